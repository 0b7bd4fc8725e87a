//! Built-in variants
//!
//! These are always present, before and after any extension scan.

use super::{RegistryTables, Role, VariantDescriptor, VariantOrigin};
use crate::model::equipment::{CcdCamera, GenericImager};
use crate::model::finding::{
    DeepSkyFinding, DoubleStarFinding, GenericFinding, OpenClusterFinding, VariableStarFinding,
};
use crate::model::target::{
    DeepSkyObject, DoubleStar, Galaxy, GenericTarget, GlobularCluster, OpenCluster,
    PlanetaryNebula, VariableStar,
};
use crate::model::{Finding, Imager, Target};

pub const GENERIC_TARGET: &str = "oal:observationTargetType";
pub const DEEP_SKY_GALAXY: &str = "oal:deepSkyGX";
pub const DEEP_SKY_GLOBULAR_CLUSTER: &str = "oal:deepSkyGC";
pub const DEEP_SKY_OPEN_CLUSTER: &str = "oal:deepSkyOC";
pub const DEEP_SKY_GALACTIC_NEBULA: &str = "oal:deepSkyGN";
pub const DEEP_SKY_PLANETARY_NEBULA: &str = "oal:deepSkyPN";
pub const DEEP_SKY_DOUBLE_STAR: &str = "oal:deepSkyDS";
pub const DEEP_SKY_ASTERISM: &str = "oal:deepSkyAS";
pub const DEEP_SKY_UNSPECIFIED: &str = "oal:deepSkyNA";
pub const DEEP_SKY_DARK_NEBULA: &str = "oal:deepSkyDN";
pub const DEEP_SKY_CLUSTER_OF_GALAXIES: &str = "oal:deepSkyCG";
pub const DEEP_SKY_CLUSTER_NEBULA: &str = "oal:deepSkyCD";
pub const DEEP_SKY_MULTIPLE_STAR: &str = "oal:deepSkyMS";
pub const DEEP_SKY_QUASAR: &str = "oal:deepSkyQS";
pub const PLANET: &str = "oal:PlanetTargetType";
pub const MOON: &str = "oal:MoonTargetType";
pub const SUN: &str = "oal:SunTargetType";
pub const COMET: &str = "oal:CometTargetType";
pub const MINOR_PLANET: &str = "oal:MinorPlanetTargetType";
pub const VARIABLE_STAR: &str = "oal:VariableStarTargetType";

pub const GENERIC_FINDING: &str = "oal:findingsType";
pub const DEEP_SKY_FINDING: &str = "oal:findingsDeepSkyType";
pub const OPEN_CLUSTER_FINDING: &str = "oal:findingsDeepSkyOCType";
pub const DOUBLE_STAR_FINDING: &str = "oal:findingsDeepSkyDSType";
pub const VARIABLE_STAR_FINDING: &str = "oal:findingsVariableStarType";

pub const GENERIC_IMAGER: &str = "oal:imagerType";
pub const CCD_CAMERA: &str = "oal:ccdCameraType";

macro_rules! target {
    ($tables:expr, $tag:expr, $finding:expr, $name:literal, |$node:ident| $details:expr) => {
        $tables.register(
            $tag,
            Role::Target,
            VariantDescriptor::target($name, VariantOrigin::Builtin, |$node, ctx| {
                Target::from_element($node, ctx, Box::new($details))
            }),
        );
        $tables.link_finding($tag, $finding);
    };
}

macro_rules! finding {
    ($tables:expr, $tag:expr, $name:literal, |$node:ident| $details:expr) => {
        $tables.register(
            $tag,
            Role::Finding,
            VariantDescriptor::finding($name, VariantOrigin::Builtin, |$node, tag| {
                Finding::from_element($node, tag, Box::new($details))
            }),
        );
    };
}

pub(crate) fn seed(tables: &mut RegistryTables) {
    target!(tables, GENERIC_TARGET, GENERIC_FINDING, "builtin::GenericTarget", |_node| GenericTarget);
    target!(tables, DEEP_SKY_GALAXY, DEEP_SKY_FINDING, "builtin::Galaxy", |node| Galaxy::from_element(node)?);
    target!(tables, DEEP_SKY_GLOBULAR_CLUSTER, DEEP_SKY_FINDING, "builtin::GlobularCluster", |node| {
        GlobularCluster::from_element(node)?
    });
    target!(tables, DEEP_SKY_OPEN_CLUSTER, OPEN_CLUSTER_FINDING, "builtin::OpenCluster", |node| {
        OpenCluster::from_element(node)?
    });
    target!(tables, DEEP_SKY_PLANETARY_NEBULA, DEEP_SKY_FINDING, "builtin::PlanetaryNebula", |node| {
        PlanetaryNebula::from_element(node)?
    });
    target!(tables, DEEP_SKY_DOUBLE_STAR, DOUBLE_STAR_FINDING, "builtin::DoubleStar", |node| {
        DoubleStar::from_element(node)?
    });
    for tag in [
        DEEP_SKY_GALACTIC_NEBULA,
        DEEP_SKY_ASTERISM,
        DEEP_SKY_UNSPECIFIED,
        DEEP_SKY_DARK_NEBULA,
        DEEP_SKY_CLUSTER_OF_GALAXIES,
        DEEP_SKY_CLUSTER_NEBULA,
        DEEP_SKY_MULTIPLE_STAR,
        DEEP_SKY_QUASAR,
    ] {
        target!(tables, tag, DEEP_SKY_FINDING, "builtin::DeepSkyObject", |node| {
            DeepSkyObject::from_element(node)?
        });
    }
    for tag in [PLANET, MOON, SUN, COMET, MINOR_PLANET] {
        target!(tables, tag, GENERIC_FINDING, "builtin::SolarSystemBody", |_node| GenericTarget);
    }
    target!(tables, VARIABLE_STAR, VARIABLE_STAR_FINDING, "builtin::VariableStar", |node| {
        VariableStar::from_element(node)?
    });

    finding!(tables, GENERIC_FINDING, "builtin::GenericFinding", |_node| GenericFinding);
    finding!(tables, DEEP_SKY_FINDING, "builtin::DeepSkyFinding", |node| DeepSkyFinding::from_element(node)?);
    finding!(tables, OPEN_CLUSTER_FINDING, "builtin::OpenClusterFinding", |node| {
        OpenClusterFinding::from_element(node)?
    });
    finding!(tables, DOUBLE_STAR_FINDING, "builtin::DoubleStarFinding", |node| {
        DoubleStarFinding::from_element(node)?
    });
    finding!(tables, VARIABLE_STAR_FINDING, "builtin::VariableStarFinding", |node| {
        VariableStarFinding::from_element(node)?
    });

    tables.register(
        GENERIC_IMAGER,
        Role::Imager,
        VariantDescriptor::imager("builtin::GenericImager", VariantOrigin::Builtin, |node, tag| {
            Imager::from_element(node, tag, Box::new(GenericImager))
        }),
    );
    tables.register(
        CCD_CAMERA,
        Role::Imager,
        VariantDescriptor::imager("builtin::CcdCamera", VariantOrigin::Builtin, |node, tag| {
            Imager::from_element(node, tag, Box::new(CcdCamera::from_element(node)?))
        }),
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_linked_finding_is_registered() {
        let tables = RegistryTables::seeded();
        for tag in tables.tags(Role::Target) {
            let finding = tables.linked_finding_tag(tag);
            assert!(
                tables.contains(finding, Role::Finding),
                "{} links to unregistered finding {}",
                tag,
                finding
            );
        }
    }

    #[test]
    fn test_oal_target_types_are_covered() {
        let tables = RegistryTables::seeded();
        for tag in [
            DEEP_SKY_DARK_NEBULA,
            DEEP_SKY_CLUSTER_OF_GALAXIES,
            DEEP_SKY_CLUSTER_NEBULA,
            DEEP_SKY_MULTIPLE_STAR,
            DEEP_SKY_QUASAR,
        ] {
            assert_eq!(tables.resolve(tag, Role::Target).unwrap().name, "builtin::DeepSkyObject");
            assert_eq!(tables.linked_finding_tag(tag), DEEP_SKY_FINDING);
        }
        for tag in [COMET, MINOR_PLANET] {
            assert_eq!(tables.resolve(tag, Role::Target).unwrap().name, "builtin::SolarSystemBody");
            assert_eq!(tables.linked_finding_tag(tag), GENERIC_FINDING);
        }
    }

    #[test]
    fn test_builtin_origin() {
        let tables = RegistryTables::seeded();
        let descriptor = tables.resolve(DEEP_SKY_DOUBLE_STAR, Role::Target).unwrap();
        assert_eq!(descriptor.origin, VariantOrigin::Builtin);
        assert_eq!(descriptor.constructor.role(), Some(Role::Target));
    }
}
