//! Observation targets
//!
//! A target is either taken from a named catalog (it carries a datasource)
//! or authored by an observer (it references one). Variant-specific data
//! hangs off [`Target::details`] so extensions can add variants the core
//! never heard of.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use super::{Angle, EntityIndex, EquatorialPosition, Identified, Observer};
use crate::document::Element;
use crate::error::{ArchiveError, Result};

/// Where a target came from
#[derive(Debug, Clone)]
pub enum TargetOrigin {
    /// Name of the catalog the target was taken from
    Catalog(String),
    /// The observer who created the target
    Observer(Arc<Observer>),
}

/// Already-built entities a target factory may depend on
pub struct TargetContext<'a> {
    pub tag: &'a str,
    pub observers: &'a EntityIndex<Observer>,
}

/// Variant-specific part of a target
pub trait TargetDetails: fmt::Debug + Send + Sync + 'static {
    fn as_any(&self) -> &dyn Any;
}

#[derive(Debug)]
pub struct Target {
    pub id: String,
    pub type_tag: String,
    pub name: String,
    pub aliases: Vec<String>,
    pub constellation: Option<String>,
    pub position: Option<EquatorialPosition>,
    pub notes: Option<String>,
    pub origin: TargetOrigin,
    pub details: Box<dyn TargetDetails>,
}

impl Target {
    /// Read the shared target fields and attach variant details
    pub fn from_element(
        node: &Element,
        ctx: &TargetContext<'_>,
        details: Box<dyn TargetDetails>,
    ) -> Result<Self> {
        let origin = match (node.optional_text("datasource"), node.optional_text("observer")) {
            (Some(source), None) => TargetOrigin::Catalog(source),
            (None, Some(observer)) => {
                TargetOrigin::Observer(ctx.observers.resolve(&observer, &node.describe())?)
            }
            (Some(_), Some(_)) => {
                return Err(ArchiveError::structural(
                    node.describe(),
                    "target has both a datasource and an observer",
                ))
            }
            (None, None) => {
                return Err(ArchiveError::structural(
                    node.describe(),
                    "target has neither a datasource nor an observer",
                ))
            }
        };

        Ok(Self {
            id: node.id()?.to_string(),
            type_tag: ctx.tag.to_string(),
            name: node.required_text("name")?,
            aliases: node.texts("alias"),
            constellation: node.optional_text("constellation"),
            position: EquatorialPosition::from_child(node, "position")?,
            notes: node.optional_text("notes"),
            origin,
            details,
        })
    }

    pub fn is_catalog_origin(&self) -> bool {
        matches!(self.origin, TargetOrigin::Catalog(_))
    }

    pub fn datasource(&self) -> Option<&str> {
        match &self.origin {
            TargetOrigin::Catalog(source) => Some(source),
            TargetOrigin::Observer(_) => None,
        }
    }

    pub fn details<T: TargetDetails>(&self) -> Option<&T> {
        self.details.as_any().downcast_ref::<T>()
    }
}

impl Identified for Target {
    fn id(&self) -> &str {
        &self.id
    }
}

/// Target variant without extra fields (generic and solar system bodies)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GenericTarget;

impl TargetDetails for GenericTarget {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Fields shared by every deep-sky variant
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeepSkyCommon {
    pub visual_magnitude: Option<f64>,
    pub surface_brightness: Option<f64>,
    pub large_diameter: Option<Angle>,
    pub small_diameter: Option<Angle>,
    pub position_angle: Option<i32>,
}

impl DeepSkyCommon {
    pub fn from_element(node: &Element) -> Result<Self> {
        Ok(Self {
            visual_magnitude: node.parse_optional("visMag")?,
            surface_brightness: node.parse_optional("surfBr")?,
            large_diameter: Angle::from_child(node, "largeDiameter")?,
            small_diameter: Angle::from_child(node, "smallDiameter")?,
            position_angle: node.parse_optional("pa")?,
        })
    }
}

macro_rules! target_details {
    ($($ty:ty),* $(,)?) => {
        $(
            impl TargetDetails for $ty {
                fn as_any(&self) -> &dyn Any {
                    self
                }
            }
        )*
    };
}

/// Nebulae, asterisms and other deep-sky objects without extra fields
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeepSkyObject {
    pub common: DeepSkyCommon,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Galaxy {
    pub common: DeepSkyCommon,
    pub hubble_type: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct GlobularCluster {
    pub common: DeepSkyCommon,
    pub brightest_stars_magnitude: Option<f64>,
    /// Shapley-Sawyer concentration class
    pub concentration: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct OpenCluster {
    pub common: DeepSkyCommon,
    pub stars: Option<u32>,
    pub brightest_star: Option<f64>,
    /// Trumpler classification
    pub classification: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlanetaryNebula {
    pub common: DeepSkyCommon,
    pub central_star_magnitude: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DoubleStar {
    pub common: DeepSkyCommon,
    pub separation: Option<Angle>,
    pub companion_position_angle: Option<i32>,
    pub companion_magnitude: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct VariableStar {
    pub star_type: Option<String>,
    pub max_magnitude: Option<f64>,
    /// Period in days
    pub period: Option<f64>,
}

target_details!(
    DeepSkyObject,
    Galaxy,
    GlobularCluster,
    OpenCluster,
    PlanetaryNebula,
    DoubleStar,
    VariableStar,
);

impl DeepSkyObject {
    pub fn from_element(node: &Element) -> Result<Self> {
        Ok(Self {
            common: DeepSkyCommon::from_element(node)?,
        })
    }
}

impl Galaxy {
    pub fn from_element(node: &Element) -> Result<Self> {
        Ok(Self {
            common: DeepSkyCommon::from_element(node)?,
            hubble_type: node.optional_text("hubbleType"),
        })
    }
}

impl GlobularCluster {
    pub fn from_element(node: &Element) -> Result<Self> {
        Ok(Self {
            common: DeepSkyCommon::from_element(node)?,
            brightest_stars_magnitude: node.parse_optional("magStars")?,
            concentration: node.optional_text("conc"),
        })
    }
}

impl OpenCluster {
    pub fn from_element(node: &Element) -> Result<Self> {
        Ok(Self {
            common: DeepSkyCommon::from_element(node)?,
            stars: node.parse_optional("stars")?,
            brightest_star: node.parse_optional("brightestStar")?,
            classification: node.optional_text("class"),
        })
    }
}

impl PlanetaryNebula {
    pub fn from_element(node: &Element) -> Result<Self> {
        Ok(Self {
            common: DeepSkyCommon::from_element(node)?,
            central_star_magnitude: node.parse_optional("magc")?,
        })
    }
}

impl DoubleStar {
    pub fn from_element(node: &Element) -> Result<Self> {
        Ok(Self {
            common: DeepSkyCommon::from_element(node)?,
            separation: Angle::from_child(node, "separation")?,
            companion_position_angle: node.parse_optional("pa")?,
            companion_magnitude: node.parse_optional("magComp")?,
        })
    }
}

impl VariableStar {
    pub fn from_element(node: &Element) -> Result<Self> {
        Ok(Self {
            star_type: node.optional_text("type"),
            max_magnitude: node.parse_optional("maxApparentMag")?,
            period: node.parse_optional("period")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Document;

    fn observers() -> EntityIndex<Observer> {
        let doc = Document::parse(
            r#"<observer id="obs1"><name>Charles</name><surname>Messier</surname></observer>"#,
        )
        .unwrap();
        let mut index = EntityIndex::new(crate::model::EntityKind::Observer);
        index.insert(Observer::from_element(doc.root()).unwrap()).unwrap();
        index
    }

    #[test]
    fn test_catalog_target() {
        let observers = observers();
        let ctx = TargetContext { tag: "oal:deepSkyGX", observers: &observers };
        let doc = Document::parse(
            r#"<target id="m31" xsi:type="oal:deepSkyGX">
                <datasource>Messier</datasource>
                <name>M 31</name>
                <alias>Andromeda Galaxy</alias>
                <position><ra unit="rad">0.1864</ra><dec unit="rad">0.7202</dec></position>
                <constellation>AND</constellation>
                <visMag>3.4</visMag>
                <hubbleType>Sb</hubbleType>
            </target>"#,
        )
        .unwrap();
        let node = doc.root();

        let target =
            Target::from_element(node, &ctx, Box::new(Galaxy::from_element(node).unwrap())).unwrap();
        assert!(target.is_catalog_origin());
        assert_eq!(target.datasource(), Some("Messier"));
        assert_eq!(target.type_tag, "oal:deepSkyGX");
        assert_eq!(target.aliases, vec!["Andromeda Galaxy"]);

        let galaxy = target.details::<Galaxy>().unwrap();
        assert_eq!(galaxy.hubble_type.as_deref(), Some("Sb"));
        assert_eq!(galaxy.common.visual_magnitude, Some(3.4));
    }

    #[test]
    fn test_observer_target_resolves_observer() {
        let observers = observers();
        let ctx = TargetContext { tag: "oal:observationTargetType", observers: &observers };
        let doc = Document::parse(
            r#"<target id="t1"><observer>obs1</observer><name>Odd smudge</name></target>"#,
        )
        .unwrap();

        let target = Target::from_element(doc.root(), &ctx, Box::new(GenericTarget)).unwrap();
        match &target.origin {
            TargetOrigin::Observer(observer) => assert_eq!(observer.surname, "Messier"),
            other => panic!("Expected observer origin, got {:?}", other),
        }
    }

    #[test]
    fn test_origin_must_be_exclusive() {
        let observers = observers();
        let ctx = TargetContext { tag: "oal:observationTargetType", observers: &observers };

        let both = Document::parse(
            r#"<target id="t1"><datasource>NGC</datasource><observer>obs1</observer><name>x</name></target>"#,
        )
        .unwrap();
        assert!(matches!(
            Target::from_element(both.root(), &ctx, Box::new(GenericTarget)),
            Err(ArchiveError::Structural { .. })
        ));

        let neither = Document::parse(r#"<target id="t2"><name>x</name></target>"#).unwrap();
        assert!(Target::from_element(neither.root(), &ctx, Box::new(GenericTarget)).is_err());

        let dangling = Document::parse(
            r#"<target id="t3"><observer>nobody</observer><name>x</name></target>"#,
        )
        .unwrap();
        assert!(matches!(
            Target::from_element(dangling.root(), &ctx, Box::new(GenericTarget)),
            Err(ArchiveError::DanglingReference { .. })
        ));
    }
}
