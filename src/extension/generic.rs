//! Generic entry point
//!
//! Lets a bundle add new tags without shipping any code: every target
//! entry builds a target with the shared fields only, every finding entry
//! a finding with description and seen flag.

use std::sync::Arc;

use super::{EntryPointCatalog, Extension};
use crate::document::Element;
use crate::error::Result;
use crate::model::finding::GenericFinding;
use crate::model::target::GenericTarget;
use crate::model::{Finding, Target, TargetContext};
use crate::registry::{FindingFactory, TargetFactory};

/// Entry-point name bundles use to select this extension
pub const GENERIC_ENTRY_POINT: &str = "archive::Generic";

#[derive(Debug, Default)]
pub struct GenericExtension;

fn generic_target(node: &Element, ctx: &TargetContext<'_>) -> Result<Target> {
    Target::from_element(node, ctx, Box::new(GenericTarget))
}

fn generic_finding(node: &Element, tag: &str) -> Result<Finding> {
    Finding::from_element(node, tag, Box::new(GenericFinding))
}

impl Extension for GenericExtension {
    fn target_factory(&self, _entry: &str) -> Option<TargetFactory> {
        Some(Arc::new(generic_target) as TargetFactory)
    }

    fn finding_factory(&self, _entry: &str) -> Option<FindingFactory> {
        Some(Arc::new(generic_finding) as FindingFactory)
    }
}

impl EntryPointCatalog {
    /// A catalog holding the generic entry point
    pub fn standard() -> Self {
        let mut catalog = Self::new();
        catalog.register(GENERIC_ENTRY_POINT, |_| Ok(Box::new(GenericExtension) as Box<dyn Extension>));
        catalog
    }
}
