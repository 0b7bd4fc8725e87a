//! Findings: what an observer recorded about a target

use std::any::Any;
use std::fmt;

use super::Angle;
use crate::document::Element;
use crate::error::Result;

/// Variant-specific part of a finding
pub trait FindingDetails: fmt::Debug + Send + Sync + 'static {
    fn as_any(&self) -> &dyn Any;
}

#[derive(Debug)]
pub struct Finding {
    pub type_tag: String,
    pub description: String,
    /// Whether the target was actually seen; absent means it was
    pub seen: bool,
    pub language: Option<String>,
    pub details: Box<dyn FindingDetails>,
}

impl Finding {
    /// Read the shared finding fields and attach variant details
    pub fn from_element(node: &Element, tag: &str, details: Box<dyn FindingDetails>) -> Result<Self> {
        Ok(Self {
            type_tag: tag.to_string(),
            description: node.optional_text("description").unwrap_or_default(),
            seen: node.optional_bool("seen")?.unwrap_or(true),
            language: node.attribute("lang").map(str::to_string),
            details,
        })
    }

    pub fn details<T: FindingDetails>(&self) -> Option<&T> {
        self.details.as_any().downcast_ref::<T>()
    }
}

macro_rules! finding_details {
    ($($ty:ty),* $(,)?) => {
        $(
            impl FindingDetails for $ty {
                fn as_any(&self) -> &dyn Any {
                    self
                }
            }
        )*
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GenericFinding;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeepSkyFinding {
    /// Visibility rating, 1 (easy) to 7 (not seen)
    pub rating: Option<u8>,
    pub small_diameter: Option<Angle>,
    pub large_diameter: Option<Angle>,
    pub stellar: Option<bool>,
    pub extended: Option<bool>,
    pub resolved: Option<bool>,
    pub mottled: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct OpenClusterFinding {
    pub base: DeepSkyFinding,
    pub partly_unresolved: Option<bool>,
    pub color_contrasts: Option<bool>,
    /// Character code (A..I) describing how the cluster stands out
    pub character: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DoubleStarFinding {
    pub base: DeepSkyFinding,
    pub equal_brightness: Option<bool>,
    pub nice_surrounding: Option<bool>,
    pub color_main: Option<String>,
    pub color_companion: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct VariableStarFinding {
    pub visual_magnitude: Option<f64>,
    pub comparison_stars: Vec<String>,
    pub chart_id: Option<String>,
}

finding_details!(
    GenericFinding,
    DeepSkyFinding,
    OpenClusterFinding,
    DoubleStarFinding,
    VariableStarFinding,
);

impl DeepSkyFinding {
    pub fn from_element(node: &Element) -> Result<Self> {
        let rating = node.parse_optional::<u8>("rating")?;
        if let Some(r) = rating {
            if !(1..=7).contains(&r) {
                return Err(node.invalid("rating", &r.to_string(), "rating must be between 1 and 7"));
            }
        }
        Ok(Self {
            rating,
            small_diameter: Angle::from_child(node, "smallDiameter")?,
            large_diameter: Angle::from_child(node, "largeDiameter")?,
            stellar: node.optional_bool("stellar")?,
            extended: node.optional_bool("extended")?,
            resolved: node.optional_bool("resolved")?,
            mottled: node.optional_bool("mottled")?,
        })
    }
}

impl OpenClusterFinding {
    pub fn from_element(node: &Element) -> Result<Self> {
        Ok(Self {
            base: DeepSkyFinding::from_element(node)?,
            partly_unresolved: node.optional_bool("partlyUnresolved")?,
            color_contrasts: node.optional_bool("colorContrasts")?,
            character: node.optional_text("character"),
        })
    }
}

impl DoubleStarFinding {
    pub fn from_element(node: &Element) -> Result<Self> {
        Ok(Self {
            base: DeepSkyFinding::from_element(node)?,
            equal_brightness: node.optional_bool("equalBrightness")?,
            nice_surrounding: node.optional_bool("niceSurrounding")?,
            color_main: node.optional_text("colorMain"),
            color_companion: node.optional_text("colorCompanion"),
        })
    }
}

impl VariableStarFinding {
    pub fn from_element(node: &Element) -> Result<Self> {
        Ok(Self {
            visual_magnitude: node.parse_optional("visMag")?,
            comparison_stars: node.texts("comparisonStar"),
            chart_id: node.optional_text("chartID"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Document;

    #[test]
    fn test_deep_sky_finding() {
        let doc = Document::parse(
            r#"<result xsi:type="oal:findingsDeepSkyType" lang="en">
                <description>Bright core, dust lane suspected</description>
                <rating>2</rating>
                <extended>true</extended>
            </result>"#,
        )
        .unwrap();
        let node = doc.root();
        let finding = Finding::from_element(
            node,
            "oal:findingsDeepSkyType",
            Box::new(DeepSkyFinding::from_element(node).unwrap()),
        )
        .unwrap();

        assert!(finding.seen);
        assert_eq!(finding.language.as_deref(), Some("en"));
        let details = finding.details::<DeepSkyFinding>().unwrap();
        assert_eq!(details.rating, Some(2));
        assert_eq!(details.extended, Some(true));
    }

    #[test]
    fn test_rating_out_of_range() {
        let doc = Document::parse(r#"<result><rating>9</rating></result>"#).unwrap();
        assert!(DeepSkyFinding::from_element(doc.root()).is_err());
    }

    #[test]
    fn test_not_seen() {
        let doc = Document::parse(r#"<result><description>clouds</description><seen>false</seen></result>"#)
            .unwrap();
        let finding = Finding::from_element(doc.root(), "oal:findingsType", Box::new(GenericFinding)).unwrap();
        assert!(!finding.seen);
    }
}
