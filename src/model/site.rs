//! Observing sites

use serde::Serialize;

use super::{Angle, Identified};
use crate::document::Element;
use crate::error::Result;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Site {
    pub id: String,
    pub name: String,
    pub latitude: Angle,
    pub longitude: Angle,
    /// Offset from UTC in minutes
    pub timezone: i32,
    /// Meters above sea level
    pub elevation: Option<f64>,
    pub iau_code: Option<String>,
}

impl Site {
    pub fn from_element(node: &Element) -> Result<Self> {
        Ok(Self {
            id: node.id()?.to_string(),
            name: node.required_text("name")?,
            latitude: Angle::required_child(node, "latitude")?,
            longitude: Angle::required_child(node, "longitude")?,
            timezone: node.parse_required("timezone")?,
            elevation: node.parse_optional("elevation")?,
            iau_code: node.optional_text("code"),
        })
    }
}

impl Identified for Site {
    fn id(&self) -> &str {
        &self.id
    }
}
