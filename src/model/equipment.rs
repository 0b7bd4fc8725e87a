//! Optical and imaging equipment
//!
//! Availability is not a field of the equipment node: an element carrying
//! an `<!-- unavailable -->` comment is equipment the observer no longer
//! owns, kept only so old observations still resolve.

use std::any::Any;
use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use super::{Angle, Identified};
use crate::document::Element;
use crate::error::Result;

/// Comment text marking a piece of equipment as no longer available
pub const UNAVAILABLE_MARKER: &str = "unavailable";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Availability {
    Available,
    Unavailable,
}

impl Availability {
    pub fn of(node: &Element) -> Self {
        let marked = node
            .comments()
            .any(|c| c.trim().eq_ignore_ascii_case(UNAVAILABLE_MARKER));
        if marked {
            Availability::Unavailable
        } else {
            Availability::Available
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self, Availability::Available)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Scope {
    pub id: String,
    pub model: String,
    pub vendor: Option<String>,
    pub kind: Option<String>,
    /// Aperture in millimeters
    pub aperture: f64,
    /// Focal length in millimeters (telescopes)
    pub focal_length: Option<f64>,
    /// Fixed magnification (binoculars, finders)
    pub magnification: Option<f64>,
    pub light_grasp: Option<f64>,
    pub true_field: Option<Angle>,
    pub availability: Availability,
}

impl Scope {
    pub fn from_element(node: &Element) -> Result<Self> {
        Ok(Self {
            id: node.id()?.to_string(),
            model: node.required_text("model")?,
            vendor: node.optional_text("vendor"),
            kind: node.optional_text("type"),
            aperture: node.parse_required("aperture")?,
            focal_length: node.parse_optional("focalLength")?,
            magnification: node.parse_optional("magnification")?,
            light_grasp: node.parse_optional("lightGrasp")?,
            true_field: Angle::from_child(node, "trueField")?,
            availability: Availability::of(node),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Eyepiece {
    pub id: String,
    pub model: String,
    pub vendor: Option<String>,
    pub focal_length: f64,
    /// Upper end of a zoom eyepiece
    pub max_focal_length: Option<f64>,
    pub apparent_fov: Option<Angle>,
    pub availability: Availability,
}

impl Eyepiece {
    pub fn from_element(node: &Element) -> Result<Self> {
        Ok(Self {
            id: node.id()?.to_string(),
            model: node.required_text("model")?,
            vendor: node.optional_text("vendor"),
            focal_length: node.parse_required("focalLength")?,
            max_focal_length: node.parse_optional("maxFocalLength")?,
            apparent_fov: Angle::from_child(node, "apparentFOV")?,
            availability: Availability::of(node),
        })
    }

    pub fn is_zoom(&self) -> bool {
        self.max_focal_length.is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum FilterKind {
    Other,
    BroadBand,
    NarrowBand,
    OIII,
    HBeta,
    HAlpha,
    Color,
    Neutral,
    Corrective,
}

impl FromStr for FilterKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "other" => Ok(FilterKind::Other),
            "broad band" => Ok(FilterKind::BroadBand),
            "narrow band" => Ok(FilterKind::NarrowBand),
            "O-III" => Ok(FilterKind::OIII),
            "H-beta" => Ok(FilterKind::HBeta),
            "H-alpha" => Ok(FilterKind::HAlpha),
            "color" => Ok(FilterKind::Color),
            "neutral" => Ok(FilterKind::Neutral),
            "corrective" => Ok(FilterKind::Corrective),
            other => Err(format!("unknown filter type '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Filter {
    pub id: String,
    pub model: String,
    pub vendor: Option<String>,
    pub kind: FilterKind,
    /// Color name, only meaningful for color filters
    pub color: Option<String>,
    pub wratten: Option<String>,
    pub schott: Option<String>,
    pub availability: Availability,
}

impl Filter {
    pub fn from_element(node: &Element) -> Result<Self> {
        Ok(Self {
            id: node.id()?.to_string(),
            model: node.required_text("model")?,
            vendor: node.optional_text("vendor"),
            kind: node.parse_required("type")?,
            color: node.optional_text("color"),
            wratten: node.optional_text("wratten"),
            schott: node.optional_text("schott"),
            availability: Availability::of(node),
        })
    }
}

/// Barlow or reducer
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Lens {
    pub id: String,
    pub model: String,
    pub vendor: Option<String>,
    pub factor: f64,
    pub availability: Availability,
}

impl Lens {
    pub fn from_element(node: &Element) -> Result<Self> {
        Ok(Self {
            id: node.id()?.to_string(),
            model: node.required_text("model")?,
            vendor: node.optional_text("vendor"),
            factor: node.parse_required("factor")?,
            availability: Availability::of(node),
        })
    }
}

/// Variant-specific part of an imager
pub trait ImagerDetails: fmt::Debug + Send + Sync + 'static {
    fn as_any(&self) -> &dyn Any;
}

/// Imager variant without extra fields
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GenericImager;

impl ImagerDetails for GenericImager {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CcdCamera {
    pub pixels_x: u32,
    pub pixels_y: u32,
}

impl CcdCamera {
    pub fn from_element(node: &Element) -> Result<Self> {
        Ok(Self {
            pixels_x: node.parse_required("pixelsX")?,
            pixels_y: node.parse_required("pixelsY")?,
        })
    }
}

impl ImagerDetails for CcdCamera {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// A camera or other imaging device (polymorphic by type tag)
#[derive(Debug)]
pub struct Imager {
    pub id: String,
    pub type_tag: String,
    pub model: String,
    pub vendor: Option<String>,
    pub remarks: Option<String>,
    pub availability: Availability,
    pub details: Box<dyn ImagerDetails>,
}

impl Imager {
    /// Read the shared imager fields and attach variant details
    pub fn from_element(node: &Element, tag: &str, details: Box<dyn ImagerDetails>) -> Result<Self> {
        Ok(Self {
            id: node.id()?.to_string(),
            type_tag: tag.to_string(),
            model: node.required_text("model")?,
            vendor: node.optional_text("vendor"),
            remarks: node.optional_text("remarks"),
            availability: Availability::of(node),
            details,
        })
    }

    pub fn details<T: ImagerDetails>(&self) -> Option<&T> {
        self.details.as_any().downcast_ref::<T>()
    }
}

impl Identified for Scope {
    fn id(&self) -> &str {
        &self.id
    }
}

impl Identified for Eyepiece {
    fn id(&self) -> &str {
        &self.id
    }
}

impl Identified for Filter {
    fn id(&self) -> &str {
        &self.id
    }
}

impl Identified for Lens {
    fn id(&self) -> &str {
        &self.id
    }
}

impl Identified for Imager {
    fn id(&self) -> &str {
        &self.id
    }
}
