//! Observing sessions

use std::sync::Arc;

use chrono::{DateTime, FixedOffset};

use super::{EntityIndex, Identified, Observer, Site};
use crate::document::Element;
use crate::error::Result;

#[derive(Debug, Clone)]
pub struct Session {
    pub id: String,
    pub begin: DateTime<FixedOffset>,
    pub end: DateTime<FixedOffset>,
    pub site: Arc<Site>,
    pub co_observers: Vec<Arc<Observer>>,
    pub weather: Option<String>,
    pub equipment: Option<String>,
    pub comments: Option<String>,
    pub language: Option<String>,
}

impl Session {
    pub fn from_element(
        node: &Element,
        sites: &EntityIndex<Site>,
        observers: &EntityIndex<Observer>,
    ) -> Result<Self> {
        let referrer = node.describe();
        let site = sites.resolve(&node.required_text("site")?, &referrer)?;
        let co_observers = node
            .texts("coObserver")
            .iter()
            .map(|id| observers.resolve(id, &referrer))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            id: node.id()?.to_string(),
            begin: node.required_timestamp("begin")?,
            end: node.required_timestamp("end")?,
            site,
            co_observers,
            weather: node.optional_text("weather"),
            equipment: node.optional_text("equipment"),
            comments: node.optional_text("comments"),
            language: node.attribute("lang").map(str::to_string),
        })
    }
}

impl Identified for Session {
    fn id(&self) -> &str {
        &self.id
    }
}
