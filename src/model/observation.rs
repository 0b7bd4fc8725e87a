//! Observations

use std::sync::Arc;

use chrono::{DateTime, FixedOffset};

use super::{Eyepiece, Filter, Finding, Identified, Imager, Lens, Observer, Scope, Session, Site, Target};

/// One observer looking at one target at one time
#[derive(Debug)]
pub struct Observation {
    pub id: String,
    pub begin: DateTime<FixedOffset>,
    pub end: Option<DateTime<FixedOffset>>,
    pub observer: Arc<Observer>,
    pub target: Arc<Target>,
    /// At least one entry
    pub findings: Vec<Finding>,
    pub session: Option<Arc<Session>>,
    pub site: Option<Arc<Site>>,
    pub scope: Option<Arc<Scope>>,
    pub eyepiece: Option<Arc<Eyepiece>>,
    pub filter: Option<Arc<Filter>>,
    pub imager: Option<Arc<Imager>>,
    pub lens: Option<Arc<Lens>>,
    /// Antoniadi scale, 1 (perfect) to 5 (very bad)
    pub seeing: Option<u8>,
    pub magnification: Option<f64>,
    pub faintest_star: Option<f64>,
    pub accessories: Option<String>,
    pub images: Vec<String>,
}

impl Observation {
    /// The site, taken from the session when the observation names none
    pub fn effective_site(&self) -> Option<&Arc<Site>> {
        self.site
            .as_ref()
            .or_else(|| self.session.as_ref().map(|s| &s.site))
    }
}

impl Identified for Observation {
    fn id(&self) -> &str {
        &self.id
    }
}
