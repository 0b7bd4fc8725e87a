//! Domain entities of an observation archive
//!
//! Every entity is built once by the loader and never mutated afterwards.
//! Cross-references are shared `Arc` handles into the owning collection.

pub mod equipment;
pub mod finding;
pub mod observation;
pub mod observer;
pub mod session;
pub mod site;
pub mod target;

pub use equipment::{
    Availability, CcdCamera, Eyepiece, Filter, FilterKind, GenericImager, Imager, ImagerDetails,
    Lens, Scope,
};
pub use finding::{Finding, FindingDetails};
pub use observation::Observation;
pub use observer::Observer;
pub use session::Session;
pub use site::Site;
pub use target::{Target, TargetContext, TargetDetails, TargetOrigin};

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::document::Element;
use crate::error::{ArchiveError, Result};

/// The kinds of entity an archive holds, one per document container
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Observer,
    Target,
    Site,
    Scope,
    Lens,
    Eyepiece,
    Filter,
    Imager,
    Session,
    Observation,
}

impl EntityKind {
    /// Element name of a single entity node
    pub fn element_name(&self) -> &'static str {
        match self {
            EntityKind::Observer => "observer",
            EntityKind::Target => "target",
            EntityKind::Site => "site",
            EntityKind::Scope => "scope",
            EntityKind::Lens => "lens",
            EntityKind::Eyepiece => "eyepiece",
            EntityKind::Filter => "filter",
            EntityKind::Imager => "imager",
            EntityKind::Session => "session",
            EntityKind::Observation => "observation",
        }
    }

    /// Element name of the container holding this kind
    pub fn container_name(&self) -> &'static str {
        match self {
            EntityKind::Observer => "observers",
            EntityKind::Target => "targets",
            EntityKind::Site => "sites",
            EntityKind::Scope => "scopes",
            EntityKind::Lens => "lenses",
            EntityKind::Eyepiece => "eyepieces",
            EntityKind::Filter => "filters",
            EntityKind::Imager => "imagers",
            EntityKind::Session => "sessions",
            EntityKind::Observation => "observations",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.element_name())
    }
}

/// Anything with a document-unique ID
pub trait Identified {
    fn id(&self) -> &str;
}

/// Entities of one kind in document order, indexed by ID
#[derive(Debug)]
pub struct EntityIndex<T> {
    kind: EntityKind,
    items: Vec<Arc<T>>,
    by_id: HashMap<String, Arc<T>>,
}

impl<T: Identified> EntityIndex<T> {
    pub fn new(kind: EntityKind) -> Self {
        Self {
            kind,
            items: Vec::new(),
            by_id: HashMap::new(),
        }
    }

    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    /// Add an entity; a second entity with the same ID is a structural error
    pub fn insert(&mut self, entity: T) -> Result<Arc<T>> {
        if self.by_id.contains_key(entity.id()) {
            return Err(ArchiveError::structural(
                self.kind.container_name(),
                format!("duplicate {} id '{}'", self.kind, entity.id()),
            ));
        }
        let entity = Arc::new(entity);
        self.by_id.insert(entity.id().to_string(), Arc::clone(&entity));
        self.items.push(Arc::clone(&entity));
        Ok(entity)
    }

    pub fn get(&self, id: &str) -> Option<&Arc<T>> {
        self.by_id.get(id)
    }

    /// Resolve a reference field, failing with a dangling-reference error
    pub fn resolve(&self, id: &str, referrer: &str) -> Result<Arc<T>> {
        self.by_id
            .get(id)
            .cloned()
            .ok_or_else(|| ArchiveError::DanglingReference {
                kind: self.kind,
                id: id.to_string(),
                referrer: referrer.to_string(),
            })
    }

    /// Resolve an optional reference child of `node`
    pub fn resolve_child(&self, node: &Element, field: &str) -> Result<Option<Arc<T>>> {
        match node.optional_text(field) {
            Some(id) => self.resolve(&id, &node.describe()).map(Some),
            None => Ok(None),
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn items(&self) -> &[Arc<T>] {
        &self.items
    }

    pub fn into_items(self) -> Vec<Arc<T>> {
        self.items
    }
}

/// Unit an angle was recorded in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AngleUnit {
    Deg,
    Rad,
    ArcMin,
    ArcSec,
}

impl FromStr for AngleUnit {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "deg" => Ok(AngleUnit::Deg),
            "rad" => Ok(AngleUnit::Rad),
            "arcmin" => Ok(AngleUnit::ArcMin),
            "arcsec" => Ok(AngleUnit::ArcSec),
            other => Err(format!("unknown angle unit '{}'", other)),
        }
    }
}

/// An angle as written in the document
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Angle {
    pub value: f64,
    pub unit: AngleUnit,
}

impl Angle {
    pub fn degrees(value: f64) -> Self {
        Self { value, unit: AngleUnit::Deg }
    }

    pub fn to_degrees(&self) -> f64 {
        match self.unit {
            AngleUnit::Deg => self.value,
            AngleUnit::Rad => self.value.to_degrees(),
            AngleUnit::ArcMin => self.value / 60.0,
            AngleUnit::ArcSec => self.value / 3600.0,
        }
    }

    /// Read `<field unit="...">value</field>`; a missing unit means degrees
    pub fn from_child(parent: &Element, field: &str) -> Result<Option<Self>> {
        let Some(node) = parent.child(field) else {
            return Ok(None);
        };
        let raw = node.text();
        if raw.is_empty() {
            return Ok(None);
        }
        let value = raw
            .parse::<f64>()
            .map_err(|e| parent.invalid(field, &raw, e))?;
        let unit = match node.attribute("unit") {
            Some(unit) => unit
                .parse::<AngleUnit>()
                .map_err(|e| parent.invalid(field, unit, e))?,
            None => AngleUnit::Deg,
        };
        Ok(Some(Self { value, unit }))
    }

    pub fn required_child(parent: &Element, field: &str) -> Result<Self> {
        Self::from_child(parent, field)?
            .ok_or_else(|| parent.missing(field))
    }
}

/// Right ascension / declination pair
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EquatorialPosition {
    pub ra: Angle,
    pub dec: Angle,
}

impl EquatorialPosition {
    pub fn from_child(parent: &Element, field: &str) -> Result<Option<Self>> {
        match parent.child(field) {
            Some(node) => Ok(Some(Self {
                ra: Angle::required_child(node, "ra")?,
                dec: Angle::required_child(node, "dec")?,
            })),
            None => Ok(None),
        }
    }
}

/// The fully resolved result of one successful load
#[derive(Debug, Default)]
pub struct RootGraph {
    pub(crate) observers: Vec<Arc<Observer>>,
    pub(crate) targets: Vec<Arc<Target>>,
    pub(crate) sites: Vec<Arc<Site>>,
    pub(crate) scopes: Vec<Arc<Scope>>,
    pub(crate) lenses: Vec<Arc<Lens>>,
    pub(crate) eyepieces: Vec<Arc<Eyepiece>>,
    pub(crate) filters: Vec<Arc<Filter>>,
    pub(crate) imagers: Vec<Arc<Imager>>,
    pub(crate) sessions: Vec<Arc<Session>>,
    pub(crate) observations: Vec<Arc<Observation>>,
}

fn find<'a, T: Identified>(items: &'a [Arc<T>], id: &str) -> Option<&'a Arc<T>> {
    items.iter().find(|item| item.id() == id)
}

impl RootGraph {
    pub fn observers(&self) -> &[Arc<Observer>] {
        &self.observers
    }

    pub fn targets(&self) -> &[Arc<Target>] {
        &self.targets
    }

    pub fn sites(&self) -> &[Arc<Site>] {
        &self.sites
    }

    pub fn scopes(&self) -> &[Arc<Scope>] {
        &self.scopes
    }

    pub fn lenses(&self) -> &[Arc<Lens>] {
        &self.lenses
    }

    pub fn eyepieces(&self) -> &[Arc<Eyepiece>] {
        &self.eyepieces
    }

    pub fn filters(&self) -> &[Arc<Filter>] {
        &self.filters
    }

    pub fn imagers(&self) -> &[Arc<Imager>] {
        &self.imagers
    }

    pub fn sessions(&self) -> &[Arc<Session>] {
        &self.sessions
    }

    pub fn observations(&self) -> &[Arc<Observation>] {
        &self.observations
    }

    pub fn observer(&self, id: &str) -> Option<&Arc<Observer>> {
        find(&self.observers, id)
    }

    pub fn target(&self, id: &str) -> Option<&Arc<Target>> {
        find(&self.targets, id)
    }

    pub fn site(&self, id: &str) -> Option<&Arc<Site>> {
        find(&self.sites, id)
    }

    pub fn session(&self, id: &str) -> Option<&Arc<Session>> {
        find(&self.sessions, id)
    }

    pub fn observation(&self, id: &str) -> Option<&Arc<Observation>> {
        find(&self.observations, id)
    }

    /// All Observations whose target is the given entity
    pub fn observations_of_target<'a>(
        &'a self,
        target: &'a Arc<Target>,
    ) -> impl Iterator<Item = &'a Arc<Observation>> + 'a {
        self.observations
            .iter()
            .filter(move |obs| Arc::ptr_eq(&obs.target, target))
    }

    /// Number of entities per kind, in load order
    pub fn counts(&self) -> Vec<(EntityKind, usize)> {
        vec![
            (EntityKind::Observer, self.observers.len()),
            (EntityKind::Target, self.targets.len()),
            (EntityKind::Site, self.sites.len()),
            (EntityKind::Scope, self.scopes.len()),
            (EntityKind::Lens, self.lenses.len()),
            (EntityKind::Eyepiece, self.eyepieces.len()),
            (EntityKind::Filter, self.filters.len()),
            (EntityKind::Imager, self.imagers.len()),
            (EntityKind::Session, self.sessions.len()),
            (EntityKind::Observation, self.observations.len()),
        ]
    }
}
