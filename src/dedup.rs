//! Catalog target deduplication
//!
//! Catalog targets are sometimes serialized more than once under the same
//! ID (one copy per exported observation list, for instance). The first
//! node parsed is canonical; later ones are recorded as duplicates while
//! the target section is built. Once every Observation exists, a single
//! pass repoints observations at the canonical target and drops the
//! duplicates from the collection.
//!
//! "First wins" is purely positional. Nothing here compares content.

use std::collections::HashMap;
use std::sync::Arc;

use crate::document::Element;
use crate::error::{ArchiveError, Result};
use crate::model::{EntityKind, Observation, Target};

/// A later copy of a catalog target and the copy that replaces it
#[derive(Debug, Clone)]
struct Duplicate {
    /// Held so the address used as key stays unique
    duplicate: Arc<Target>,
    canonical: Arc<Target>,
}

/// Map from duplicate target to the canonical one, keyed by identity
#[derive(Debug, Default)]
pub struct Deduplicator {
    duplicate_of: HashMap<usize, Duplicate>,
}

fn identity(target: &Arc<Target>) -> usize {
    Arc::as_ptr(target) as usize
}

impl Deduplicator {
    pub fn record(&mut self, duplicate: &Arc<Target>, canonical: &Arc<Target>) {
        tracing::debug!(target_id = %canonical.id, "recording duplicate catalog target");
        self.duplicate_of.insert(
            identity(duplicate),
            Duplicate {
                duplicate: Arc::clone(duplicate),
                canonical: Arc::clone(canonical),
            },
        );
    }

    pub fn is_duplicate(&self, target: &Arc<Target>) -> bool {
        self.duplicate_of
            .get(&identity(target))
            .is_some_and(|d| Arc::ptr_eq(&d.duplicate, target))
    }

    pub fn canonical(&self, target: &Arc<Target>) -> Option<&Arc<Target>> {
        self.duplicate_of
            .get(&identity(target))
            .filter(|d| Arc::ptr_eq(&d.duplicate, target))
            .map(|d| &d.canonical)
    }

    pub fn len(&self) -> usize {
        self.duplicate_of.len()
    }

    pub fn is_empty(&self) -> bool {
        self.duplicate_of.is_empty()
    }

    /// Repoint observations at canonical targets and return the surviving
    /// target collection
    pub fn apply(&self, targets: Vec<Arc<Target>>, observations: &mut [Observation]) -> Vec<Arc<Target>> {
        if self.is_empty() {
            return targets;
        }

        let mut repointed = 0usize;
        for observation in observations.iter_mut() {
            if let Some(canonical) = self.canonical(&observation.target) {
                observation.target = Arc::clone(canonical);
                repointed += 1;
            }
        }

        let survivors: Vec<_> = targets
            .into_iter()
            .filter(|t| !self.is_duplicate(t))
            .collect();

        tracing::debug!(
            duplicates = self.len(),
            repointed,
            remaining = survivors.len(),
            "deduplicated catalog targets"
        );
        survivors
    }
}

/// The target section under construction
#[derive(Debug, Default)]
pub struct TargetCollection {
    built: Vec<Arc<Target>>,
    /// Most recently built target per ID; references resolve through this
    latest: HashMap<String, Arc<Target>>,
    /// First target built per ID
    first: HashMap<String, Arc<Target>>,
    dedup: Deduplicator,
}

impl TargetCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a freshly built target, recording it as a duplicate when a
    /// catalog target with the same ID already exists
    pub fn insert(&mut self, target: Target) -> Result<Arc<Target>> {
        let target = Arc::new(target);

        if let Some(canonical) = self.first.get(&target.id) {
            if !(canonical.is_catalog_origin() && target.is_catalog_origin()) {
                return Err(ArchiveError::structural(
                    EntityKind::Target.container_name(),
                    format!("duplicate target id '{}' outside a catalog", target.id),
                ));
            }
            self.dedup.record(&target, canonical);
        } else {
            self.first.insert(target.id.clone(), Arc::clone(&target));
        }

        self.latest.insert(target.id.clone(), Arc::clone(&target));
        self.built.push(Arc::clone(&target));
        Ok(target)
    }

    pub fn resolve(&self, id: &str, referrer: &str) -> Result<Arc<Target>> {
        self.latest
            .get(id)
            .cloned()
            .ok_or_else(|| ArchiveError::DanglingReference {
                kind: EntityKind::Target,
                id: id.to_string(),
                referrer: referrer.to_string(),
            })
    }

    pub fn resolve_child(&self, node: &Element, field: &str) -> Result<Arc<Target>> {
        let id = node.required_text(field)?;
        self.resolve(&id, &node.describe())
    }

    /// Every target built so far, duplicates included
    pub fn len(&self) -> usize {
        self.built.len()
    }

    pub fn is_empty(&self) -> bool {
        self.built.is_empty()
    }

    pub fn duplicates(&self) -> usize {
        self.dedup.len()
    }

    /// Run the post-pass over the built observations
    pub fn finish(self, observations: &mut [Observation]) -> Vec<Arc<Target>> {
        self.dedup.apply(self.built, observations)
    }
}
