//! Type Registry
//!
//! Maps namespaced type tags to the variant that builds them, separately
//! for targets, findings and imagers. Built-in variants are seeded before
//! anything else, so an extension registering the same tag overwrites the
//! built-in rather than shadowing it.
//!
//! ## Concurrency
//!
//! Readers take an immutable snapshot (`Arc<RegistryTables>`). Writers are
//! serialized by a mutex, assemble the next tables off to the side, and
//! publish them with a single pointer swap. A reader therefore sees either
//! the old tables or the fully re-seeded new ones, never a cleared
//! registry.

pub mod builtin;

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};

use crate::document::Element;
use crate::error::{ArchiveError, Result};
use crate::model::{Finding, Imager, Target, TargetContext};

/// The tag family a variant belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Target,
    Finding,
    Imager,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Target => f.write_str("target"),
            Role::Finding => f.write_str("finding"),
            Role::Imager => f.write_str("imager"),
        }
    }
}

/// Builds a target from its node plus the already-built observers
pub type TargetFactory = Arc<dyn Fn(&Element, &TargetContext<'_>) -> Result<Target> + Send + Sync>;

/// Builds a finding from its node; the second argument is the resolved tag
pub type FindingFactory = Arc<dyn Fn(&Element, &str) -> Result<Finding> + Send + Sync>;

/// Builds an imager from its node; the second argument is the resolved tag
pub type ImagerFactory = Arc<dyn Fn(&Element, &str) -> Result<Imager> + Send + Sync>;

/// How a registered variant is constructed
#[derive(Clone)]
pub enum Constructor {
    Target(TargetFactory),
    Finding(FindingFactory),
    Imager(ImagerFactory),
    /// Tag is known (e.g. from a persisted schema extension) but no code
    /// for it has been activated
    Unbound,
}

impl Constructor {
    /// The dependency shape this constructor accepts
    pub fn role(&self) -> Option<Role> {
        match self {
            Constructor::Target(_) => Some(Role::Target),
            Constructor::Finding(_) => Some(Role::Finding),
            Constructor::Imager(_) => Some(Role::Imager),
            Constructor::Unbound => None,
        }
    }
}

impl fmt::Debug for Constructor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.role() {
            Some(role) => write!(f, "Constructor({})", role),
            None => f.write_str("Constructor(unbound)"),
        }
    }
}

/// Who contributed a variant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VariantOrigin {
    Builtin,
    /// Contributed by the named extension
    Extension(String),
    /// Declared by the persisted schema extension, code not yet activated
    Declared,
}

/// Everything the registry knows about one variant
#[derive(Debug, Clone)]
pub struct VariantDescriptor {
    /// Name of the implementing entry point
    pub name: String,
    pub origin: VariantOrigin,
    pub constructor: Constructor,
}

impl VariantDescriptor {
    pub fn target<F>(name: impl Into<String>, origin: VariantOrigin, factory: F) -> Self
    where
        F: Fn(&Element, &TargetContext<'_>) -> Result<Target> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            origin,
            constructor: Constructor::Target(Arc::new(factory)),
        }
    }

    pub fn finding<F>(name: impl Into<String>, origin: VariantOrigin, factory: F) -> Self
    where
        F: Fn(&Element, &str) -> Result<Finding> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            origin,
            constructor: Constructor::Finding(Arc::new(factory)),
        }
    }

    pub fn imager<F>(name: impl Into<String>, origin: VariantOrigin, factory: F) -> Self
    where
        F: Fn(&Element, &str) -> Result<Imager> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            origin,
            constructor: Constructor::Imager(Arc::new(factory)),
        }
    }

    /// A tag that is recognized but cannot be instantiated yet
    pub fn declared(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            origin: VariantOrigin::Declared,
            constructor: Constructor::Unbound,
        }
    }
}

/// One consistent generation of registry contents
#[derive(Debug, Clone, Default)]
pub struct RegistryTables {
    targets: HashMap<String, VariantDescriptor>,
    findings: HashMap<String, VariantDescriptor>,
    imagers: HashMap<String, VariantDescriptor>,
    linked_findings: HashMap<String, String>,
}

impl RegistryTables {
    /// Tables holding only the built-in variants
    pub fn seeded() -> Self {
        let mut tables = Self::default();
        builtin::seed(&mut tables);
        tables
    }

    fn table(&self, role: Role) -> &HashMap<String, VariantDescriptor> {
        match role {
            Role::Target => &self.targets,
            Role::Finding => &self.findings,
            Role::Imager => &self.imagers,
        }
    }

    fn table_mut(&mut self, role: Role) -> &mut HashMap<String, VariantDescriptor> {
        match role {
            Role::Target => &mut self.targets,
            Role::Finding => &mut self.findings,
            Role::Imager => &mut self.imagers,
        }
    }

    /// Add or overwrite the mapping for (tag, role)
    pub fn register(&mut self, tag: impl Into<String>, role: Role, descriptor: VariantDescriptor) {
        self.table_mut(role).insert(tag.into(), descriptor);
    }

    /// Record the finding tag a target tag implies
    pub fn link_finding(&mut self, target_tag: impl Into<String>, finding_tag: impl Into<String>) {
        self.linked_findings.insert(target_tag.into(), finding_tag.into());
    }

    /// Record a tag that has no code behind it. A variant already
    /// registered for the tag is kept; returns whether the tag was new.
    pub fn declare(&mut self, tag: impl Into<String>, role: Role, name: impl Into<String>) -> bool {
        match self.table_mut(role).entry(tag.into()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(VariantDescriptor::declared(name));
                true
            }
        }
    }

    /// Link a finding tag to a target tag that is not built in. Built-in
    /// targets keep the finding they were seeded with.
    pub fn link_extended_finding(&mut self, target_tag: &str, finding_tag: &str) {
        let builtin = self
            .targets
            .get(target_tag)
            .is_some_and(|d| d.origin == VariantOrigin::Builtin);
        if !builtin {
            self.link_finding(target_tag, finding_tag);
        }
    }

    pub fn resolve(&self, tag: &str, role: Role) -> Result<&VariantDescriptor> {
        self.table(role)
            .get(tag)
            .ok_or_else(|| ArchiveError::UnknownType {
                role,
                tag: tag.to_string(),
            })
    }

    pub fn contains(&self, tag: &str, role: Role) -> bool {
        self.table(role).contains_key(tag)
    }

    /// The finding tag implied by a target tag, the generic one if none is linked
    pub fn linked_finding_tag(&self, target_tag: &str) -> &str {
        self.linked_findings
            .get(target_tag)
            .map(String::as_str)
            .unwrap_or(builtin::GENERIC_FINDING)
    }

    /// All tags of one role, sorted
    pub fn tags(&self, role: Role) -> Vec<&str> {
        let mut tags: Vec<&str> = self.table(role).keys().map(String::as_str).collect();
        tags.sort_unstable();
        tags
    }

    pub fn len(&self, role: Role) -> usize {
        self.table(role).len()
    }
}

/// Shared, internally synchronized type registry
#[derive(Debug)]
pub struct TypeRegistry {
    current: RwLock<Arc<RegistryTables>>,
    writer: Mutex<()>,
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl TypeRegistry {
    /// A registry seeded with the built-in variants
    pub fn new() -> Self {
        Self {
            current: RwLock::new(Arc::new(RegistryTables::seeded())),
            writer: Mutex::new(()),
        }
    }

    /// The current generation; stays valid however the registry changes later
    pub fn snapshot(&self) -> Arc<RegistryTables> {
        Arc::clone(&self.current.read())
    }

    /// Apply several changes as one atomic step on top of the current contents
    pub fn edit(&self, change: impl FnOnce(&mut RegistryTables)) {
        let _writer = self.writer.lock();
        let mut next = RegistryTables::clone(&self.snapshot());
        change(&mut next);
        *self.current.write() = Arc::new(next);
    }

    pub fn register(&self, tag: impl Into<String>, role: Role, descriptor: VariantDescriptor) {
        let tag = tag.into();
        tracing::debug!(%tag, %role, variant = %descriptor.name, "registering type");
        self.edit(|tables| tables.register(tag, role, descriptor));
    }

    pub fn link_finding(&self, target_tag: impl Into<String>, finding_tag: impl Into<String>) {
        self.edit(|tables| tables.link_finding(target_tag, finding_tag));
    }

    pub fn resolve(&self, tag: &str, role: Role) -> Result<VariantDescriptor> {
        self.snapshot().resolve(tag, role).cloned()
    }

    pub fn linked_finding_tag(&self, target_tag: &str) -> String {
        self.snapshot().linked_finding_tag(target_tag).to_string()
    }

    pub fn is_supported(&self, tag: &str, role: Role) -> bool {
        self.snapshot().contains(tag, role)
    }

    /// Clear everything and re-seed the built-ins
    pub fn reset(&self) {
        self.rebuild(|_| {});
    }

    /// Atomically replace the contents with built-ins plus whatever
    /// `populate` registers
    pub fn rebuild(&self, populate: impl FnOnce(&mut RegistryTables)) {
        let _writer = self.writer.lock();
        let mut next = RegistryTables::seeded();
        populate(&mut next);
        tracing::debug!(
            targets = next.len(Role::Target),
            findings = next.len(Role::Finding),
            imagers = next.len(Role::Imager),
            "type registry rebuilt"
        );
        *self.current.write() = Arc::new(next);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::finding::GenericFinding;
    use std::thread;

    fn custom_finding() -> VariantDescriptor {
        VariantDescriptor::finding("test::Custom", VariantOrigin::Extension("test".into()), |node, tag| {
            Finding::from_element(node, tag, Box::new(GenericFinding))
        })
    }

    #[test]
    fn test_builtins_are_seeded() {
        let registry = TypeRegistry::new();
        assert!(registry.is_supported(builtin::DEEP_SKY_GALAXY, Role::Target));
        assert!(registry.is_supported(builtin::GENERIC_FINDING, Role::Finding));
        assert!(registry.is_supported(builtin::CCD_CAMERA, Role::Imager));
        assert_eq!(
            registry.linked_finding_tag(builtin::DEEP_SKY_OPEN_CLUSTER),
            builtin::OPEN_CLUSTER_FINDING
        );
        assert_eq!(registry.linked_finding_tag("custom:unknown"), builtin::GENERIC_FINDING);
    }

    #[test]
    fn test_unknown_type() {
        let registry = TypeRegistry::new();
        let err = registry.resolve("custom:cometTarget", Role::Target).unwrap_err();
        assert!(matches!(err, ArchiveError::UnknownType { role: Role::Target, .. }));
    }

    #[test]
    fn test_register_overwrites_builtin() {
        let registry = TypeRegistry::new();
        let before = registry.snapshot().len(Role::Finding);

        registry.register(builtin::GENERIC_FINDING, Role::Finding, custom_finding());

        let descriptor = registry.resolve(builtin::GENERIC_FINDING, Role::Finding).unwrap();
        assert_eq!(descriptor.name, "test::Custom");
        assert_eq!(registry.snapshot().len(Role::Finding), before);
    }

    #[test]
    fn test_declare_keeps_existing_variant() {
        let mut tables = RegistryTables::seeded();

        assert!(!tables.declare(builtin::DEEP_SKY_FINDING, Role::Finding, "nebulae::Finding"));
        let kept = tables.resolve(builtin::DEEP_SKY_FINDING, Role::Finding).unwrap();
        assert_eq!(kept.origin, VariantOrigin::Builtin);

        assert!(tables.declare("custom:cometFinding", Role::Finding, "comets::Finding"));
        let declared = tables.resolve("custom:cometFinding", Role::Finding).unwrap();
        assert_eq!(declared.origin, VariantOrigin::Declared);
    }

    #[test]
    fn test_builtin_targets_keep_their_link() {
        let mut tables = RegistryTables::seeded();
        tables.link_extended_finding(builtin::DEEP_SKY_OPEN_CLUSTER, "custom:clusterFinding");
        assert_eq!(
            tables.linked_finding_tag(builtin::DEEP_SKY_OPEN_CLUSTER),
            builtin::OPEN_CLUSTER_FINDING
        );

        tables.declare("custom:cometTarget", Role::Target, "comets::Comet");
        tables.link_extended_finding("custom:cometTarget", "custom:cometFinding");
        assert_eq!(tables.linked_finding_tag("custom:cometTarget"), "custom:cometFinding");
    }

    #[test]
    fn test_reset_reseeds() {
        let registry = TypeRegistry::new();
        registry.register("custom:cometFinding", Role::Finding, custom_finding());
        assert!(registry.is_supported("custom:cometFinding", Role::Finding));

        registry.reset();
        assert!(!registry.is_supported("custom:cometFinding", Role::Finding));
        assert!(registry.is_supported(builtin::GENERIC_FINDING, Role::Finding));
    }

    #[test]
    fn test_snapshot_is_stable_across_rebuild() {
        let registry = TypeRegistry::new();
        registry.register("custom:cometFinding", Role::Finding, custom_finding());
        let snapshot = registry.snapshot();

        registry.reset();
        assert!(snapshot.contains("custom:cometFinding", Role::Finding));
        assert!(!registry.is_supported("custom:cometFinding", Role::Finding));
    }

    #[test]
    fn test_readers_never_see_cleared_registry() {
        let registry = Arc::new(TypeRegistry::new());
        let builtin_count = registry.snapshot().len(Role::Target);

        let writer = {
            let registry = Arc::clone(&registry);
            thread::spawn(move || {
                for _ in 0..200 {
                    registry.rebuild(|tables| {
                        tables.register("custom:cometFinding", Role::Finding, custom_finding());
                    });
                }
            })
        };

        for _ in 0..2000 {
            let snapshot = registry.snapshot();
            assert_eq!(snapshot.len(Role::Target), builtin_count);
            assert!(snapshot.contains(builtin::GENERIC_TARGET, Role::Target));
        }
        writer.join().unwrap();
    }
}
