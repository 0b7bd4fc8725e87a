//! Entity Factory
//!
//! Resolves a node's type tag against one registry snapshot and runs the
//! variant's constructor with the dependencies the caller can offer. The
//! loader never needs to know which variants exist; it only hands over
//! nodes and already-built collections.

use std::sync::Arc;

use crate::document::Element;
use crate::error::{ArchiveError, Result};
use crate::model::{EntityIndex, Finding, Imager, Observer, Target, TargetContext};
use crate::registry::{Constructor, RegistryTables, Role, TypeRegistry};

/// Already-built entities offered to a constructor
#[derive(Clone, Copy)]
pub enum Dependencies<'a> {
    /// The node alone
    Node,
    /// The node plus the observer collection
    Observers(&'a EntityIndex<Observer>),
}

/// A freshly built polymorphic entity
#[derive(Debug)]
pub enum Entity {
    Target(Target),
    Finding(Finding),
    Imager(Imager),
}

pub struct EntityFactory {
    tables: Arc<RegistryTables>,
}

impl EntityFactory {
    /// Factory bound to the registry contents at this moment
    pub fn new(registry: &TypeRegistry) -> Self {
        Self::from_tables(registry.snapshot())
    }

    pub fn from_tables(tables: Arc<RegistryTables>) -> Self {
        Self { tables }
    }

    pub fn tables(&self) -> &RegistryTables {
        &self.tables
    }

    /// The type tag of a polymorphic node; its absence is structural
    pub fn tag_of<'n>(node: &'n Element, role: Role) -> Result<&'n str> {
        node.type_tag().ok_or_else(|| {
            ArchiveError::structural(
                node.describe(),
                format!("{} node carries no type tag", role),
            )
        })
    }

    pub fn build(&self, role: Role, tag: &str, node: &Element, deps: Dependencies<'_>) -> Result<Entity> {
        let descriptor = self.tables.resolve(tag, role)?;
        let incompatible = |message: String| ArchiveError::Instantiation {
            role,
            tag: tag.to_string(),
            message,
        };

        match (&descriptor.constructor, deps) {
            (Constructor::Target(factory), Dependencies::Observers(observers)) if role == Role::Target => {
                let ctx = TargetContext { tag, observers };
                factory(node, &ctx).map(Entity::Target)
            }
            (Constructor::Finding(factory), _) if role == Role::Finding => {
                factory(node, tag).map(Entity::Finding)
            }
            (Constructor::Imager(factory), _) if role == Role::Imager => {
                factory(node, tag).map(Entity::Imager)
            }
            (Constructor::Unbound, _) => Err(incompatible(format!(
                "variant {} is declared but its extension is not active",
                descriptor.name
            ))),
            (constructor, _) => Err(incompatible(format!(
                "variant {} has no constructor for this dependency shape ({:?})",
                descriptor.name, constructor
            ))),
        }
    }

    pub fn build_target(&self, node: &Element, observers: &EntityIndex<Observer>) -> Result<Target> {
        let tag = Self::tag_of(node, Role::Target)?;
        match self.build(Role::Target, tag, node, Dependencies::Observers(observers))? {
            Entity::Target(target) => Ok(target),
            other => Err(unexpected(Role::Target, tag, &other)),
        }
    }

    /// Build a finding recorded for `target`
    pub fn build_finding(&self, node: &Element, target: &Target) -> Result<Finding> {
        let tag = Self::tag_of(node, Role::Finding)?;
        let expected = self.tables.linked_finding_tag(&target.type_tag);
        if tag != expected {
            tracing::warn!(
                target_id = %target.id,
                finding = %tag,
                expected = %expected,
                "finding type does not match the target's type"
            );
        }
        match self.build(Role::Finding, tag, node, Dependencies::Node)? {
            Entity::Finding(finding) => Ok(finding),
            other => Err(unexpected(Role::Finding, tag, &other)),
        }
    }

    pub fn build_imager(&self, node: &Element) -> Result<Imager> {
        let tag = Self::tag_of(node, Role::Imager)?;
        match self.build(Role::Imager, tag, node, Dependencies::Node)? {
            Entity::Imager(imager) => Ok(imager),
            other => Err(unexpected(Role::Imager, tag, &other)),
        }
    }
}

fn unexpected(role: Role, tag: &str, entity: &Entity) -> ArchiveError {
    let built = match entity {
        Entity::Target(_) => Role::Target,
        Entity::Finding(_) => Role::Finding,
        Entity::Imager(_) => Role::Imager,
    };
    ArchiveError::Instantiation {
        role,
        tag: tag.to_string(),
        message: format!("constructor produced a {}", built),
    }
}
