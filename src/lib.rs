//! Observation Archive
//!
//! Loads versioned astronomical observation logs into a fully
//! cross-referenced, typed in-memory graph, with target and finding
//! variants that extension bundles can add at runtime.
//!
//! ## Features
//!
//! - **Version Selection**: Documents are matched against known schema markers
//! - **Ordered Loading**: Sections are built in dependency order, references resolved by ID
//! - **Extensible Types**: Type tags resolve through a registry extensions populate
//! - **Deduplication**: Catalog targets serialized twice collapse into one
//! - **Partial Failure**: A malformed Observation is skipped, not fatal
//!
//! ## Architecture
//!
//! ```text
//! ExtensionRegistry ──populates──> TypeRegistry
//!                                      │
//! document ──> DocumentLoader ──> EntityFactory
//!                    │
//!                    └──> Deduplicator ──> RootGraph
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use observation_archive::{DocumentLoader, TypeRegistry};
//!
//! let registry = Arc::new(TypeRegistry::new());
//! let loaded = DocumentLoader::new(registry).load_path("observations.xml")?;
//! println!("{} observations", loaded.graph.observations().len());
//! # Ok::<(), observation_archive::ArchiveError>(())
//! ```

pub mod checksum;
pub mod config;
pub mod dedup;
pub mod document;
pub mod error;
pub mod extension;
pub mod factory;
pub mod loader;
pub mod model;
pub mod registry;
pub mod version;

pub use checksum::Checksum;
pub use config::ArchiveConfig;
pub use dedup::{Deduplicator, TargetCollection};
pub use document::{Document, Element};
pub use error::{ArchiveError, Result};
pub use extension::{
    EntryPointCatalog, Extension, ExtensionContext, ExtensionDescriptor, ExtensionHandle,
    ExtensionRegistry, InstallReport, SearchLocation,
};
pub use factory::{Entity, EntityFactory};
pub use loader::{DocumentLoader, LoadPhase, LoadedArchive, SkippedObservation};
pub use model::{EntityKind, RootGraph};
pub use registry::{Role, TypeRegistry, VariantDescriptor, VariantOrigin};
pub use version::{KnownVersions, SchemaVersion};
