//! Extension Registry
//!
//! Discovers extension bundles, activates them, and feeds the variants they
//! declare into the [`TypeRegistry`].
//!
//! ## Entry points
//!
//! A bundle names its entry point and the entry names of every target and
//! finding variant it supports. The code behind those names is linked into
//! the host and registered in an [`EntryPointCatalog`]; activating a bundle
//! looks its entry point up there and constructs the [`Extension`]. Host
//! code may also embed a bundle manifest directly, which makes the bundle
//! discoverable without any file on disk.
//!
//! ## Lifecycle
//!
//! ```text
//! load_all:  persisted declarations -> discover -> activate -> rebuild registry
//! install:   unpack -> discover -> activate -> rebuild registry -> persist
//! ```
//!
//! Rebuilding always starts from the built-ins, so the registry is reset and
//! re-populated in one atomic swap.

pub mod bundle;
pub mod generic;
pub mod manifest;
pub mod schema_ext;

pub use generic::{GenericExtension, GENERIC_ENTRY_POINT};
pub use manifest::{BundleSource, ExtensionDescriptor, TypeDeclaration};
pub use schema_ext::{SchemaExtension, SchemaExtensionFile};

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use serde::Serialize;

use crate::checksum::Checksum;
use crate::config::ArchiveConfig;
use crate::error::{ArchiveError, Result};
use crate::model::RootGraph;
use crate::registry::{
    Constructor, FindingFactory, ImagerFactory, RegistryTables, Role, TargetFactory, TypeRegistry,
    VariantDescriptor, VariantOrigin,
};

/// Handle to the graph currently open in the application
pub type SharedModel = Arc<RwLock<Option<Arc<RootGraph>>>>;

/// What an extension receives when it is constructed
#[derive(Debug, Clone)]
pub struct ExtensionContext {
    pub config: ArchiveConfig,
    /// Directory installed bundles live in
    pub install_dir: Option<PathBuf>,
    pub model: SharedModel,
}

/// An imager variant contributed by an extension
#[derive(Clone)]
pub struct ImagerVariant {
    pub tag: String,
    pub entry: String,
    pub factory: ImagerFactory,
}

/// Code behind an activated bundle
pub trait Extension: Send + Sync {
    /// Factory for the target variant with this entry name
    fn target_factory(&self, entry: &str) -> Option<TargetFactory>;

    /// Factory for the finding variant with this entry name
    fn finding_factory(&self, entry: &str) -> Option<FindingFactory>;

    fn imagers(&self) -> Vec<ImagerVariant> {
        Vec::new()
    }

    /// Whether new entities of `tag` may be created, as opposed to only
    /// read from existing documents
    fn allows_creation(&self, _tag: &str) -> bool {
        true
    }
}

/// Constructs an extension's entry-point object
pub type EntryPoint = Arc<dyn Fn(&ExtensionContext) -> Result<Box<dyn Extension>> + Send + Sync>;

/// Named entry points plus manifests compiled into the host
#[derive(Default, Clone)]
pub struct EntryPointCatalog {
    entries: HashMap<String, EntryPoint>,
    embedded: Vec<(String, Option<String>)>,
}

impl EntryPointCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(&mut self, name: impl Into<String>, constructor: F) -> &mut Self
    where
        F: Fn(&ExtensionContext) -> Result<Box<dyn Extension>> + Send + Sync + 'static,
    {
        self.entries.insert(name.into(), Arc::new(constructor));
        self
    }

    /// Make a bundle discoverable from its manifest texts alone
    pub fn embed(&mut self, extension: impl Into<String>, types: Option<String>) -> &mut Self {
        self.embedded.push((extension.into(), types));
        self
    }

    pub fn get(&self, name: &str) -> Option<&EntryPoint> {
        self.entries.get(name)
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.entries.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl fmt::Debug for EntryPointCatalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntryPointCatalog")
            .field("entries", &self.names())
            .field("embedded", &self.embedded.len())
            .finish()
    }
}

/// Where bundles are looked for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchLocation {
    /// Manifests embedded in the catalog
    Embedded,
    Directory(PathBuf),
}

/// An activated bundle
#[derive(Clone)]
pub struct ExtensionHandle {
    descriptor: Arc<ExtensionDescriptor>,
    extension: Arc<dyn Extension>,
}

impl ExtensionHandle {
    pub fn name(&self) -> &str {
        &self.descriptor.name
    }

    pub fn descriptor(&self) -> &ExtensionDescriptor {
        &self.descriptor
    }

    pub fn extension(&self) -> &dyn Extension {
        self.extension.as_ref()
    }

    /// Whether two handles refer to the same activation
    pub fn same_as(&self, other: &ExtensionHandle) -> bool {
        Arc::ptr_eq(&self.descriptor, &other.descriptor)
    }

    /// Push this extension's variants into `tables`
    fn contribute(&self, tables: &mut RegistryTables) {
        let origin = VariantOrigin::Extension(self.name().to_string());
        let ext = self.extension();

        for decl in &self.descriptor.types {
            match ext.target_factory(&decl.target_entry) {
                Some(factory) => tables.register(
                    &decl.target_tag,
                    Role::Target,
                    VariantDescriptor {
                        name: decl.target_entry.clone(),
                        origin: origin.clone(),
                        constructor: Constructor::Target(factory),
                    },
                ),
                None => {
                    tracing::warn!(
                        extension = %self.name(),
                        entry = %decl.target_entry,
                        "extension has no target factory for declared entry"
                    );
                    tables.declare(&decl.target_tag, Role::Target, &decl.target_entry);
                }
            }

            match ext.finding_factory(&decl.finding_entry) {
                Some(factory) => tables.register(
                    &decl.finding_tag,
                    Role::Finding,
                    VariantDescriptor {
                        name: decl.finding_entry.clone(),
                        origin: origin.clone(),
                        constructor: Constructor::Finding(factory),
                    },
                ),
                None => {
                    tracing::warn!(
                        extension = %self.name(),
                        entry = %decl.finding_entry,
                        "extension has no finding factory for declared entry"
                    );
                    tables.declare(&decl.finding_tag, Role::Finding, &decl.finding_entry);
                }
            }
            tables.link_extended_finding(&decl.target_tag, &decl.finding_tag);
        }

        for imager in ext.imagers() {
            tables.register(
                imager.tag,
                Role::Imager,
                VariantDescriptor {
                    name: imager.entry,
                    origin: origin.clone(),
                    constructor: Constructor::Imager(imager.factory),
                },
            );
        }
    }
}

impl fmt::Debug for ExtensionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtensionHandle")
            .field("name", &self.descriptor.name)
            .field("version", &self.descriptor.version.to_string())
            .field("source", &self.descriptor.source.to_string())
            .finish()
    }
}

/// Outcome of installing a bundle
#[derive(Debug, Clone, Serialize)]
pub struct InstallReport {
    pub name: String,
    pub version: String,
    pub installed_path: PathBuf,
    pub checksum: Checksum,
    pub tags: Vec<String>,
    /// Why the schema-extension descriptor could not be updated, if it
    /// could not. Registration stands either way.
    pub persist_error: Option<String>,
}

impl InstallReport {
    pub fn persisted(&self) -> bool {
        self.persist_error.is_none()
    }
}

pub struct ExtensionRegistry {
    registry: Arc<TypeRegistry>,
    catalog: EntryPointCatalog,
    context: ExtensionContext,
    /// Active extensions in activation order
    active: Mutex<Vec<ExtensionHandle>>,
    declared: RwLock<SchemaExtensionFile>,
}

impl ExtensionRegistry {
    pub fn new(registry: Arc<TypeRegistry>, catalog: EntryPointCatalog, config: ArchiveConfig) -> Self {
        let context = ExtensionContext {
            install_dir: config.extension_dir(),
            config,
            model: SharedModel::default(),
        };
        Self {
            registry,
            catalog,
            context,
            active: Mutex::new(Vec::new()),
            declared: RwLock::new(SchemaExtensionFile::default()),
        }
    }

    /// Share an existing application model with extensions
    pub fn with_model(mut self, model: SharedModel) -> Self {
        self.context.model = model;
        self
    }

    pub fn type_registry(&self) -> &Arc<TypeRegistry> {
        &self.registry
    }

    pub fn context(&self) -> &ExtensionContext {
        &self.context
    }

    /// The locations the configuration asks to scan
    pub fn search_locations(&self) -> Vec<SearchLocation> {
        let mut locations = Vec::new();
        if self.context.config.extensions.scan_embedded {
            locations.push(SearchLocation::Embedded);
        }
        if let Some(dir) = &self.context.install_dir {
            locations.push(SearchLocation::Directory(dir.clone()));
        }
        locations
    }

    /// Find every readable bundle. Unreadable bundles are logged and skipped.
    pub fn discover(&self, locations: &[SearchLocation]) -> Vec<ExtensionDescriptor> {
        let mut found = Vec::new();
        for location in locations {
            match location {
                SearchLocation::Embedded => {
                    for (extension, types) in &self.catalog.embedded {
                        match ExtensionDescriptor::from_manifests(BundleSource::Embedded, extension, types.as_deref()) {
                            Ok(descriptor) => found.push(descriptor),
                            Err(e) => tracing::error!(error = %e, "invalid embedded extension manifest"),
                        }
                    }
                }
                SearchLocation::Directory(dir) => {
                    for path in bundle::scan_directory(dir) {
                        match bundle::read_descriptor(&path) {
                            Ok(descriptor) => found.push(descriptor),
                            Err(e) => tracing::error!(
                                bundle = %path.display(),
                                error = %e,
                                "skipping unreadable extension bundle"
                            ),
                        }
                    }
                }
            }
        }
        tracing::debug!(count = found.len(), "discovered extension bundles");
        found
    }

    /// Construct a bundle's entry point. Activating a name that is already
    /// active returns the existing handle.
    pub fn activate(&self, descriptor: &ExtensionDescriptor) -> Result<ExtensionHandle> {
        let mut active = self.active.lock();
        if let Some(existing) = active.iter().find(|h| h.name() == descriptor.name) {
            tracing::debug!(extension = %descriptor.name, "extension already active");
            return Ok(existing.clone());
        }

        let entry = self.catalog.get(&descriptor.entry_point).ok_or_else(|| {
            ArchiveError::activation(
                descriptor.source.to_string(),
                format!("no entry point named '{}'", descriptor.entry_point),
            )
        })?;
        let extension = entry(&self.context).map_err(|e| {
            ArchiveError::activation(
                descriptor.source.to_string(),
                format!("entry point '{}' failed: {}", descriptor.entry_point, e),
            )
        })?;

        let handle = ExtensionHandle {
            descriptor: Arc::new(descriptor.clone()),
            extension: Arc::from(extension),
        };
        tracing::info!(
            extension = %handle.name(),
            version = %descriptor.version,
            source = %descriptor.source,
            "activated extension"
        );
        active.push(handle.clone());
        Ok(handle)
    }

    /// Push one extension's variants into the type registry
    pub fn register_types(&self, handle: &ExtensionHandle) {
        self.registry.edit(|tables| handle.contribute(tables));
    }

    /// Reset the type registry to built-ins, persisted declarations and
    /// every active extension, in one swap
    pub fn rebuild_registry(&self) {
        let handles = self.active();
        let declared = self.declared.read();
        self.registry.rebuild(|tables| {
            for (tag, role) in declared.declared_tags() {
                tables.declare(tag, role, tag);
            }
            for (target, finding) in declared.declared_links() {
                tables.link_extended_finding(target, finding);
            }
            for handle in &handles {
                handle.contribute(tables);
            }
        });
    }

    /// Startup: read persisted declarations, scan the configured locations,
    /// activate what can be activated and rebuild the registry
    pub fn load_all(&self) -> Vec<ExtensionHandle> {
        self.load_declared();

        for descriptor in self.discover(&self.search_locations()) {
            if let Err(e) = self.activate(&descriptor) {
                tracing::error!(error = %e, "extension not activated");
            }
        }

        self.rebuild_registry();
        self.active()
    }

    fn load_declared(&self) {
        let Some(path) = self.context.config.schema_extension_path() else {
            return;
        };
        match SchemaExtensionFile::load(&path) {
            Ok(file) => {
                tracing::debug!(
                    path = %path.display(),
                    extensions = file.extensions.len(),
                    "loaded schema extensions"
                );
                *self.declared.write() = file;
            }
            Err(e) => tracing::warn!(path = %path.display(), error = %e, "ignoring unreadable schema extensions"),
        }
    }

    /// Install a new bundle at runtime
    pub fn install(&self, bundle_path: &Path) -> Result<InstallReport> {
        let extension_dir = self.context.install_dir.clone().ok_or_else(|| {
            ArchiveError::activation(bundle_path.display().to_string(), "no extension directory configured")
        })?;

        let checksum = Checksum::of_bundle(bundle_path)?;
        let installed_path = bundle::unpack(bundle_path, &extension_dir)?;
        let descriptor = bundle::read_descriptor(&installed_path)?;
        let handle = self.activate(&descriptor)?;
        self.rebuild_registry();

        let persist_error = self
            .persist(SchemaExtension::from_descriptor(handle.descriptor(), Some(checksum.clone())))
            .err()
            .map(|e| {
                tracing::error!(extension = %handle.name(), error = %e, "could not persist schema extension");
                e.to_string()
            });

        Ok(InstallReport {
            name: handle.name().to_string(),
            version: handle.descriptor().version.to_string(),
            installed_path,
            checksum,
            tags: handle.descriptor().declared_tags().map(str::to_string).collect(),
            persist_error,
        })
    }

    fn persist(&self, extension: SchemaExtension) -> Result<()> {
        let path = self.context.config.schema_extension_path().ok_or_else(|| {
            ArchiveError::activation(extension.name.clone(), "no schema extension file configured")
        })?;
        // held across load and save so concurrent installs cannot drop each other's entry
        let mut declared = self.declared.write();
        let mut file = SchemaExtensionFile::load(&path)?;
        file.append(extension);
        file.save(&path)?;
        *declared = file;
        Ok(())
    }

    /// Whether new entities of `tag` may be created. Declared-only and
    /// unknown tags never allow creation.
    pub fn allows_creation(&self, tag: &str, role: Role) -> bool {
        let Ok(descriptor) = self.registry.resolve(tag, role) else {
            return false;
        };
        match descriptor.origin {
            VariantOrigin::Builtin => true,
            VariantOrigin::Declared => false,
            VariantOrigin::Extension(name) => self
                .handle(&name)
                .map(|h| h.extension().allows_creation(tag))
                .unwrap_or(false),
        }
    }

    /// Active extensions in activation order
    pub fn active(&self) -> Vec<ExtensionHandle> {
        self.active.lock().clone()
    }

    pub fn handle(&self, name: &str) -> Option<ExtensionHandle> {
        self.active.lock().iter().find(|h| h.name() == name).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Element;
    use crate::model::target::GenericTarget;
    use crate::model::{Target, TargetContext};

    struct Comets;

    fn comet_target(node: &Element, ctx: &TargetContext<'_>) -> Result<Target> {
        Target::from_element(node, ctx, Box::new(GenericTarget))
    }

    impl Extension for Comets {
        fn target_factory(&self, entry: &str) -> Option<TargetFactory> {
            (entry == "comets::CometTarget").then(|| Arc::new(comet_target) as TargetFactory)
        }

        fn finding_factory(&self, _entry: &str) -> Option<FindingFactory> {
            None
        }

        fn allows_creation(&self, tag: &str) -> bool {
            tag != "custom:cometTarget"
        }
    }

    fn catalog() -> EntryPointCatalog {
        let mut catalog = EntryPointCatalog::new();
        catalog
            .register("comets::CometExtension", |_| Ok(Box::new(Comets) as Box<dyn Extension>))
            .embed(bundle::tests::EXTENSION, Some(bundle::tests::TYPES.to_string()));
        catalog
    }

    fn embedded_only() -> ArchiveConfig {
        let mut config = ArchiveConfig::default();
        let dir = std::env::temp_dir().join("observation-archive-tests-no-extensions");
        config.extensions.directory = Some(dir.join("bundles"));
        config.extensions.schema_extension_file = Some(dir.join("missing.json"));
        config
    }

    #[test]
    fn test_embedded_discovery_and_activation() {
        let registry = Arc::new(TypeRegistry::new());
        let extensions = ExtensionRegistry::new(Arc::clone(&registry), catalog(), embedded_only());

        let handles = extensions.load_all();
        assert_eq!(handles.len(), 1);
        assert!(registry.is_supported("custom:cometTarget", Role::Target));
        assert_eq!(registry.linked_finding_tag("custom:cometTarget"), "custom:cometFinding");

        // no finding factory: recognized, but only as a declaration
        let finding = registry.resolve("custom:cometFinding", Role::Finding).unwrap();
        assert_eq!(finding.origin, VariantOrigin::Declared);
    }

    #[test]
    fn test_activation_is_idempotent() {
        let registry = Arc::new(TypeRegistry::new());
        let extensions = ExtensionRegistry::new(Arc::clone(&registry), catalog(), embedded_only());
        let descriptor = extensions.discover(&[SearchLocation::Embedded]).remove(0);

        let first = extensions.activate(&descriptor).unwrap();
        let second = extensions.activate(&descriptor).unwrap();
        assert!(first.same_as(&second));
        assert_eq!(extensions.active().len(), 1);
    }

    #[test]
    fn test_missing_entry_point() {
        let mut catalog = EntryPointCatalog::new();
        catalog.embed(bundle::tests::EXTENSION, None);
        let extensions = ExtensionRegistry::new(Arc::new(TypeRegistry::new()), catalog, embedded_only());
        let descriptor = extensions.discover(&[SearchLocation::Embedded]).remove(0);

        assert!(matches!(
            extensions.activate(&descriptor),
            Err(ArchiveError::ExtensionActivation { .. })
        ));
        assert!(extensions.load_all().is_empty());
    }

    #[test]
    fn test_broken_bundle_does_not_block_others() {
        let mut catalog = catalog();
        catalog.embed(
            "name=asteroids\nversion=0.3.0\nentry-point=asteroids::Missing\n",
            Some(
                "type.0.target.tag=custom:asteroidTarget\ntype.0.target.entry=asteroids::Asteroid\n\
                 type.0.finding.tag=custom:asteroidFinding\ntype.0.finding.entry=asteroids::Finding\n"
                    .to_string(),
            ),
        );
        let registry = Arc::new(TypeRegistry::new());
        let extensions = ExtensionRegistry::new(Arc::clone(&registry), catalog, embedded_only());

        let handles = extensions.load_all();
        assert_eq!(handles.len(), 1);
        assert_eq!(handles[0].name(), "comets");

        let comet = registry.resolve("custom:cometTarget", Role::Target).unwrap();
        assert_eq!(comet.origin, VariantOrigin::Extension("comets".into()));
        assert!(!registry.is_supported("custom:asteroidTarget", Role::Target));
    }

    #[test]
    fn test_missing_factory_keeps_builtin() {
        struct Partial;

        impl Extension for Partial {
            fn target_factory(&self, entry: &str) -> Option<TargetFactory> {
                (entry == "comets::CometTarget").then(|| Arc::new(comet_target) as TargetFactory)
            }

            fn finding_factory(&self, _entry: &str) -> Option<FindingFactory> {
                None
            }
        }

        let mut catalog = EntryPointCatalog::new();
        catalog
            .register("comets::Partial", |_| Ok(Box::new(Partial) as Box<dyn Extension>))
            .embed(
                "name=partial\nversion=1.0.0\nentry-point=comets::Partial\n",
                Some(format!(
                    "type.0.target.tag=custom:cometTarget\ntype.0.target.entry=comets::CometTarget\n\
                     type.0.finding.tag={}\ntype.0.finding.entry=comets::CometFinding\n",
                    crate::registry::builtin::DEEP_SKY_FINDING
                )),
            );
        let registry = Arc::new(TypeRegistry::new());
        let extensions = ExtensionRegistry::new(Arc::clone(&registry), catalog, embedded_only());
        extensions.load_all();

        let finding = registry
            .resolve(crate::registry::builtin::DEEP_SKY_FINDING, Role::Finding)
            .unwrap();
        assert_eq!(finding.origin, VariantOrigin::Builtin);
        assert_eq!(
            registry.linked_finding_tag("custom:cometTarget"),
            crate::registry::builtin::DEEP_SKY_FINDING
        );
    }

    #[test]
    fn test_concurrent_persists_keep_every_entry() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = ArchiveConfig::default();
        config.extensions.directory = Some(dir.path().join("bundles"));
        config.extensions.schema_extension_file = Some(dir.path().join("schema-extensions.json"));
        let extensions = Arc::new(ExtensionRegistry::new(Arc::new(TypeRegistry::new()), catalog(), config));

        let workers: Vec<_> = (0..8)
            .map(|i| {
                let extensions = Arc::clone(&extensions);
                std::thread::spawn(move || {
                    let text = format!("name=ext{}\nversion=1.0.0\nentry-point=comets::CometExtension\n", i);
                    let descriptor =
                        ExtensionDescriptor::from_manifests(BundleSource::Embedded, &text, Some(bundle::tests::TYPES))
                            .unwrap();
                    extensions
                        .persist(SchemaExtension::from_descriptor(&descriptor, None))
                        .unwrap();
                })
            })
            .collect();
        for worker in workers {
            worker.join().unwrap();
        }

        let file = SchemaExtensionFile::load(&dir.path().join("schema-extensions.json")).unwrap();
        assert_eq!(file.extensions.len(), 8);
    }

    #[test]
    fn test_allows_creation() {
        let extensions = ExtensionRegistry::new(Arc::new(TypeRegistry::new()), catalog(), embedded_only());
        extensions.load_all();

        assert!(extensions.allows_creation(crate::registry::builtin::DEEP_SKY_GALAXY, Role::Target));
        assert!(!extensions.allows_creation("custom:cometTarget", Role::Target));
        assert!(!extensions.allows_creation("custom:cometFinding", Role::Finding));
        assert!(!extensions.allows_creation("custom:unknown", Role::Target));
    }

    #[test]
    fn test_register_types_without_rebuild() {
        let registry = Arc::new(TypeRegistry::new());
        let extensions = ExtensionRegistry::new(Arc::clone(&registry), catalog(), embedded_only());
        let descriptor = extensions.discover(&[SearchLocation::Embedded]).remove(0);
        let handle = extensions.activate(&descriptor).unwrap();

        assert!(!registry.is_supported("custom:cometTarget", Role::Target));
        extensions.register_types(&handle);
        assert!(registry.is_supported("custom:cometTarget", Role::Target));
    }
}
