//! Document Loader
//!
//! Turns an archive document into a [`RootGraph`]. Loading is a single,
//! strictly ordered pass:
//!
//! ```text
//! VersionSelect -> ValidateStructure -> LoadObservers -> LoadTargets
//!   -> LoadSites -> LoadScopes -> LoadLenses -> LoadEyepieces -> LoadFilters
//!   -> LoadImagers -> LoadSessions -> LoadObservations -> Deduplicate -> Done
//! ```
//!
//! Each phase may only reference entities built by an earlier one.
//!
//! ## Failure policy
//!
//! An error while building one Observation is logged and that Observation
//! is skipped (see [`LoadedArchive::skipped`]). Any other error aborts the
//! load and no graph is returned.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use crate::config::ArchiveConfig;
use crate::dedup::TargetCollection;
use crate::document::{Document, Element};
use crate::error::{ArchiveError, Result};
use crate::factory::EntityFactory;
use crate::model::{
    EntityIndex, EntityKind, Eyepiece, Filter, Identified, Imager, Lens, Observation, Observer,
    RootGraph, Scope, Session, Site,
};
use crate::registry::TypeRegistry;
use crate::version::{KnownVersions, SchemaVersion, DEFAULT_SCAN_WINDOW};

/// Steps of a load, in the order they run
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LoadPhase {
    VersionSelect,
    ValidateStructure,
    LoadObservers,
    LoadTargets,
    LoadSites,
    LoadScopes,
    LoadLenses,
    LoadEyepieces,
    LoadFilters,
    LoadImagers,
    LoadSessions,
    LoadObservations,
    Deduplicate,
    Done,
}

impl LoadPhase {
    pub const ALL: [LoadPhase; 14] = [
        LoadPhase::VersionSelect,
        LoadPhase::ValidateStructure,
        LoadPhase::LoadObservers,
        LoadPhase::LoadTargets,
        LoadPhase::LoadSites,
        LoadPhase::LoadScopes,
        LoadPhase::LoadLenses,
        LoadPhase::LoadEyepieces,
        LoadPhase::LoadFilters,
        LoadPhase::LoadImagers,
        LoadPhase::LoadSessions,
        LoadPhase::LoadObservations,
        LoadPhase::Deduplicate,
        LoadPhase::Done,
    ];

    /// The entity kind a `Load*` phase builds
    pub fn kind(&self) -> Option<EntityKind> {
        match self {
            LoadPhase::LoadObservers => Some(EntityKind::Observer),
            LoadPhase::LoadTargets => Some(EntityKind::Target),
            LoadPhase::LoadSites => Some(EntityKind::Site),
            LoadPhase::LoadScopes => Some(EntityKind::Scope),
            LoadPhase::LoadLenses => Some(EntityKind::Lens),
            LoadPhase::LoadEyepieces => Some(EntityKind::Eyepiece),
            LoadPhase::LoadFilters => Some(EntityKind::Filter),
            LoadPhase::LoadImagers => Some(EntityKind::Imager),
            LoadPhase::LoadSessions => Some(EntityKind::Session),
            LoadPhase::LoadObservations => Some(EntityKind::Observation),
            _ => None,
        }
    }
}

impl fmt::Display for LoadPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// An Observation dropped under the partial-failure policy
#[derive(Debug)]
pub struct SkippedObservation {
    /// The node's ID, when it had one
    pub id: Option<String>,
    pub error: ArchiveError,
}

/// Result of a successful load
#[derive(Debug)]
pub struct LoadedArchive {
    pub graph: RootGraph,
    pub version: SchemaVersion,
    pub skipped: Vec<SkippedObservation>,
}

pub struct DocumentLoader {
    registry: Arc<TypeRegistry>,
    versions: KnownVersions,
    scan_window: usize,
}

impl DocumentLoader {
    pub fn new(registry: Arc<TypeRegistry>) -> Self {
        Self {
            registry,
            versions: KnownVersions::standard(),
            scan_window: DEFAULT_SCAN_WINDOW,
        }
    }

    /// Loader using the configured versions and scan window
    pub fn from_config(registry: Arc<TypeRegistry>, config: &ArchiveConfig) -> Self {
        Self {
            registry,
            versions: config.known_versions(),
            scan_window: config.loader.version_scan_window,
        }
    }

    pub fn with_versions(mut self, versions: KnownVersions) -> Self {
        self.versions = versions;
        self
    }

    pub fn with_scan_window(mut self, window: usize) -> Self {
        self.scan_window = window;
        self
    }

    pub fn versions(&self) -> &KnownVersions {
        &self.versions
    }

    pub fn load_path(&self, path: impl AsRef<Path>) -> Result<LoadedArchive> {
        let path = path.as_ref();
        tracing::info!(path = %path.display(), "loading archive");
        self.load_str(fs::read_to_string(path)?)
    }

    /// Load from document text. The version is selected before the text is
    /// parsed, so an unrecognized document fails without building anything.
    pub fn load_str(&self, text: impl Into<String>) -> Result<LoadedArchive> {
        let text = text.into();
        enter(LoadPhase::VersionSelect);
        let version = self.select_version(&text)?;
        let document = Document::parse(text)?;
        self.load_selected(&document, version)
    }

    pub fn load_document(&self, document: &Document) -> Result<LoadedArchive> {
        enter(LoadPhase::VersionSelect);
        let version = self.select_version(document.source())?;
        self.load_selected(document, version)
    }

    fn select_version(&self, text: &str) -> Result<SchemaVersion> {
        let version = self.versions.select(text, self.scan_window)?.clone();
        tracing::debug!(%version, "selected document version");
        Ok(version)
    }

    fn load_selected(&self, document: &Document, version: SchemaVersion) -> Result<LoadedArchive> {
        enter(LoadPhase::ValidateStructure);
        let sections = Sections::validate(document.root(), &self.versions, &version)?;

        let factory = EntityFactory::new(&self.registry);

        enter(LoadPhase::LoadObservers);
        let observers = build_section(sections.get(EntityKind::Observer), EntityKind::Observer, Observer::from_element)?;

        enter(LoadPhase::LoadTargets);
        let mut targets = TargetCollection::new();
        if let Some(container) = sections.get(EntityKind::Target) {
            for node in container.children_named(EntityKind::Target.element_name()) {
                targets.insert(factory.build_target(node, &observers)?)?;
            }
        }
        tracing::debug!(count = targets.len(), duplicates = targets.duplicates(), "built targets");

        enter(LoadPhase::LoadSites);
        let sites = build_section(sections.get(EntityKind::Site), EntityKind::Site, Site::from_element)?;

        enter(LoadPhase::LoadScopes);
        let scopes = build_section(sections.get(EntityKind::Scope), EntityKind::Scope, Scope::from_element)?;

        enter(LoadPhase::LoadLenses);
        let lenses = build_section(sections.get(EntityKind::Lens), EntityKind::Lens, Lens::from_element)?;

        enter(LoadPhase::LoadEyepieces);
        let eyepieces = build_section(sections.get(EntityKind::Eyepiece), EntityKind::Eyepiece, Eyepiece::from_element)?;

        enter(LoadPhase::LoadFilters);
        let filters = build_section(sections.get(EntityKind::Filter), EntityKind::Filter, Filter::from_element)?;

        enter(LoadPhase::LoadImagers);
        let imagers = build_section(sections.get(EntityKind::Imager), EntityKind::Imager, |node| {
            factory.build_imager(node)
        })?;

        enter(LoadPhase::LoadSessions);
        let sessions = build_section(sections.get(EntityKind::Session), EntityKind::Session, |node| {
            Session::from_element(node, &sites, &observers)
        })?;

        enter(LoadPhase::LoadObservations);
        let built = Built {
            factory: &factory,
            observers: &observers,
            targets: &targets,
            sites: &sites,
            scopes: &scopes,
            lenses: &lenses,
            eyepieces: &eyepieces,
            filters: &filters,
            imagers: &imagers,
            sessions: &sessions,
        };
        let mut observations = Vec::new();
        let mut skipped = Vec::new();
        let mut seen_ids = HashSet::new();
        for node in sections.observations() {
            match built.observation(node, &mut seen_ids) {
                Ok(observation) => observations.push(observation),
                Err(error) if error.is_node_local() => {
                    tracing::warn!(node = %node.describe(), %error, "skipping observation");
                    skipped.push(SkippedObservation {
                        id: node.id().ok().map(str::to_string),
                        error,
                    });
                }
                Err(error) => return Err(error),
            }
        }

        enter(LoadPhase::Deduplicate);
        let targets = targets.finish(&mut observations);

        let graph = RootGraph {
            observers: observers.into_items(),
            targets,
            sites: sites.into_items(),
            scopes: scopes.into_items(),
            lenses: lenses.into_items(),
            eyepieces: eyepieces.into_items(),
            filters: filters.into_items(),
            imagers: imagers.into_items(),
            sessions: sessions.into_items(),
            observations: observations.into_iter().map(Arc::new).collect(),
        };

        enter(LoadPhase::Done);
        tracing::info!(
            %version,
            targets = graph.targets.len(),
            observations = graph.observations.len(),
            skipped = skipped.len(),
            "archive loaded"
        );
        Ok(LoadedArchive { graph, version, skipped })
    }
}

fn enter(phase: LoadPhase) {
    tracing::debug!(%phase, "load phase");
}

/// The containers of a structurally valid document
struct Sections<'d> {
    root: &'d Element,
    containers: HashMap<EntityKind, &'d Element>,
}

impl<'d> Sections<'d> {
    /// Which containers may be absent does not depend on the selected
    /// version: a kind is optional when the oldest known version lacks it.
    /// A container the selected version predates is still loaded, with a
    /// warning.
    fn validate(root: &'d Element, versions: &KnownVersions, selected: &SchemaVersion) -> Result<Self> {
        let root_name = EntityKind::Observation.container_name();
        if root.local_name() != root_name {
            return Err(ArchiveError::structural(
                root.local_name(),
                format!("document root must be <{}>", root_name),
            ));
        }

        let mut containers = HashMap::new();
        for phase in LoadPhase::ALL {
            let Some(kind) = phase.kind() else {
                continue;
            };
            // the root element is the observation container
            if kind == EntityKind::Observation {
                continue;
            }

            let name = kind.container_name();
            let mut found = root.children_named(name);
            match (found.next(), found.next()) {
                (Some(container), None) => {
                    if !selected.has_section(kind) {
                        tracing::warn!(container = name, version = %selected, "container is newer than the document version");
                    }
                    containers.insert(kind, container);
                }
                (Some(_), Some(_)) => {
                    return Err(ArchiveError::structural(name, "container appears more than once"));
                }
                (None, _) if versions.is_optional(kind) => {
                    tracing::debug!(container = name, "optional container absent");
                }
                (None, _) => {
                    return Err(ArchiveError::structural(name, "mandatory container is missing"));
                }
            }
        }

        Ok(Self { root, containers })
    }

    fn get(&self, kind: EntityKind) -> Option<&'d Element> {
        self.containers.get(&kind).copied()
    }

    fn observations(&self) -> impl Iterator<Item = &'d Element> {
        self.root.children_named(EntityKind::Observation.element_name())
    }
}

fn build_section<T: Identified>(
    container: Option<&Element>,
    kind: EntityKind,
    mut build: impl FnMut(&Element) -> Result<T>,
) -> Result<EntityIndex<T>> {
    let mut index = EntityIndex::new(kind);
    if let Some(container) = container {
        for node in container.children_named(kind.element_name()) {
            index.insert(build(node)?)?;
        }
    }
    tracing::debug!(%kind, count = index.len(), "built section");
    Ok(index)
}

/// Everything an Observation may reference
struct Built<'a> {
    factory: &'a EntityFactory,
    observers: &'a EntityIndex<Observer>,
    targets: &'a TargetCollection,
    sites: &'a EntityIndex<Site>,
    scopes: &'a EntityIndex<Scope>,
    lenses: &'a EntityIndex<Lens>,
    eyepieces: &'a EntityIndex<Eyepiece>,
    filters: &'a EntityIndex<Filter>,
    imagers: &'a EntityIndex<Imager>,
    sessions: &'a EntityIndex<Session>,
}

impl Built<'_> {
    fn observation(&self, node: &Element, seen_ids: &mut HashSet<String>) -> Result<Observation> {
        let id = node.id()?.to_string();
        if seen_ids.contains(&id) {
            return Err(ArchiveError::structural(
                EntityKind::Observation.container_name(),
                format!("duplicate observation id '{}'", id),
            ));
        }

        let observer = self
            .observers
            .resolve(&node.required_text("observer")?, &node.describe())?;
        let target = self.targets.resolve_child(node, "target")?;

        let findings = node
            .children_named("result")
            .map(|result| self.factory.build_finding(result, &target))
            .collect::<Result<Vec<_>>>()?;
        if findings.is_empty() {
            return Err(node.missing("result"));
        }

        let seeing = node.parse_optional::<u8>("seeing")?;
        if let Some(value) = seeing {
            if !(1..=5).contains(&value) {
                return Err(node.invalid("seeing", &value.to_string(), "seeing must be between 1 and 5"));
            }
        }

        let observation = Observation {
            begin: node.required_timestamp("begin")?,
            end: node.optional_timestamp("end")?,
            observer,
            target,
            findings,
            session: self.sessions.resolve_child(node, "session")?,
            site: self.sites.resolve_child(node, "site")?,
            scope: self.scopes.resolve_child(node, "scope")?,
            eyepiece: self.eyepieces.resolve_child(node, "eyepiece")?,
            filter: self.filters.resolve_child(node, "filter")?,
            imager: self.imagers.resolve_child(node, "imager")?,
            lens: self.lenses.resolve_child(node, "lens")?,
            seeing,
            magnification: node.parse_optional("magnification")?,
            faintest_star: node.parse_optional("faintestStar")?,
            accessories: node.optional_text("accessories"),
            images: node.texts("image"),
            id,
        };
        seen_ids.insert(observation.id.clone());
        Ok(observation)
    }
}
