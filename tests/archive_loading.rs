//! End-to-end loading of fixture archives

use std::path::PathBuf;
use std::sync::Arc;

use observation_archive::model::equipment::CcdCamera;
use observation_archive::model::finding::VariableStarFinding;
use observation_archive::model::target::Galaxy;
use observation_archive::model::{EntityKind, TargetOrigin};
use observation_archive::{ArchiveError, DocumentLoader, Role, TypeRegistry};
use pretty_assertions::assert_eq;

fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(name)
}

fn loader() -> DocumentLoader {
    DocumentLoader::new(Arc::new(TypeRegistry::new()))
}

#[test]
fn duplicate_catalog_targets_are_unified() {
    let loaded = loader().load_path(fixture("duplicate_targets.xml")).unwrap();
    let graph = &loaded.graph;

    let ids: Vec<&str> = graph.targets().iter().map(|t| t.id.as_str()).collect();
    assert_eq!(ids, vec!["M31-dup"]);

    let survivor = &graph.targets()[0];
    // the first node parsed is the one that survives
    assert_eq!(survivor.aliases, vec!["Andromeda Galaxy".to_string()]);
    assert_eq!(survivor.details::<Galaxy>().unwrap().hubble_type.as_deref(), Some("Sb"));

    let observations = graph.observations();
    assert_eq!(observations.len(), 2);
    for obs in observations {
        assert!(Arc::ptr_eq(&obs.target, survivor));
    }
    assert_eq!(graph.observations_of_target(survivor).count(), 2);
}

#[test]
fn malformed_observation_is_skipped() {
    let loaded = loader().load_path(fixture("partial_failure.xml")).unwrap();

    assert_eq!(loaded.version.version_string(), "2.0.0");
    let ids: Vec<&str> = loaded.graph.observations().iter().map(|o| o.id.as_str()).collect();
    assert_eq!(ids, vec!["o1", "o3"]);

    assert_eq!(loaded.skipped.len(), 1);
    let skipped = &loaded.skipped[0];
    assert_eq!(skipped.id.as_deref(), Some("o2"));
    match &skipped.error {
        ArchiveError::DanglingReference { kind, id, .. } => {
            assert_eq!(*kind, EntityKind::Target);
            assert_eq!(id, "m999");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn every_reference_resolves_into_the_graph() {
    for name in ["duplicate_targets.xml", "partial_failure.xml", "equipment.xml"] {
        let loaded = loader().load_path(fixture(name)).unwrap();
        let graph = &loaded.graph;
        for obs in graph.observations() {
            assert!(graph.targets().iter().any(|t| Arc::ptr_eq(t, &obs.target)), "{name}");
            assert!(graph.observers().iter().any(|o| Arc::ptr_eq(o, &obs.observer)), "{name}");
            if let Some(session) = &obs.session {
                assert!(graph.sessions().iter().any(|s| Arc::ptr_eq(s, session)), "{name}");
            }
            if let Some(scope) = &obs.scope {
                assert!(graph.scopes().iter().any(|s| Arc::ptr_eq(s, scope)), "{name}");
            }
        }
    }
}

#[test]
fn missing_targets_container_is_fatal() {
    let err = loader().load_path(fixture("missing_targets.xml")).unwrap_err();
    match err {
        ArchiveError::Structural { section, .. } => assert_eq!(section, "targets"),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn unknown_target_type_is_fatal() {
    let err = loader().load_path(fixture("comet_target.xml")).unwrap_err();
    match err {
        ArchiveError::UnknownType { role, tag } => {
            assert_eq!(role, Role::Target);
            assert_eq!(tag, "custom:cometTarget");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn equipment_sessions_and_polymorphic_entities() {
    let loaded = loader().load_path(fixture("equipment.xml")).unwrap();
    let graph = &loaded.graph;
    assert!(loaded.skipped.is_empty());

    let counts: Vec<(EntityKind, usize)> = graph.counts();
    assert_eq!(
        counts,
        vec![
            (EntityKind::Observer, 2),
            (EntityKind::Target, 2),
            (EntityKind::Site, 1),
            (EntityKind::Scope, 2),
            (EntityKind::Lens, 1),
            (EntityKind::Eyepiece, 1),
            (EntityKind::Filter, 1),
            (EntityKind::Imager, 1),
            (EntityKind::Session, 1),
            (EntityKind::Observation, 2),
        ]
    );

    assert!(graph.scopes()[0].availability.is_available());
    assert!(!graph.scopes()[1].availability.is_available());

    let camera = graph.imagers()[0].details::<CcdCamera>().unwrap();
    assert_eq!((camera.pixels_x, camera.pixels_y), (4096, 4096));

    let session = graph.session("s1").unwrap();
    assert_eq!(session.co_observers.len(), 1);
    assert_eq!(session.co_observers[0].surname, "Humason");

    let variable = graph.target("v1").unwrap();
    match &variable.origin {
        TargetOrigin::Observer(observer) => assert_eq!(observer.id, "obs1"),
        TargetOrigin::Catalog(source) => panic!("unexpected catalog origin {source}"),
    }

    let o1 = graph.observation("o1").unwrap();
    assert_eq!(o1.seeing, Some(2));
    assert_eq!(o1.images, vec!["plates/H335H.png".to_string()]);
    assert_eq!(o1.effective_site().map(|s| s.name.as_str()), Some("Mount Wilson"));
    let finding = o1.findings[0].details::<VariableStarFinding>().unwrap();
    assert_eq!(finding.visual_magnitude, Some(18.2));

    let o2 = graph.observation("o2").unwrap();
    assert_eq!(o2.lens.as_ref().map(|l| l.factor), Some(2.0));
    assert_eq!(o2.magnification, Some(1016.0));
    assert!(o2.findings[0].seen);
}

#[test]
fn scan_window_is_configurable() {
    let text = std::fs::read_to_string(fixture("partial_failure.xml")).unwrap();
    let padded = text.replacen("<oal:observations", &format!("<!--{}-->\n<oal:observations", "x".repeat(600)), 1);

    assert!(matches!(
        loader().load_str(padded.clone()),
        Err(ArchiveError::UnknownVersion { .. })
    ));
    assert!(loader().with_scan_window(2000).load_str(padded).is_ok());
}
