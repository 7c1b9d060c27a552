use std::fs;
use std::sync::Arc;

use pretty_assertions::assert_eq;
use prism_cache::{ChangeDetector, PersistenceMode};
use prism_reflect::keys;
use prism_reflect::{ClassDecl, FileDeclarations, MethodDecl, Name, PrismConfig, Reflector, TypeExpr};
use tempfile::TempDir;

use super::fixture::{Fixture, SharedLogBuffer};

fn service(fixture: &Fixture) {
    fixture.workspace.add_class(
        ClassDecl::class("Service")
            .in_namespace("App")
            .with_method(MethodDecl::new("run").returns(TypeExpr::named("void"))),
    );
}

#[test]
fn commit_writes_every_staged_record_once() {
    let fixture = Fixture::new();
    service(&fixture);
    let reflector = fixture.reflector();

    reflector.reflect_class("App\\Service").unwrap();
    assert_eq!(reflector.commit().unwrap(), 1);
    assert_eq!(fixture.backend.len(), 1);

    // Nothing left to write: the backend is not touched at all.
    let before = fixture.backend.stats().operations();
    assert_eq!(reflector.commit().unwrap(), 0);
    assert_eq!(fixture.backend.stats().operations(), before);
}

#[test]
fn committed_records_serve_later_reflectors() {
    let fixture = Fixture::new();
    service(&fixture);

    let first = fixture.reflector();
    let record = first.reflect_class("App\\Service").unwrap();
    first.commit().unwrap();
    assert_eq!(fixture.workspace.locates(), 1);

    let second = fixture.reflector();
    assert_eq!(second.reflect_class("App\\Service").unwrap(), record);
    assert_eq!(fixture.workspace.locates(), 1);
    let stats = second.cache_stats();
    assert_eq!(stats.backend_hits, 1);
    assert_eq!(stats.misses, 0);
}

#[test]
fn records_that_never_stay_fresh_are_rebuilt() {
    let fixture = Fixture::new();
    fixture.workspace.add_file(
        "volatile.php",
        FileDeclarations {
            classes: vec![ClassDecl::class("Volatile")],
            ..FileDeclarations::default()
        },
        ChangeDetector::NeverFresh,
    );

    let first = fixture.reflector();
    first.reflect_class("Volatile").unwrap();
    first.commit().unwrap();

    let second = fixture.reflector();
    second.reflect_class("Volatile").unwrap();
    assert_eq!(fixture.workspace.locates(), 2);
    let stats = second.cache_stats();
    assert_eq!(stats.stale, 1);
    assert_eq!(stats.backend_hits, 0);
}

#[test]
fn editing_an_ancestor_invalidates_its_descendants() {
    let dir = TempDir::new().unwrap();
    let parent_file = dir.path().join("Model.php");
    fs::write(&parent_file, "class Model { function save() {} }").unwrap();

    let fixture = Fixture::new();
    fixture.workspace.add_file(
        "Model.php",
        FileDeclarations {
            classes: vec![ClassDecl::class("Model").with_method(MethodDecl::new("save"))],
            ..FileDeclarations::default()
        },
        ChangeDetector::from_file(&parent_file).unwrap(),
    );
    fixture.workspace.add_class(ClassDecl::class("User").extends("Model"));

    let first = fixture.reflector();
    first.reflect_class("User").unwrap();
    assert_eq!(first.commit().unwrap(), 2);

    // Unchanged: both records come from the backend.
    let second = fixture.reflector();
    second.reflect_class("User").unwrap();
    assert_eq!(fixture.workspace.locates(), 2);
    assert_eq!(second.cache_stats().stale, 0);

    fs::write(&parent_file, "class Model { function save(): bool {} }").unwrap();

    let third = fixture.reflector();
    third.reflect_class("User").unwrap();
    assert_eq!(fixture.workspace.locates(), 4);
    assert_eq!(third.cache_stats().stale, 2);
}

#[test]
fn disk_cache_directory_comes_from_config() {
    let dir = TempDir::new().unwrap();
    let mut config = PrismConfig::default();
    config.cache.dir = Some(dir.path().join("cache"));

    let fixture = Fixture::new();
    service(&fixture);
    let reflector = || {
        Reflector::builder()
            .with_source_provider(fixture.workspace.clone())
            .with_extractor(fixture.workspace.clone())
            .with_config(config.clone())
            .build()
            .unwrap()
    };

    let first = reflector();
    first.reflect_class("App\\Service").unwrap();
    assert_eq!(first.commit().unwrap(), 1);
    assert!(fs::read_dir(dir.path().join("cache")).unwrap().next().is_some());

    let second = reflector();
    second.reflect_class("App\\Service").unwrap();
    assert_eq!(fixture.workspace.locates(), 1);
    assert_eq!(second.cache_stats().backend_hits, 1);
    // The memory backend of the fixture was never used.
    assert!(fixture.backend.is_empty());
}

#[test]
fn disabled_persistence_never_writes() {
    let mut config = PrismConfig::default();
    config.cache.mode = PersistenceMode::Disabled;

    let fixture = Fixture::new();
    service(&fixture);
    let reflector = fixture.builder().with_config(config).build().unwrap();

    reflector.reflect_class("App\\Service").unwrap();
    assert_eq!(reflector.commit().unwrap(), 0);
    assert!(fixture.backend.is_empty());

    // The commit dropped what was staged, and nothing is read back.
    reflector.reflect_class("App\\Service").unwrap();
    assert_eq!(fixture.workspace.locates(), 2);
}

#[test]
fn discarded_records_are_not_committed() {
    let fixture = Fixture::new();
    service(&fixture);
    let reflector = fixture.reflector();

    reflector.reflect_class("App\\Service").unwrap();
    reflector.discard();
    assert_eq!(reflector.commit().unwrap(), 0);
    assert!(fixture.backend.is_empty());
}

#[test]
fn a_new_format_version_ignores_old_records() {
    let fixture = Fixture::new();
    service(&fixture);

    let first = fixture.reflector();
    first.reflect_class("App\\Service").unwrap();
    first.commit().unwrap();

    let mut config = PrismConfig::default();
    config.cache.format_version += 1;
    let second = fixture.builder().with_config(config).build().unwrap();
    second.reflect_class("App\\Service").unwrap();
    assert_eq!(fixture.workspace.locates(), 2);
    assert_eq!(second.cache_stats().backend_hits, 0);
}

#[test]
fn stale_records_are_logged() {
    let fixture = Fixture::new();
    fixture.workspace.add_file(
        "volatile.php",
        FileDeclarations {
            classes: vec![ClassDecl::class("Volatile")],
            ..FileDeclarations::default()
        },
        ChangeDetector::NeverFresh,
    );
    let first = fixture.reflector();
    first.reflect_class("Volatile").unwrap();
    first.commit().unwrap();

    let logs = SharedLogBuffer::default();
    let subscriber = tracing_subscriber::fmt()
        .with_ansi(false)
        .without_time()
        .with_max_level(tracing::Level::DEBUG)
        .with_writer(logs.clone())
        .finish();
    tracing::subscriber::with_default(subscriber, || {
        let second = fixture.reflector();
        second.reflect_class("Volatile").unwrap();
    });

    let text = logs.as_string();
    assert!(text.contains("stale cache record"), "expected a stale record event, got:\n{text}");
}

#[test]
fn shared_backends_can_be_passed_explicitly() {
    let fixture = Fixture::new();
    service(&fixture);
    let backend = Arc::new(prism_cache::MemoryBackend::new());

    let reflector = fixture.builder().with_cache_backend(backend.clone()).build().unwrap();
    reflector.reflect_class("App\\Service").unwrap();
    reflector.commit().unwrap();

    assert_eq!(backend.len(), 1);
    assert!(fixture.backend.is_empty());
}

#[test]
fn class_names_differing_in_case_share_one_record() {
    let fixture = Fixture::new();
    service(&fixture);
    let reflector = fixture.reflector();

    let declared = reflector.reflect_class("App\\Service").unwrap();
    let shouted = reflector.reflect_class("APP\\SERVICE").unwrap();
    assert_eq!(shouted, declared);
    assert_eq!(fixture.workspace.locates(), 1);
    assert_eq!(reflector.cache_stats().staged_hits, 1);

    let run = &shouted.value::<keys::Methods>()[&Name::new("run")];
    assert_eq!(run.value::<keys::DeclaringClass>(), Name::new("App\\Service"));
    assert_eq!(reflector.commit().unwrap(), 1);
}
