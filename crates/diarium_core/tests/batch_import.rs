use diarium_core::config::SyncConfig;
use diarium_core::db::open_db_in_memory;
use diarium_core::model::document::UpdateMode;
use diarium_core::resolve::AliasTable;
use diarium_core::service::batch_service::BatchRunner;
use diarium_core::service::query::QueryService;
use diarium_core::service::snapshot::load_snapshot;
use diarium_core::service::SyncErrorKind;
use std::fs;
use std::path::Path;

fn write(root: &Path, relative: &str, text: &str) {
    let path = root.join(relative);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, text).unwrap();
}

fn seed(root: &Path) {
    write(
        root,
        "2024/2024-03-10.md",
        "---\ndate: 2024-03-10\npeople:\n  - name: Dana\n    last_name: Ibarra\nscenes:\n  - name: Morning Walk\n---\nWalked.\n",
    );
    write(
        root,
        "2024/2024-03-11.md",
        "---\ndate: 2024-03-11\npeople: Dana\n---\nCoffee with Dana.\n",
    );
    write(
        root,
        "2024/2024-03-12.md",
        "---\ndate: 2024-03-12\nevents:\n  - name: Party\n    scenes: [Dance]\n---\n",
    );
    write(root, "2024/notes.txt", "not a diary document");
    write(root, "2023/2023-12-31.md", "no header at all\n");
}

#[test]
fn batch_imports_in_sorted_order_and_reports_failures_individually() {
    let dir = tempfile::tempdir().unwrap();
    seed(dir.path());
    let mut conn = open_db_in_memory().unwrap();
    let mut runner = BatchRunner::new(SyncConfig::default(), AliasTable::empty());

    let report = runner.run(&mut conn, dir.path(), false).unwrap();

    assert_eq!(report.scanned, 4);
    let committed: Vec<&str> = report
        .committed
        .iter()
        .map(|(path, _)| path.as_str())
        .collect();
    assert_eq!(committed, vec!["2024/2024-03-10.md", "2024/2024-03-11.md"]);
    assert!(report.skipped.is_empty());

    let failed: Vec<(&str, SyncErrorKind)> = report
        .failures
        .iter()
        .map(|failure| (failure.source_path.as_str(), failure.error.kind()))
        .collect();
    assert_eq!(
        failed,
        vec![
            ("2023/2023-12-31.md", SyncErrorKind::Parse),
            ("2024/2024-03-12.md", SyncErrorKind::Validation),
        ]
    );
    assert_eq!(report.failure_counts().get("parse_failed"), Some(&1));
    assert_eq!(report.failures_of(SyncErrorKind::Validation).count(), 1);
    assert_eq!(report.stats.created, 1);

    let queries = QueryService::try_new(&conn).unwrap();
    let documents = queries.list_documents().unwrap();
    assert_eq!(documents.len(), 2);
    assert_eq!(
        documents[0].source_path.as_deref(),
        Some("2024/2024-03-10.md")
    );
    let dana = report.committed[0].1;
    let people = load_snapshot(&conn, dana).unwrap().unwrap().people;
    assert_eq!(queries.person_summary(people[0]).unwrap().document_count, 2);
}

#[test]
fn second_run_skips_unchanged_files_and_force_reimports() {
    let dir = tempfile::tempdir().unwrap();
    seed(dir.path());
    let mut conn = open_db_in_memory().unwrap();
    let mut runner = BatchRunner::new(SyncConfig::default(), AliasTable::empty());
    runner.run(&mut conn, dir.path(), false).unwrap();

    write(
        dir.path(),
        "2024/2024-03-11.md",
        "---\ndate: 2024-03-11\npeople: Dana Ibarra\ntags: [coffee]\n---\nCoffee with Dana again.\n",
    );
    let second = runner.run(&mut conn, dir.path(), false).unwrap();
    assert_eq!(second.skipped, vec!["2024/2024-03-10.md".to_string()]);
    assert_eq!(second.committed.len(), 1);
    assert_eq!(second.committed[0].0, "2024/2024-03-11.md");
    assert_eq!(second.failures.len(), 2);

    let forced = runner.run(&mut conn, dir.path(), true).unwrap();
    assert!(forced.skipped.is_empty());
    assert_eq!(forced.committed.len(), 2);
}

#[test]
fn configured_extension_and_mode_are_honored() {
    let dir = tempfile::tempdir().unwrap();
    write(
        dir.path(),
        "2024-04-01.diary",
        "---\ndate: 2024-04-01\npeople: Ana Lopez\n---\n",
    );
    write(
        dir.path(),
        "2024-04-01.md",
        "---\ndate: 2024-04-01\npeople: Ben Ortiz\n---\n",
    );
    let config = SyncConfig::from_yaml_str(
        "default_mode: incremental\ndocument_extension: .diary\n",
        Path::new("diarium.yaml"),
    )
    .unwrap();
    assert_eq!(config.default_mode, UpdateMode::Incremental);

    let mut conn = open_db_in_memory().unwrap();
    let mut runner = BatchRunner::new(config, AliasTable::empty());
    let report = runner.run(&mut conn, dir.path(), false).unwrap();
    assert_eq!(report.scanned, 1);
    assert_eq!(report.committed.len(), 1);
    assert_eq!(report.committed[0].0, "2024-04-01.diary");
}

#[test]
fn runner_loads_alias_file_from_config() {
    let dir = tempfile::tempdir().unwrap();
    let alias_path = dir.path().join("aliases.yaml");
    fs::write(&alias_path, "people:\n  Dani: Dana Ibarra\n").unwrap();
    let docs = dir.path().join("docs");
    write(&docs, "2024-05-01.md", "---\ndate: 2024-05-01\npeople: Dani\n---\n");

    let config = SyncConfig {
        alias_file: Some(alias_path),
        ..SyncConfig::default()
    };
    let mut runner = BatchRunner::from_config(config).unwrap();
    assert_eq!(runner.importer().aliases().len(), 1);

    let mut conn = open_db_in_memory().unwrap();
    let report = runner.run(&mut conn, &docs, false).unwrap();
    assert!(report.failures.is_empty(), "{:?}", report.failures);
    assert_eq!(report.stats.created, 1);
}

#[test]
fn missing_root_aborts_the_run() {
    let dir = tempfile::tempdir().unwrap();
    let mut conn = open_db_in_memory().unwrap();
    let mut runner = BatchRunner::new(SyncConfig::default(), AliasTable::empty());
    let err = runner
        .run(&mut conn, &dir.path().join("missing"), false)
        .unwrap_err();
    assert_eq!(err.kind(), SyncErrorKind::Io);
}

#[test]
fn second_file_with_an_imported_date_is_rejected_on_every_run() {
    let dir = tempfile::tempdir().unwrap();
    write(
        dir.path(),
        "2024/a.md",
        "---\ndate: 2024-03-10\npeople: Dana Ibarra\n---\n",
    );
    write(
        dir.path(),
        "2024/b.md",
        "---\ndate: 2024-03-10\npeople: Eli Soto\n---\n",
    );
    let mut conn = open_db_in_memory().unwrap();
    let mut runner = BatchRunner::new(SyncConfig::default(), AliasTable::empty());

    let first = runner.run(&mut conn, dir.path(), false).unwrap();
    assert_eq!(first.committed.len(), 1);
    assert_eq!(first.committed[0].0, "2024/a.md");
    assert_eq!(first.failures.len(), 1);
    assert_eq!(first.failures[0].source_path, "2024/b.md");
    assert_eq!(first.failures[0].error.kind(), SyncErrorKind::Validation);
    assert!(first.failures[0].error.to_string().contains("2024/a.md"));

    let second = runner.run(&mut conn, dir.path(), false).unwrap();
    assert_eq!(second.skipped, vec!["2024/a.md".to_string()]);
    assert!(second.committed.is_empty());
    assert_eq!(second.failures.len(), 1);

    let queries = QueryService::try_new(&conn).unwrap();
    let documents = queries.list_documents().unwrap();
    assert_eq!(documents.len(), 1);
    assert_eq!(documents[0].source_path.as_deref(), Some("2024/a.md"));
    let snapshot = load_snapshot(&conn, documents[0].id).unwrap().unwrap();
    let person = snapshot.person(snapshot.people[0]).unwrap();
    assert_eq!(snapshot.people.len(), 1);
    assert_eq!(person.display_name(), "Dana Ibarra");
}

#[test]
fn renamed_file_takes_over_its_date() {
    let dir = tempfile::tempdir().unwrap();
    let text = "---\ndate: 2024-03-10\npeople: Dana Ibarra\n---\nWalked.\n";
    write(dir.path(), "2024/draft.md", text);
    let mut conn = open_db_in_memory().unwrap();
    let mut runner = BatchRunner::new(SyncConfig::default(), AliasTable::empty());
    let first = runner.run(&mut conn, dir.path(), false).unwrap();
    let id = first.committed[0].1;

    fs::rename(
        dir.path().join("2024/draft.md"),
        dir.path().join("2024/2024-03-10.md"),
    )
    .unwrap();
    let second = runner.run(&mut conn, dir.path(), false).unwrap();
    assert!(second.failures.is_empty(), "{:?}", second.failures);
    assert_eq!(second.committed, vec![("2024/2024-03-10.md".to_string(), id)]);

    let third = runner.run(&mut conn, dir.path(), false).unwrap();
    assert_eq!(third.skipped, vec!["2024/2024-03-10.md".to_string()]);
}
