use chrono::NaiveDate;
use diarium_core::db::open_db_in_memory;
use diarium_core::model::date::DateRef;
use diarium_core::model::document::UpdateMode;
use diarium_core::model::entity::NamedKind;
use diarium_core::repo::entity_repo::{EntityRepository, SqliteEntityRepository};
use diarium_core::resolve::AliasTable;
use diarium_core::service::import_service::{
    ImportOptions, ImportOutcome, ImportReport, Importer,
};
use diarium_core::service::query::QueryService;
use diarium_core::service::snapshot::load_snapshot;
use diarium_core::service::{SyncError, SyncErrorKind};
use rusqlite::Connection;

const MORNING_WALK: &str = "---
date: 2024-03-10
people:
  - name: Dana
    last_name: Ibarra
scenes:
  - name: Morning Walk
---
Walked along the canal before work.
";

fn day(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn options(mode: UpdateMode) -> ImportOptions {
    ImportOptions { mode, force: false }
}

fn committed(outcome: ImportOutcome) -> ImportReport {
    match outcome {
        ImportOutcome::Committed(report) => report,
        ImportOutcome::Skipped(id) => panic!("expected a commit, document {id} was skipped"),
    }
}

fn person_id(conn: &Connection, name: &str, last_name: &str) -> i64 {
    let entities = SqliteEntityRepository::try_new(conn).unwrap();
    let people = entities
        .find_people_by_key(name, Some(last_name), None)
        .unwrap();
    assert_eq!(people.len(), 1, "expected one row for {name} {last_name}");
    people[0].id
}

fn count(conn: &Connection, table: &str) -> i64 {
    conn.query_row(&format!("SELECT COUNT(*) FROM {table};"), [], |row| {
        row.get(0)
    })
    .unwrap()
}

#[test]
fn morning_walk_example_defaults_scene_date_and_reuses_person() {
    let mut conn = open_db_in_memory().unwrap();
    let mut importer = Importer::new(AliasTable::empty());

    let first = committed(
        importer
            .import_text(
                &mut conn,
                Some("2024/2024-03-10.md"),
                MORNING_WALK,
                ImportOptions::default(),
            )
            .unwrap(),
    );
    assert!(first.created);

    let snapshot = load_snapshot(&conn, first.document).unwrap().unwrap();
    assert_eq!(snapshot.document.date, day(2024, 3, 10));
    assert_eq!(snapshot.document.word_count, 6);
    assert_eq!(snapshot.scenes.len(), 1);
    assert_eq!(snapshot.scenes[0].name, "Morning Walk");
    assert_eq!(
        snapshot.scenes[0].dates[0].date,
        DateRef::exact(day(2024, 3, 10))
    );
    let dana = person_id(&conn, "Dana", "Ibarra");
    assert_eq!(snapshot.people, vec![dana]);

    let again = importer
        .import_text(
            &mut conn,
            Some("2024/2024-03-10.md"),
            MORNING_WALK,
            ImportOptions::default(),
        )
        .unwrap();
    assert_eq!(again, ImportOutcome::Skipped(first.document));

    let second = committed(
        importer
            .import_text(
                &mut conn,
                Some("2024/2024-03-11.md"),
                "---\ndate: 2024-03-11\npeople: Dana Ibarra\n---\nCoffee.\n",
                ImportOptions::default(),
            )
            .unwrap(),
    );
    let second_snapshot = load_snapshot(&conn, second.document).unwrap().unwrap();
    assert_eq!(second_snapshot.people, vec![dana]);
    assert_eq!(count(&conn, "people"), 1);

    let queries = QueryService::try_new(&conn).unwrap();
    let summary = queries.person_summary(dana).unwrap();
    assert_eq!(summary.document_count, 2);
    assert_eq!(summary.first_appearance, Some(day(2024, 3, 10)));
    assert_eq!(summary.last_appearance, Some(day(2024, 3, 11)));
}

#[test]
fn unchanged_hash_performs_no_writes_unless_forced() {
    let mut conn = open_db_in_memory().unwrap();
    let mut importer = Importer::new(AliasTable::empty());
    let report = committed(
        importer
            .import_text(&mut conn, Some("a.md"), MORNING_WALK, ImportOptions::default())
            .unwrap(),
    );

    let before: i64 = conn
        .query_row(
            "SELECT updated_at FROM documents WHERE uuid = ?1;",
            [report.document.to_string()],
            |row| row.get(0),
        )
        .unwrap();
    let skipped = importer
        .import_text(&mut conn, Some("a.md"), MORNING_WALK, ImportOptions::default())
        .unwrap();
    assert_eq!(skipped, ImportOutcome::Skipped(report.document));

    let after: i64 = conn
        .query_row(
            "SELECT updated_at FROM documents WHERE uuid = ?1;",
            [report.document.to_string()],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(before, after);

    let forced = importer
        .import_text(
            &mut conn,
            Some("a.md"),
            MORNING_WALK,
            ImportOptions {
                force: true,
                ..ImportOptions::default()
            },
        )
        .unwrap();
    let forced = committed(forced);
    assert!(!forced.created);
    assert_eq!(forced.document, report.document);
}

#[test]
fn incremental_unions_links_and_full_replace_unlinks_without_deleting() {
    let mut conn = open_db_in_memory().unwrap();
    let mut importer = Importer::new(AliasTable::empty());

    let first = committed(
        importer
            .import_text(
                &mut conn,
                None,
                "---\ndate: 2024-04-01\npeople: Ana Lopez\ntags: [garden]\n---\n",
                options(UpdateMode::FullReplace),
            )
            .unwrap(),
    );
    let ana = person_id(&conn, "Ana", "Lopez");

    committed(
        importer
            .import_text(
                &mut conn,
                None,
                "---\ndate: 2024-04-01\npeople: Ben Ortiz\n---\n",
                options(UpdateMode::Incremental),
            )
            .unwrap(),
    );
    let ben = person_id(&conn, "Ben", "Ortiz");
    let snapshot = load_snapshot(&conn, first.document).unwrap().unwrap();
    let mut linked = snapshot.people.clone();
    linked.sort();
    let mut expected = vec![ana, ben];
    expected.sort();
    assert_eq!(linked, expected);
    assert_eq!(snapshot.keywords.len(), 1, "incremental keeps other relations");

    let replaced = committed(
        importer
            .import_text(
                &mut conn,
                None,
                "---\ndate: 2024-04-01\npeople: Ben Ortiz\n---\n",
                options(UpdateMode::FullReplace),
            )
            .unwrap(),
    );
    assert_eq!(replaced.document, first.document);
    let snapshot = load_snapshot(&conn, first.document).unwrap().unwrap();
    assert_eq!(snapshot.people, vec![ben]);
    assert!(snapshot.keywords.is_empty());

    let entities = SqliteEntityRepository::try_new(&conn).unwrap();
    assert!(entities.get_person(ana).unwrap().is_some());
    assert!(entities
        .find_named(NamedKind::Keyword, "garden")
        .unwrap()
        .is_some());
}

#[test]
fn full_replace_removes_owned_records_and_incremental_merges_them() {
    let mut conn = open_db_in_memory().unwrap();
    let mut importer = Importer::new(AliasTable::empty());

    let report = committed(
        importer
            .import_text(
                &mut conn,
                None,
                "---\ndate: 2024-04-02\nscenes:\n  - name: Breakfast\n  - name: Market\nevents:\n  - name: Saturday\n    scenes: [Breakfast, Market]\n---\n",
                options(UpdateMode::FullReplace),
            )
            .unwrap(),
    );

    committed(
        importer
            .import_text(
                &mut conn,
                None,
                "---\ndate: 2024-04-02\nscenes:\n  - name: Dinner\nevents:\n  - name: Saturday\n    scenes: [Market, Dinner]\n---\n",
                options(UpdateMode::Incremental),
            )
            .unwrap(),
    );
    let snapshot = load_snapshot(&conn, report.document).unwrap().unwrap();
    let mut scenes: Vec<&str> = snapshot.scenes.iter().map(|scene| scene.name.as_str()).collect();
    scenes.sort();
    assert_eq!(scenes, vec!["Breakfast", "Dinner", "Market"]);
    assert_eq!(snapshot.events.len(), 1);
    let mut event_scenes = snapshot.events[0].scene_names.clone();
    event_scenes.sort();
    assert_eq!(event_scenes, vec!["Breakfast", "Dinner", "Market"]);

    committed(
        importer
            .import_text(
                &mut conn,
                None,
                "---\ndate: 2024-04-02\nscenes:\n  - name: Dinner\n---\n",
                options(UpdateMode::FullReplace),
            )
            .unwrap(),
    );
    let snapshot = load_snapshot(&conn, report.document).unwrap().unwrap();
    assert_eq!(snapshot.scenes.len(), 1);
    assert_eq!(snapshot.scenes[0].name, "Dinner");
    assert!(snapshot.events.is_empty());
}

#[test]
fn dangling_event_reference_rolls_back_the_whole_document() {
    let mut conn = open_db_in_memory().unwrap();
    let mut importer = Importer::new(AliasTable::empty());

    let err = importer
        .import_text(
            &mut conn,
            Some("2024/2024-03-12.md"),
            "---\ndate: 2024-03-12\npeople: Ana Lopez\ntags: [lunch]\nscenes:\n  - name: Lunch\nevents:\n  - name: Birthday\n    scenes: [Lunch, Cake]\n---\n",
            ImportOptions::default(),
        )
        .unwrap_err();

    assert_eq!(err.kind(), SyncErrorKind::Validation);
    match &err {
        SyncError::Validation { document, field, .. } => {
            assert_eq!(document, "2024/2024-03-12.md");
            assert_eq!(field, "events[0].scenes[1]");
        }
        other => panic!("unexpected error: {other}"),
    }

    let queries = QueryService::try_new(&conn).unwrap();
    assert!(queries
        .find_document_by_date(day(2024, 3, 12))
        .unwrap()
        .is_none());
    for table in ["documents", "people", "keywords", "scenes", "events"] {
        assert_eq!(count(&conn, table), 0, "{table} should be empty");
    }
}

#[test]
fn failed_reimport_leaves_existing_document_untouched() {
    let mut conn = open_db_in_memory().unwrap();
    let mut importer = Importer::new(AliasTable::empty());
    let report = committed(
        importer
            .import_text(
                &mut conn,
                None,
                "---\ndate: 2024-03-13\npeople: Ana Lopez\nscenes:\n  - name: Lunch\n---\n",
                ImportOptions::default(),
            )
            .unwrap(),
    );

    let err = importer
        .import_text(
            &mut conn,
            None,
            "---\ndate: 2024-03-13\npeople: Ben Ortiz\nevents:\n  - name: Party\n    scenes: [Dance]\n---\n",
            ImportOptions::default(),
        )
        .unwrap_err();
    assert_eq!(err.kind(), SyncErrorKind::Validation);

    let snapshot = load_snapshot(&conn, report.document).unwrap().unwrap();
    assert_eq!(snapshot.people, vec![person_id(&conn, "Ana", "Lopez")]);
    assert_eq!(snapshot.scenes.len(), 1);
    assert_eq!(count(&conn, "people"), 1);
    assert_eq!(importer.guard_stats().created, 1);
}

#[test]
fn bare_name_without_match_is_rejected_and_creates_no_row() {
    let mut conn = open_db_in_memory().unwrap();
    let mut importer = Importer::new(AliasTable::empty());

    let err = importer
        .import_text(
            &mut conn,
            None,
            "---\ndate: 2024-05-01\npeople: [Ben Ortiz, Dana]\n---\n",
            ImportOptions::default(),
        )
        .unwrap_err();

    assert_eq!(err.kind(), SyncErrorKind::Validation);
    assert_eq!(count(&conn, "people"), 0);
    assert_eq!(count(&conn, "documents"), 0);
}

#[test]
fn same_given_name_with_different_last_names_stays_distinct() {
    let mut conn = open_db_in_memory().unwrap();
    let mut importer = Importer::new(AliasTable::empty());

    committed(
        importer
            .import_text(
                &mut conn,
                None,
                "---\ndate: 2024-05-02\npeople: [Dana Ibarra, Dana Kim]\n---\n",
                ImportOptions::default(),
            )
            .unwrap(),
    );
    let ibarra = person_id(&conn, "Dana", "Ibarra");
    let kim = person_id(&conn, "Dana", "Kim");
    assert_ne!(ibarra, kim);

    let err = importer
        .import_text(
            &mut conn,
            None,
            "---\ndate: 2024-05-03\npeople: Dana\n---\n",
            ImportOptions::default(),
        )
        .unwrap_err();
    match err {
        SyncError::Ambiguity {
            reference,
            candidates,
            ..
        } => {
            assert_eq!(reference, "Dana");
            assert_eq!(candidates.len(), 2);
        }
        other => panic!("unexpected error: {other}"),
    }

    let report = committed(
        importer
            .import_text(
                &mut conn,
                None,
                "---\ndate: 2024-05-04\npeople: Dana Kim\n---\n",
                ImportOptions::default(),
            )
            .unwrap(),
    );
    let snapshot = load_snapshot(&conn, report.document).unwrap().unwrap();
    assert_eq!(snapshot.people, vec![kim]);
    assert_eq!(count(&conn, "people"), 2);
}

#[test]
fn editable_fields_survive_when_omitted_and_computed_fields_are_ignored() {
    let mut conn = open_db_in_memory().unwrap();
    let mut importer = Importer::new(AliasTable::empty());

    let report = committed(
        importer
            .import_text(
                &mut conn,
                None,
                "---\ndate: 2024-06-01\nnotes: Rainy all day.\nsummary: Indoors.\n---\none two three\n",
                ImportOptions::default(),
            )
            .unwrap(),
    );
    committed(
        importer
            .import_text(
                &mut conn,
                None,
                "---\ndate: 2024-06-01\nsummary: Read a book.\nword_count: 999\n---\none two\n",
                ImportOptions::default(),
            )
            .unwrap(),
    );

    let queries = QueryService::try_new(&conn).unwrap();
    let document = queries.get_document(report.document).unwrap().unwrap();
    assert_eq!(document.notes.as_deref(), Some("Rainy all day."));
    assert_eq!(document.summary.as_deref(), Some("Read a book."));
    assert_eq!(document.word_count, 2);
}

#[test]
fn blank_editable_field_clears_the_stored_value() {
    let mut conn = open_db_in_memory().unwrap();
    let mut importer = Importer::new(AliasTable::empty());

    let report = committed(
        importer
            .import_text(
                &mut conn,
                None,
                "---\ndate: 2024-06-02\nnotes: Rainy all day.\nsummary: Indoors.\n---\n",
                ImportOptions::default(),
            )
            .unwrap(),
    );
    committed(
        importer
            .import_text(
                &mut conn,
                None,
                "---\ndate: 2024-06-02\nnotes: ''\nsummary:\n---\nchanged\n",
                ImportOptions::default(),
            )
            .unwrap(),
    );

    let queries = QueryService::try_new(&conn).unwrap();
    let document = queries.get_document(report.document).unwrap().unwrap();
    assert!(document.notes.is_none());
    assert!(document.summary.is_none());
}

#[test]
fn parse_failure_reports_the_source_path() {
    let mut conn = open_db_in_memory().unwrap();
    let mut importer = Importer::new(AliasTable::empty());

    let err = importer
        .import_text(
            &mut conn,
            Some("broken.md"),
            "---\npeople: Dana Ibarra\n---\n",
            ImportOptions::default(),
        )
        .unwrap_err();
    assert_eq!(err.kind(), SyncErrorKind::Parse);
    assert!(err.to_string().starts_with("broken.md"));
    assert_eq!(count(&conn, "documents"), 0);
}
