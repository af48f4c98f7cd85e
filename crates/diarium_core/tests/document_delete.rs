use diarium_core::db::open_db_in_memory;
use diarium_core::model::document::DocumentId;
use diarium_core::repo::entity_repo::{EntityRepository, SqliteEntityRepository};
use diarium_core::repo::RepoError;
use diarium_core::resolve::AliasTable;
use diarium_core::service::import_service::{ImportOptions, ImportOutcome, Importer};
use diarium_core::service::query::QueryService;
use diarium_core::service::snapshot::load_snapshot;
use rusqlite::Connection;

const RICH_DAY: &str = "---
date: 2024-07-01
city: Lisbon (Portugal)
locations: [Alfama]
people: [Dana Ibarra, Ana Lopez]
tags: [travel]
scenes:
  - name: Tram
    people: Dana Ibarra
events:
  - name: Arrival
    scenes: [Tram]
threads:
  - name: First visit
    to: '2015'
references:
  - content: Saudade.
    source: Book of Disquiet
poems:
  - title: Hills
    content: seven of them
motifs:
  - name: Stairs
---
";

fn import(conn: &mut Connection, importer: &mut Importer, text: &str) -> DocumentId {
    match importer
        .import_text(conn, None, text, ImportOptions::default())
        .unwrap()
    {
        ImportOutcome::Committed(report) => report.document,
        ImportOutcome::Skipped(id) => panic!("document {id} was unexpectedly skipped"),
    }
}

fn count(conn: &Connection, table: &str) -> i64 {
    conn.query_row(&format!("SELECT COUNT(*) FROM {table};"), [], |row| {
        row.get(0)
    })
    .unwrap()
}

#[test]
fn delete_removes_owned_records_and_keeps_shared_entities() {
    let mut conn = open_db_in_memory().unwrap();
    let mut importer = Importer::new(AliasTable::empty());
    let doomed = import(&mut conn, &mut importer, RICH_DAY);
    let survivor = import(
        &mut conn,
        &mut importer,
        "---\ndate: 2024-07-02\ncity: Lisbon\nlocations: [Alfama]\npeople: Dana Ibarra\ntags: [travel]\nscenes:\n  - name: Fado\n---\n",
    );

    let queries = QueryService::try_new(&conn).unwrap();
    assert_eq!(queries.verse_history("Hills").unwrap().len(), 1);
    queries.delete_document(doomed).unwrap();

    assert!(queries.verse_history("Hills").unwrap().is_empty());
    assert!(queries.get_document(doomed).unwrap().is_none());
    assert!(load_snapshot(&conn, doomed).unwrap().is_none());
    for table in [
        "events",
        "threads",
        "citations",
        "verse_instances",
        "pattern_occurrences",
    ] {
        assert_eq!(count(&conn, table), 0, "{table} should be empty");
    }
    assert_eq!(count(&conn, "scenes"), 1);

    assert_eq!(count(&conn, "people"), 2);
    assert_eq!(count(&conn, "places"), 1);
    assert_eq!(count(&conn, "works"), 1);
    assert_eq!(count(&conn, "verses"), 1);
    assert_eq!(count(&conn, "patterns"), 1);

    let snapshot = load_snapshot(&conn, survivor).unwrap().unwrap();
    assert_eq!(snapshot.people.len(), 1);
    assert_eq!(snapshot.places.len(), 1);
    assert_eq!(snapshot.keywords.len(), 1);
    assert_eq!(snapshot.scenes[0].name, "Fado");

    let entities = SqliteEntityRepository::try_new(&conn).unwrap();
    let dana = entities
        .find_people_by_key("Dana", Some("Ibarra"), None)
        .unwrap()
        .remove(0);
    let summary = queries.person_summary(dana.id).unwrap();
    assert_eq!(summary.document_count, 1);
    assert_eq!(queries.documents_for_person(dana.id).unwrap().len(), 1);
    assert_eq!(queries.documents_for_keyword("travel").unwrap().len(), 1);
}

#[test]
fn deleting_twice_reports_not_found() {
    let mut conn = open_db_in_memory().unwrap();
    let mut importer = Importer::new(AliasTable::empty());
    let id = import(&mut conn, &mut importer, RICH_DAY);

    let queries = QueryService::try_new(&conn).unwrap();
    queries.delete_document(id).unwrap();
    let err = queries.delete_document(id).unwrap_err();
    assert!(matches!(err, RepoError::DocumentNotFound(missing) if missing == id));
}

#[test]
fn deleted_date_can_be_imported_again() {
    let mut conn = open_db_in_memory().unwrap();
    let mut importer = Importer::new(AliasTable::empty());
    let first = import(&mut conn, &mut importer, RICH_DAY);
    QueryService::try_new(&conn)
        .unwrap()
        .delete_document(first)
        .unwrap();

    let second = import(&mut conn, &mut importer, RICH_DAY);
    assert_ne!(first, second);
    let snapshot = load_snapshot(&conn, second).unwrap().unwrap();
    assert_eq!(snapshot.people.len(), 2);
    assert_eq!(snapshot.events.len(), 1);
    assert_eq!(count(&conn, "people"), 2);
}
