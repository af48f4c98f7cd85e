use diarium_core::db::open_db_in_memory;
use diarium_core::model::document::DocumentId;
use diarium_core::model::entity::EntityValidationError;
use diarium_core::repo::entity_repo::{EntityRepository, SqliteEntityRepository};
use diarium_core::resolve::{AliasTable, EntityResolver, PersonRef, ResolveError};
use diarium_core::service::import_service::{ImportOptions, ImportOutcome, Importer};
use diarium_core::service::query::QueryService;
use diarium_core::service::snapshot::load_snapshot;
use diarium_core::service::{SyncError, SyncErrorKind};
use rusqlite::Connection;
use std::path::Path;

fn import(
    importer: &mut Importer,
    conn: &mut Connection,
    text: &str,
) -> Result<ImportOutcome, SyncError> {
    importer.import_text(conn, None, text, ImportOptions::default())
}

fn document_of(outcome: ImportOutcome) -> DocumentId {
    match outcome {
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
fn lookups_are_side_effect_free_and_bare_creation_is_rejected() {
    let conn = open_db_in_memory().unwrap();
    let entities = SqliteEntityRepository::try_new(&conn).unwrap();
    let aliases = AliasTable::empty();
    let resolver = EntityResolver::new(&entities, &aliases);

    let keyed = PersonRef::from_text("Dana Ibarra", &aliases).unwrap();
    assert!(resolver.lookup_person(&keyed).unwrap().is_none());
    assert!(resolver.suggest_people("Da", 5).unwrap().is_empty());
    assert_eq!(count(&conn, "people"), 0);

    let bare = PersonRef::from_text("Dana", &aliases).unwrap();
    let err = resolver.create_person(&bare).unwrap_err();
    assert!(matches!(
        err,
        ResolveError::Validation(EntityValidationError::PersonIdentityIncomplete(_))
    ));
    assert_eq!(count(&conn, "people"), 0);

    let id = resolver.create_person(&keyed).unwrap();
    let found = resolver.lookup_person(&keyed).unwrap().unwrap();
    assert_eq!(found.id, id);
    assert_eq!(found.display_name(), "Dana Ibarra");
}

#[test]
fn alias_table_expands_person_text_before_resolution() {
    let mut conn = open_db_in_memory().unwrap();
    let aliases = AliasTable::from_yaml_str(
        "people:\n  Dani: Dana Ibarra\nregions:\n  MTL: Montréal\n",
        Path::new("aliases.yaml"),
    )
    .unwrap();
    let mut importer = Importer::new(aliases);

    let first = document_of(
        import(
            &mut importer,
            &mut conn,
            "---\ndate: 2024-02-01\npeople: Dani\ncity: MTL\nlocations: [Parc Jarry]\n---\n",
        )
        .unwrap(),
    );
    let second = document_of(
        import(
            &mut importer,
            &mut conn,
            "---\ndate: 2024-02-02\npeople: Dana Ibarra\ncity: Montréal (Canada)\nlocations: [Parc Jarry]\n---\n",
        )
        .unwrap(),
    );

    let first = load_snapshot(&conn, first).unwrap().unwrap();
    let second = load_snapshot(&conn, second).unwrap().unwrap();
    assert_eq!(first.people, second.people);
    assert_eq!(first.places, second.places);
    assert_eq!(count(&conn, "people"), 1);
    assert_eq!(count(&conn, "regions"), 1);

    let region = &second.regions[0];
    assert_eq!(region.name, "Montréal");
    assert_eq!(region.country.as_deref(), Some("Canada"));
}

#[test]
fn stored_person_alias_resolves_a_bare_name() {
    let mut conn = open_db_in_memory().unwrap();
    let mut importer = Importer::new(AliasTable::empty());

    document_of(
        import(
            &mut importer,
            &mut conn,
            "---\ndate: 2024-02-03\npeople:\n  - name: Dana\n    last_name: Ibarra\n    relation: friend\n    alias: [Dee]\n---\n",
        )
        .unwrap(),
    );
    let later = document_of(
        import(&mut importer, &mut conn, "---\ndate: 2024-02-04\npeople: Dee\n---\n").unwrap(),
    );

    let snapshot = load_snapshot(&conn, later).unwrap().unwrap();
    let person = snapshot.person(snapshot.people[0]).unwrap();
    assert_eq!(person.display_name(), "Dana Ibarra");
    assert_eq!(person.aliases, vec!["Dee".to_string()]);
    assert_eq!(count(&conn, "people"), 1);
}

#[test]
fn bare_name_matches_a_keyed_mention_in_the_same_document() {
    let mut conn = open_db_in_memory().unwrap();
    let mut importer = Importer::new(AliasTable::empty());

    let id = document_of(
        import(
            &mut importer,
            &mut conn,
            "---\ndate: 2024-02-05\npeople: Dana Ibarra\nscenes:\n  - name: Lunch\n    people: Dana\n---\n",
        )
        .unwrap(),
    );
    let snapshot = load_snapshot(&conn, id).unwrap().unwrap();
    assert_eq!(snapshot.scenes[0].people, snapshot.people);
    assert_eq!(count(&conn, "people"), 1);
}

#[test]
fn places_are_scoped_by_region() {
    let mut conn = open_db_in_memory().unwrap();
    let mut importer = Importer::new(AliasTable::empty());

    document_of(
        import(
            &mut importer,
            &mut conn,
            "---\ndate: 2024-02-06\ncity: Montréal\nlocations: [Central Park]\n---\n",
        )
        .unwrap(),
    );
    document_of(
        import(
            &mut importer,
            &mut conn,
            "---\ndate: 2024-02-07\nlocations:\n  New York: [Central Park]\n---\n",
        )
        .unwrap(),
    );
    assert_eq!(count(&conn, "places"), 2);

    let err = import(
        &mut importer,
        &mut conn,
        "---\ndate: 2024-02-08\nlocations: [Central Park]\n---\n",
    )
    .unwrap_err();
    assert_eq!(err.kind(), SyncErrorKind::Ambiguity);

    let err = import(
        &mut importer,
        &mut conn,
        "---\ndate: 2024-02-09\nlocations: [Nowhere Cafe]\n---\n",
    )
    .unwrap_err();
    assert_eq!(err.kind(), SyncErrorKind::Validation);
    assert_eq!(count(&conn, "places"), 2);

    let reused = document_of(
        import(
            &mut importer,
            &mut conn,
            "---\ndate: 2024-02-10\ncity: New York\nlocations: [Central Park]\n---\n",
        )
        .unwrap(),
    );
    let snapshot = load_snapshot(&conn, reused).unwrap().unwrap();
    let place = snapshot.place(snapshot.places[0]).unwrap();
    assert_eq!(place.region_name, "New York");
    assert_eq!(count(&conn, "places"), 2);
}

#[test]
fn labels_are_shared_and_keywords_fold_case() {
    let mut conn = open_db_in_memory().unwrap();
    let mut importer = Importer::new(AliasTable::empty());

    document_of(
        import(
            &mut importer,
            &mut conn,
            "---\ndate: 2024-02-11\ntags: [Walk, '#rain']\narcs: Moving Out\n---\n",
        )
        .unwrap(),
    );
    document_of(
        import(
            &mut importer,
            &mut conn,
            "---\ndate: 2024-02-12\ntags: [walk]\narcs: [moving out]\n---\n",
        )
        .unwrap(),
    );

    assert_eq!(count(&conn, "keywords"), 2);
    assert_eq!(count(&conn, "arcs"), 1);
    let queries = QueryService::try_new(&conn).unwrap();
    assert_eq!(queries.documents_for_keyword("WALK").unwrap().len(), 2);
    assert_eq!(queries.documents_for_keyword("rain").unwrap().len(), 1);
    assert!(queries.documents_for_keyword("snow").unwrap().is_empty());
}

#[test]
fn guard_counts_created_and_reused_rows_across_documents() {
    let mut conn = open_db_in_memory().unwrap();
    let mut importer = Importer::new(AliasTable::empty());

    document_of(
        import(&mut importer, &mut conn, "---\ndate: 2024-02-13\npeople: Dana Ibarra\n---\n")
            .unwrap(),
    );
    assert_eq!(importer.guard_stats().created, 1);
    assert_eq!(importer.guard_stats().reused, 0);

    document_of(
        import(&mut importer, &mut conn, "---\ndate: 2024-02-14\npeople: Dana Ibarra\n---\n")
            .unwrap(),
    );
    let stats = importer.guard_stats();
    assert_eq!(stats.created, 1);
    assert!(stats.reused >= 1);
}

#[test]
fn suggest_people_matches_names_last_names_and_aliases() {
    let mut conn = open_db_in_memory().unwrap();
    let mut importer = Importer::new(AliasTable::empty());
    document_of(
        import(
            &mut importer,
            &mut conn,
            "---\ndate: 2024-02-15\npeople:\n  - Dana Ibarra\n  - Dana Kim\n  - name: Ben\n    last_name: Ortiz\n    alias: [Benny]\n---\n",
        )
        .unwrap(),
    );

    let queries = QueryService::try_new(&conn).unwrap();
    let aliases = AliasTable::empty();
    let danas = queries.suggest_people(&aliases, "da", 10).unwrap();
    assert_eq!(danas.len(), 2);
    assert_eq!(queries.suggest_people(&aliases, "Ort", 10).unwrap().len(), 1);
    assert_eq!(queries.suggest_people(&aliases, "benn", 10).unwrap().len(), 1);
    assert_eq!(queries.suggest_people(&aliases, "da", 1).unwrap().len(), 1);
    assert!(queries.suggest_people(&aliases, "  ", 10).unwrap().is_empty());
}
