//! Shared entity repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Look up canonical entities by their identity keys.
//! - Insert new canonical rows after identity validation.
//! - Compute per-entity summaries from the link graph.
//!
//! # Invariants
//! - Lookups never write.
//! - Identity comparisons are case-insensitive, matching the unique indexes.
//! - Attribute updates (`set_person_relation`, `set_region_country`, ...) only
//!   ever set values; clearing is not part of this contract.

use crate::model::date::parse_day;
use crate::model::entity::{
    EntityValidationError, ExternalWork, NamedEntity, NamedId, NamedKind, NewPerson, Person,
    PersonId, PersonRelation,
    PersonSummary, Place, PlaceId, Region, RegionId, WorkId, WorkKind,
};
use crate::repo::{ensure_tables, non_blank, RepoError, RepoResult};
use rusqlite::{params, Connection, OptionalExtension, Row};

const PERSON_SELECT_SQL: &str = "SELECT
    p.id AS id,
    p.name AS name,
    p.last_name AS last_name,
    p.disambiguator AS disambiguator,
    p.relation AS relation
FROM people p";

const PLACE_SELECT_SQL: &str = "SELECT
    pl.id AS id,
    pl.name AS name,
    pl.region_id AS region_id,
    r.name AS region_name
FROM places pl
INNER JOIN regions r ON r.id = pl.region_id";

/// Repository interface for canonical shared entities.
pub trait EntityRepository {
    /// Finds people matching an identity key. `None` components are not
    /// constrained, so `(name, last_name, None)` also returns rows that carry a
    /// disambiguator.
    fn find_people_by_key(
        &self,
        name: &str,
        last_name: Option<&str>,
        disambiguator: Option<&str>,
    ) -> RepoResult<Vec<Person>>;
    /// Finds people whose given name or any stored alias equals `text`.
    fn find_people_by_name_or_alias(&self, text: &str) -> RepoResult<Vec<Person>>;
    fn get_person(&self, id: PersonId) -> RepoResult<Option<Person>>;
    fn insert_person(&self, person: &NewPerson) -> RepoResult<PersonId>;
    fn set_person_relation(&self, id: PersonId, relation: PersonRelation) -> RepoResult<()>;
    fn add_person_aliases(&self, id: PersonId, aliases: &[String]) -> RepoResult<()>;
    /// Autocomplete over given names, last names and aliases.
    fn people_with_prefix(&self, prefix: &str, limit: u32) -> RepoResult<Vec<Person>>;
    fn person_summary(&self, id: PersonId) -> RepoResult<PersonSummary>;

    fn find_region(&self, name: &str) -> RepoResult<Option<Region>>;
    fn get_region(&self, id: RegionId) -> RepoResult<Option<Region>>;
    fn insert_region(&self, name: &str, country: Option<&str>) -> RepoResult<RegionId>;
    fn set_region_country(&self, id: RegionId, country: &str) -> RepoResult<()>;

    fn find_place(&self, name: &str, region_id: RegionId) -> RepoResult<Option<Place>>;
    fn find_places_by_name(&self, name: &str) -> RepoResult<Vec<Place>>;
    fn get_place(&self, id: PlaceId) -> RepoResult<Option<Place>>;
    fn insert_place(&self, name: &str, region_id: RegionId) -> RepoResult<PlaceId>;

    fn find_named(&self, kind: NamedKind, name: &str) -> RepoResult<Option<NamedEntity>>;
    fn get_named(&self, kind: NamedKind, id: NamedId) -> RepoResult<Option<NamedEntity>>;
    fn insert_named(&self, kind: NamedKind, name: &str) -> RepoResult<NamedId>;

    fn find_work(&self, title: &str) -> RepoResult<Option<ExternalWork>>;
    fn get_work(&self, id: WorkId) -> RepoResult<Option<ExternalWork>>;
    fn insert_work(
        &self,
        title: &str,
        author: Option<&str>,
        kind: Option<WorkKind>,
    ) -> RepoResult<WorkId>;
    /// Sets author/kind when provided; `None` leaves the stored value.
    fn update_work_details(
        &self,
        id: WorkId,
        author: Option<&str>,
        kind: Option<WorkKind>,
    ) -> RepoResult<()>;
}

/// SQLite-backed entity repository.
pub struct SqliteEntityRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteEntityRepository<'conn> {
    /// Constructs a repository from a migrated connection or transaction.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_tables(
            conn,
            &[
                "people",
                "person_aliases",
                "regions",
                "places",
                "arcs",
                "keywords",
                "concepts",
                "patterns",
                "verses",
                "works",
            ],
        )?;
        Ok(Self { conn })
    }

    fn query_people(&self, sql: &str, params: impl rusqlite::Params) -> RepoResult<Vec<Person>> {
        let mut stmt = self.conn.prepare(sql)?;
        let mut rows = stmt.query(params)?;
        let mut people = Vec::new();
        while let Some(row) = rows.next()? {
            people.push(parse_person_row(row)?);
        }
        for person in &mut people {
            person.aliases = load_aliases(self.conn, person.id)?;
        }
        Ok(people)
    }

    fn query_places(&self, sql: &str, params: impl rusqlite::Params) -> RepoResult<Vec<Place>> {
        let mut stmt = self.conn.prepare(sql)?;
        let mut rows = stmt.query(params)?;
        let mut places = Vec::new();
        while let Some(row) = rows.next()? {
            places.push(parse_place_row(row)?);
        }
        Ok(places)
    }
}

impl EntityRepository for SqliteEntityRepository<'_> {
    fn find_people_by_key(
        &self,
        name: &str,
        last_name: Option<&str>,
        disambiguator: Option<&str>,
    ) -> RepoResult<Vec<Person>> {
        self.query_people(
            &format!(
                "{PERSON_SELECT_SQL}
                 WHERE p.name = ?1 COLLATE NOCASE
                   AND (?2 IS NULL OR p.last_name = ?2 COLLATE NOCASE)
                   AND (?3 IS NULL OR p.disambiguator = ?3 COLLATE NOCASE)
                 ORDER BY p.id ASC;"
            ),
            params![name.trim(), last_name, disambiguator],
        )
    }

    fn find_people_by_name_or_alias(&self, text: &str) -> RepoResult<Vec<Person>> {
        self.query_people(
            &format!(
                "{PERSON_SELECT_SQL}
                 WHERE p.name = ?1 COLLATE NOCASE
                    OR EXISTS (
                        SELECT 1
                        FROM person_aliases a
                        WHERE a.person_id = p.id
                          AND a.alias = ?1 COLLATE NOCASE
                    )
                 ORDER BY p.id ASC;"
            ),
            [text.trim()],
        )
    }

    fn get_person(&self, id: PersonId) -> RepoResult<Option<Person>> {
        let mut people =
            self.query_people(&format!("{PERSON_SELECT_SQL} WHERE p.id = ?1;"), [id])?;
        Ok(people.pop())
    }

    fn insert_person(&self, person: &NewPerson) -> RepoResult<PersonId> {
        person.validate()?;
        self.conn.execute(
            "INSERT INTO people (name, last_name, disambiguator, relation)
             VALUES (?1, ?2, ?3, ?4);",
            params![
                person.name.trim(),
                non_blank(person.last_name.as_deref()),
                non_blank(person.disambiguator.as_deref()),
                person.relation.map(PersonRelation::as_str),
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn set_person_relation(&self, id: PersonId, relation: PersonRelation) -> RepoResult<()> {
        self.conn.execute(
            "UPDATE people SET relation = ?2 WHERE id = ?1;",
            params![id, relation.as_str()],
        )?;
        Ok(())
    }

    fn add_person_aliases(&self, id: PersonId, aliases: &[String]) -> RepoResult<()> {
        for alias in aliases {
            let Some(alias) = non_blank(Some(alias.as_str())) else {
                continue;
            };
            self.conn.execute(
                "INSERT OR IGNORE INTO person_aliases (person_id, alias) VALUES (?1, ?2);",
                params![id, alias],
            )?;
        }
        Ok(())
    }

    fn people_with_prefix(&self, prefix: &str, limit: u32) -> RepoResult<Vec<Person>> {
        let pattern = format!("{}%", escape_like(prefix.trim()));
        self.query_people(
            &format!(
                "{PERSON_SELECT_SQL}
                 WHERE p.name LIKE ?1 ESCAPE '\\'
                    OR p.last_name LIKE ?1 ESCAPE '\\'
                    OR EXISTS (
                        SELECT 1
                        FROM person_aliases a
                        WHERE a.person_id = p.id
                          AND a.alias LIKE ?1 ESCAPE '\\'
                    )
                 ORDER BY p.name COLLATE NOCASE ASC, p.id ASC
                 LIMIT ?2;"
            ),
            params![pattern, i64::from(limit)],
        )
    }

    fn person_summary(&self, id: PersonId) -> RepoResult<PersonSummary> {
        let (count, first, last): (u32, Option<String>, Option<String>) = self.conn.query_row(
            "SELECT COUNT(*), MIN(d.date), MAX(d.date)
             FROM document_people dp
             INNER JOIN documents d ON d.uuid = dp.document_uuid
             WHERE dp.person_id = ?1;",
            [id],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        )?;

        Ok(PersonSummary {
            person_id: id,
            document_count: count,
            first_appearance: first.as_deref().and_then(parse_day),
            last_appearance: last.as_deref().and_then(parse_day),
        })
    }

    fn find_region(&self, name: &str) -> RepoResult<Option<Region>> {
        let region = self
            .conn
            .query_row(
                "SELECT id, name, country FROM regions WHERE name = ?1 COLLATE NOCASE;",
                [name.trim()],
                parse_region_row,
            )
            .optional()?;
        Ok(region)
    }

    fn get_region(&self, id: RegionId) -> RepoResult<Option<Region>> {
        let region = self
            .conn
            .query_row(
                "SELECT id, name, country FROM regions WHERE id = ?1;",
                [id],
                parse_region_row,
            )
            .optional()?;
        Ok(region)
    }

    fn insert_region(&self, name: &str, country: Option<&str>) -> RepoResult<RegionId> {
        let name = name.trim();
        if name.is_empty() {
            return Err(RepoError::Validation(
                EntityValidationError::EmptyName("region"),
            ));
        }
        self.conn.execute(
            "INSERT INTO regions (name, country) VALUES (?1, ?2);",
            params![name, non_blank(country)],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn set_region_country(&self, id: RegionId, country: &str) -> RepoResult<()> {
        self.conn.execute(
            "UPDATE regions SET country = ?2 WHERE id = ?1;",
            params![id, country.trim()],
        )?;
        Ok(())
    }

    fn find_place(&self, name: &str, region_id: RegionId) -> RepoResult<Option<Place>> {
        let mut places = self.query_places(
            &format!(
                "{PLACE_SELECT_SQL}
                 WHERE pl.name = ?1 COLLATE NOCASE
                   AND pl.region_id = ?2;"
            ),
            params![name.trim(), region_id],
        )?;
        Ok(places.pop())
    }

    fn find_places_by_name(&self, name: &str) -> RepoResult<Vec<Place>> {
        self.query_places(
            &format!(
                "{PLACE_SELECT_SQL}
                 WHERE pl.name = ?1 COLLATE NOCASE
                 ORDER BY pl.id ASC;"
            ),
            [name.trim()],
        )
    }

    fn get_place(&self, id: PlaceId) -> RepoResult<Option<Place>> {
        let mut places =
            self.query_places(&format!("{PLACE_SELECT_SQL} WHERE pl.id = ?1;"), [id])?;
        Ok(places.pop())
    }

    fn insert_place(&self, name: &str, region_id: RegionId) -> RepoResult<PlaceId> {
        let name = name.trim();
        if name.is_empty() {
            return Err(RepoError::Validation(
                EntityValidationError::EmptyName("place"),
            ));
        }
        self.conn.execute(
            "INSERT INTO places (name, region_id) VALUES (?1, ?2);",
            params![name, region_id],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn find_named(&self, kind: NamedKind, name: &str) -> RepoResult<Option<NamedEntity>> {
        let Some(normalized) = kind.normalize(name) else {
            return Ok(None);
        };
        let entity = self
            .conn
            .query_row(
                &format!(
                    "SELECT id, name FROM {} WHERE name = ?1 COLLATE NOCASE;",
                    kind.table()
                ),
                [normalized],
                |row| {
                    Ok(NamedEntity {
                        id: row.get(0)?,
                        kind,
                        name: row.get(1)?,
                    })
                },
            )
            .optional()?;
        Ok(entity)
    }

    fn get_named(&self, kind: NamedKind, id: NamedId) -> RepoResult<Option<NamedEntity>> {
        let entity = self
            .conn
            .query_row(
                &format!("SELECT id, name FROM {} WHERE id = ?1;", kind.table()),
                [id],
                |row| {
                    Ok(NamedEntity {
                        id: row.get(0)?,
                        kind,
                        name: row.get(1)?,
                    })
                },
            )
            .optional()?;
        Ok(entity)
    }

    fn insert_named(&self, kind: NamedKind, name: &str) -> RepoResult<NamedId> {
        let normalized = kind.normalize(name).ok_or(RepoError::Validation(
            EntityValidationError::EmptyName(kind.label()),
        ))?;
        self.conn.execute(
            &format!("INSERT INTO {} (name) VALUES (?1);", kind.table()),
            [normalized],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn find_work(&self, title: &str) -> RepoResult<Option<ExternalWork>> {
        let work = self
            .conn
            .query_row(
                "SELECT id, title, author, kind FROM works WHERE title = ?1 COLLATE NOCASE;",
                [title.trim()],
                |row| Ok(parse_work_row(row)),
            )
            .optional()?;
        work.transpose()
    }

    fn get_work(&self, id: WorkId) -> RepoResult<Option<ExternalWork>> {
        let work = self
            .conn
            .query_row(
                "SELECT id, title, author, kind FROM works WHERE id = ?1;",
                [id],
                |row| Ok(parse_work_row(row)),
            )
            .optional()?;
        work.transpose()
    }

    fn insert_work(
        &self,
        title: &str,
        author: Option<&str>,
        kind: Option<WorkKind>,
    ) -> RepoResult<WorkId> {
        let title = title.trim();
        if title.is_empty() {
            return Err(RepoError::Validation(
                EntityValidationError::EmptyName("work"),
            ));
        }
        self.conn.execute(
            "INSERT INTO works (title, author, kind) VALUES (?1, ?2, ?3);",
            params![title, non_blank(author), kind.map(WorkKind::as_str)],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn update_work_details(
        &self,
        id: WorkId,
        author: Option<&str>,
        kind: Option<WorkKind>,
    ) -> RepoResult<()> {
        self.conn.execute(
            "UPDATE works
             SET
                author = COALESCE(?2, author),
                kind = COALESCE(?3, kind)
             WHERE id = ?1;",
            params![id, non_blank(author), kind.map(WorkKind::as_str)],
        )?;
        Ok(())
    }
}

fn parse_person_row(row: &Row<'_>) -> RepoResult<Person> {
    let relation = match row.get::<_, Option<String>>("relation")? {
        Some(value) => Some(PersonRelation::parse(&value).ok_or_else(|| {
            RepoError::InvalidData(format!("invalid relation `{value}` in people.relation"))
        })?),
        None => None,
    };

    Ok(Person {
        id: row.get("id")?,
        name: row.get("name")?,
        last_name: row.get("last_name")?,
        disambiguator: row.get("disambiguator")?,
        relation,
        aliases: Vec::new(),
    })
}

fn parse_place_row(row: &Row<'_>) -> RepoResult<Place> {
    Ok(Place {
        id: row.get("id")?,
        name: row.get("name")?,
        region_id: row.get("region_id")?,
        region_name: row.get("region_name")?,
    })
}

fn parse_region_row(row: &Row<'_>) -> rusqlite::Result<Region> {
    Ok(Region {
        id: row.get(0)?,
        name: row.get(1)?,
        country: row.get(2)?,
    })
}

fn parse_work_row(row: &Row<'_>) -> RepoResult<ExternalWork> {
    let kind = match row.get::<_, Option<String>>(3)? {
        Some(value) => Some(WorkKind::parse(&value).ok_or_else(|| {
            RepoError::InvalidData(format!("invalid work kind `{value}` in works.kind"))
        })?),
        None => None,
    };
    Ok(ExternalWork {
        id: row.get(0)?,
        title: row.get(1)?,
        author: row.get(2)?,
        kind,
    })
}

fn load_aliases(conn: &Connection, person_id: PersonId) -> RepoResult<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT alias
         FROM person_aliases
         WHERE person_id = ?1
         ORDER BY alias COLLATE NOCASE ASC;",
    )?;
    let mut rows = stmt.query([person_id])?;
    let mut aliases = Vec::new();
    while let Some(row) = rows.next()? {
        aliases.push(row.get(0)?);
    }
    Ok(aliases)
}

fn escape_like(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}
