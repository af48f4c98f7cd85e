//! Typed header parsing.
//!
//! # Responsibility
//! - Turn tagged header fields into typed specs per relation kind.
//! - Fail soft on malformed sub-blocks: drop them and record a warning.
//!
//! # Invariants
//! - A missing or invalid `date` fails the whole document; nothing else does.
//! - Scene dates default to the document date when omitted.
//! - Date sentinels are preserved as `DateRef::ThisDocument` / `Unknown`.
//! - `word_count` is computed and ignored here.

use crate::header::extract::{extract, HeaderError};
use crate::header::field::{split_packed, FieldValue};
use crate::model::date::{parse_day, DateRef, DatedContext};
use crate::model::document::{count_words, EditableFields};
use crate::model::entity::{PersonRelation, WorkKind};
use crate::model::relation::CitationMode;
use chrono::NaiveDate;
use std::collections::BTreeMap;

/// Non-fatal problem found while parsing a header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderWarning {
    /// Field path, e.g. `scenes[2].date`.
    pub field: String,
    pub message: String,
}

/// Raw person mention; normalization happens in the resolver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PersonMention {
    Text(String),
    Record(PersonRecord),
}

/// Person written as an explicit record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PersonRecord {
    pub name: String,
    pub last_name: Option<String>,
    pub disambiguator: Option<String>,
    pub relation: Option<PersonRelation>,
    pub aliases: Vec<String>,
}

/// `Name (Country)` region mention.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegionMention {
    pub name: String,
    pub country: Option<String>,
}

/// Place mention, optionally scoped to a region by the `{City: [..]}` form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaceMention {
    pub name: String,
    pub region: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SceneSpec {
    pub name: String,
    pub description: Option<String>,
    pub dates: Vec<DatedContext>,
    pub people: Vec<PersonMention>,
    pub locations: Vec<PlaceMention>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventSpec {
    pub name: String,
    pub scenes: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadSpec {
    pub name: String,
    /// Near moment; defaults to this document.
    pub from: DateRef,
    /// Far moment, possibly approximate or unknown.
    pub to: DateRef,
    /// Date of the document narrating the far moment.
    pub entry: Option<NaiveDate>,
    pub content: Option<String>,
    pub people: Vec<PersonMention>,
    pub locations: Vec<PlaceMention>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkSpec {
    pub title: String,
    pub author: Option<String>,
    pub kind: Option<WorkKind>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CitationSpec {
    pub content: String,
    pub description: Option<String>,
    pub mode: CitationMode,
    pub source: WorkSpec,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoemSpec {
    pub title: String,
    pub content: String,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MotifSpec {
    pub name: String,
    pub description: Option<String>,
}

/// Typed header of one document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedHeader {
    pub date: NaiveDate,
    pub people: Vec<PersonMention>,
    pub regions: Vec<RegionMention>,
    pub locations: Vec<PlaceMention>,
    pub arcs: Vec<String>,
    pub tags: Vec<String>,
    pub themes: Vec<String>,
    pub scenes: Vec<SceneSpec>,
    pub events: Vec<EventSpec>,
    pub threads: Vec<ThreadSpec>,
    pub citations: Vec<CitationSpec>,
    pub poems: Vec<PoemSpec>,
    pub motifs: Vec<MotifSpec>,
    pub editable: EditableFields,
    pub warnings: Vec<HeaderWarning>,
}

/// Parsed header plus computed body facts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedDocument {
    pub header: ParsedHeader,
    pub body: String,
    pub content_hash: String,
    pub word_count: i64,
}

/// Extracts and parses one document.
pub fn parse_document(text: &str) -> Result<ParsedDocument, HeaderError> {
    let raw = extract(text)?;
    let header = parse_header(raw.fields)?;
    Ok(ParsedDocument {
        word_count: count_words(&raw.body),
        header,
        body: raw.body,
        content_hash: raw.content_hash,
    })
}

/// Parses tagged header fields.
pub fn parse_header(mut fields: BTreeMap<String, FieldValue>) -> Result<ParsedHeader, HeaderError> {
    let date = match fields.remove("date") {
        None | Some(FieldValue::Null) => return Err(HeaderError::MissingDate),
        Some(value) => {
            let text = value.as_text().unwrap_or_default();
            parse_day(&text).ok_or(HeaderError::InvalidDate(text))?
        }
    };

    let mut parser = HeaderParser {
        date,
        warnings: Vec::new(),
    };
    let mut header = ParsedHeader {
        date,
        people: Vec::new(),
        regions: Vec::new(),
        locations: Vec::new(),
        arcs: Vec::new(),
        tags: Vec::new(),
        themes: Vec::new(),
        scenes: Vec::new(),
        events: Vec::new(),
        threads: Vec::new(),
        citations: Vec::new(),
        poems: Vec::new(),
        motifs: Vec::new(),
        editable: EditableFields::default(),
        warnings: Vec::new(),
    };

    for (key, value) in fields {
        match key.as_str() {
            "word_count" => {}
            "people" => header.people = parser.people(&key, value),
            "city" => {
                for region in parser.regions(&key, value) {
                    push_region(&mut header.regions, region);
                }
            }
            "locations" => {
                let (regions, places) = parser.locations(&key, value);
                header.locations = places;
                for region in regions {
                    push_region(&mut header.regions, region);
                }
            }
            "arcs" => header.arcs = parser.labels(&key, value),
            "tags" => header.tags = parser.labels(&key, value),
            "themes" => header.themes = parser.labels(&key, value),
            "scenes" => header.scenes = parser.records(&key, value, HeaderParser::scene),
            "events" => header.events = parser.records(&key, value, HeaderParser::event),
            "threads" => header.threads = parser.records(&key, value, HeaderParser::thread),
            "references" => {
                header.citations = parser.records(&key, value, HeaderParser::citation)
            }
            "poems" => header.poems = parser.records(&key, value, HeaderParser::poem),
            "motifs" => header.motifs = parser.records(&key, value, HeaderParser::motif),
            "notes" => header.editable.notes = parser.editable(&key, value),
            "summary" => header.editable.summary = parser.editable(&key, value),
            other => parser.warn(other, "unknown header field ignored"),
        }
    }

    header.warnings = parser.warnings;
    Ok(header)
}

fn push_region(regions: &mut Vec<RegionMention>, region: RegionMention) {
    if !regions
        .iter()
        .any(|existing| existing.name.eq_ignore_ascii_case(&region.name))
    {
        regions.push(region);
    }
}

struct HeaderParser {
    date: NaiveDate,
    warnings: Vec<HeaderWarning>,
}

impl HeaderParser {
    fn warn(&mut self, field: &str, message: impl Into<String>) {
        self.warnings.push(HeaderWarning {
            field: field.to_string(),
            message: message.into(),
        });
    }

    fn text(&mut self, path: &str, value: FieldValue) -> Option<String> {
        match value {
            FieldValue::Null => None,
            other => {
                let text = other.as_text();
                if text.is_none() {
                    self.warn(path, format!("expected text, found {}", other.kind_label()));
                }
                text
            }
        }
    }

    /// Blank or null text clears the field; structured values leave it as is.
    fn editable(&mut self, path: &str, value: FieldValue) -> Option<Option<String>> {
        match value {
            FieldValue::Null => Some(None),
            FieldValue::Scalar(text) if text.trim().is_empty() => Some(None),
            other => self.text(path, other).map(Some),
        }
    }

    fn labels(&mut self, path: &str, value: FieldValue) -> Vec<String> {
        let mut labels = Vec::new();
        for (index, item) in value.into_list().into_iter().enumerate() {
            match item.as_text() {
                Some(text) => labels.push(text),
                None => self.warn(
                    &format!("{path}[{index}]"),
                    format!("expected a name, found {}", item.kind_label()),
                ),
            }
        }
        labels
    }

    fn people(&mut self, path: &str, value: FieldValue) -> Vec<PersonMention> {
        let mut people = Vec::new();
        for (index, item) in value.into_list().into_iter().enumerate() {
            let item_path = format!("{path}[{index}]");
            match item {
                FieldValue::Scalar(text) if !text.trim().is_empty() => {
                    people.push(PersonMention::Text(text.trim().to_string()));
                }
                FieldValue::Record(record) => {
                    if let Some(person) = self.person_record(&item_path, record) {
                        people.push(PersonMention::Record(person));
                    }
                }
                other => self.warn(
                    &item_path,
                    format!("expected a person, found {}", other.kind_label()),
                ),
            }
        }
        people
    }

    fn person_record(
        &mut self,
        path: &str,
        mut record: BTreeMap<String, FieldValue>,
    ) -> Option<PersonRecord> {
        let Some(name) = record.remove("name").and_then(|value| value.as_text()) else {
            self.warn(path, "person record has no name");
            return None;
        };
        let relation = match record.remove("relation").and_then(|value| value.as_text()) {
            Some(text) => {
                let relation = PersonRelation::parse(&text);
                if relation.is_none() {
                    self.warn(&format!("{path}.relation"), format!("unknown relation `{text}`"));
                }
                relation
            }
            None => None,
        };
        let aliases = match record.remove("alias") {
            Some(value) => self.labels(&format!("{path}.alias"), value),
            None => Vec::new(),
        };
        let person = PersonRecord {
            name,
            last_name: record.remove("last_name").and_then(|value| value.as_text()),
            disambiguator: record.remove("disambiguator").and_then(|value| value.as_text()),
            relation,
            aliases,
        };
        for key in record.keys() {
            self.warn(&format!("{path}.{key}"), "unknown person field ignored");
        }
        Some(person)
    }

    fn regions(&mut self, path: &str, value: FieldValue) -> Vec<RegionMention> {
        let mut regions = Vec::new();
        for name in self.labels(path, value) {
            let (name, country) = split_packed(&name);
            push_region(&mut regions, RegionMention { name, country });
        }
        regions
    }

    /// Reads either a plain list of places or a `{Region: [places]}` mapping.
    fn locations(
        &mut self,
        path: &str,
        value: FieldValue,
    ) -> (Vec<RegionMention>, Vec<PlaceMention>) {
        match value {
            FieldValue::Record(by_region) => {
                let mut regions = Vec::new();
                let mut places = Vec::new();
                for (region, names) in by_region {
                    let (region_name, country) = split_packed(&region);
                    for name in self.labels(&format!("{path}.{region}"), names) {
                        places.push(PlaceMention {
                            name,
                            region: Some(region_name.clone()),
                        });
                    }
                    push_region(
                        &mut regions,
                        RegionMention {
                            name: region_name,
                            country,
                        },
                    );
                }
                (regions, places)
            }
            other => {
                let places = self
                    .labels(path, other)
                    .into_iter()
                    .map(|name| PlaceMention { name, region: None })
                    .collect();
                (Vec::new(), places)
            }
        }
    }

    fn records<T>(
        &mut self,
        path: &str,
        value: FieldValue,
        parse: fn(&mut Self, &str, BTreeMap<String, FieldValue>) -> Option<T>,
    ) -> Vec<T> {
        let mut parsed = Vec::new();
        for (index, item) in value.into_list().into_iter().enumerate() {
            let item_path = format!("{path}[{index}]");
            match item {
                FieldValue::Record(record) => {
                    if let Some(value) = parse(self, &item_path, record) {
                        parsed.push(value);
                    }
                }
                other => self.warn(
                    &item_path,
                    format!("expected a record, found {}", other.kind_label()),
                ),
            }
        }
        parsed
    }

    fn required_text(
        &mut self,
        path: &str,
        record: &mut BTreeMap<String, FieldValue>,
        key: &str,
    ) -> Option<String> {
        let text = record.remove(key).and_then(|value| value.as_text());
        if text.is_none() {
            self.warn(path, format!("record has no `{key}`; skipped"));
        }
        text
    }

    fn required_indented(
        &mut self,
        path: &str,
        record: &mut BTreeMap<String, FieldValue>,
        key: &str,
    ) -> Option<String> {
        let text = record.remove(key).and_then(|value| value.as_indented_text());
        if text.is_none() {
            self.warn(path, format!("record has no `{key}`; skipped"));
        }
        text
    }

    fn optional_indented(
        &mut self,
        path: &str,
        record: &mut BTreeMap<String, FieldValue>,
        key: &str,
    ) -> Option<String> {
        match record.remove(key) {
            None | Some(FieldValue::Null) => None,
            Some(value) => {
                let text = value.as_indented_text();
                if text.is_none() {
                    self.warn(
                        &format!("{path}.{key}"),
                        format!("expected text, found {}", value.kind_label()),
                    );
                }
                text
            }
        }
    }

    fn optional_text(
        &mut self,
        path: &str,
        record: &mut BTreeMap<String, FieldValue>,
        key: &str,
    ) -> Option<String> {
        match record.remove(key) {
            Some(value) => self.text(&format!("{path}.{key}"), value),
            None => None,
        }
    }

    fn warn_unknown(&mut self, path: &str, record: &BTreeMap<String, FieldValue>) {
        for key in record.keys() {
            self.warn(&format!("{path}.{key}"), "unknown field ignored");
        }
    }

    /// Reads one date position; YAML null means unknown.
    fn date_ref(&mut self, path: &str, value: &FieldValue) -> Option<DatedContext> {
        match value {
            FieldValue::Null => Some(DatedContext::new(DateRef::Unknown, None)),
            FieldValue::Sentinel(sentinel) => Some(DatedContext::new(sentinel.to_date_ref(), None)),
            FieldValue::Scalar(text) => {
                let (head, context) = split_packed(text);
                match DateRef::parse(&head) {
                    Ok(date) => Some(DatedContext::new(date, context)),
                    Err(err) => {
                        self.warn(path, err.to_string());
                        None
                    }
                }
            }
            other => {
                self.warn(path, format!("expected a date, found {}", other.kind_label()));
                None
            }
        }
    }

    fn person_list(
        &mut self,
        path: &str,
        record: &mut BTreeMap<String, FieldValue>,
    ) -> Vec<PersonMention> {
        match record.remove("people") {
            Some(value) => self.people(&format!("{path}.people"), value),
            None => Vec::new(),
        }
    }

    fn place_list(
        &mut self,
        path: &str,
        record: &mut BTreeMap<String, FieldValue>,
    ) -> Vec<PlaceMention> {
        match record.remove("locations") {
            Some(value) => self.locations(&format!("{path}.locations"), value).1,
            None => Vec::new(),
        }
    }

    fn scene(&mut self, path: &str, mut record: BTreeMap<String, FieldValue>) -> Option<SceneSpec> {
        let name = self.required_text(path, &mut record, "name")?;
        let description = self.optional_text(path, &mut record, "description");
        let dates = match record.remove("date") {
            None => vec![DatedContext::new(DateRef::exact(self.date), None)],
            Some(FieldValue::List(items)) => {
                let mut dates = Vec::new();
                for (index, item) in items.iter().enumerate() {
                    if let Some(date) = self.date_ref(&format!("{path}.date[{index}]"), item) {
                        dates.push(date);
                    }
                }
                dates
            }
            Some(value) => self
                .date_ref(&format!("{path}.date"), &value)
                .into_iter()
                .collect(),
        };
        if dates.is_empty() {
            self.warn(path, format!("scene `{name}` has no valid date; skipped"));
            return None;
        }
        let people = self.person_list(path, &mut record);
        let locations = self.place_list(path, &mut record);
        self.warn_unknown(path, &record);

        Some(SceneSpec {
            name,
            description,
            dates,
            people,
            locations,
        })
    }

    fn event(&mut self, path: &str, mut record: BTreeMap<String, FieldValue>) -> Option<EventSpec> {
        let name = self.required_text(path, &mut record, "name")?;
        let scenes = match record.remove("scenes") {
            Some(value) => self.labels(&format!("{path}.scenes"), value),
            None => Vec::new(),
        };
        self.warn_unknown(path, &record);
        Some(EventSpec { name, scenes })
    }

    fn thread(&mut self, path: &str, mut record: BTreeMap<String, FieldValue>) -> Option<ThreadSpec> {
        let name = self.required_text(path, &mut record, "name")?;
        let from = match record.remove("from") {
            Some(value) => self.date_ref(&format!("{path}.from"), &value)?.date,
            None => DateRef::ThisDocument,
        };
        let Some(to_value) = record.remove("to") else {
            self.warn(path, format!("thread `{name}` has no `to` date; skipped"));
            return None;
        };
        let to = self.date_ref(&format!("{path}.to"), &to_value)?.date;
        let entry = match record.remove("entry") {
            None | Some(FieldValue::Null) => None,
            Some(value) => {
                let text = value.as_text().unwrap_or_default();
                let day = parse_day(&text);
                if day.is_none() {
                    self.warn(
                        &format!("{path}.entry"),
                        format!("entry `{text}` is not a YYYY-MM-DD day; ignored"),
                    );
                }
                day
            }
        };
        let content = self.optional_indented(path, &mut record, "content");
        let people = self.person_list(path, &mut record);
        let locations = self.place_list(path, &mut record);
        self.warn_unknown(path, &record);

        Some(ThreadSpec {
            name,
            from,
            to,
            entry,
            content,
            people,
            locations,
        })
    }

    fn citation(
        &mut self,
        path: &str,
        mut record: BTreeMap<String, FieldValue>,
    ) -> Option<CitationSpec> {
        let content = self.required_text(path, &mut record, "content")?;
        let description = self.optional_text(path, &mut record, "description");
        let mode = match record.remove("mode").and_then(|value| value.as_text()) {
            Some(text) => CitationMode::parse(&text).unwrap_or_else(|| {
                self.warn(
                    &format!("{path}.mode"),
                    format!("unknown mode `{text}`; using direct"),
                );
                CitationMode::Direct
            }),
            None => CitationMode::Direct,
        };
        let source = match record.remove("source") {
            Some(FieldValue::Record(mut source)) => {
                let source_path = format!("{path}.source");
                let title = self.required_text(&source_path, &mut source, "title")?;
                let author = self.optional_text(&source_path, &mut source, "author");
                let kind = match source.remove("type").and_then(|value| value.as_text()) {
                    Some(text) => {
                        let kind = WorkKind::parse(&text);
                        if kind.is_none() {
                            self.warn(
                                &format!("{source_path}.type"),
                                format!("unknown work type `{text}` ignored"),
                            );
                        }
                        kind
                    }
                    None => None,
                };
                self.warn_unknown(&source_path, &source);
                WorkSpec {
                    title,
                    author,
                    kind,
                }
            }
            Some(value) => match value.as_text() {
                Some(title) => WorkSpec {
                    title,
                    author: None,
                    kind: None,
                },
                None => {
                    self.warn(path, "reference source has no title; skipped");
                    return None;
                }
            },
            None => {
                self.warn(path, "reference has no `source`; skipped");
                return None;
            }
        };
        self.warn_unknown(path, &record);

        Some(CitationSpec {
            content,
            description,
            mode,
            source,
        })
    }

    fn poem(&mut self, path: &str, mut record: BTreeMap<String, FieldValue>) -> Option<PoemSpec> {
        let title = self.required_text(path, &mut record, "title")?;
        let content = self.required_indented(path, &mut record, "content")?;
        let notes = self.optional_text(path, &mut record, "notes");
        self.warn_unknown(path, &record);
        Some(PoemSpec {
            title,
            content,
            notes,
        })
    }

    fn motif(&mut self, path: &str, mut record: BTreeMap<String, FieldValue>) -> Option<MotifSpec> {
        let name = self.required_text(path, &mut record, "name")?;
        let description = self.optional_text(path, &mut record, "description");
        self.warn_unknown(path, &record);
        Some(MotifSpec { name, description })
    }
}

#[cfg(test)]
mod tests {
    use super::{parse_document, PersonMention, PlaceMention};
    use crate::header::extract::HeaderError;
    use crate::model::date::DateRef;
    use crate::model::relation::CitationMode;
    use chrono::NaiveDate;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn scene_without_date_defaults_to_document_date() {
        let parsed = parse_document(
            "---\ndate: 2024-03-10\nscenes:\n  - name: Morning Walk\n---\nWalked.\n",
        )
        .unwrap();
        let scene = &parsed.header.scenes[0];
        assert_eq!(scene.name, "Morning Walk");
        assert_eq!(scene.dates[0].date, DateRef::exact(day(2024, 3, 10)));
        assert_eq!(parsed.word_count, 1);
    }

    #[test]
    fn scalar_people_become_a_list() {
        let parsed = parse_document("---\ndate: 2024-03-10\npeople: Dana Ibarra\n---\n").unwrap();
        assert_eq!(
            parsed.header.people,
            vec![PersonMention::Text("Dana Ibarra".to_string())]
        );
    }

    #[test]
    fn packed_scene_dates_and_sentinels_are_kept() {
        let parsed = parse_document(
            "---\ndate: 2024-03-10\nscenes:\n  - name: Concert\n    date: ['2024-03-09 (the night before)', '.', '??']\n---\n",
        )
        .unwrap();
        let dates = &parsed.header.scenes[0].dates;
        assert_eq!(dates.len(), 3);
        assert_eq!(dates[0].context.as_deref(), Some("the night before"));
        assert_eq!(dates[1].date, DateRef::ThisDocument);
        assert_eq!(dates[2].date, DateRef::Unknown);
    }

    #[test]
    fn thread_defaults_and_null_far_date() {
        let parsed = parse_document(
            "---\ndate: 2024-03-10\nthreads:\n  - name: Same bench\n    to: ~\n    entry: 2019-05-02\n---\n",
        )
        .unwrap();
        let thread = &parsed.header.threads[0];
        assert_eq!(thread.from, DateRef::ThisDocument);
        assert_eq!(thread.to, DateRef::Unknown);
        assert_eq!(thread.entry, Some(day(2019, 5, 2)));
    }

    #[test]
    fn locations_mapping_scopes_places_and_adds_regions() {
        let parsed = parse_document(
            "---\ndate: 2024-03-10\ncity: Montréal (Canada)\nlocations:\n  Montréal: [Parc Jarry]\n  Québec: Vieux-Port\n---\n",
        )
        .unwrap();
        let header = parsed.header;
        assert_eq!(header.regions.len(), 2);
        assert_eq!(header.regions[0].country.as_deref(), Some("Canada"));
        assert!(header.locations.contains(&PlaceMention {
            name: "Vieux-Port".to_string(),
            region: Some("Québec".to_string()),
        }));
    }

    #[test]
    fn malformed_sub_blocks_warn_instead_of_failing() {
        let parsed = parse_document(
            "---\ndate: 2024-03-10\nscenes:\n  - 42\n  - name: Ok\n    date: yesterday\n  - name: Fine\nreferences:\n  - source: Book\nmood: calm\n---\n",
        )
        .unwrap();
        let header = parsed.header;
        assert_eq!(header.scenes.len(), 1);
        assert_eq!(header.scenes[0].name, "Fine");
        assert!(header.citations.is_empty());
        let fields: Vec<&str> = header.warnings.iter().map(|w| w.field.as_str()).collect();
        assert!(fields.contains(&"scenes[0]"));
        assert!(fields.contains(&"scenes[1].date"));
        assert!(fields.contains(&"references[0]"));
        assert!(fields.contains(&"mood"));
    }

    #[test]
    fn citation_source_may_be_a_title() {
        let parsed = parse_document(
            "---\ndate: 2024-03-10\nreferences:\n  - content: Call me Ishmael.\n    mode: paraphrase\n    source: Moby-Dick\n---\n",
        )
        .unwrap();
        let citation = &parsed.header.citations[0];
        assert_eq!(citation.mode, CitationMode::Paraphrase);
        assert_eq!(citation.source.title, "Moby-Dick");
    }

    #[test]
    fn missing_or_invalid_date_fails_the_document() {
        assert!(matches!(
            parse_document("---\npeople: Dana\n---\n"),
            Err(HeaderError::MissingDate)
        ));
        assert!(matches!(
            parse_document("---\ndate: '.'\n---\n"),
            Err(HeaderError::InvalidDate(_))
        ));
    }

    #[test]
    fn word_count_in_header_is_ignored() {
        let parsed =
            parse_document("---\ndate: 2024-03-10\nword_count: 999\n---\none two\n").unwrap();
        assert_eq!(parsed.word_count, 2);
        assert!(parsed.header.warnings.is_empty());
    }
}
