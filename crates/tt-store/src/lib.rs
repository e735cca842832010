//! Storage for time trial events.
//!
//! An event is kept as one pretty-printed JSON document wrapping the
//! [`EventState`]:
//!
//! ```json
//! { "format": "tt-event", "version": 1, "saved_at": "...", "event": { ... } }
//! ```
//!
//! # Compatibility
//!
//! Every field of the event defaults when missing, so documents written by
//! older versions load with defaults. Times are stored as 4 decimal strings
//! and round-trip exactly. Derived results (placings, bunch times, ETAs) are
//! not stored; recalculate after loading.
//!
//! Saves write a sibling temporary file and rename it over the target, so a
//! crash mid-save leaves the previous document intact.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tt_core::{EventState, MemoryDirectory};

/// Document format identifier.
pub const FORMAT: &str = "tt-event";

/// Newest document version this crate reads and the one it writes.
pub const VERSION: u32 = 1;

/// Storage errors.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Reading or writing the file failed.
    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    /// The document is not valid JSON for an event.
    #[error("invalid event document: {0}")]
    Json(#[from] serde_json::Error),
    /// The document is some other kind of JSON.
    #[error("unexpected document format: {found:?}")]
    Format { found: String },
    /// The document was written by a newer version.
    #[error("unsupported document version {found} (newest supported is {VERSION})")]
    Version { found: u32 },
}

impl StoreError {
    fn io(path: &Path, source: io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// The on-disk wrapper around an event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventDocument {
    pub format: String,
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub saved_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub event: EventState,
}

const fn default_version() -> u32 {
    VERSION
}

impl EventDocument {
    pub fn new(event: EventState) -> Self {
        Self {
            format: FORMAT.to_string(),
            version: VERSION,
            saved_at: Some(Utc::now()),
            event,
        }
    }

    fn check(self) -> Result<Self, StoreError> {
        if self.format != FORMAT {
            return Err(StoreError::Format { found: self.format });
        }
        if self.version > VERSION {
            return Err(StoreError::Version {
                found: self.version,
            });
        }
        Ok(self)
    }
}

/// Serializes an event to a document string.
pub fn to_json(state: &EventState) -> Result<String, StoreError> {
    Ok(serde_json::to_string_pretty(&EventDocument::new(state.clone()))?)
}

/// Parses a document string.
pub fn from_json(json: &str) -> Result<EventDocument, StoreError> {
    serde_json::from_str::<EventDocument>(json)?.check()
}

/// An event document at a fixed path.
#[derive(Debug, Clone)]
pub struct EventStore {
    path: PathBuf,
}

impl EventStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Loads the full document.
    pub fn load_document(&self) -> Result<EventDocument, StoreError> {
        let json = fs::read_to_string(&self.path).map_err(|e| StoreError::io(&self.path, e))?;
        let document = from_json(&json)?;
        tracing::debug!(
            path = %self.path.display(),
            riders = document.event.riders().len(),
            "loaded event"
        );
        Ok(document)
    }

    /// Loads the event.
    pub fn load(&self) -> Result<EventState, StoreError> {
        Ok(self.load_document()?.event)
    }

    /// Saves the event, replacing any existing document.
    pub fn save(&self, state: &EventState) -> Result<(), StoreError> {
        let json = to_json(state)?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| StoreError::io(parent, e))?;
        }
        let tmp = self.temp_path();
        fs::write(&tmp, json).map_err(|e| StoreError::io(&tmp, e))?;
        fs::rename(&tmp, &self.path).map_err(|e| StoreError::io(&self.path, e))?;
        tracing::debug!(path = %self.path.display(), "saved event");
        Ok(())
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

/// Loads a rider directory (riders, teams and categories) from JSON.
pub fn load_directory(path: &Path) -> Result<MemoryDirectory, StoreError> {
    let json = fs::read_to_string(path).map_err(|e| StoreError::io(path, e))?;
    let directory: MemoryDirectory = serde_json::from_str(&json)?;
    tracing::debug!(
        path = %path.display(),
        riders = directory.riders.len(),
        teams = directory.teams.len(),
        "loaded rider directory"
    );
    Ok(directory)
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;
    use tt_core::{
        Bib, Comment, Contest, Context, EventKind, NullSink, Passing, PlacesSource, Rider,
        SplitPoint, SplitSchema, Tod,
    };

    use super::*;

    fn t(s: &str) -> Tod {
        s.parse().unwrap()
    }

    fn rider(number: &str) -> Rider {
        Rider::new(Bib::new(number).unwrap())
            .with_name(format!("Rider {number}"))
            .with_category("A")
            .with_refid(format!("T{number}"))
    }

    /// An event with every persisted field populated.
    fn busy_event() -> EventState {
        let mut state = EventState::new(EventKind::Individual);
        state.series = "M".to_string();
        state.categories = vec!["A".to_string()];
        state.tallies = vec!["sprint".to_string()];
        state.config.distance = Some(32.4);
        state.config.precision = 2;
        state.config.inter_loops.insert(2, vec![SplitPoint::A]);
        state.config.splits.insert(
            SplitPoint::A,
            SplitSchema {
                label: "km16".to_string(),
                distance: Some(16.2),
                ..SplitSchema::default()
            },
        );
        state.contests.push(
            Contest::new("int1", PlacesSource::Intermediate("int1".to_string()))
                .with_tally("sprint")
                .with_points(vec![3, 2, 1])
                .with_bonuses(vec![t("3"), t("2")]),
        );

        state.add_rider(rider("1").with_wall_start(t("10:00:00")));
        let mut second = rider("2").with_team("red").with_start_offset(t("1:30"));
        second.insert_seen(t("10:05:00.1234"), t("2:00"));
        second.insert_seen(t("10:09:00"), t("2:00"));
        second.set_manual_bunch(Some(t("30:00.5")));
        second.set_split(SplitPoint::A, Some(t("10:15:00.01")));
        state.add_rider(second);
        state.add_rider(rider("3"));

        state.set_start(t("9:59:00"));
        let directory = MemoryDirectory::new();
        let ctx = Context::from_directory(&directory, &NullSink);
        state.ingest(&ctx, &Passing::trigger(t("10:00:00.0123"), "C0"));
        state.ingest(&ctx, &Passing::trigger(t("10:20:00.4567"), "C1"));
        state
            .set_times("1", Some(t("10:00:00.0123")), Some(t("10:20:00.4567")), Some(t("10")))
            .unwrap();
        state.dnf_riders(["3"], Comment::Dns);
        state
            .set_places(&PlacesSource::Intermediate("int1".to_string()), "2 1")
            .unwrap();
        state
    }

    #[test]
    fn save_and_load_round_trip() {
        let dir = TempDir::new().unwrap();
        let store = EventStore::new(dir.path().join("event.json"));
        let state = busy_event();

        store.save(&state).unwrap();
        let loaded = store.load().unwrap();

        assert_eq!(loaded, state);
        assert_eq!(loaded.start_passings().len(), 1);
        assert_eq!(loaded.rider("2").unwrap().seen()[0], t("10:05:00.1234"));
    }

    #[test]
    fn results_survive_reload() {
        let dir = TempDir::new().unwrap();
        let store = EventStore::new(dir.path().join("event.json"));
        let directory = MemoryDirectory::new();
        let ctx = Context::from_directory(&directory, &NullSink);
        let mut state = busy_event();
        let before = state.recalculate(&ctx);

        store.save(&state).unwrap();
        let mut loaded = store.load().unwrap();
        assert_eq!(loaded.recalculate(&ctx), before);
    }

    #[test]
    fn save_replaces_without_leftovers() {
        let dir = TempDir::new().unwrap();
        let store = EventStore::new(dir.path().join("nested").join("event.json"));
        store.save(&EventState::new(EventKind::Team)).unwrap();
        store.save(&busy_event()).unwrap();

        let names: Vec<_> = fs::read_dir(dir.path().join("nested"))
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(names, ["event.json"]);
        assert!(store.load_document().unwrap().saved_at.is_some());
    }

    #[test]
    fn missing_fields_default() {
        let doc = from_json(r#"{"format": "tt-event", "event": {"kind": "team"}}"#).unwrap();
        assert_eq!(doc.version, VERSION);
        assert_eq!(doc.event.kind(), EventKind::Team);
        assert!(doc.event.riders().is_empty());
        assert_eq!(doc.event.config.min_lap, t("2:00"));

        let doc = from_json(
            r#"{"format": "tt-event", "event": {"riders": [{"bib": "7", "laps": 2}]}}"#,
        )
        .unwrap();
        let rider = doc.event.rider("7").unwrap();
        assert_eq!(rider.laps(), 2);
        assert!(rider.in_race());
    }

    #[test]
    fn rejects_foreign_documents() {
        assert!(matches!(
            from_json(r#"{"format": "something-else"}"#),
            Err(StoreError::Format { .. })
        ));
        assert!(matches!(
            from_json(r#"{"format": "tt-event", "version": 99}"#),
            Err(StoreError::Version { found: 99 })
        ));
        assert!(matches!(from_json("not json"), Err(StoreError::Json(_))));
    }

    #[test]
    fn missing_file_reports_path() {
        let dir = TempDir::new().unwrap();
        let store = EventStore::new(dir.path().join("absent.json"));
        assert!(!store.exists());
        let err = store.load().unwrap_err();
        assert!(err.to_string().contains("absent.json"));
    }

    #[test]
    fn loads_rider_directory() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("riders.json");
        fs::write(
            &path,
            r#"{
                "riders": [{"bib": "1", "refid": "T1", "first_name": "Ann", "last_name": "Lee"}],
                "teams": [{"code": "RED", "start_offset": "1:00"}],
                "categories": [{"label": "A", "nth_wheel": 4}]
            }"#,
        )
        .unwrap();

        let directory = load_directory(&path).unwrap();
        assert_eq!(directory.riders[0].display_name(), "Ann LEE");
        assert_eq!(directory.teams[0].start_offset, Some(t("1:00")));
        assert_eq!(directory.categories[0].nth_wheel, Some(4));
    }
}
