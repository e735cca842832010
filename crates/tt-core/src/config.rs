//! Event configuration: timing parameters, categories, intermediates and
//! contests.
//!
//! All of this is plain serde data stored in the event document. Every
//! field has a default so partially written documents still load.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::tod::Tod;
use crate::types::{SplitPoint, ValidationError};

/// Which race handler an event uses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    /// Individual time trial.
    #[default]
    Individual,
    /// Team time trial.
    Team,
}

impl EventKind {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Individual => "individual",
            Self::Team => "team",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "individual" | "itt" | "irtt" => Ok(Self::Individual),
            "team" | "ttt" | "trtt" => Ok(Self::Team),
            other => Err(format!("unknown event kind: {other}")),
        }
    }
}

/// Elapsed-time window and distance of one intermediate split.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SplitSchema {
    /// Announced label, e.g. `"10km"`.
    pub label: String,
    /// Passings at or before this elapsed time are too early for the split.
    pub min_elapsed: Tod,
    /// Passings at or after this elapsed time are too late for the split.
    pub max_elapsed: Tod,
    /// Distance from the start in kilometres, used for ETA projection.
    pub distance: Option<f64>,
}

impl Default for SplitSchema {
    fn default() -> Self {
        Self {
            label: String::new(),
            min_elapsed: Tod::ZERO,
            max_elapsed: Tod::MAX,
            distance: None,
        }
    }
}

impl SplitSchema {
    /// True when `elapsed` falls strictly inside the window.
    pub fn accepts(&self, elapsed: Tod) -> bool {
        elapsed > self.min_elapsed && elapsed < self.max_elapsed
    }
}

/// Race level timing parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    /// Channel of the start line loop or switch.
    pub start_loop: Option<u32>,

    /// Channel of the finish line loop or photocell.
    pub finish_loop: Option<u32>,

    /// Shortest elapsed time accepted as a finish.
    pub min_elapsed: Tod,

    /// Shortest gap accepted between two passings of one rider.
    pub min_lap: Tod,

    /// Window before a start loop passing searched for the start impulse.
    pub start_match: Tod,

    /// Window around a finish loop passing searched for the finish impulse.
    pub finish_match: Tod,

    /// Largest accepted difference between wall start and start loop passing.
    pub wall_tolerance: Tod,

    /// Accept start loop passings without an armed start lane.
    pub sloppy_start: bool,

    /// Take start and finish times from matched impulses instead of the
    /// transponder passing itself.
    pub sloppy_impulse: bool,

    /// Subtracted from start impulses to get the rider's start.
    pub start_delay: Tod,

    /// Individual: finish loop passes needed to finish (multi-lap course).
    pub finish_passes: Option<u32>,

    /// Team: laps needed to finish.
    pub target_laps: Option<u32>,

    /// Decimal places kept in ranked times (0, 1 or 2).
    pub precision: u8,

    /// Time limit expression: `"1:10:00"`, `"+5:00"` or `"+5%"`.
    pub time_limit: Option<String>,

    /// Team: which finisher sets the team time.
    pub nth_wheel: usize,

    /// Team: riders dropped by more than `gap` keep their own time.
    pub own_time: bool,

    /// Team: gap that separates a dropped rider from the team.
    pub gap: Tod,

    /// Course length in kilometres.
    pub distance: Option<f64>,

    /// Intermediate loop channel to the splits it may feed, nearest first.
    pub inter_loops: BTreeMap<u32, Vec<SplitPoint>>,

    /// Configured intermediate splits.
    pub splits: BTreeMap<SplitPoint, SplitSchema>,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            start_loop: Some(0),
            finish_loop: Some(1),
            min_elapsed: Tod::from_secs(30),
            min_lap: Tod::from_secs(120),
            start_match: Tod::from_secs(5),
            finish_match: Tod::from_millis(200),
            wall_tolerance: Tod::from_secs(5),
            sloppy_start: false,
            sloppy_impulse: false,
            start_delay: Tod::ZERO,
            finish_passes: None,
            target_laps: None,
            precision: 1,
            time_limit: None,
            nth_wheel: 3,
            own_time: true,
            gap: Tod::from_millis(1120),
            distance: None,
            inter_loops: BTreeMap::new(),
            splits: BTreeMap::new(),
        }
    }
}

impl TimingConfig {
    /// Ranking precision clamped to the supported range.
    pub fn places(&self) -> u8 {
        self.precision.min(2)
    }

    /// Splits fed by an intermediate channel, or `None` if unconfigured.
    pub fn splits_for(&self, channel: u32) -> Option<&[SplitPoint]> {
        self.inter_loops.get(&channel).map(Vec::as_slice)
    }
}

/// Per category overrides from the category directory.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Category {
    pub label: String,
    pub title: String,
    /// Finish passes (individual) or target laps (team).
    pub laps: Option<u32>,
    pub time_limit: Option<String>,
    pub nth_wheel: Option<usize>,
    pub distance: Option<f64>,
}

impl Category {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into().to_uppercase(),
            ..Self::default()
        }
    }
}

/// A named intermediate sprint or climb with its manually entered places.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Intermediate {
    pub label: String,
    pub places: String,
}

/// Where a contest reads its places from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum PlacesSource {
    /// Finish order of the event (`"finish"`).
    Finish,
    /// Finish order filtered to one category (`"finish:U23"`).
    CategoryFinish(String),
    /// Every rider in start order (`"registered"`).
    Registered,
    /// Every rider who started (`"starters"`).
    Starters,
    /// An intermediate by id.
    Intermediate(String),
}

impl PlacesSource {
    /// Finish sources only credit the winner in countbacks.
    pub const fn is_finish(&self) -> bool {
        matches!(self, Self::Finish | Self::CategoryFinish(_))
    }
}

impl fmt::Display for PlacesSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Finish => f.write_str("finish"),
            Self::CategoryFinish(cat) => write!(f, "finish:{cat}"),
            Self::Registered => f.write_str("registered"),
            Self::Starters => f.write_str("starters"),
            Self::Intermediate(id) => f.write_str(id),
        }
    }
}

impl FromStr for PlacesSource {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        match s.to_ascii_lowercase().as_str() {
            "" => Err(ValidationError::InvalidSource {
                value: s.to_string(),
            }),
            "finish" | "fin" => Ok(Self::Finish),
            "registered" | "reg" => Ok(Self::Registered),
            "starters" | "start" => Ok(Self::Starters),
            lower => match lower.strip_prefix("finish:") {
                Some("") => Err(ValidationError::InvalidSource {
                    value: s.to_string(),
                }),
                Some(cat) => Ok(Self::CategoryFinish(cat.to_uppercase())),
                None => Ok(Self::Intermediate(s.to_string())),
            },
        }
    }
}

impl TryFrom<String> for PlacesSource {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<PlacesSource> for String {
    fn from(value: PlacesSource) -> Self {
        value.to_string()
    }
}

/// Points and bonuses awarded from one places source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contest {
    pub id: String,
    pub source: PlacesSource,
    /// Points tally credited, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tally: Option<String>,
    /// Points by place, first place first.
    #[serde(default)]
    pub points: Vec<i64>,
    /// Time bonuses by place.
    #[serde(default)]
    pub bonuses: Vec<Tod>,
    /// Every listed rider gets the first points and bonus entries.
    #[serde(default)]
    pub all_source: bool,
    /// Countback slot credited to a climb winner.
    #[serde(default)]
    pub category: usize,
}

impl Contest {
    pub fn new(id: impl Into<String>, source: PlacesSource) -> Self {
        Self {
            id: id.into(),
            source,
            tally: None,
            points: Vec::new(),
            bonuses: Vec::new(),
            all_source: false,
            category: 0,
        }
    }

    #[must_use]
    pub fn with_tally(mut self, tally: impl Into<String>) -> Self {
        self.tally = Some(tally.into());
        self
    }

    #[must_use]
    pub fn with_points(mut self, points: impl Into<Vec<i64>>) -> Self {
        self.points = points.into();
        self
    }

    #[must_use]
    pub fn with_bonuses(mut self, bonuses: impl Into<Vec<Tod>>) -> Self {
        self.bonuses = bonuses.into();
        self
    }

    #[must_use]
    pub const fn all_source(mut self) -> Self {
        self.all_source = true;
        self
    }

    /// Sets the countback slot credited to a climb winner.
    #[must_use]
    pub const fn with_category(mut self, slot: usize) -> Self {
        self.category = slot;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_road_timing_practice() {
        let config = TimingConfig::default();
        assert_eq!(config.min_lap, "2:00".parse().unwrap());
        assert_eq!(config.finish_match, "0.200".parse().unwrap());
        assert_eq!(config.gap, "1.12".parse().unwrap());
        assert_eq!(config.nth_wheel, 3);
        assert_eq!(config.places(), 1);
    }

    #[test]
    fn partial_config_loads_with_defaults() {
        let config: TimingConfig =
            serde_json::from_str(r#"{"min_lap": "1:30", "precision": 9}"#).unwrap();
        assert_eq!(config.min_lap, "1:30".parse().unwrap());
        assert_eq!(config.min_elapsed, Tod::from_secs(30));
        assert_eq!(config.places(), 2);
    }

    #[test]
    fn split_window_is_exclusive() {
        let split = SplitSchema {
            label: "10km".into(),
            min_elapsed: Tod::from_secs(600),
            max_elapsed: Tod::from_secs(1200),
            distance: Some(10.0),
        };
        assert!(!split.accepts(Tod::from_secs(600)));
        assert!(split.accepts(Tod::from_secs(601)));
        assert!(!split.accepts(Tod::from_secs(1200)));
    }

    #[test]
    fn places_source_tags() {
        assert_eq!("finish".parse::<PlacesSource>().unwrap(), PlacesSource::Finish);
        assert_eq!(
            "finish:u23".parse::<PlacesSource>().unwrap(),
            PlacesSource::CategoryFinish("U23".into())
        );
        assert_eq!(
            "sprint1".parse::<PlacesSource>().unwrap(),
            PlacesSource::Intermediate("sprint1".into())
        );
        assert!("finish:".parse::<PlacesSource>().is_err());
        assert_eq!(PlacesSource::Starters.to_string(), "starters");
    }

    #[test]
    fn event_kind_parses_aliases() {
        assert_eq!("TTT".parse::<EventKind>().unwrap(), EventKind::Team);
        assert!("road".parse::<EventKind>().is_err());
    }
}
