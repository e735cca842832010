//! Rider and category lookups provided by the surrounding application.

use serde::{Deserialize, Serialize};

use crate::config::Category;
use crate::tod::Tod;
use crate::types::Bib;

/// A registered rider as known to the meet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiderEntry {
    pub bib: Bib,
    #[serde(default)]
    pub series: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub team: String,
    #[serde(default)]
    pub uci_code: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    /// Transponder id.
    #[serde(default)]
    pub refid: String,
    /// Scheduled start for individual events.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wall_start: Option<Tod>,
}

impl RiderEntry {
    pub fn new(bib: Bib) -> Self {
        Self {
            bib,
            series: String::new(),
            category: String::new(),
            team: String::new(),
            uci_code: String::new(),
            first_name: String::new(),
            last_name: String::new(),
            refid: String::new(),
            wall_start: None,
        }
    }

    /// `"First LAST"`, or whichever part is present.
    pub fn display_name(&self) -> String {
        let last = self.last_name.to_uppercase();
        match (self.first_name.is_empty(), last.is_empty()) {
            (false, false) => format!("{} {last}", self.first_name),
            (false, true) => self.first_name.clone(),
            _ => last,
        }
    }
}

/// A team with its scheduled start offset from the race start.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamEntry {
    pub code: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_offset: Option<Tod>,
}

/// Lookup of registered riders and teams.
pub trait RiderDirectory {
    /// Finds the rider carrying a transponder.
    fn resolve(&self, refid: &str) -> Option<&RiderEntry>;

    /// Finds a rider by number.
    fn rider(&self, bib: &str) -> Option<&RiderEntry>;

    /// Finds a team by code.
    fn team(&self, code: &str) -> Option<&TeamEntry>;
}

/// Lookup of per category limits and overrides.
pub trait CategoryDirectory {
    fn category_info(&self, label: &str) -> Option<&Category>;
}

/// An in-memory directory, loadable from JSON.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryDirectory {
    pub riders: Vec<RiderEntry>,
    pub teams: Vec<TeamEntry>,
    pub categories: Vec<Category>,
}

impl MemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_rider(mut self, rider: RiderEntry) -> Self {
        self.riders.push(rider);
        self
    }

    #[must_use]
    pub fn with_team(mut self, team: TeamEntry) -> Self {
        self.teams.push(team);
        self
    }

    #[must_use]
    pub fn with_category(mut self, category: Category) -> Self {
        self.categories.push(category);
        self
    }
}

impl RiderDirectory for MemoryDirectory {
    fn resolve(&self, refid: &str) -> Option<&RiderEntry> {
        if refid.is_empty() {
            return None;
        }
        self.riders.iter().find(|r| r.refid == refid)
    }

    fn rider(&self, bib: &str) -> Option<&RiderEntry> {
        self.riders.iter().find(|r| r.bib.as_str() == bib)
    }

    fn team(&self, code: &str) -> Option<&TeamEntry> {
        self.teams.iter().find(|t| t.code.eq_ignore_ascii_case(code))
    }
}

impl CategoryDirectory for MemoryDirectory {
    fn category_info(&self, label: &str) -> Option<&Category> {
        self.categories
            .iter()
            .find(|c| c.label.eq_ignore_ascii_case(label))
    }
}
