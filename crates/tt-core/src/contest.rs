//! Points and bonus assignment from places strings.
//!
//! A places string lists numbers in finish order, space separated, with
//! tied numbers joined by hyphens: `"12 34-35 8"`. Each group is one place,
//! so every member of a tie receives that place's award.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashSet};
use std::fmt;

use serde::Serialize;

use crate::config::Contest;
use crate::rider::RiderSet;
use crate::tod::Tod;
use crate::types::Bib;

/// Tally whose countback credits only the contest's category slot.
const CLIMB_TALLY: &str = "climb";

/// Placeholder for an unknown rider in operator entered places.
pub const PLACEHOLDER: &str = "x";

/// Splits a places string into its groups of tied numbers.
pub fn place_groups(places: &str) -> impl Iterator<Item = Vec<&str>> {
    places
        .split_whitespace()
        .map(|group| group.split('-').filter(|b| !b.is_empty()).collect::<Vec<_>>())
        .filter(|group| !group.is_empty())
}

/// Rebuilds a places string with single spaces and no empty ties.
pub fn normalise_places(places: &str) -> String {
    place_groups(places)
        .map(|group| group.join("-"))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Counts of placings used to split equal point totals.
///
/// Slot 0 counts stage wins; other slots count intermediate places or climb
/// category wins. Comparison favours the higher count in the first slot that
/// differs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Countback(Vec<u32>);

impl Countback {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds one placing in `slot`.
    pub fn credit(&mut self, slot: usize) {
        if self.0.len() <= slot {
            self.0.resize(slot + 1, 0);
        }
        self.0[slot] += 1;
    }

    pub fn get(&self, slot: usize) -> u32 {
        self.0.get(slot).copied().unwrap_or(0)
    }
}

impl Ord for Countback {
    fn cmp(&self, other: &Self) -> Ordering {
        let len = self.0.len().max(other.0.len());
        (0..len)
            .map(|slot| self.get(slot).cmp(&other.get(slot)))
            .find(|o| o.is_ne())
            .unwrap_or(Ordering::Equal)
    }
}

impl PartialOrd for Countback {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Countback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let counts: Vec<String> = self.0.iter().map(u32::to_string).collect();
        f.write_str(&counts.join("/"))
    }
}

/// One line of a points tally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TallyStanding {
    pub bib: Bib,
    pub points: i64,
    pub countback: Countback,
}

/// Points per tally and time bonuses per rider, rebuilt on every recalculation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Tally {
    pub points: BTreeMap<String, BTreeMap<Bib, i64>>,
    pub countbacks: BTreeMap<String, BTreeMap<Bib, Countback>>,
    pub bonuses: BTreeMap<Bib, Tod>,
}

impl Tally {
    /// An empty tally accepting points for the named tallies.
    pub fn new<S: AsRef<str>>(tallies: &[S]) -> Self {
        let mut tally = Self::default();
        for name in tallies {
            tally.points.insert(name.as_ref().to_string(), BTreeMap::new());
            tally
                .countbacks
                .insert(name.as_ref().to_string(), BTreeMap::new());
        }
        tally
    }

    pub fn bonus(&self, bib: &Bib) -> Option<Tod> {
        self.bonuses.get(bib).copied()
    }

    pub fn points(&self, tally: &str, bib: &Bib) -> Option<i64> {
        self.points.get(tally).and_then(|p| p.get(bib)).copied()
    }

    /// Riders in one tally, most points first, then best countback.
    pub fn standings(&self, tally: &str) -> Vec<TallyStanding> {
        let Some(points) = self.points.get(tally) else {
            return Vec::new();
        };
        let countbacks = self.countbacks.get(tally);
        let mut lines: Vec<TallyStanding> = points
            .iter()
            .map(|(bib, &points)| TallyStanding {
                bib: bib.clone(),
                points,
                countback: countbacks
                    .and_then(|c| c.get(bib))
                    .cloned()
                    .unwrap_or_default(),
            })
            .collect();
        lines.sort_by(|a, b| {
            b.points
                .cmp(&a.points)
                .then_with(|| b.countback.cmp(&a.countback))
                .then_with(|| a.bib.cmp(&b.bib))
        });
        lines
    }

    fn add_bonus(&mut self, bib: &Bib, bonus: Tod) {
        *self.bonuses.entry(bib.clone()).or_insert(Tod::ZERO) += bonus;
    }

    fn add_points(&mut self, tally: &str, bib: &Bib, points: i64) {
        if let Some(table) = self.points.get_mut(tally) {
            *table.entry(bib.clone()).or_insert(0) += points;
        }
    }

    fn countback(&mut self, tally: &str, bib: &Bib) -> Option<&mut Countback> {
        self.countbacks
            .get_mut(tally)
            .map(|table| table.entry(bib.clone()).or_default())
    }

    /// Credits one contest from its resolved places string.
    ///
    /// Bad entries are logged and skipped; the rest of the list still counts.
    pub fn assign(&mut self, contest: &Contest, places: &str, riders: &RiderSet) {
        let tally = contest
            .tally
            .as_deref()
            .filter(|name| !name.is_empty());
        if let Some(name) = tally {
            if !self.points.contains_key(name) {
                tracing::warn!(
                    contest = %contest.id,
                    tally = name,
                    "contest credits unknown tally"
                );
            }
        }
        let tally = tally.filter(|name| self.points.contains_key(*name));

        let mut seen = HashSet::new();
        for (group, bibs) in place_groups(places).enumerate() {
            let place = group + 1;
            for bib in bibs {
                if bib == PLACEHOLDER {
                    continue;
                }
                if !seen.insert(bib) {
                    tracing::warn!(contest = %contest.id, bib, "duplicate rider in contest places");
                    continue;
                }
                let Some(rider) = riders.get(bib) else {
                    tracing::error!(
                        contest = %contest.id,
                        bib,
                        "unknown rider ignored in contest places"
                    );
                    continue;
                };
                let bib = rider.bib();
                if contest.all_source {
                    self.award_flat(contest, tally, bib);
                } else {
                    self.award_place(contest, tally, bib, place);
                }
            }
        }
    }

    fn award_flat(&mut self, contest: &Contest, tally: Option<&str>, bib: &Bib) {
        if let Some(&bonus) = contest.bonuses.first() {
            if bonus != Tod::ZERO {
                self.add_bonus(bib, bonus);
            }
        }
        if let (Some(tally), Some(&points)) = (tally, contest.points.first()) {
            if points != 0 {
                self.add_points(tally, bib, points);
                self.countback(tally, bib);
            }
        }
    }

    fn award_place(&mut self, contest: &Contest, tally: Option<&str>, bib: &Bib, place: usize) {
        if let Some(&bonus) = contest.bonuses.get(place - 1) {
            self.add_bonus(bib, bonus);
        }
        let Some(tally) = tally else {
            return;
        };
        if let Some(&points) = contest.points.get(place - 1) {
            self.add_points(tally, bib, points);
        }
        let slot = if contest.source.is_finish() {
            (place == 1).then_some(0)
        } else if tally == CLIMB_TALLY {
            (place == 1).then_some(contest.category)
        } else {
            Some(place)
        };
        if let Some(countback) = self.countback(tally, bib) {
            if let Some(slot) = slot {
                countback.credit(slot);
            }
        }
    }
}
