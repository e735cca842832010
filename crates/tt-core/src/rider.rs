//! Rider records and the ordered rider collection.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::tod::Tod;
use crate::types::{Bib, Comment, SplitPoint, ValidationError};

/// Derived result position of a rider.
///
/// Written only by the recalculation engine; never persisted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Placing {
    /// No result yet.
    #[default]
    Unplaced,
    /// Ranked at the given place, ties share a place.
    Place(u32),
    /// Excluded from ranking with a status code.
    Out(Comment),
}

impl Placing {
    /// True once the rider has a place or a status code.
    pub const fn is_placed(&self) -> bool {
        !matches!(self, Self::Unplaced)
    }

    /// Sorting key: numeric places first, then unplaced, then status codes.
    pub const fn rank_key(&self) -> u32 {
        match self {
            Self::Unplaced => Comment::None.rank_key(),
            Self::Place(place) => *place,
            Self::Out(code) => code.rank_key(),
        }
    }
}

impl fmt::Display for Placing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unplaced => Ok(()),
            Self::Place(place) => write!(f, "{place}"),
            Self::Out(code) => f.write_str(code.as_str()),
        }
    }
}

impl TryFrom<String> for Placing {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        let value = value.trim();
        if value.is_empty() {
            return Ok(Self::Unplaced);
        }
        if let Ok(place) = value.parse::<u32>() {
            return Ok(Self::Place(place));
        }
        value.parse::<Comment>().map(Self::Out)
    }
}

impl From<Placing> for String {
    fn from(value: Placing) -> Self {
        value.to_string()
    }
}

/// Outcome of adding a passing to a rider's seen list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeenInsert {
    /// Inserted at the given index.
    Accepted(usize),
    /// Not more than one minimum lap after the previous passing.
    ShortLap { previous: Tod },
    /// A later recorded passing is not more than one minimum lap away.
    Spurious { next: Tod },
}

fn yes() -> bool {
    true
}

/// One competitor in an event.
///
/// Raw timing fields are set by the classifier and operator commands;
/// derived fields (computed bunch, placing, ETA) are owned by the
/// recalculation engine and skipped on save.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rider {
    bib: Bib,

    #[serde(default)]
    name: String,

    /// Space separated category labels, primary first.
    #[serde(default)]
    category: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    team: String,

    /// Transponder id used for manual passings.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    refid: String,

    #[serde(default = "yes")]
    in_race: bool,

    #[serde(default)]
    comment: Comment,

    /// Lap or finish loop pass count.
    #[serde(default)]
    laps: u32,

    /// Accepted transponder passings, time ordered.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    seen: Vec<Tod>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    wall_start: Option<Tod>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    start: Option<Tod>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    finish: Option<Tod>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    last_seen: Option<Tod>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    penalty: Option<Tod>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    manual_bunch: Option<Tod>,

    #[serde(default)]
    start_offset: Tod,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    splits: BTreeMap<SplitPoint, Tod>,

    #[serde(skip)]
    computed_bunch: Option<Tod>,

    #[serde(skip)]
    placing: Placing,

    #[serde(skip)]
    eta: Option<Tod>,
}

impl Rider {
    pub fn new(bib: Bib) -> Self {
        Self {
            bib,
            name: String::new(),
            category: String::new(),
            team: String::new(),
            refid: String::new(),
            in_race: true,
            comment: Comment::None,
            laps: 0,
            seen: Vec::new(),
            wall_start: None,
            start: None,
            finish: None,
            last_seen: None,
            penalty: None,
            manual_bunch: None,
            start_offset: Tod::ZERO,
            splits: BTreeMap::new(),
            computed_bunch: None,
            placing: Placing::Unplaced,
            eta: None,
        }
    }

    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    #[must_use]
    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into().to_uppercase();
        self
    }

    #[must_use]
    pub fn with_team(mut self, team: impl Into<String>) -> Self {
        self.team = team.into().to_uppercase();
        self
    }

    #[must_use]
    pub fn with_refid(mut self, refid: impl Into<String>) -> Self {
        self.refid = refid.into();
        self
    }

    #[must_use]
    pub const fn with_wall_start(mut self, wall_start: Tod) -> Self {
        self.wall_start = Some(wall_start);
        self
    }

    #[must_use]
    pub const fn with_start_offset(mut self, offset: Tod) -> Self {
        self.start_offset = offset;
        self
    }

    pub const fn bib(&self) -> &Bib {
        &self.bib
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn category(&self) -> &str {
        &self.category
    }

    /// First category label, or `""` when uncategorised.
    pub fn primary_category(&self) -> &str {
        self.category.split_whitespace().next().unwrap_or("")
    }

    /// True if any of the rider's labels matches `cat`, ignoring case.
    pub fn in_category(&self, cat: &str) -> bool {
        !cat.is_empty()
            && self
                .category
                .split_whitespace()
                .any(|label| label.eq_ignore_ascii_case(cat))
    }

    pub fn team(&self) -> &str {
        &self.team
    }

    pub fn refid(&self) -> &str {
        &self.refid
    }

    pub const fn in_race(&self) -> bool {
        self.in_race
    }

    pub const fn comment(&self) -> Comment {
        self.comment
    }

    pub const fn laps(&self) -> u32 {
        self.laps
    }

    pub fn seen(&self) -> &[Tod] {
        &self.seen
    }

    pub const fn wall_start(&self) -> Option<Tod> {
        self.wall_start
    }

    pub const fn start(&self) -> Option<Tod> {
        self.start
    }

    pub const fn finish(&self) -> Option<Tod> {
        self.finish
    }

    pub const fn last_seen(&self) -> Option<Tod> {
        self.last_seen
    }

    pub const fn penalty(&self) -> Option<Tod> {
        self.penalty
    }

    pub const fn manual_bunch(&self) -> Option<Tod> {
        self.manual_bunch
    }

    pub const fn computed_bunch(&self) -> Option<Tod> {
        self.computed_bunch
    }

    pub const fn start_offset(&self) -> Tod {
        self.start_offset
    }

    pub fn split(&self, point: SplitPoint) -> Option<Tod> {
        self.splits.get(&point).copied()
    }

    pub const fn placing(&self) -> Placing {
        self.placing
    }

    pub const fn eta(&self) -> Option<Tod> {
        self.eta
    }

    /// The rider's start: the start trigger if seen, else the wall start.
    pub fn start_reference(&self) -> Option<Tod> {
        self.start.or(self.wall_start)
    }

    /// Ranked elapsed time: truncated course time plus any penalty.
    ///
    /// `None` without a finish or without any start reference.
    pub fn elapsed(&self, precision: u8) -> Option<Tod> {
        let finish = self.finish?;
        let start = self.start_reference()?;
        Some((finish - start).truncate(precision) + self.penalty.unwrap_or(Tod::ZERO))
    }

    /// Time on course at `now` for a rider who has started but not finished.
    pub fn running_time(&self, now: Tod) -> Option<Tod> {
        if self.finish.is_some() {
            return self.elapsed(4);
        }
        self.start_reference().map(|start| now - start)
    }

    /// Manual override if set, otherwise the computed bunch time.
    pub fn bunch(&self) -> Option<Tod> {
        self.manual_bunch.or(self.computed_bunch)
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn set_category(&mut self, category: impl Into<String>) {
        self.category = category.into().to_uppercase();
    }

    pub fn set_team(&mut self, team: impl Into<String>) {
        self.team = team.into().to_uppercase();
    }

    pub fn set_refid(&mut self, refid: impl Into<String>) {
        self.refid = refid.into();
    }

    pub const fn set_in_race(&mut self, in_race: bool) {
        self.in_race = in_race;
    }

    pub const fn set_comment(&mut self, comment: Comment) {
        self.comment = comment;
    }

    pub const fn set_laps(&mut self, laps: u32) {
        self.laps = laps;
    }

    /// Counts one more lap and returns the new total.
    pub const fn add_lap(&mut self) -> u32 {
        self.laps += 1;
        self.laps
    }

    pub const fn set_wall_start(&mut self, wall_start: Option<Tod>) {
        self.wall_start = wall_start;
    }

    /// Replaces the start trigger and finish times together.
    pub const fn set_times(&mut self, start: Option<Tod>, finish: Option<Tod>) {
        self.start = start;
        self.finish = finish;
    }

    pub const fn set_start(&mut self, start: Option<Tod>) {
        self.start = start;
    }

    pub const fn set_finish(&mut self, finish: Option<Tod>) {
        self.finish = finish;
    }

    pub const fn set_last_seen(&mut self, seen: Tod) {
        self.last_seen = Some(seen);
    }

    pub const fn set_penalty(&mut self, penalty: Option<Tod>) {
        self.penalty = penalty;
    }

    pub const fn set_manual_bunch(&mut self, bunch: Option<Tod>) {
        self.manual_bunch = bunch;
    }

    pub const fn set_start_offset(&mut self, offset: Tod) {
        self.start_offset = offset;
    }

    pub fn set_split(&mut self, point: SplitPoint, time: Option<Tod>) {
        match time {
            Some(time) => self.splits.insert(point, time),
            None => self.splits.remove(&point),
        };
    }

    /// Inserts a transponder passing keeping the seen list sorted.
    ///
    /// A passing is only accepted when it is strictly more than `minlap`
    /// after the passing before it and strictly more than `minlap` before
    /// the passing after it, wherever it lands in the list.
    pub fn insert_seen(&mut self, time: Tod, minlap: Tod) -> SeenInsert {
        let pos = self.seen.partition_point(|t| *t <= time);
        if let Some(&previous) = pos.checked_sub(1).and_then(|i| self.seen.get(i)) {
            if time <= previous + minlap {
                return SeenInsert::ShortLap { previous };
            }
        }
        if let Some(&next) = self.seen.get(pos) {
            if next - time <= minlap {
                return SeenInsert::Spurious { next };
            }
        }
        self.seen.insert(pos, time);
        SeenInsert::Accepted(pos)
    }

    /// Clears all timing, leaving identity and start list data.
    pub fn reset_timing(&mut self) {
        self.laps = 0;
        self.seen.clear();
        self.start = None;
        self.finish = None;
        self.last_seen = None;
        self.splits.clear();
        self.clear_derived();
    }

    pub(crate) const fn clear_derived(&mut self) {
        self.computed_bunch = None;
        self.placing = Placing::Unplaced;
        self.eta = None;
    }

    pub(crate) const fn set_computed_bunch(&mut self, bunch: Option<Tod>) {
        self.computed_bunch = bunch;
    }

    pub(crate) const fn set_placing(&mut self, placing: Placing) {
        self.placing = placing;
    }

    pub(crate) const fn set_eta(&mut self, eta: Option<Tod>) {
        self.eta = eta;
    }
}

/// Riders of one event in start list order, indexed by bib.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<Rider>", into = "Vec<Rider>")]
pub struct RiderSet {
    riders: Vec<Rider>,
    index: HashMap<String, usize>,
}

impl RiderSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a rider. Returns false, leaving the set unchanged, if the bib
    /// is already present.
    pub fn add(&mut self, rider: Rider) -> bool {
        let key = rider.bib().as_str().to_string();
        if self.index.contains_key(&key) {
            return false;
        }
        self.index.insert(key, self.riders.len());
        self.riders.push(rider);
        true
    }

    pub fn remove(&mut self, bib: &str) -> Option<Rider> {
        let pos = self.index.remove(bib)?;
        let rider = self.riders.remove(pos);
        self.reindex();
        Some(rider)
    }

    pub fn get(&self, bib: &str) -> Option<&Rider> {
        self.index.get(bib).map(|&i| &self.riders[i])
    }

    pub fn get_mut(&mut self, bib: &str) -> Option<&mut Rider> {
        self.index.get(bib).map(|&i| &mut self.riders[i])
    }

    pub fn contains(&self, bib: &str) -> bool {
        self.index.contains_key(bib)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Rider> {
        self.riders.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Rider> {
        self.riders.iter_mut()
    }

    pub fn len(&self) -> usize {
        self.riders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.riders.is_empty()
    }

    fn reindex(&mut self) {
        self.index = self
            .riders
            .iter()
            .enumerate()
            .map(|(i, r)| (r.bib().as_str().to_string(), i))
            .collect();
    }
}

impl From<Vec<Rider>> for RiderSet {
    fn from(riders: Vec<Rider>) -> Self {
        let mut set = Self::new();
        for rider in riders {
            let bib = rider.bib().clone();
            if !set.add(rider) {
                tracing::warn!(bib = %bib, "duplicate rider dropped from loaded start list");
            }
        }
        set
    }
}

impl From<RiderSet> for Vec<Rider> {
    fn from(set: RiderSet) -> Self {
        set.riders
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(s: &str) -> Tod {
        s.parse().unwrap()
    }

    fn rider(bib: &str) -> Rider {
        Rider::new(Bib::new(bib).unwrap())
    }

    #[test]
    fn placing_display_and_parse() {
        assert_eq!(Placing::Place(3).to_string(), "3");
        assert_eq!(Placing::Out(Comment::Dnf).to_string(), "dnf");
        assert_eq!(Placing::Unplaced.to_string(), "");
        assert_eq!(
            Placing::try_from("otl".to_string()).unwrap(),
            Placing::Out(Comment::Otl)
        );
        assert!(Placing::try_from("late".to_string()).is_err());
    }

    #[test]
    fn placing_rank_keys_sort_codes_after_places() {
        let mut placings = vec![
            Placing::Out(Comment::Dns),
            Placing::Unplaced,
            Placing::Place(2),
            Placing::Out(Comment::Otl),
            Placing::Place(1),
        ];
        placings.sort_by_key(Placing::rank_key);
        assert_eq!(
            placings,
            [
                Placing::Place(1),
                Placing::Place(2),
                Placing::Unplaced,
                Placing::Out(Comment::Otl),
                Placing::Out(Comment::Dns),
            ]
        );
    }

    #[test]
    fn primary_category_is_first_label() {
        let r = rider("1").with_category("u23 elite");
        assert_eq!(r.primary_category(), "U23");
        assert!(r.in_category("elite"));
        assert!(!r.in_category(""));
        assert_eq!(rider("2").primary_category(), "");
    }

    #[test]
    fn elapsed_prefers_start_trigger_and_adds_penalty() {
        let mut r = rider("1").with_wall_start(t("10:00:00"));
        r.set_times(None, Some(t("10:20:00.56")));
        assert_eq!(r.elapsed(1), Some(t("20:00.5")));

        r.set_start(Some(t("10:00:01")));
        r.set_penalty(Some(t("10")));
        assert_eq!(r.elapsed(1), Some(t("20:09.5")));
    }

    #[test]
    fn elapsed_needs_a_start_reference() {
        let mut r = rider("1");
        r.set_finish(Some(t("10:20:00")));
        assert_eq!(r.elapsed(2), None);
    }

    #[test]
    fn seen_insertion_is_order_independent() {
        let minlap = t("2:00");
        let times = [t("10:03:00"), t("10:06:00"), t("10:09:00"), t("10:12:00")];

        let mut ordered = rider("1");
        for time in times {
            ordered.insert_seen(time, minlap);
        }
        let mut shuffled = rider("1");
        for i in [2, 0, 3, 1] {
            shuffled.insert_seen(times[i], minlap);
        }
        assert_eq!(ordered.seen(), shuffled.seen());
        assert_eq!(ordered.seen(), times);
    }

    #[test]
    fn seen_rejects_passings_within_minlap() {
        let minlap = t("2:00");
        let mut r = rider("1");
        assert_eq!(r.insert_seen(t("10:03:00"), minlap), SeenInsert::Accepted(0));
        assert_eq!(
            r.insert_seen(t("10:05:00"), minlap),
            SeenInsert::ShortLap {
                previous: t("10:03:00")
            }
        );
        assert_eq!(
            r.insert_seen(t("10:01:30"), minlap),
            SeenInsert::Spurious {
                next: t("10:03:00")
            }
        );
        assert_eq!(r.insert_seen(t("10:05:00.0001"), minlap), SeenInsert::Accepted(1));
        assert_eq!(r.seen().len(), 2);
    }

    #[test]
    fn rider_set_indexes_by_bib() {
        let mut set = RiderSet::new();
        assert!(set.add(rider("1")));
        assert!(set.add(rider("2")));
        assert!(!set.add(rider("1")));
        assert_eq!(set.len(), 2);

        assert!(set.remove("1").is_some());
        assert!(set.get("1").is_none());
        assert_eq!(set.get("2").map(|r| r.bib().as_str()), Some("2"));
    }

    #[test]
    fn derived_fields_are_not_saved() {
        let mut r = rider("7").with_name("A Rider");
        r.set_placing(Placing::Place(1));
        r.set_computed_bunch(Some(t("10:05")));
        let json = serde_json::to_string(&r).unwrap();
        let parsed: Rider = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.placing(), Placing::Unplaced);
        assert_eq!(parsed.computed_bunch(), None);
        assert_eq!(parsed.name(), "A Rider");
        assert!(parsed.in_race());
    }
}
