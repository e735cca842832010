//! The event aggregate: everything persisted about one time trial, the
//! operator commands that edit it, and the gate that coalesces concurrent
//! recalculation requests.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError, TryLockError};

use serde::{Deserialize, Serialize};

use crate::announce::AnnounceSink;
use crate::classifier::{self, Outcome};
use crate::config::{Contest, EventKind, Intermediate, PlacesSource, TimingConfig};
use crate::contest::{PLACEHOLDER, Tally, normalise_places, place_groups};
use crate::directory::{CategoryDirectory, RiderDirectory};
use crate::passing::{Passing, PassingStore};
use crate::recalc::scoring_for;
use crate::rider::{Placing, Rider, RiderSet};
use crate::tod::Tod;
use crate::types::{Bib, Comment, ValidationError};

/// How far ahead of their wall start a rider is loaded into the start lane.
const START_PRELOAD: Tod = Tod::from_secs(30);

/// Collaborators consulted while classifying and recalculating.
#[derive(Clone, Copy)]
pub struct Context<'a> {
    pub riders: &'a dyn RiderDirectory,
    pub categories: &'a dyn CategoryDirectory,
    pub sink: &'a dyn AnnounceSink,
}

impl<'a> Context<'a> {
    pub fn new(
        riders: &'a dyn RiderDirectory,
        categories: &'a dyn CategoryDirectory,
        sink: &'a dyn AnnounceSink,
    ) -> Self {
        Self {
            riders,
            categories,
            sink,
        }
    }

    /// A context whose riders and categories come from one directory.
    pub fn from_directory<D>(directory: &'a D, sink: &'a dyn AnnounceSink) -> Self
    where
        D: RiderDirectory + CategoryDirectory,
    {
        Self::new(directory, directory, sink)
    }
}

/// Overall state of the results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RaceStatus {
    /// Nobody placed yet.
    Prerace,
    /// Some riders placed, standings only.
    Virtual,
    /// Everyone placed, event not yet flagged finished.
    Provisional,
    Final,
}

impl RaceStatus {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Prerace => "prerace",
            Self::Virtual => "virtual",
            Self::Provisional => "provisional",
            Self::Final => "final",
        }
    }
}

impl fmt::Display for RaceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Race timer state.
///
/// Individual events use idle, armstart, running and finished. Team events
/// also pass through armfinish, where every passing is a finishing passing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimerState {
    #[default]
    Idle,
    ArmStart,
    Running,
    ArmFinish,
    Finished,
}

impl TimerState {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::ArmStart => "armstart",
            Self::Running => "running",
            Self::ArmFinish => "armfinish",
            Self::Finished => "finished",
        }
    }
}

impl fmt::Display for TimerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One rider's line in the results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Standing {
    pub placing: Placing,
    pub bib: Bib,
    pub name: String,
    pub category: String,
    pub team: String,
    /// Ranked time: elapsed for individual, bunch time for team events.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time: Option<Tod>,
    /// Gap to the category winner.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub down: Option<Tod>,
    pub laps: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub eta: Option<Tod>,
}

/// One team's line in team event results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TeamStanding {
    pub placing: Placing,
    pub team: String,
    pub category: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time: Option<Tod>,
    /// In-race finishers in arrival order.
    pub finishers: Vec<String>,
}

/// Output of one recalculation pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Results {
    pub status: RaceStatus,
    pub places: String,
    pub standings: Vec<Standing>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub teams: Vec<TeamStanding>,
    pub tally: Tally,
}

/// Persisted state of one event.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EventState {
    pub config: TimingConfig,
    /// Rider series code; passings from other series are ignored.
    pub series: String,
    /// Categories run in this event, in result order.
    pub categories: Vec<String>,
    pub intermediates: BTreeMap<String, Intermediate>,
    pub contests: Vec<Contest>,
    /// Points tallies credited by contests.
    pub tallies: Vec<String>,

    pub(crate) kind: EventKind,
    pub(crate) places: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) start: Option<Tod>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) local_start: Option<Tod>,
    pub(crate) timer: TimerState,
    pub(crate) riders: RiderSet,
    pub(crate) start_passings: PassingStore,
    pub(crate) finish_passings: PassingStore,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) start_lane: Option<Bib>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) finish_lane: Option<Bib>,
    /// Teams whose time has been announced.
    #[serde(skip_serializing_if = "BTreeSet::is_empty")]
    pub(crate) announced_teams: BTreeSet<String>,
}

impl EventState {
    pub fn new(kind: EventKind) -> Self {
        Self {
            kind,
            ..Self::default()
        }
    }

    pub const fn kind(&self) -> EventKind {
        self.kind
    }

    pub const fn riders(&self) -> &RiderSet {
        &self.riders
    }

    pub fn rider(&self, bib: &str) -> Option<&Rider> {
        self.riders.get(bib)
    }

    /// Finish places: computed for individual events, entered for team events.
    pub fn places(&self) -> &str {
        &self.places
    }

    pub const fn start(&self) -> Option<Tod> {
        self.start
    }

    pub const fn local_start(&self) -> Option<Tod> {
        self.local_start
    }

    pub const fn timer(&self) -> TimerState {
        self.timer
    }

    pub fn is_finished(&self) -> bool {
        self.timer == TimerState::Finished
    }

    pub const fn start_passings(&self) -> &PassingStore {
        &self.start_passings
    }

    pub const fn finish_passings(&self) -> &PassingStore {
        &self.finish_passings
    }

    pub const fn start_lane(&self) -> Option<&Bib> {
        self.start_lane.as_ref()
    }

    pub const fn finish_lane(&self) -> Option<&Bib> {
        self.finish_lane.as_ref()
    }

    /// Result category of a label: the label itself if this event runs it,
    /// otherwise the uncategorised `""`.
    pub fn resolve_category(&self, label: &str) -> String {
        self.categories
            .iter()
            .find(|c| c.eq_ignore_ascii_case(label))
            .map(|c| c.to_uppercase())
            .unwrap_or_default()
    }

    /// Result category of a rider, from their primary label.
    pub fn rider_category(&self, rider: &Rider) -> String {
        self.resolve_category(rider.primary_category())
    }

    /// Configured categories in result order, uncategorised last.
    pub fn category_order(&self) -> Vec<String> {
        let mut order: Vec<String> = Vec::with_capacity(self.categories.len() + 1);
        for cat in &self.categories {
            let cat = cat.to_uppercase();
            if !cat.is_empty() && !order.contains(&cat) {
                order.push(cat);
            }
        }
        order.push(String::new());
        order
    }

    /// The places string a contest source refers to, if configured.
    pub fn places_for(&self, source: &PlacesSource) -> Option<String> {
        match source {
            PlacesSource::Finish => Some(self.places.clone()),
            PlacesSource::CategoryFinish(cat) => Some(self.category_places(cat)),
            PlacesSource::Registered => Some(self.startlist()),
            PlacesSource::Starters => Some(self.starters()),
            PlacesSource::Intermediate(id) => self.intermediates.get(id).map(|i| i.places.clone()),
        }
    }

    /// Finish places rebuilt from ranked riders, by category, ties hyphenated.
    pub fn placelist(&self) -> String {
        let mut groups: Vec<String> = Vec::new();
        for cat in self.category_order() {
            let mut placed: Vec<(u32, &Rider)> = self
                .riders
                .iter()
                .filter(|r| self.rider_category(r) == cat)
                .filter_map(|r| match r.placing() {
                    Placing::Place(place) => Some((place, r)),
                    _ => None,
                })
                .collect();
            placed.sort_by_key(|(place, _)| *place);
            let mut last = None;
            for (place, rider) in placed {
                match groups.last_mut() {
                    Some(group) if last == Some(place) => {
                        group.push('-');
                        group.push_str(rider.bib().as_str());
                    }
                    _ => groups.push(rider.bib().as_str().to_string()),
                }
                last = Some(place);
            }
        }
        groups.join(" ")
    }

    /// Riders who started, in start order.
    pub fn starters(&self) -> String {
        self.start_order()
            .into_iter()
            .filter(|r| r.comment() != Comment::Dns)
            .map(|r| r.bib().as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Every rider in start order.
    pub fn startlist(&self) -> String {
        self.start_order()
            .into_iter()
            .map(|r| r.bib().as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn start_order(&self) -> Vec<&Rider> {
        let mut riders: Vec<&Rider> = self.riders.iter().collect();
        riders.sort_by_key(|r| r.wall_start().unwrap_or(Tod::MAX) + r.start_offset());
        riders
    }

    /// Finish places limited to riders of one category.
    pub fn category_places(&self, category: &str) -> String {
        place_groups(&self.places)
            .filter_map(|group| {
                let kept: Vec<&str> = group
                    .into_iter()
                    .filter(|bib| self.riders.get(bib).is_some_and(|r| r.in_category(category)))
                    .collect();
                (!kept.is_empty()).then(|| kept.join("-"))
            })
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Short status of a team rider: place or code, laps, then bunch time or
    /// bracketed running time at their last passing.
    pub fn bunch_string(&self, bib: &str) -> Option<String> {
        let rider = self.riders.get(bib)?;
        let mut parts = Vec::new();
        match rider.placing() {
            Placing::Place(place) => parts.push(format!("{place}.")),
            Placing::Out(code) => parts.push(code.as_str().to_string()),
            Placing::Unplaced => {}
        }
        if rider.laps() > 0 {
            parts.push(format!("lap {}", rider.laps()));
        }
        let precision = self.config.places();
        if let Some(bunch) = rider.bunch() {
            parts.push(bunch.rawtime(precision));
        } else if let (Some(start), Some(&seen)) = (self.start, rider.seen().last()) {
            let running = seen - start - rider.start_offset();
            parts.push(format!("[{}]", running.rawtime(0)));
        }
        Some(parts.join(" "))
    }

    /// Race clock time corresponding to a local wall clock reading.
    pub fn race_clock(&self, now: Tod) -> Option<Tod> {
        let start = self.start?;
        Some(start + (now - self.local_start.unwrap_or(start)))
    }

    /// Time since the race start.
    pub fn elapsed(&self, now: Tod) -> Option<Tod> {
        Some(self.race_clock(now)? - self.start?)
    }

    /// Waits for the next start impulse to synchronise the race start.
    pub fn arm_start(&mut self) -> bool {
        if self.timer != TimerState::Idle {
            tracing::info!(timer = %self.timer, "arm start ignored");
            return false;
        }
        self.timer = TimerState::ArmStart;
        tracing::info!("armed for start");
        true
    }

    /// Team events: treat every following passing as a finishing passing.
    pub fn arm_finish(&mut self) -> bool {
        if self.kind != EventKind::Team || self.timer != TimerState::Running {
            tracing::info!(timer = %self.timer, "arm finish ignored");
            return false;
        }
        self.timer = TimerState::ArmFinish;
        tracing::info!("armed for finish");
        true
    }

    /// Loads a rider into the start lane for the next start impulse.
    pub fn arm_start_lane(&mut self, bib: &str) -> Result<(), ValidationError> {
        let rider = self.lane_rider(bib)?;
        tracing::info!(bib = %rider, "start lane armed");
        self.start_lane = Some(rider);
        Ok(())
    }

    /// Loads a rider into the finish lane for the next finish impulse.
    pub fn arm_finish_lane(&mut self, bib: &str) -> Result<(), ValidationError> {
        let rider = self.lane_rider(bib)?;
        tracing::info!(bib = %rider, "finish lane armed");
        self.finish_lane = Some(rider);
        Ok(())
    }

    fn lane_rider(&self, bib: &str) -> Result<Bib, ValidationError> {
        self.riders
            .get(bib)
            .map(|r| r.bib().clone())
            .ok_or_else(|| ValidationError::UnknownRider {
                bib: bib.to_string(),
            })
    }

    /// Sets the race start and runs the timer.
    pub fn set_start(&mut self, start: Tod) {
        self.start = Some(start);
        self.local_start = Some(start);
        self.timer = TimerState::Running;
        self.start_lane = None;
        self.finish_lane = None;
        tracing::info!(start = %start.rawtime(4), "race start");
    }

    /// Flags the results final.
    pub fn set_finished(&mut self) {
        self.timer = TimerState::Finished;
        self.start_lane = None;
        self.finish_lane = None;
        tracing::info!("event finished");
    }

    /// Clears all timing, keeping the start list and configuration.
    pub fn reset(&mut self) {
        self.timer = TimerState::Idle;
        self.start = None;
        self.local_start = None;
        self.start_lane = None;
        self.finish_lane = None;
        self.start_passings.clear();
        self.finish_passings.clear();
        self.places.clear();
        self.announced_teams.clear();
        for rider in self.riders.iter_mut() {
            rider.reset_timing();
        }
        tracing::info!("event reset");
    }

    /// Adds a rider. Returns false if the number is already entered.
    pub fn add_rider(&mut self, rider: Rider) -> bool {
        let bib = rider.bib().clone();
        let added = self.riders.add(rider);
        if added {
            tracing::debug!(bib = %bib, "rider added");
        } else {
            tracing::warn!(bib = %bib, "rider already entered");
        }
        added
    }

    /// Enters a registered rider, taking the team start offset from the
    /// directory when one is set.
    pub fn add_rider_from_directory(
        &mut self,
        ctx: &Context<'_>,
        bib: &str,
    ) -> Result<bool, ValidationError> {
        let entry = ctx
            .riders
            .rider(bib)
            .ok_or_else(|| ValidationError::UnknownRider {
                bib: bib.to_string(),
            })?;
        let mut rider = Rider::new(entry.bib.clone())
            .with_name(entry.display_name())
            .with_category(entry.category.as_str())
            .with_team(entry.team.as_str())
            .with_refid(entry.refid.as_str());
        if let Some(wall_start) = entry.wall_start {
            rider = rider.with_wall_start(wall_start);
        }
        if let Some(offset) = ctx.riders.team(&entry.team).and_then(|t| t.start_offset) {
            rider = rider.with_start_offset(offset);
        }
        Ok(self.add_rider(rider))
    }

    pub fn del_rider(&mut self, bib: &str) -> Option<Rider> {
        if self.start_lane.as_ref().is_some_and(|b| b.as_str() == bib) {
            self.start_lane = None;
        }
        if self.finish_lane.as_ref().is_some_and(|b| b.as_str() == bib) {
            self.finish_lane = None;
        }
        let removed = self.riders.remove(bib);
        if removed.is_some() {
            tracing::info!(bib, "rider removed");
        }
        removed
    }

    /// Sets a status code on each listed rider. In team events an out code
    /// also takes the rider out of the race. Returns the riders changed.
    pub fn dnf_riders<'b>(
        &mut self,
        bibs: impl IntoIterator<Item = &'b str>,
        code: Comment,
    ) -> usize {
        let team = self.kind == EventKind::Team;
        let mut changed = 0;
        for bib in bibs {
            let Some(rider) = self.riders.get_mut(bib) else {
                tracing::warn!(bib, "unknown rider");
                continue;
            };
            rider.set_comment(code);
            if team && code.is_out() {
                rider.set_in_race(false);
            }
            tracing::info!(bib, code = %code, "rider status");
            changed += 1;
        }
        changed
    }

    /// Clears the status code and returns each listed rider to the race.
    pub fn return_riders<'b>(&mut self, bibs: impl IntoIterator<Item = &'b str>) -> usize {
        let mut changed = 0;
        for bib in bibs {
            let Some(rider) = self.riders.get_mut(bib) else {
                tracing::warn!(bib, "unknown rider");
                continue;
            };
            rider.set_comment(Comment::None);
            rider.set_in_race(true);
            tracing::info!(bib, "rider returned to race");
            changed += 1;
        }
        changed
    }

    /// Injects a passing for each listed rider as if seen on the finish loop.
    pub fn manual_passing<'b>(
        &mut self,
        ctx: &Context<'_>,
        bibs: impl IntoIterator<Item = &'b str>,
        time: Tod,
    ) -> Vec<Outcome> {
        let chan = self
            .config
            .finish_loop
            .map_or_else(|| "C1".to_string(), |c| format!("C{c}"));
        let mut outcomes = Vec::new();
        for bib in bibs {
            let Some(rider) = self.riders.get(bib) else {
                tracing::warn!(bib, "manual passing for unknown rider");
                continue;
            };
            let bib = rider.bib().clone();
            let refid = if rider.refid().is_empty() {
                bib.as_str()
            } else {
                rider.refid()
            };
            let passing = Passing::tagged(time, chan.as_str(), refid).with_source("manual");
            outcomes.push(classifier::classify_rider(self, ctx, &bib, &passing));
        }
        outcomes
    }

    /// Validates and stores a places string against the finish or an
    /// intermediate.
    ///
    /// Numbers must be unique and entered in the event. Finish places may not
    /// name riders out of the race; intermediates may.
    pub fn set_places(
        &mut self,
        source: &PlacesSource,
        places: &str,
    ) -> Result<(), ValidationError> {
        let places = normalise_places(places);
        let mut seen = HashSet::new();
        for bib in place_groups(&places).flatten() {
            if bib == PLACEHOLDER {
                continue;
            }
            if !seen.insert(bib) {
                return Err(ValidationError::DuplicatePlace {
                    bib: bib.to_string(),
                });
            }
            let rider = self
                .riders
                .get(bib)
                .ok_or_else(|| ValidationError::UnknownRider {
                    bib: bib.to_string(),
                })?;
            let out = !rider.in_race() || rider.comment().is_out();
            if source.is_finish() && out {
                return Err(ValidationError::RiderOut {
                    bib: bib.to_string(),
                });
            }
        }

        match source {
            PlacesSource::Finish => self.places = places,
            PlacesSource::Intermediate(id) => {
                self.intermediates
                    .entry(id.clone())
                    .or_insert_with(|| Intermediate {
                        label: id.clone(),
                        places: String::new(),
                    })
                    .places = places;
            }
            other => {
                return Err(ValidationError::InvalidSource {
                    value: other.to_string(),
                });
            }
        }
        tracing::info!(source = %source, "places updated");
        Ok(())
    }

    /// Manual time edit.
    pub fn set_times(
        &mut self,
        bib: &str,
        start: Option<Tod>,
        finish: Option<Tod>,
        penalty: Option<Tod>,
    ) -> Result<(), ValidationError> {
        let rider = self.rider_mut(bib)?;
        rider.set_times(start, finish);
        rider.set_penalty(penalty);
        tracing::info!(bib, "times edited");
        Ok(())
    }

    /// Sets or clears a manual bunch time override.
    pub fn set_manual_bunch(
        &mut self,
        bib: &str,
        bunch: Option<Tod>,
    ) -> Result<(), ValidationError> {
        self.rider_mut(bib)?.set_manual_bunch(bunch);
        Ok(())
    }

    fn rider_mut(&mut self, bib: &str) -> Result<&mut Rider, ValidationError> {
        self.riders
            .get_mut(bib)
            .ok_or_else(|| ValidationError::UnknownRider {
                bib: bib.to_string(),
            })
    }

    /// Periodic housekeeping. For individual events not in impulse mode,
    /// loads the next rider due at the start into the start lane and unloads
    /// a rider whose start has passed. Returns a newly loaded rider.
    pub fn tick(&mut self, now: Tod) -> Option<Bib> {
        if self.kind != EventKind::Individual
            || self.timer != TimerState::Running
            || self.config.sloppy_impulse
        {
            return None;
        }
        let clock = self.race_clock(now)?;
        let tolerance = self.config.wall_tolerance;

        if let Some(bib) = &self.start_lane {
            let stale = self.riders.get(bib.as_str()).is_none_or(|r| {
                r.start().is_some() || r.wall_start().is_none_or(|w| w + tolerance < clock)
            });
            if !stale {
                return None;
            }
            tracing::info!(bib = %bib, "start lane unloaded");
            self.start_lane = None;
        }

        let next = self
            .riders
            .iter()
            .filter(|r| r.start().is_none() && !r.comment().is_out())
            .filter_map(|r| r.wall_start().map(|w| (w, r.bib())))
            .filter(|(w, _)| *w + tolerance >= clock && *w - clock <= START_PRELOAD)
            .min_by_key(|(w, _)| *w)
            .map(|(_, bib)| bib.clone())?;
        tracing::info!(bib = %next, "load starter");
        self.start_lane = Some(next.clone());
        Some(next)
    }

    /// Classifies and applies one passing.
    pub fn ingest(&mut self, ctx: &Context<'_>, passing: &Passing) -> Outcome {
        classifier::classify(self, ctx, passing)
    }

    /// Rebuilds all derived results.
    pub fn recalculate(&mut self, ctx: &Context<'_>) -> Results {
        scoring_for(self.kind).recalculate(self, ctx)
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// An event shared between the passing feed and a periodic tick.
///
/// Passings are applied immediately. Recalculation is coalesced: a request
/// arriving while a pass is running marks the event dirty and returns, and the
/// next tick runs the pending pass.
#[derive(Debug, Default)]
pub struct SharedEvent {
    state: Mutex<EventState>,
    recalc: Mutex<()>,
    dirty: AtomicBool,
    results: Mutex<Option<Results>>,
}

impl SharedEvent {
    pub fn new(state: EventState) -> Self {
        Self {
            state: Mutex::new(state),
            ..Self::default()
        }
    }

    /// Applies a passing and requests a recalculation if results may change.
    pub fn ingest(&self, ctx: &Context<'_>, passing: &Passing) -> Outcome {
        let outcome = lock(&self.state).ingest(ctx, passing);
        if outcome.changes_results() {
            self.request_recalc(ctx);
        }
        outcome
    }

    /// Runs a recalculation unless one is already in flight, in which case
    /// the request is recorded and false returned.
    pub fn request_recalc(&self, ctx: &Context<'_>) -> bool {
        let _guard = match self.recalc.try_lock() {
            Ok(guard) => guard,
            Err(TryLockError::Poisoned(err)) => err.into_inner(),
            Err(TryLockError::WouldBlock) => {
                self.dirty.store(true, Ordering::SeqCst);
                tracing::debug!("recalculation in progress, request coalesced");
                return false;
            }
        };
        self.dirty.store(false, Ordering::SeqCst);
        let results = lock(&self.state).recalculate(ctx);
        *lock(&self.results) = Some(results);
        true
    }

    /// Periodic tick: start lane housekeeping, then any pending recalculation.
    pub fn tick(&self, ctx: &Context<'_>, now: Tod) {
        lock(&self.state).tick(now);
        if self.is_dirty() {
            self.request_recalc(ctx);
        }
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::SeqCst)
    }

    /// Results of the latest completed recalculation.
    pub fn results(&self) -> Option<Results> {
        lock(&self.results).clone()
    }

    /// Runs a closure with the locked state.
    pub fn with_state<R>(&self, f: impl FnOnce(&mut EventState) -> R) -> R {
        f(&mut *lock(&self.state))
    }

    pub fn into_inner(self) -> EventState {
        self.state
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner)
    }
}
