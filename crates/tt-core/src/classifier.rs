//! The passing classifier.
//!
//! Decides what one timing signal means for the event and applies at most one
//! change to at most one rider. Nothing here fails: rejected passings are
//! logged with their reason and reported back as [`Outcome::Ignored`], since
//! spurious reads are normal on an RF timing line.

use std::fmt;

use crate::announce::Announcement;
use crate::config::EventKind;
use crate::event::{Context, EventState, TimerState};
use crate::passing::Passing;
use crate::rider::{Placing, SeenInsert};
use crate::tod::Tod;
use crate::types::{Bib, Comment, SplitPoint};

/// Intermediate passings this soon after the start are ignored.
const START_FUDGE: Tod = Tod::from_secs(30);

/// Which line an impulse was recorded against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Line {
    Start,
    Finish,
}

/// Why a passing was not applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    /// Untagged trigger on a channel that is neither start nor finish.
    SpuriousTrigger,
    /// Transponder not in the rider directory.
    UnknownRider,
    /// Rider registered to another series.
    NonSeries,
    /// Rider known to the meet but not entered in this event.
    NonStarter,
    /// Timer not running.
    NotRunning,
    AlreadyStarted,
    AlreadyFinished,
    /// Start loop passing too far from the rider's wall start.
    StartWindow,
    /// Rider has neither a start trigger nor a wall start.
    NoStartTime,
    /// Passing before the first allowed lap time.
    EarlyPassing,
    /// Finish passing before the minimum elapsed time.
    EarlyFinish,
    /// Not more than one minimum lap after the previous passing.
    ShortLap,
    /// A recorded later passing is not more than one minimum lap away.
    Spurious,
    /// No impulse found in the match window.
    NoMatch,
    /// Intermediate passing from a channel without splits.
    UnconfiguredLoop,
    /// No free split accepts the passing's elapsed time.
    NoSplit,
    /// Intermediate passing from a rider not yet on course.
    NotOnCourse,
    /// Finish lane already armed for another rider.
    FinishBlocked,
}

impl Rejection {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::SpuriousTrigger => "spurious trigger",
            Self::UnknownRider => "unknown rider",
            Self::NonSeries => "non-series rider",
            Self::NonStarter => "non-starter",
            Self::NotRunning => "timer not running",
            Self::AlreadyStarted => "started rider on start loop",
            Self::AlreadyFinished => "finished rider",
            Self::StartWindow => "start outside wall start tolerance",
            Self::NoStartTime => "no start time",
            Self::EarlyPassing => "early passing",
            Self::EarlyFinish => "early arrival at finish",
            Self::ShortLap => "short lap",
            Self::Spurious => "spurious passing",
            Self::NoMatch => "no impulse match",
            Self::UnconfiguredLoop => "unconfigured intermediate loop",
            Self::NoSplit => "no matching split",
            Self::NotOnCourse => "rider not on course",
            Self::FinishBlocked => "finish blocked",
        }
    }
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a passing did to the event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Ignored(Rejection),
    /// Event start synchronised from an armed timer.
    Synced(Tod),
    /// Untagged impulse recorded, no rider affected.
    Impulse(Line),
    Started { bib: Bib, time: Tod },
    Finished { bib: Bib, time: Tod },
    /// Finish lane armed for a rider approaching the line.
    FinishArmed { bib: Bib },
    /// Lap counted.
    Lap { bib: Bib, laps: u32 },
    /// Passing recorded without counting a lap.
    Seen { bib: Bib },
    /// Intermediate split recorded with the rider's rank there.
    Split { bib: Bib, point: SplitPoint, rank: usize },
}

impl Outcome {
    /// True when derived results may have changed.
    pub const fn changes_results(&self) -> bool {
        !matches!(
            self,
            Self::Ignored(_) | Self::Impulse(_) | Self::FinishArmed { .. }
        )
    }
}

/// Classifies and applies one passing.
pub fn classify(state: &mut EventState, ctx: &Context<'_>, passing: &Passing) -> Outcome {
    match state.kind() {
        EventKind::Individual => individual(state, ctx, passing),
        EventKind::Team => team(state, ctx, passing),
    }
}

/// Applies a tagged passing to a known rider, skipping transponder lookup.
pub(crate) fn classify_rider(
    state: &mut EventState,
    ctx: &Context<'_>,
    bib: &Bib,
    passing: &Passing,
) -> Outcome {
    match state.kind() {
        EventKind::Individual => individual_rider(state, ctx, bib, passing),
        EventKind::Team => team_rider(state, ctx, bib, passing),
    }
}

fn on(chan: Option<u32>, line: Option<u32>) -> bool {
    chan.is_some() && chan == line
}

fn ignore(bib: &str, passing: &Passing, why: Rejection) -> Outcome {
    tracing::info!(bib, passing = %passing.describe(), "ignored: {why}");
    Outcome::Ignored(why)
}

/// Resolves a transponder to an entered rider's number.
fn entrant(state: &EventState, ctx: &Context<'_>, passing: &Passing) -> Result<Bib, Outcome> {
    let Some(entry) = ctx.riders.resolve(&passing.refid) else {
        return Err(ignore(&passing.refid, passing, Rejection::UnknownRider));
    };
    if entry.series != state.series {
        return Err(ignore(entry.bib.as_str(), passing, Rejection::NonSeries));
    }
    if !state.riders.contains(entry.bib.as_str()) {
        return Err(ignore(entry.bib.as_str(), passing, Rejection::NonStarter));
    }
    Ok(entry.bib.clone())
}

fn sync_start(state: &mut EventState, time: Tod) -> Outcome {
    tracing::info!(start = %time.rawtime(2), "timer sync");
    state.set_start(time);
    Outcome::Synced(time)
}

fn individual(state: &mut EventState, ctx: &Context<'_>, passing: &Passing) -> Outcome {
    let chan = passing.channel();
    if passing.is_trigger() {
        if on(chan, state.config.finish_loop) {
            return finish_trigger(state, ctx, passing);
        }
        if on(chan, state.config.start_loop) {
            return start_trigger(state, passing);
        }
        tracing::info!(passing = %passing.describe(), "spurious trigger");
        return Outcome::Ignored(Rejection::SpuriousTrigger);
    }

    match entrant(state, ctx, passing) {
        Ok(bib) => individual_rider(state, ctx, &bib, passing),
        Err(outcome) => outcome,
    }
}

fn individual_rider(
    state: &mut EventState,
    ctx: &Context<'_>,
    bib: &Bib,
    passing: &Passing,
) -> Outcome {
    let chan = passing.channel();
    let Some(rider) = state.riders.get(bib.as_str()) else {
        return Outcome::Ignored(Rejection::NonStarter);
    };

    // a shared start/finish loop only finishes riders past the minimum elapsed
    let ok_finish = rider
        .start_reference()
        .is_some_and(|st| passing.time > st && passing.time - st > state.config.min_elapsed);
    let finished = rider.finish().is_some();

    if ok_finish && on(chan, state.config.finish_loop) {
        return finish_by_transponder(state, ctx, bib, passing);
    }
    if on(chan, state.config.start_loop) {
        return start_by_transponder(state, bib, passing);
    }
    if let Some(points) = chan.and_then(|c| state.config.splits_for(c)) {
        let points = points.to_vec();
        return split(state, ctx, bib, passing, &points);
    }
    if on(chan, state.config.finish_loop) {
        return ignore(bib.as_str(), passing, Rejection::EarlyFinish);
    }

    // any other loop arms the finish lane for a rider on course
    if finished {
        return ignore(bib.as_str(), passing, Rejection::AlreadyFinished);
    }
    if state.finish_lane.is_some() {
        return ignore(bib.as_str(), passing, Rejection::FinishBlocked);
    }
    if !ok_finish {
        return ignore(bib.as_str(), passing, Rejection::EarlyFinish);
    }
    tracing::info!(bib = %bib, passing = %passing.describe(), "arm finish");
    state.finish_lane = Some(bib.clone());
    Outcome::FinishArmed { bib: bib.clone() }
}

fn start_trigger(state: &mut EventState, passing: &Passing) -> Outcome {
    tracing::info!(passing = %passing.describe(), "start trigger");
    match state.timer() {
        TimerState::Running => {
            state.start_passings.insert(passing.clone());
            let Some(bib) = state.start_lane.take() else {
                return Outcome::Impulse(Line::Start);
            };
            let time = passing.time - state.config.start_delay;
            match state.riders.get_mut(bib.as_str()) {
                Some(rider) => {
                    rider.set_start(Some(time));
                    Outcome::Started { bib, time }
                }
                None => {
                    tracing::error!(bib = %bib, "missing rider at start");
                    Outcome::Impulse(Line::Start)
                }
            }
        }
        TimerState::ArmStart => sync_start(state, passing.time),
        _ => Outcome::Ignored(Rejection::NotRunning),
    }
}

fn finish_trigger(state: &mut EventState, ctx: &Context<'_>, passing: &Passing) -> Outcome {
    tracing::info!(passing = %passing.describe(), "finish trigger");
    match state.timer() {
        TimerState::Running => {
            state.finish_passings.insert(passing.clone());
            let Some(bib) = state.finish_lane.take() else {
                return Outcome::Impulse(Line::Finish);
            };
            let Some(rider) = state.riders.get_mut(bib.as_str()) else {
                tracing::error!(bib = %bib, "missing rider at finish");
                return Outcome::Impulse(Line::Finish);
            };
            rider.set_finish(Some(passing.time));
            announce_finish(state, ctx, &bib);
            Outcome::Finished {
                bib,
                time: passing.time,
            }
        }
        TimerState::ArmStart => sync_start(state, passing.time),
        _ => Outcome::Ignored(Rejection::NotRunning),
    }
}

fn start_by_transponder(state: &mut EventState, bib: &Bib, passing: &Passing) -> Outcome {
    let config = &state.config;
    let Some(rider) = state.riders.get(bib.as_str()) else {
        return Outcome::Ignored(Rejection::NonStarter);
    };
    if rider.finish().is_some() {
        return ignore(bib.as_str(), passing, Rejection::AlreadyFinished);
    }
    if !config.sloppy_start {
        if rider.start().is_some() {
            return ignore(bib.as_str(), passing, Rejection::AlreadyStarted);
        }
        if let Some(wall) = rider.wall_start() {
            if (wall - passing.time).abs() > config.wall_tolerance {
                return ignore(bib.as_str(), passing, Rejection::StartWindow);
            }
        }
    }

    state.start_passings.insert(passing.clone());
    let time = if state.config.sloppy_impulse {
        match state
            .start_passings
            .start_match(passing.time, state.config.start_match)
        {
            Some(time) => time,
            None => {
                tracing::warn!(bib = %bib, passing = %passing.describe(), "no start match found");
                return Outcome::Ignored(Rejection::NoMatch);
            }
        }
    } else {
        passing.time
    };
    if let Some(rider) = state.riders.get_mut(bib.as_str()) {
        rider.set_start(Some(time));
    }
    tracing::info!(bib = %bib, start = %time.rawtime(4), "set start time");
    Outcome::Started {
        bib: bib.clone(),
        time,
    }
}

fn finish_by_transponder(
    state: &mut EventState,
    ctx: &Context<'_>,
    bib: &Bib,
    passing: &Passing,
) -> Outcome {
    let Some(rider) = state.riders.get(bib.as_str()) else {
        return Outcome::Ignored(Rejection::NonStarter);
    };
    if rider.finish().is_some() {
        return ignore(bib.as_str(), passing, Rejection::AlreadyFinished);
    }
    let Some(start) = rider.start_reference() else {
        tracing::warn!(
            bib = %bib,
            passing = %passing.describe(),
            "no start time for rider at finish"
        );
        return Outcome::Ignored(Rejection::NoStartTime);
    };
    let category = state.rider_category(rider);
    let finish_passes = ctx
        .categories
        .category_info(&category)
        .and_then(|c| c.laps)
        .or(state.config.finish_passes);
    let last_lap = rider.last_seen().filter(|&seen| seen > start).unwrap_or(start);
    let min_elapsed = state.config.min_elapsed;

    let outcome = match finish_passes {
        None if passing.time > start + min_elapsed => complete_finish(state, ctx, bib, passing),
        None => ignore(bib.as_str(), passing, Rejection::EarlyFinish),
        Some(passes) if passing.time > last_lap + min_elapsed => {
            let laps = state
                .riders
                .get_mut(bib.as_str())
                .map_or(0, crate::rider::Rider::add_lap);
            if laps >= passes {
                complete_finish(state, ctx, bib, passing)
            } else {
                state.finish_passings.insert(passing.clone());
                tracing::info!(bib = %bib, laps, passing = %passing.describe(), "lap passing");
                Outcome::Lap {
                    bib: bib.clone(),
                    laps,
                }
            }
        }
        Some(_) => ignore(bib.as_str(), passing, Rejection::ShortLap),
    };

    if let Some(rider) = state.riders.get_mut(bib.as_str()) {
        rider.set_last_seen(passing.time);
    }
    outcome
}

/// Sets a rider's finish from a finish loop passing, matched to an impulse
/// when the decoder runs in impulse mode.
fn complete_finish(
    state: &mut EventState,
    ctx: &Context<'_>,
    bib: &Bib,
    passing: &Passing,
) -> Outcome {
    state.finish_passings.insert(passing.clone());
    let time = if state.config.sloppy_impulse {
        let found = state
            .finish_passings
            .finish_match(passing.time, state.config.finish_match);
        if found.is_ambiguous() {
            tracing::warn!(
                bib = %bib,
                at = %passing.time.rawtime(2),
                candidates = found.candidates,
                "excess impulses detected, manual check required"
            );
        }
        let Some(time) = found.time else {
            tracing::warn!(bib = %bib, passing = %passing.describe(), "no finish match found");
            return Outcome::Ignored(Rejection::NoMatch);
        };
        time
    } else {
        passing.time
    };
    if let Some(rider) = state.riders.get_mut(bib.as_str()) {
        rider.set_finish(Some(time));
    }
    tracing::info!(bib = %bib, finish = %time.rawtime(4), "set finish time");
    announce_finish(state, ctx, bib);
    Outcome::Finished {
        bib: bib.clone(),
        time,
    }
}

fn split(
    state: &mut EventState,
    ctx: &Context<'_>,
    bib: &Bib,
    passing: &Passing,
    points: &[SplitPoint],
) -> Outcome {
    let Some(rider) = state.riders.get(bib.as_str()) else {
        return Outcome::Ignored(Rejection::NonStarter);
    };
    let Some(start) = rider
        .start_reference()
        .filter(|&st| passing.time > st && passing.time - st > START_FUDGE)
    else {
        return ignore(bib.as_str(), passing, Rejection::NotOnCourse);
    };
    if rider.finish().is_some() {
        return ignore(bib.as_str(), passing, Rejection::AlreadyFinished);
    }
    if points.is_empty() {
        return ignore(bib.as_str(), passing, Rejection::UnconfiguredLoop);
    }

    let elapsed = passing.time - start;
    let found = points.iter().copied().find(|point| {
        rider.split(*point).is_none()
            && state
                .config
                .splits
                .get(point)
                .is_some_and(|schema| schema.accepts(elapsed))
    });
    let Some(point) = found else {
        return ignore(bib.as_str(), passing, Rejection::NoSplit);
    };

    let precision = state.config.places();
    let config = state.config.clone();
    if let Some(rider) = state.riders.get_mut(bib.as_str()) {
        rider.set_split(point, Some(passing.time));
        rider.set_eta(crate::recalc::eta(rider, &config, precision));
    }
    let rank = split_rank(state, bib, point);
    let label = config
        .splits
        .get(&point)
        .map_or_else(|| point.to_string(), |s| s.label.clone());
    tracing::info!(bib = %bib, split = %label, rank, passing = %passing.describe(), "intermediate");
    if let Some(rider) = state.riders.get(bib.as_str()) {
        ctx.sink.announce(Announcement::Split {
            label,
            place: format!("({rank}.)"),
            bib: bib.to_string(),
            name: rider.name().to_string(),
            time: elapsed.truncate(precision).rawtime(precision),
        });
    }
    Outcome::Split {
        bib: bib.clone(),
        point,
        rank,
    }
}

/// One-based rank of a rider at a split among their category.
fn split_rank(state: &EventState, bib: &Bib, point: SplitPoint) -> usize {
    let at_split = |r: &crate::rider::Rider| Some(r.split(point)? - r.start_reference()?);
    let Some(rider) = state.riders.get(bib.as_str()) else {
        return 0;
    };
    let Some(own) = at_split(rider) else {
        return 0;
    };
    let category = state.rider_category(rider);
    1 + state
        .riders
        .iter()
        .filter(|r| state.rider_category(r) == category)
        .filter_map(at_split)
        .filter(|&t| t < own)
        .count()
}

/// Announces a finished individual rider with a provisional rank.
fn announce_finish(state: &EventState, ctx: &Context<'_>, bib: &Bib) {
    let precision = state.config.places();
    let Some(rider) = state.riders.get(bib.as_str()) else {
        return;
    };
    let Some(elapsed) = rider.elapsed(precision) else {
        tracing::error!(bib = %bib, "no start time for finished rider");
        return;
    };
    let category = state.rider_category(rider);
    let ahead = state
        .riders
        .iter()
        .filter(|r| !r.comment().is_out() && state.rider_category(r) == category)
        .filter_map(|r| r.elapsed(precision))
        .filter(|&t| t < elapsed)
        .count();
    ctx.sink.announce(Announcement::Rider {
        place: (ahead + 1).to_string(),
        bib: bib.to_string(),
        name: rider.name().to_string(),
        category,
        time: elapsed.rawtime(2),
    });
}

fn team(state: &mut EventState, ctx: &Context<'_>, passing: &Passing) -> Outcome {
    if passing.is_trigger() {
        let chan = passing.channel();
        if on(chan, state.config.finish_loop) && state.timer() == TimerState::ArmFinish {
            tracing::info!(at = %passing.time.rawtime(2), "team finish impulse");
            return Outcome::Impulse(Line::Finish);
        }
        if state.timer() == TimerState::ArmStart {
            tracing::info!(passing = %passing.describe(), "start trigger");
            return sync_start(state, passing.time);
        }
        tracing::info!(passing = %passing.describe(), "trigger");
        return Outcome::Impulse(Line::Start);
    }

    match entrant(state, ctx, passing) {
        Ok(bib) => team_rider(state, ctx, &bib, passing),
        Err(outcome) => outcome,
    }
}

fn team_rider(state: &mut EventState, ctx: &Context<'_>, bib: &Bib, passing: &Passing) -> Outcome {
    let Some(rider) = state.riders.get(bib.as_str()) else {
        return Outcome::Ignored(Rejection::NonStarter);
    };
    if rider.in_race() {
        tracing::info!(bib = %bib, passing = %passing.describe(), "saw");
    } else {
        tracing::warn!(bib = %bib, passing = %passing.describe(), "withdrawn rider");
    }
    if !matches!(state.timer(), TimerState::Running | TimerState::ArmFinish) {
        return Outcome::Ignored(Rejection::NotRunning);
    }

    let min_lap = state.config.min_lap;
    let first_allowed = state
        .start()
        .map_or(Tod::ZERO, |start| start + rider.start_offset() + min_lap);
    if passing.time <= first_allowed {
        return ignore(bib.as_str(), passing, Rejection::EarlyPassing);
    }
    let category = state.rider_category(rider);
    let target = ctx
        .categories
        .category_info(&category)
        .and_then(|c| c.laps)
        .or(state.config.target_laps);
    let arm_finish = state.timer() == TimerState::ArmFinish;
    let lap_finish = target.is_some_and(|t| rider.laps() + 1 >= t);
    if (arm_finish || lap_finish) && rider.finish().is_some() {
        return ignore(bib.as_str(), passing, Rejection::AlreadyFinished);
    }

    let Some(rider) = state.riders.get_mut(bib.as_str()) else {
        return Outcome::Ignored(Rejection::NonStarter);
    };
    match rider.insert_seen(passing.time, min_lap) {
        SeenInsert::Accepted(_) => {}
        SeenInsert::ShortLap { .. } => {
            return ignore(bib.as_str(), passing, Rejection::ShortLap);
        }
        SeenInsert::Spurious { .. } => {
            return ignore(bib.as_str(), passing, Rejection::Spurious);
        }
    }

    let outcome = if arm_finish || lap_finish {
        let mut outcome = Outcome::Seen { bib: bib.clone() };
        if rider.comment() != Comment::Wd {
            if rider.placing() == Placing::Unplaced {
                rider.set_finish(Some(passing.time));
                outcome = Outcome::Finished {
                    bib: bib.clone(),
                    time: passing.time,
                };
            } else {
                tracing::error!(
                    bib = %bib,
                    passing = %passing.describe(),
                    "placed rider seen at finish"
                );
            }
        }
        if rider.in_race() {
            rider.add_lap();
        }
        outcome
    } else if rider.in_race() && (rider.placing().is_placed() || rider.computed_bunch().is_none()) {
        let laps = rider.add_lap();
        Outcome::Lap {
            bib: bib.clone(),
            laps,
        }
    } else {
        Outcome::Seen { bib: bib.clone() }
    };

    if let Some(rider) = state.riders.get(bib.as_str()) {
        if rider.in_race() {
            ctx.sink.announce(Announcement::Rider {
                place: String::new(),
                bib: bib.to_string(),
                name: rider.name().to_string(),
                category: rider.category().to_string(),
                time: passing.time.rawtime(2),
            });
        }
    }
    outcome
}

#[cfg(test)]
mod tests {
    use std::sync::mpsc;

    use super::*;
    use crate::announce::{ChannelSink, NullSink};
    use crate::config::SplitSchema;
    use crate::directory::{MemoryDirectory, RiderEntry};

    fn t(s: &str) -> Tod {
        s.parse().unwrap()
    }

    fn tagged(time: &str, chan: &str, refid: &str) -> Passing {
        Passing::tagged(t(time), chan, refid)
    }

    fn trigger(time: &str, chan: &str) -> Passing {
        Passing::trigger(t(time), chan)
    }

    /// Riders 1 to 3 on transponders T1 to T3, a minute apart from 10:00.
    fn directory() -> MemoryDirectory {
        let mut directory = MemoryDirectory::new();
        for (i, number) in ["1", "2", "3"].into_iter().enumerate() {
            let offset = Tod::from_secs(60 * i64::try_from(i).unwrap());
            directory = directory.with_rider(RiderEntry {
                refid: format!("T{number}"),
                category: "A".to_string(),
                team: "RED".to_string(),
                wall_start: Some(t("10:00:00") + offset),
                ..RiderEntry::new(Bib::new(number).unwrap())
            });
        }
        directory.with_rider(RiderEntry {
            refid: "T9".to_string(),
            ..RiderEntry::new(Bib::new("9").unwrap())
        })
    }

    fn event(kind: EventKind, directory: &MemoryDirectory) -> EventState {
        let mut state = EventState::new(kind);
        state.categories = vec!["A".to_string()];
        let ctx = Context::from_directory(directory, &NullSink);
        for number in ["1", "2", "3"] {
            state.add_rider_from_directory(&ctx, number).unwrap();
        }
        state
    }

    fn finish_of(state: &EventState, bib: &str) -> Option<Tod> {
        state.rider(bib).unwrap().finish()
    }

    #[test]
    fn transponder_start_and_finish() {
        let dir = directory();
        let ctx = Context::from_directory(&dir, &NullSink);
        let mut state = event(EventKind::Individual, &dir);

        let started = classify(&mut state, &ctx, &tagged("10:00:00.8", "C0", "T1"));
        assert!(matches!(started, Outcome::Started { time, .. } if time == t("10:00:00.8")));
        let finished = classify(&mut state, &ctx, &tagged("10:20:00", "C1", "T1"));
        assert!(matches!(finished, Outcome::Finished { .. }));
        assert_eq!(finish_of(&state, "1"), Some(t("10:20:00")));

        // a second hit on the finish loop changes nothing
        let again = classify(&mut state, &ctx, &tagged("10:20:01", "C1", "T1"));
        assert_eq!(again, Outcome::Ignored(Rejection::AlreadyFinished));
        assert_eq!(finish_of(&state, "1"), Some(t("10:20:00")));
    }

    #[test]
    fn unknown_and_unentered_riders_are_ignored() {
        let dir = directory();
        let ctx = Context::from_directory(&dir, &NullSink);
        let mut state = event(EventKind::Individual, &dir);
        let before = state.clone();

        let unknown = classify(&mut state, &ctx, &tagged("10:00:00", "C0", "nobody"));
        assert_eq!(unknown, Outcome::Ignored(Rejection::UnknownRider));
        let absent = classify(&mut state, &ctx, &tagged("10:00:00", "C0", "T9"));
        assert_eq!(absent, Outcome::Ignored(Rejection::NonStarter));
        state.series = "M".to_string();
        let other = classify(&mut state, &ctx, &tagged("10:00:00", "C0", "T1"));
        assert_eq!(other, Outcome::Ignored(Rejection::NonSeries));
        state.series.clear();
        assert_eq!(state, before);
    }

    #[test]
    fn spurious_trigger_channel() {
        let dir = directory();
        let ctx = Context::from_directory(&dir, &NullSink);
        let mut state = event(EventKind::Individual, &dir);
        let outcome = classify(&mut state, &ctx, &trigger("10:00:00", "C4"));
        assert_eq!(outcome, Outcome::Ignored(Rejection::SpuriousTrigger));
    }

    #[test]
    fn start_loop_checks_wall_start() {
        let dir = directory();
        let ctx = Context::from_directory(&dir, &NullSink);
        let mut state = event(EventKind::Individual, &dir);

        let late = classify(&mut state, &ctx, &tagged("10:00:06", "C0", "T1"));
        assert_eq!(late, Outcome::Ignored(Rejection::StartWindow));
        classify(&mut state, &ctx, &tagged("10:00:04", "C0", "T1"));
        let twice = classify(&mut state, &ctx, &tagged("10:00:05", "C0", "T1"));
        assert_eq!(twice, Outcome::Ignored(Rejection::AlreadyStarted));

        state.config.sloppy_start = true;
        let restart = classify(&mut state, &ctx, &tagged("10:00:30", "C0", "T1"));
        assert!(matches!(restart, Outcome::Started { time, .. } if time == t("10:00:30")));
    }

    #[test]
    fn early_finish_on_shared_loop() {
        let dir = directory();
        let ctx = Context::from_directory(&dir, &NullSink);
        let mut state = event(EventKind::Individual, &dir);
        state.config.finish_loop = Some(0);

        classify(&mut state, &ctx, &tagged("10:00:00", "C0", "T1"));
        // the start loop re-reads the rider inside the minimum elapsed
        let echo = classify(&mut state, &ctx, &tagged("10:00:20", "C0", "T1"));
        assert_eq!(echo, Outcome::Ignored(Rejection::AlreadyStarted));
        let finish = classify(&mut state, &ctx, &tagged("10:25:00", "C0", "T1"));
        assert!(matches!(finish, Outcome::Finished { .. }));
    }

    #[test]
    fn impulse_mode_adopts_matched_impulses() {
        let dir = directory();
        let ctx = Context::from_directory(&dir, &NullSink);
        let mut state = event(EventKind::Individual, &dir);
        state.config.sloppy_impulse = true;
        state.set_start(t("9:59:00"));

        assert_eq!(
            classify(&mut state, &ctx, &trigger("10:00:00.12", "C0")),
            Outcome::Impulse(Line::Start)
        );
        let started = classify(&mut state, &ctx, &tagged("10:00:01.5", "C0", "T1"));
        assert!(matches!(started, Outcome::Started { time, .. } if time == t("10:00:00.12")));

        classify(&mut state, &ctx, &trigger("10:20:00.34", "C1"));
        classify(&mut state, &ctx, &tagged("10:20:00.4", "C1", "T1"));
        assert_eq!(finish_of(&state, "1"), Some(t("10:20:00.34")));

        // every accepted passing is kept, tagged or not
        assert_eq!(state.start_passings().len(), 2);
        assert_eq!(state.finish_passings().len(), 2);
    }

    #[test]
    fn ambiguous_impulses_take_nearest() {
        let dir = directory();
        let ctx = Context::from_directory(&dir, &NullSink);
        let mut state = event(EventKind::Individual, &dir);
        state.config.sloppy_impulse = true;
        state.set_start(t("9:59:00"));
        state.set_times("2", Some(t("10:01:00")), None, None).unwrap();

        for at in ["10:21:00.00", "10:21:00.05", "10:21:00.10"] {
            classify(&mut state, &ctx, &trigger(at, "C1"));
        }
        classify(&mut state, &ctx, &tagged("10:21:00.08", "C1", "T2"));
        assert_eq!(finish_of(&state, "2"), Some(t("10:21:00.10")));

        state.set_times("3", Some(t("10:02:00")), None, None).unwrap();
        let lost = classify(&mut state, &ctx, &tagged("10:30:00", "C1", "T3"));
        assert_eq!(lost, Outcome::Ignored(Rejection::NoMatch));
        assert_eq!(finish_of(&state, "3"), None);
    }

    #[test]
    fn finish_passes_count_laps() {
        let dir = directory();
        let ctx = Context::from_directory(&dir, &NullSink);
        let mut state = event(EventKind::Individual, &dir);
        state.config.finish_passes = Some(2);
        classify(&mut state, &ctx, &tagged("10:00:00", "C0", "T1"));

        let lap = classify(&mut state, &ctx, &tagged("10:10:00", "C1", "T1"));
        assert_eq!(
            lap,
            Outcome::Lap {
                bib: Bib::new("1").unwrap(),
                laps: 1
            }
        );
        let short = classify(&mut state, &ctx, &tagged("10:10:10", "C1", "T1"));
        assert_eq!(short, Outcome::Ignored(Rejection::ShortLap));
        assert_eq!(finish_of(&state, "1"), None);
        classify(&mut state, &ctx, &tagged("10:20:00", "C1", "T1"));
        assert_eq!(finish_of(&state, "1"), Some(t("10:20:00")));
        assert_eq!(state.rider("1").unwrap().laps(), 2);
    }

    #[test]
    fn lanes_take_impulse_times() {
        let dir = directory();
        let ctx = Context::from_directory(&dir, &NullSink);
        let mut state = event(EventKind::Individual, &dir);
        state.config.start_delay = t("0.1");
        state.set_start(t("9:59:00"));

        state.arm_start_lane("1").unwrap();
        let started = classify(&mut state, &ctx, &trigger("10:00:00.5", "C0"));
        assert!(matches!(started, Outcome::Started { time, .. } if time == t("10:00:00.4")));
        assert_eq!(state.start_lane(), None);

        // approaching the line arms the finish lane
        let armed = classify(&mut state, &ctx, &tagged("10:19:50", "C5", "T1"));
        assert!(matches!(armed, Outcome::FinishArmed { .. }));
        state.set_times("2", Some(t("10:01:00")), None, None).unwrap();
        let blocked = classify(&mut state, &ctx, &tagged("10:19:51", "C5", "T2"));
        assert_eq!(blocked, Outcome::Ignored(Rejection::FinishBlocked));

        let finished = classify(&mut state, &ctx, &trigger("10:20:00", "C1"));
        assert!(matches!(finished, Outcome::Finished { .. }));
        assert_eq!(finish_of(&state, "1"), Some(t("10:20:00")));
        assert_eq!(state.finish_lane(), None);
    }

    #[test]
    fn intermediate_splits_and_rank() {
        let dir = directory();
        let (tx, rx) = mpsc::channel();
        let sink = ChannelSink::new(tx);
        let ctx = Context::from_directory(&dir, &sink);
        let mut state = event(EventKind::Individual, &dir);
        state.config.inter_loops.insert(2, vec![SplitPoint::A, SplitPoint::B]);
        state.config.splits.insert(
            SplitPoint::A,
            SplitSchema {
                label: "km10".to_string(),
                min_elapsed: t("5:00"),
                max_elapsed: t("20:00"),
                distance: Some(10.0),
            },
        );
        state.config.splits.insert(
            SplitPoint::B,
            SplitSchema {
                label: "km20".to_string(),
                min_elapsed: t("20:00"),
                max_elapsed: t("40:00"),
                distance: Some(20.0),
            },
        );
        state.set_times("1", Some(t("10:00:00")), None, None).unwrap();
        state.set_times("2", Some(t("10:01:00")), None, None).unwrap();

        let early = classify(&mut state, &ctx, &tagged("10:00:20", "C2", "T1"));
        assert_eq!(early, Outcome::Ignored(Rejection::NotOnCourse));

        let first = classify(&mut state, &ctx, &tagged("10:15:00", "C2", "T1"));
        assert!(matches!(first, Outcome::Split { point: SplitPoint::A, rank: 1, .. }));
        let faster = classify(&mut state, &ctx, &tagged("10:15:30", "C2", "T2"));
        assert!(matches!(faster, Outcome::Split { point: SplitPoint::A, rank: 1, .. }));
        let repeat = classify(&mut state, &ctx, &tagged("10:15:10", "C2", "T1"));
        assert_eq!(repeat, Outcome::Ignored(Rejection::NoSplit));
        let second = classify(&mut state, &ctx, &tagged("10:25:00", "C2", "T1"));
        assert!(matches!(second, Outcome::Split { point: SplitPoint::B, rank: 1, .. }));

        assert_eq!(state.rider("1").unwrap().split(SplitPoint::A), Some(t("10:15:00")));
        let labels: Vec<String> = rx
            .try_iter()
            .filter_map(|a| match a {
                Announcement::Split { label, .. } => Some(label),
                _ => None,
            })
            .collect();
        assert_eq!(labels, ["km10", "km10", "km20"]);
    }

    #[test]
    fn team_passings_gate_on_minimum_lap() {
        let dir = directory();
        let ctx = Context::from_directory(&dir, &NullSink);
        let mut state = event(EventKind::Team, &dir);
        state.set_start(t("10:00:00"));

        let outcomes: Vec<Outcome> = ["10:00:01", "10:03:00", "10:03:05"]
            .into_iter()
            .map(|at| classify(&mut state, &ctx, &tagged(at, "C1", "T1")))
            .collect();
        assert_eq!(outcomes[0], Outcome::Ignored(Rejection::EarlyPassing));
        assert!(matches!(outcomes[1], Outcome::Lap { laps: 1, .. }));
        assert_eq!(outcomes[2], Outcome::Ignored(Rejection::ShortLap));
        assert_eq!(state.rider("1").unwrap().laps(), 1);

        // slotting between two recorded passings needs room on both sides
        classify(&mut state, &ctx, &tagged("10:09:00", "C1", "T1"));
        let squeezed = classify(&mut state, &ctx, &tagged("10:07:30", "C1", "T1"));
        assert_eq!(squeezed, Outcome::Ignored(Rejection::Spurious));
        assert_eq!(state.rider("1").unwrap().seen(), [t("10:03:00"), t("10:09:00")]);
    }

    #[test]
    fn team_passings_need_running_timer() {
        let dir = directory();
        let ctx = Context::from_directory(&dir, &NullSink);
        let mut state = event(EventKind::Team, &dir);
        let outcome = classify(&mut state, &ctx, &tagged("10:05:00", "C1", "T1"));
        assert_eq!(outcome, Outcome::Ignored(Rejection::NotRunning));

        state.arm_start();
        let synced = classify(&mut state, &ctx, &trigger("10:00:00", "C0"));
        assert_eq!(synced, Outcome::Synced(t("10:00:00")));
        assert_eq!(state.timer(), TimerState::Running);
    }

    #[test]
    fn team_target_laps_finish() {
        let dir = directory();
        let ctx = Context::from_directory(&dir, &NullSink);
        let mut state = event(EventKind::Team, &dir);
        state.config.target_laps = Some(2);
        state.set_start(t("10:00:00"));

        classify(&mut state, &ctx, &tagged("10:03:00", "C1", "T1"));
        assert_eq!(finish_of(&state, "1"), None);
        let done = classify(&mut state, &ctx, &tagged("10:06:00", "C1", "T1"));
        assert!(matches!(done, Outcome::Finished { .. }));
        assert_eq!(state.rider("1").unwrap().laps(), 2);
        let extra = classify(&mut state, &ctx, &tagged("10:09:00", "C1", "T1"));
        assert_eq!(extra, Outcome::Ignored(Rejection::AlreadyFinished));
        assert_eq!(state.rider("1").unwrap().seen(), [t("10:03:00"), t("10:06:00")]);
        assert_eq!(state.rider("1").unwrap().laps(), 2);
    }

    #[test]
    fn finished_team_rider_passing_leaves_rider_untouched() {
        let dir = directory();
        let ctx = Context::from_directory(&dir, &NullSink);
        let mut state = event(EventKind::Team, &dir);
        state.config.target_laps = Some(1);
        state.set_start(t("10:00:00"));

        let done = classify(&mut state, &ctx, &tagged("10:05:00", "C1", "T1"));
        assert!(matches!(done, Outcome::Finished { .. }));
        let before = state.rider("1").unwrap().clone();

        let extra = classify(&mut state, &ctx, &tagged("10:09:00", "C1", "T1"));
        assert_eq!(extra, Outcome::Ignored(Rejection::AlreadyFinished));
        assert_eq!(state.rider("1").unwrap(), &before);
        assert_eq!(state.rider("1").unwrap().seen(), [t("10:05:00")]);
    }

    #[test]
    fn withdrawn_rider_does_not_finish() {
        let dir = directory();
        let ctx = Context::from_directory(&dir, &NullSink);
        let mut state = event(EventKind::Team, &dir);
        state.set_start(t("10:00:00"));
        state.dnf_riders(["2"], Comment::Wd);
        state.arm_finish();

        let seen = classify(&mut state, &ctx, &tagged("10:10:00", "C1", "T2"));
        assert!(matches!(seen, Outcome::Seen { .. }));
        assert_eq!(finish_of(&state, "2"), None);
        assert_eq!(state.rider("2").unwrap().laps(), 0);

        let finished = classify(&mut state, &ctx, &tagged("10:10:00", "C1", "T1"));
        assert!(matches!(finished, Outcome::Finished { .. }));
        assert_eq!(state.rider("1").unwrap().laps(), 1);
    }

    #[test]
    fn outcome_reports_result_changes() {
        assert!(!Outcome::Ignored(Rejection::ShortLap).changes_results());
        assert!(!Outcome::Impulse(Line::Finish).changes_results());
        assert!(Outcome::Synced(Tod::ZERO).changes_results());
        assert_eq!(Rejection::ShortLap.to_string(), "short lap");
    }
}
