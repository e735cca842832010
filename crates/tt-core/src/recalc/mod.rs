//! Results recalculation.
//!
//! Every pass rebuilds all derived rider fields, standings and tallies from
//! the raw timing data, so running it twice without new input yields the same
//! [`Results`]. The two event kinds share the status, contest and ranking
//! helpers here and differ only in how a rider's ranked time is found.

mod individual;
mod limit;
mod team;

use serde::Serialize;

pub use individual::IndividualScoring;
pub(crate) use individual::eta;
pub use limit::decode_limit;
pub use team::TeamScoring;

use crate::config::EventKind;
use crate::contest::Tally;
use crate::event::{Context, EventState, RaceStatus, Results, Standing};
use crate::rider::{Placing, Rider};
use crate::tod::Tod;

/// A recalculation strategy for one event kind.
pub trait Scoring {
    /// Rebuilds all derived state and returns the new results.
    fn recalculate(&self, state: &mut EventState, ctx: &Context<'_>) -> Results;
}

/// The strategy for an event kind.
pub fn scoring_for(kind: EventKind) -> &'static dyn Scoring {
    match kind {
        EventKind::Individual => &IndividualScoring,
        EventKind::Team => &TeamScoring,
    }
}

/// One entry of a ranked time list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Ranked<K> {
    pub time: Tod,
    pub key: K,
    pub place: u32,
}

/// Sorts by time and assigns standard competition places: equal times share
/// a place and the next distinct time is placed after everyone ahead of it
/// (1, 1, 3). Equal times keep their input order.
pub fn rank_times<K>(entries: Vec<(Tod, K)>) -> Vec<Ranked<K>> {
    let mut entries = entries;
    entries.sort_by_key(|(time, _)| *time);
    let mut ranked: Vec<Ranked<K>> = Vec::with_capacity(entries.len());
    for (count, (time, key)) in entries.into_iter().enumerate() {
        let place = match ranked.last() {
            Some(prev) if prev.time == time => prev.place,
            _ => u32::try_from(count + 1).unwrap_or(u32::MAX),
        };
        ranked.push(Ranked { time, key, place });
    }
    ranked
}

/// Joins ranked keys into a places string, hyphenating ties.
pub(crate) fn places_string<K: AsRef<str>>(ranked: &[Ranked<K>]) -> String {
    let mut out = String::new();
    let mut last_place = None;
    for entry in ranked {
        if !out.is_empty() {
            out.push(if last_place == Some(entry.place) { '-' } else { ' ' });
        }
        out.push_str(entry.key.as_ref());
        last_place = Some(entry.place);
    }
    out
}

/// Overall race status from the riders' placings.
pub(crate) fn race_status(state: &EventState) -> RaceStatus {
    let total = state.riders().len();
    let placed = state
        .riders()
        .iter()
        .filter(|r| r.placing().is_placed())
        .count();
    if placed == 0 {
        RaceStatus::Prerace
    } else if placed < total {
        RaceStatus::Virtual
    } else if state.is_finished() {
        RaceStatus::Final
    } else {
        RaceStatus::Provisional
    }
}

/// Rebuilds every contest from scratch.
///
/// A contest whose source is not configured is logged and skipped.
pub(crate) fn assign_contests(state: &EventState) -> Tally {
    let mut tally = Tally::new(&state.tallies);
    for contest in &state.contests {
        let Some(places) = state.places_for(&contest.source) else {
            tracing::error!(
                contest = %contest.id,
                source = %contest.source,
                "contest source not configured, contest skipped"
            );
            continue;
        };
        tally.assign(contest, &places, state.riders());
    }
    tally
}

/// The result line for one rider.
pub(crate) fn standing(state: &EventState, rider: &Rider, time: Option<Tod>) -> Standing {
    Standing {
        placing: rider.placing(),
        bib: rider.bib().clone(),
        name: rider.name().to_string(),
        category: state.rider_category(rider),
        team: rider.team().to_string(),
        time,
        down: None,
        laps: rider.laps(),
        eta: rider.eta(),
    }
}

/// Fills `down` with each placed line's gap to its category winner.
pub(crate) fn fill_down_times(standings: &mut [Standing]) {
    let mut leaders: Vec<(String, Tod)> = Vec::new();
    for line in standings.iter_mut() {
        let (Placing::Place(_), Some(time)) = (line.placing, line.time) else {
            continue;
        };
        let leader = match leaders.iter().find(|(cat, _)| *cat == line.category) {
            Some((_, leader)) => *leader,
            None => {
                leaders.push((line.category.clone(), time));
                time
            }
        };
        line.down = Some(time - leader);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(s: &str) -> Tod {
        s.parse().unwrap()
    }

    #[test]
    fn ties_share_place_and_leave_gap() {
        let ranked = rank_times(vec![
            (t("10:02"), "b"),
            (t("10:00"), "a"),
            (t("10:02"), "c"),
            (t("10:05"), "d"),
        ]);
        let places: Vec<(&str, u32)> = ranked.iter().map(|r| (r.key, r.place)).collect();
        assert_eq!(places, [("a", 1), ("b", 2), ("c", 2), ("d", 4)]);
    }

    #[test]
    fn next_place_counts_everyone_ahead() {
        let ranked = rank_times(vec![(t("1:00"), "a"), (t("1:00"), "b"), (t("1:01"), "c")]);
        let faster = ranked.iter().filter(|r| r.time < t("1:01")).count();
        assert_eq!(ranked[2].place as usize, faster + 1);
        assert_eq!(ranked[0].place, ranked[1].place);
    }

    #[test]
    fn places_string_hyphenates_ties() {
        let ranked = rank_times(vec![(t("1:00"), "5"), (t("1:01"), "3"), (t("1:01"), "4")]);
        assert_eq!(places_string(&ranked), "5 3-4");
    }
}
