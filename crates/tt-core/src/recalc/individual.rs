//! Individual time trial scoring: riders ranked on their own elapsed time.

use super::{
    Scoring, assign_contests, decode_limit, fill_down_times, places_string, race_status,
    rank_times, standing,
};
use crate::config::TimingConfig;
use crate::event::{Context, EventState, Results};
use crate::rider::{Placing, Rider};
use crate::tod::Tod;
use crate::types::{Bib, Comment, SplitPoint};

/// Ranks each category on elapsed time (finish minus start plus penalty).
#[derive(Debug, Clone, Copy, Default)]
pub struct IndividualScoring;

impl Scoring for IndividualScoring {
    fn recalculate(&self, state: &mut EventState, ctx: &Context<'_>) -> Results {
        let precision = state.config.places();

        for rider in state.riders.iter_mut() {
            rider.clear_derived();
            if rider.comment().is_out() {
                rider.set_placing(Placing::Out(rider.comment()));
            }
        }

        // per category time lists, in category order
        let order = state.category_order();
        let mut lists: Vec<Vec<(Tod, Bib)>> = vec![Vec::new(); order.len()];
        for rider in state.riders.iter() {
            if rider.comment().is_out() || rider.finish().is_none() {
                continue;
            }
            let Some(elapsed) = rider.elapsed(precision) else {
                tracing::error!(bib = %rider.bib(), "no start time for finished rider");
                continue;
            };
            let cat = state.rider_category(rider);
            let slot = order.iter().position(|c| *c == cat).unwrap_or(order.len() - 1);
            lists[slot].push((elapsed, rider.bib().clone()));
        }

        let mut ranked_bibs = Vec::new();
        let mut places = Vec::new();
        for (cat, list) in order.iter().zip(lists) {
            let ranked = rank_times(list);
            let limit = ranked.first().and_then(|winner| {
                let expr = ctx
                    .categories
                    .category_info(cat)
                    .and_then(|c| c.time_limit.clone())
                    .or_else(|| state.config.time_limit.clone())?;
                let limit = decode_limit(&expr, Some(winner.time))?;
                tracing::info!(category = %cat, limit = %limit.rawtime(0), "time limit");
                Some(limit)
            });
            for entry in &ranked {
                let placing = match limit {
                    Some(limit) if entry.time > limit => Placing::Out(Comment::Otl),
                    _ => Placing::Place(entry.place),
                };
                if let Some(rider) = state.riders.get_mut(entry.key.as_str()) {
                    rider.set_placing(placing);
                }
                ranked_bibs.push((entry.key.clone(), entry.time));
            }
            let within: Vec<_> = ranked
                .into_iter()
                .filter(|entry| limit.is_none_or(|limit| entry.time <= limit))
                .collect();
            if !within.is_empty() {
                places.push(places_string(&within));
            }
        }
        state.places = places.join(" ");

        let config = state.config.clone();
        for rider in state.riders.iter_mut() {
            if !matches!(rider.placing(), Placing::Out(_)) {
                rider.set_eta(eta(rider, &config, precision));
            }
        }

        let tally = assign_contests(state);
        let status = race_status(state);

        let mut standings = Vec::with_capacity(state.riders.len());
        for (bib, time) in &ranked_bibs {
            if let Some(rider) = state.riders.get(bib.as_str()) {
                standings.push(standing(state, rider, Some(*time)));
            }
        }
        let mut rest: Vec<&Rider> = state
            .riders
            .iter()
            .filter(|r| !ranked_bibs.iter().any(|(bib, _)| bib == r.bib()))
            .collect();
        rest.sort_by_key(|r| r.placing().rank_key());
        for rider in rest {
            standings.push(standing(state, rider, None));
        }
        fill_down_times(&mut standings);

        tracing::debug!(
            status = %status,
            riders = standings.len(),
            "recalculated individual results"
        );
        Results {
            status,
            places: state.places.clone(),
            standings,
            teams: Vec::new(),
            tally,
        }
    }
}

/// Projected elapsed time for a rider on course, from their farthest split.
///
/// A finished rider's ETA is their elapsed time.
pub(crate) fn eta(rider: &Rider, config: &TimingConfig, precision: u8) -> Option<Tod> {
    if let Some(elapsed) = rider.elapsed(precision) {
        return Some(elapsed);
    }
    let total_m = config.distance? * 1000.0;
    let start = rider.start_reference()?;
    SplitPoint::ALL.iter().rev().find_map(|point| {
        let split_m = config.splits.get(point)?.distance? * 1000.0;
        let elapsed = rider.split(*point)? - start;
        if elapsed <= Tod::ZERO {
            return None;
        }
        let speed = split_m / elapsed.as_seconds();
        Tod::from_secs_f64(total_m / speed)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SplitSchema;

    fn t(s: &str) -> Tod {
        s.parse().unwrap()
    }

    #[test]
    fn eta_projects_from_farthest_split() {
        let mut config = TimingConfig {
            distance: Some(40.0),
            ..TimingConfig::default()
        };
        for (point, km) in [(SplitPoint::A, 10.0), (SplitPoint::B, 20.0)] {
            config.splits.insert(
                point,
                SplitSchema {
                    distance: Some(km),
                    ..SplitSchema::default()
                },
            );
        }
        let mut rider = Rider::new(Bib::new("1").unwrap()).with_wall_start(t("10:00:00"));
        rider.set_split(SplitPoint::A, Some(t("10:12:00")));
        rider.set_split(SplitPoint::B, Some(t("10:25:00")));
        // 20km in 25:00 projects 40km in 50:00
        assert_eq!(eta(&rider, &config, 1), Some(t("50:00")));
    }

    #[test]
    fn eta_without_splits_or_distance() {
        let config = TimingConfig::default();
        let rider = Rider::new(Bib::new("1").unwrap()).with_wall_start(t("10:00:00"));
        assert_eq!(eta(&rider, &config, 1), None);
    }
}
