//! Team time trial scoring.
//!
//! A team's time is taken on its Nth finishing rider. Riders up to the Nth
//! share that time; later riders keep it unless they were dropped by more
//! than the gap threshold, in which case they get their own.

use std::cmp::Reverse;
use std::collections::HashSet;

use super::{Scoring, assign_contests, race_status, rank_times, standing};
use crate::announce::Announcement;
use crate::config::TimingConfig;
use crate::contest::{PLACEHOLDER, place_groups};
use crate::event::{Context, EventState, Results, TeamStanding};
use crate::rider::{Placing, Rider};
use crate::tod::Tod;

/// Ranks teams on the Nth wheel time and riders on the manual finish order.
#[derive(Debug, Clone, Copy, Default)]
pub struct TeamScoring;

impl Scoring for TeamScoring {
    fn recalculate(&self, state: &mut EventState, ctx: &Context<'_>) -> Results {
        let Some(start) = state.start() else {
            tracing::debug!("no race start, team recalculation skipped");
            return unstarted(state);
        };
        let precision = state.config.places();

        for rider in state.riders.iter_mut() {
            rider.clear_derived();
            if !rider.in_race() && rider.comment().is_out() {
                rider.set_placing(Placing::Out(rider.comment()));
            }
        }
        assign_finish(state);
        let tally = assign_contests(state);

        // display order: by team, then in-race, rank, laps and arrival
        let mut order: Vec<(usize, &Rider)> = state.riders.iter().enumerate().collect();
        order.sort_by_key(|&(idx, r)| {
            let arrival = r.finish().filter(|_| r.in_race()).unwrap_or(Tod::MAX);
            (
                r.start_offset(),
                r.team().to_string(),
                !r.in_race(),
                r.placing().rank_key(),
                Reverse(r.laps()),
                arrival,
                idx,
            )
        });
        let order: Vec<String> = order
            .into_iter()
            .map(|(_, r)| r.bib().as_str().to_string())
            .collect();

        let teams = team_arrivals(state, &order);
        let mut team_times = Vec::new();
        for (team, arrivals) in &teams {
            let category = order
                .iter()
                .filter_map(|bib| state.riders.get(bib))
                .find(|r| r.team() == team)
                .map(|r| state.rider_category(r))
                .unwrap_or_default();
            let nth = ctx
                .categories
                .category_info(&category)
                .and_then(|c| c.nth_wheel)
                .unwrap_or(state.config.nth_wheel)
                .max(1);
            if arrivals.len() < nth {
                team_times.push((team.clone(), category, None));
                continue;
            }

            let elapsed: Vec<Tod> = arrivals
                .iter()
                .filter_map(|bib| state.riders.get(bib))
                .filter_map(|r| r.finish().map(|finish| finish - start - r.start_offset()))
                .collect();
            let bunches = bunch_times(&elapsed, nth, precision, &state.config);
            for (bib, bunch) in arrivals.iter().zip(bunches) {
                if let Some(rider) = state.riders.get_mut(bib) {
                    rider.set_computed_bunch(Some(bunch));
                }
            }

            let official = arrivals
                .get(nth - 1)
                .and_then(|bib| state.riders.get(bib))
                .and_then(Rider::computed_bunch);
            if let Some(time) = official {
                announce_team(state, ctx, team, &category, time);
            }
            team_times.push((team.clone(), category, official));
        }

        let teams = rank_teams(state, team_times, &teams);
        let status = race_status(state);
        let standings = order
            .iter()
            .filter_map(|bib| state.riders.get(bib))
            .map(|r| standing(state, r, r.bunch()))
            .collect::<Vec<_>>();

        tracing::debug!(status = %status, teams = teams.len(), "recalculated team results");
        Results {
            status,
            places: state.places.clone(),
            standings,
            teams,
            tally,
        }
    }
}

/// Bunch times for a team's finishers, given their elapsed times in arrival
/// order. Never decreases along the list.
fn bunch_times(elapsed: &[Tod], nth: usize, precision: u8, config: &TimingConfig) -> Vec<Tod> {
    let Some(&nth_time) = elapsed.get(nth - 1) else {
        return Vec::new();
    };
    let mut team_time = nth_time.truncate(precision);
    let mut bunches = vec![team_time; nth];
    let mut previous = nth_time;
    for &et in &elapsed[nth..] {
        if config.own_time && et > previous && et - previous > config.gap {
            team_time = et.truncate(precision);
        }
        bunches.push(team_time);
        previous = et;
    }
    bunches
}

/// Results before the race has a start time.
fn unstarted(state: &EventState) -> Results {
    Results {
        status: race_status(state),
        places: state.places.clone(),
        standings: state
            .riders
            .iter()
            .map(|r| standing(state, r, r.bunch()))
            .collect(),
        teams: Vec::new(),
        tally: assign_contests(state),
    }
}

/// Transfers the manual finish order onto in-race riders.
fn assign_finish(state: &mut EventState) {
    let places = state.places.clone();
    let mut seen = HashSet::new();
    let mut placed = 0;
    for group in place_groups(&places) {
        let place = placed + 1;
        for bib in group {
            if bib == PLACEHOLDER {
                continue;
            }
            if !seen.insert(bib) {
                tracing::warn!(bib, "duplicate rider in finish places");
                continue;
            }
            let Some(rider) = state.riders.get_mut(bib) else {
                tracing::warn!(bib, "unknown rider in finish places");
                continue;
            };
            if rider.in_race() {
                rider.set_placing(Placing::Place(place));
                placed += 1;
            } else {
                tracing::warn!(bib, "out of race rider in finish places");
            }
        }
    }
}

/// In-race finishers of each team in arrival order, teams in display order.
fn team_arrivals(state: &EventState, order: &[String]) -> Vec<(String, Vec<String>)> {
    let mut teams: Vec<(String, Vec<(Tod, String)>)> = Vec::new();
    for bib in order {
        let Some(rider) = state.riders.get(bib) else {
            continue;
        };
        let team = rider.team();
        let idx = match teams.iter().position(|(t, _)| t == team) {
            Some(idx) => idx,
            None => {
                teams.push((team.to_string(), Vec::new()));
                teams.len() - 1
            }
        };
        if let (true, Some(finish)) = (rider.in_race(), rider.finish()) {
            teams[idx].1.push((finish, bib.clone()));
        }
    }
    teams
        .into_iter()
        .map(|(team, mut arrivals)| {
            arrivals.sort_by_key(|(finish, _)| *finish);
            (team, arrivals.into_iter().map(|(_, bib)| bib).collect())
        })
        .collect()
}

fn announce_team(
    state: &mut EventState,
    ctx: &Context<'_>,
    team: &str,
    category: &str,
    time: Tod,
) {
    if !state.announced_teams.insert(team.to_string()) {
        return;
    }
    let name = ctx
        .riders
        .team(team)
        .map(|t| t.name.clone())
        .unwrap_or_default();
    tracing::info!(team, time = %time.rawtime(1), "team time");
    ctx.sink.announce(Announcement::TeamTime {
        category: category.to_string(),
        team: team.to_string(),
        name,
        time: time.rawtime(1),
    });
}

/// Team standings ranked on official time within each category.
fn rank_teams(
    state: &EventState,
    times: Vec<(String, String, Option<Tod>)>,
    arrivals: &[(String, Vec<String>)],
) -> Vec<TeamStanding> {
    let mut standings = Vec::with_capacity(times.len());
    for cat in state.category_order() {
        let in_cat: Vec<&(String, String, Option<Tod>)> =
            times.iter().filter(|(_, c, _)| *c == cat).collect();
        let timed: Vec<(Tod, &str)> = in_cat
            .iter()
            .filter_map(|(team, _, time)| time.map(|t| (t, team.as_str())))
            .collect();
        for entry in rank_times(timed) {
            let placing = Placing::Place(entry.place);
            standings.push(team_standing(entry.key, &cat, Some(entry.time), placing, arrivals));
        }
        for (team, _, _) in in_cat.iter().filter(|(_, _, time)| time.is_none()) {
            standings.push(team_standing(team, &cat, None, Placing::Unplaced, arrivals));
        }
    }
    standings
}

fn team_standing(
    team: &str,
    category: &str,
    time: Option<Tod>,
    placing: Placing,
    arrivals: &[(String, Vec<String>)],
) -> TeamStanding {
    TeamStanding {
        placing,
        team: team.to_string(),
        category: category.to_string(),
        time,
        finishers: arrivals
            .iter()
            .find(|(t, _)| t == team)
            .map(|(_, bibs)| bibs.clone())
            .unwrap_or_default(),
    }
}
