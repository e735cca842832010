//! Standings, team times and tallies.

use std::io::Write;

use anyhow::Result;
use tt_core::{Context, EventKind, EventState, MemoryDirectory, NullSink, Placing, Results, Tod};
use tt_store::EventStore;

use super::load_event;

pub fn run<W: Write>(
    writer: &mut W,
    store: &EventStore,
    directory: &MemoryDirectory,
    json: bool,
) -> Result<()> {
    let mut state = load_event(store)?;
    let ctx = Context::from_directory(directory, &NullSink);
    let results = state.recalculate(&ctx);

    if json {
        writeln!(writer, "{}", serde_json::to_string_pretty(&results)?)?;
    } else {
        render(writer, &state, &results)?;
    }
    Ok(())
}

fn render<W: Write>(writer: &mut W, state: &EventState, results: &Results) -> Result<()> {
    let precision = state.config.places();
    let team_event = state.kind() == EventKind::Team;
    let title = if team_event {
        "Team time trial"
    } else {
        "Individual time trial"
    };
    writeln!(writer, "{title}: {}", results.status)?;

    for line in &results.standings {
        let group = if team_event { &line.team } else { &line.category };
        let row = format!(
            "{:>4} {:>4}  {:<20} {:<6}{:>10}{:>10}",
            place(line.placing),
            line.bib.as_str(),
            line.name,
            group,
            line.time.map(|t| t.rawtime(precision)).unwrap_or_default(),
            down(line.down, precision),
        );
        writeln!(writer, "{}", row.trim_end())?;
    }

    if !results.teams.is_empty() {
        writeln!(writer)?;
        writeln!(writer, "Teams")?;
        for team in &results.teams {
            let row = format!(
                "{:>4} {:<8} {:<6}{:>10}  {}",
                place(team.placing),
                team.team,
                team.category,
                team.time.map(|t| t.rawtime(precision)).unwrap_or_default(),
                team.finishers.join(" "),
            );
            writeln!(writer, "{}", row.trim_end())?;
        }
    }

    for name in &state.tallies {
        let lines = results.tally.standings(name);
        if lines.is_empty() {
            continue;
        }
        writeln!(writer)?;
        writeln!(writer, "Points: {name}")?;
        for (idx, line) in lines.iter().enumerate() {
            let rank = format!("{}.", idx + 1);
            let row = format!(
                "{rank:>4} {:>4} {:>6}  {}",
                line.bib.as_str(),
                line.points,
                line.countback
            );
            writeln!(writer, "{}", row.trim_end())?;
        }
    }

    if !results.tally.bonuses.is_empty() {
        writeln!(writer)?;
        writeln!(writer, "Time bonuses")?;
        for (bib, bonus) in &results.tally.bonuses {
            writeln!(writer, "{:>4}  -{}", bib.as_str(), bonus.rawtime(precision))?;
        }
    }
    Ok(())
}

fn place(placing: Placing) -> String {
    match placing {
        Placing::Place(n) => format!("{n}."),
        other => other.to_string(),
    }
}

fn down(down: Option<Tod>, precision: u8) -> String {
    down.filter(|d| *d > Tod::ZERO)
        .map(|d| format!("+{}", d.rawtime(precision)))
        .unwrap_or_default()
}
