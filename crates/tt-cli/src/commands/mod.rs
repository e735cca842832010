//! CLI subcommand implementations.

pub mod finish;
pub mod ingest;
pub mod init;
pub mod mark;
pub mod places;
pub mod results;
pub mod start;
pub mod status;

use anyhow::{Context as _, Result};
use tt_core::{Category, EventState, MemoryDirectory, RiderEntry, TeamEntry};
use tt_store::{EventStore, load_directory};

use crate::Config;

/// Loads the event document, failing with a hint when there is none.
pub fn load_event(store: &EventStore) -> Result<EventState> {
    if !store.exists() {
        anyhow::bail!(
            "no event at {}; run `tt init` first",
            store.path().display()
        );
    }
    store
        .load()
        .with_context(|| format!("failed to load {}", store.path().display()))
}

/// The rider directory for an event: the configured directory file, or one
/// rebuilt from the event's own start list.
pub fn directory_for(config: &Config, state: &EventState) -> Result<MemoryDirectory> {
    match &config.riders_path {
        Some(path) => load_directory(path)
            .with_context(|| format!("failed to load riders from {}", path.display())),
        None => Ok(start_list_directory(state)),
    }
}

fn start_list_directory(state: &EventState) -> MemoryDirectory {
    let mut directory = MemoryDirectory::new();
    for rider in state.riders().iter() {
        directory.riders.push(RiderEntry {
            series: state.series.clone(),
            category: rider.category().to_string(),
            team: rider.team().to_string(),
            first_name: rider.name().to_string(),
            refid: rider.refid().to_string(),
            wall_start: rider.wall_start(),
            ..RiderEntry::new(rider.bib().clone())
        });
        if !rider.team().is_empty() && !directory.teams.iter().any(|t| t.code == rider.team()) {
            directory.teams.push(TeamEntry {
                code: rider.team().to_string(),
                name: String::new(),
                start_offset: Some(rider.start_offset()),
            });
        }
    }
    directory.categories = state.categories.iter().map(Category::new).collect();
    directory
}

#[cfg(test)]
pub(crate) mod fixtures {
    //! Shared helpers for command tests.

    use std::path::Path;

    use tt_core::{Bib, EventKind, EventState, Rider, Tod};
    use tt_store::EventStore;

    pub fn t(s: &str) -> Tod {
        s.parse().unwrap()
    }

    pub fn rider(number: &str, name: &str, category: &str) -> Rider {
        Rider::new(Bib::new(number).unwrap())
            .with_name(name)
            .with_category(category)
            .with_refid(format!("10{number}"))
    }

    /// Three riders in category A, started a minute apart from 10:00.
    pub fn individual_event() -> EventState {
        let mut state = EventState::new(EventKind::Individual);
        state.categories = vec!["A".to_string()];
        for (idx, (bib, name)) in [("1", "Ann LEE"), ("2", "Bea KING"), ("3", "Cat MOSS")]
            .into_iter()
            .enumerate()
        {
            let wall = Tod::from_secs(36_000 + 60 * i64::try_from(idx).unwrap());
            state.add_rider(rider(bib, name, "A").with_wall_start(wall));
        }
        state
    }

    pub fn store_with(dir: &Path, state: &EventState) -> EventStore {
        let store = EventStore::new(dir.join("event.json"));
        store.save(state).unwrap();
        store
    }
}
