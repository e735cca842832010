//! Creates a new event document.

use std::io::Write;

use anyhow::{Context as _, Result};
use tt_core::{Context, EventKind, EventState, MemoryDirectory, NullSink};
use tt_store::EventStore;

/// Writes a fresh event, entering every rider of `directory`.
pub fn run<W: Write>(
    writer: &mut W,
    store: &EventStore,
    kind: EventKind,
    directory: Option<&MemoryDirectory>,
    force: bool,
) -> Result<()> {
    if store.exists() && !force {
        anyhow::bail!(
            "an event already exists at {}; use --force to replace it",
            store.path().display()
        );
    }

    let mut state = EventState::new(kind);
    if let Some(directory) = directory {
        state.categories = directory
            .categories
            .iter()
            .map(|c| c.label.to_uppercase())
            .collect();
        let ctx = Context::from_directory(directory, &NullSink);
        for entry in &directory.riders {
            state
                .add_rider_from_directory(&ctx, entry.bib.as_str())
                .with_context(|| format!("failed to enter rider {}", entry.bib))?;
        }
    }

    store
        .save(&state)
        .with_context(|| format!("failed to write {}", store.path().display()))?;
    tracing::info!(kind = %kind, riders = state.riders().len(), "event created");

    writeln!(
        writer,
        "Created {kind} event with {} riders at {}",
        state.riders().len(),
        store.path().display()
    )?;
    Ok(())
}
