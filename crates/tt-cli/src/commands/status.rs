//! Status command for a quick look at the event and timer.

use std::io::Write;

use anyhow::{Context as _, Result};
use tt_core::{Context, MemoryDirectory, NullSink};
use tt_store::EventStore;

pub fn run<W: Write>(
    writer: &mut W,
    store: &EventStore,
    directory: &MemoryDirectory,
) -> Result<()> {
    writeln!(writer, "Time trial status")?;
    writeln!(writer, "Event: {}", store.path().display())?;
    if !store.exists() {
        writeln!(writer, "No event created.")?;
        return Ok(());
    }

    let document = store
        .load_document()
        .with_context(|| format!("failed to load {}", store.path().display()))?;
    let mut state = document.event;
    let ctx = Context::from_directory(directory, &NullSink);
    let results = state.recalculate(&ctx);

    let riders = state.riders();
    let finished = riders.iter().filter(|r| r.finish().is_some()).count();
    let out = riders.iter().filter(|r| r.comment().is_out()).count();

    writeln!(writer, "Kind: {}", state.kind())?;
    writeln!(writer, "Timer: {}", state.timer())?;
    if let Some(start) = state.start() {
        writeln!(writer, "Start: {}", start.rawtime(1))?;
    }
    writeln!(writer, "Results: {}", results.status)?;
    writeln!(
        writer,
        "Riders: {} ({finished} finished, {out} out)",
        riders.len()
    )?;
    if !results.places.is_empty() {
        writeln!(writer, "Places: {}", results.places)?;
    }
    writeln!(
        writer,
        "Passings: {} start, {} finish",
        state.start_passings().len(),
        state.finish_passings().len()
    )?;
    if let Some(saved_at) = document.saved_at {
        writeln!(writer, "Saved: {}", saved_at.format("%Y-%m-%d %H:%M:%S UTC"))?;
    }
    Ok(())
}
