//! Manual places entry for the finish and intermediates.

use std::io::Write;

use anyhow::{Context as _, Result};
use tt_core::PlacesSource;
use tt_store::EventStore;

use super::load_event;

pub fn run<W: Write>(
    writer: &mut W,
    store: &EventStore,
    source: &str,
    places: &[String],
) -> Result<()> {
    let source: PlacesSource = source.parse()?;
    let mut state = load_event(store)?;
    state
        .set_places(&source, &places.join(" "))
        .with_context(|| format!("places for {source} rejected"))?;
    store.save(&state)?;

    let stored = state.places_for(&source).unwrap_or_default();
    writeln!(writer, "{source}: {stored}")?;
    Ok(())
}
