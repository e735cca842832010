//! Race start control.

use std::io::Write;

use anyhow::Result;
use tt_core::Tod;
use tt_store::EventStore;

use super::load_event;

/// Sets the race start, or arms the timer so the next start trigger sets it.
pub fn run<W: Write>(writer: &mut W, store: &EventStore, time: Option<Tod>) -> Result<()> {
    let mut state = load_event(store)?;
    match time {
        Some(time) => {
            state.set_start(time);
            writeln!(writer, "Race start set to {}", time.rawtime(1))?;
        }
        None => {
            if !state.arm_start() {
                anyhow::bail!("timer is {}, cannot arm start", state.timer());
            }
            writeln!(writer, "Start armed, waiting for trigger")?;
        }
    }
    store.save(&state)?;
    Ok(())
}
