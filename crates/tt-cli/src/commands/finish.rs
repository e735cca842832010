//! Race finish control.

use std::io::Write;

use anyhow::Result;
use tt_store::EventStore;

use super::load_event;

/// Flags the results final, or with `arm` switches a running team event to
/// treat every passing as a finish.
pub fn run<W: Write>(writer: &mut W, store: &EventStore, arm: bool) -> Result<()> {
    let mut state = load_event(store)?;
    if arm {
        if !state.arm_finish() {
            anyhow::bail!(
                "cannot arm finish: {} event, timer {}",
                state.kind(),
                state.timer()
            );
        }
        writeln!(writer, "Finish armed")?;
    } else {
        state.set_finished();
        writeln!(writer, "Results flagged final")?;
    }
    store.save(&state)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use insta::assert_snapshot;
    use tt_core::{EventKind, EventState, TimerState};

    use super::super::fixtures::{individual_event, store_with, t};
    use super::*;

    #[test]
    fn finish_flags_event_final() {
        let temp = tempfile::tempdir().unwrap();
        let store = store_with(temp.path(), &individual_event());
        let mut output = Vec::new();

        run(&mut output, &store, false).unwrap();

        assert_snapshot!(String::from_utf8(output).unwrap(), @"Results flagged final");
        assert!(store.load().unwrap().is_finished());
    }

    #[test]
    fn arm_finish_needs_running_team_event() {
        let temp = tempfile::tempdir().unwrap();
        let store = store_with(temp.path(), &individual_event());
        let err = run(&mut Vec::new(), &store, true).unwrap_err();
        assert_snapshot!(err.to_string(), @"cannot arm finish: individual event, timer idle");

        let mut team = EventState::new(EventKind::Team);
        team.set_start(t("10:00:00"));
        let store = store_with(temp.path(), &team);
        run(&mut Vec::new(), &store, true).unwrap();
        assert_eq!(store.load().unwrap().timer(), TimerState::ArmFinish);
    }
}
