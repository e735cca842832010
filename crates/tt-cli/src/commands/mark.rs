//! Rider status codes.

use std::io::Write;

use anyhow::Result;
use tt_core::Comment;
use tt_store::EventStore;

use super::load_event;

/// Sets `code` on each rider, or returns them to the race for `ok`.
pub fn run<W: Write>(
    writer: &mut W,
    store: &EventStore,
    code: &str,
    bibs: &[String],
) -> Result<()> {
    let mut state = load_event(store)?;
    let bibs = bibs.iter().map(String::as_str);
    let (changed, label) = if code.eq_ignore_ascii_case("ok") {
        (state.return_riders(bibs), "ok".to_string())
    } else {
        let code: Comment = code.parse()?;
        if code == Comment::None {
            anyhow::bail!("empty status code; use `ok` to return riders to the race");
        }
        (state.dnf_riders(bibs, code), code.to_string())
    };
    store.save(&state)?;

    writeln!(writer, "Marked {changed} riders {label}")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use insta::assert_snapshot;
    use tt_core::EventKind;

    use super::super::fixtures::{rider, store_with};
    use super::*;

    fn args(values: &[&str]) -> Vec<String> {
        values.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn mark_takes_team_riders_out_and_back() {
        let temp = tempfile::tempdir().unwrap();
        let mut state = tt_core::EventState::new(EventKind::Team);
        state.add_rider(rider("1", "Ann LEE", "").with_team("RED"));
        state.add_rider(rider("2", "Bea KING", "").with_team("RED"));
        let store = store_with(temp.path(), &state);

        let mut output = Vec::new();
        run(&mut output, &store, "DNF", &args(&["1", "2", "7"])).unwrap();
        assert_snapshot!(String::from_utf8(output).unwrap(), @"Marked 2 riders dnf");
        let saved = store.load().unwrap();
        assert_eq!(saved.rider("1").unwrap().comment(), Comment::Dnf);
        assert!(!saved.rider("1").unwrap().in_race());

        let mut output = Vec::new();
        run(&mut output, &store, "ok", &args(&["1"])).unwrap();
        assert_snapshot!(String::from_utf8(output).unwrap(), @"Marked 1 riders ok");
        assert!(store.load().unwrap().rider("1").unwrap().in_race());
    }

    #[test]
    fn mark_rejects_unknown_codes() {
        let temp = tempfile::tempdir().unwrap();
        let store = store_with(temp.path(), &tt_core::EventState::default());
        assert!(run(&mut Vec::new(), &store, "lost", &args(&["1"])).is_err());
        assert!(run(&mut Vec::new(), &store, "", &args(&["1"])).is_err());
    }
}
