//! Timing passings and the start/finish passing store.
//!
//! A [`Passing`] is one raw signal from timing hardware: a transponder read,
//! a photocell or switch impulse, or a keyboard trigger. The
//! [`PassingStore`] keeps every accepted start or finish line signal in time
//! order; it is the audit trail searched when matching a transponder read to
//! the impulse that actually timed the rider.

use serde::{Deserialize, Serialize};

use crate::tod::Tod;

/// Transponder id reported by decoders for untagged impulses.
const IMPULSE_REFID: &str = "255";

/// A raw timing signal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Passing {
    /// When the signal occurred.
    pub time: Tod,

    /// Source channel as reported by the device (e.g. `"C1"`, `"C2M"`).
    #[serde(default)]
    pub chan: String,

    /// Transponder id, empty for untagged triggers.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub refid: String,

    /// Identifier of the device that produced the signal.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub source: String,
}

impl Passing {
    /// An untagged trigger on the given channel.
    pub fn trigger(time: Tod, chan: impl Into<String>) -> Self {
        Self {
            time,
            chan: chan.into(),
            refid: String::new(),
            source: String::new(),
        }
    }

    /// A transponder passing on the given channel.
    pub fn tagged(time: Tod, chan: impl Into<String>, refid: impl Into<String>) -> Self {
        Self {
            time,
            chan: chan.into(),
            refid: refid.into(),
            source: String::new(),
        }
    }

    /// Sets the reporting device id.
    #[must_use]
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }

    /// True for manual, photocell and chronometer impulses with no rider tag.
    pub fn is_trigger(&self) -> bool {
        self.refid.is_empty() || self.refid == IMPULSE_REFID
    }

    /// Numeric channel id, or `None` when the channel string is not a channel.
    ///
    /// Accepts `"1"`, `"C1"` and the decoder's manual-flagged `"C1M"`.
    pub fn channel(&self) -> Option<u32> {
        let chan = self.chan.trim().to_ascii_uppercase();
        let chan = chan.trim_end_matches('M').trim_start_matches('C');
        if chan.is_empty() || !chan.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        chan.parse().ok()
    }

    /// Short description for log lines: `refid:chan@time/source`.
    pub fn describe(&self) -> String {
        format!(
            "{}:{}@{}/{}",
            self.refid,
            self.chan,
            self.time.rawtime(2),
            self.source
        )
    }
}

/// Result of searching the finish store for the impulse behind a passing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FinishMatch {
    /// The impulse nearest the passing, if any fell inside the window.
    pub time: Option<Tod>,
    /// How many impulses fell inside the window.
    pub candidates: usize,
}

impl FinishMatch {
    /// More than two impulses in the window: wheels likely overlapped.
    pub const fn is_ambiguous(&self) -> bool {
        self.candidates > 2
    }
}

/// Time-ordered multiset of start or finish line passings.
///
/// Insertion keeps the store sorted with equal times in arrival order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<Passing>", into = "Vec<Passing>")]
pub struct PassingStore {
    passings: Vec<Passing>,
}

impl PassingStore {
    pub const fn new() -> Self {
        Self {
            passings: Vec::new(),
        }
    }

    /// Inserts a passing after any existing passing with the same time.
    pub fn insert(&mut self, passing: Passing) {
        let pos = self.passings.partition_point(|p| p.time <= passing.time);
        self.passings.insert(pos, passing);
    }

    pub fn clear(&mut self) {
        self.passings.clear();
    }

    pub fn len(&self) -> usize {
        self.passings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.passings.is_empty()
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &Passing> {
        self.passings.iter()
    }

    /// Untagged impulses, oldest first.
    fn impulses(&self) -> impl DoubleEndedIterator<Item = &Passing> {
        self.passings.iter().filter(|p| p.is_trigger())
    }

    /// Finds the start impulse that preceded a start loop passing at `at`.
    ///
    /// The start loop sits after the start switch, so only impulses strictly
    /// before `at` and less than `window` earlier are considered. Of those the
    /// earliest is taken: it is the moment the rider left the gate.
    pub fn start_match(&self, at: Tod, window: Tod) -> Option<Tod> {
        let mut found = None;
        for p in self.impulses().rev() {
            if p.time >= at {
                continue;
            }
            if at - p.time < window {
                found = Some(p.time);
            } else {
                break;
            }
        }
        found
    }

    /// Finds the finish impulse nearest a finish loop passing at `at`.
    ///
    /// Impulses on either side of `at` strictly within `window` are candidates.
    /// The nearest wins; on equal distance the earlier impulse wins.
    pub fn finish_match(&self, at: Tod, window: Tod) -> FinishMatch {
        let mut best: Option<(Tod, Tod)> = None;
        let mut candidates = 0;
        for p in self.impulses().rev() {
            let offset = (at - p.time).abs();
            if p.time < at && offset >= window {
                break;
            }
            if offset < window {
                candidates += 1;
                if best.is_none_or(|(d, _)| offset <= d) {
                    best = Some((offset, p.time));
                }
            }
        }
        FinishMatch {
            time: best.map(|(_, t)| t),
            candidates,
        }
    }
}

impl From<Vec<Passing>> for PassingStore {
    fn from(mut passings: Vec<Passing>) -> Self {
        passings.sort_by_key(|p| p.time);
        Self { passings }
    }
}

impl From<PassingStore> for Vec<Passing> {
    fn from(store: PassingStore) -> Self {
        store.passings
    }
}
