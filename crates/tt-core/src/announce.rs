//! Live announcement output.
//!
//! Announcements are fire-and-forget: a sink must never block or fail the
//! caller.

use std::sync::mpsc::Sender;

use serde::Serialize;

/// A message for the live scoreboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Announcement {
    /// A rider passing or finishing.
    Rider {
        place: String,
        bib: String,
        name: String,
        category: String,
        time: String,
    },
    /// A rider reaching an intermediate split.
    Split {
        label: String,
        place: String,
        bib: String,
        name: String,
        time: String,
    },
    /// A team's official time.
    TeamTime {
        category: String,
        team: String,
        name: String,
        time: String,
    },
}

/// Receives announcements.
pub trait AnnounceSink {
    fn announce(&self, announcement: Announcement);
}

/// Discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl AnnounceSink for NullSink {
    fn announce(&self, _announcement: Announcement) {}
}

/// Forwards announcements over a channel.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: Sender<Announcement>,
}

impl ChannelSink {
    pub const fn new(tx: Sender<Announcement>) -> Self {
        Self { tx }
    }
}

impl AnnounceSink for ChannelSink {
    fn announce(&self, announcement: Announcement) {
        if self.tx.send(announcement).is_err() {
            tracing::debug!("announce receiver gone");
        }
    }
}
