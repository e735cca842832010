//! Live passing ingestion.
//!
//! A reader thread parses JSON-lines passings and hands them to the event
//! loop over a channel. The loop applies each passing as it arrives; results
//! are recalculated through [`SharedEvent`], and a pending recalculation is
//! picked up on the next idle tick. Announcements are written out as JSON
//! lines and the event is saved once input ends.

use std::io::{BufRead, Write};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread;
use std::time::Duration;

use anyhow::{Context as _, Result, anyhow};
use tt_core::{
    Announcement, ChannelSink, Context, MemoryDirectory, Outcome, Passing, SharedEvent, Tod,
};
use tt_store::EventStore;

use super::load_event;

/// Counts for one ingest run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestSummary {
    /// Passings applied to the event.
    pub accepted: usize,
    /// Passings the classifier ignored.
    pub ignored: usize,
    /// Input lines that were not valid passings.
    pub malformed: usize,
}

impl IngestSummary {
    fn record(&mut self, outcome: &Outcome) {
        if matches!(outcome, Outcome::Ignored(_)) {
            self.ignored += 1;
        } else {
            self.accepted += 1;
        }
    }
}

pub fn run<R, W>(
    input: R,
    writer: &mut W,
    store: &EventStore,
    directory: &MemoryDirectory,
    idle: Duration,
) -> Result<IngestSummary>
where
    R: BufRead + Send + 'static,
    W: Write,
{
    let event = SharedEvent::new(load_event(store)?);
    let (announce_tx, announcements) = mpsc::channel();
    let sink = ChannelSink::new(announce_tx);
    let ctx = Context::from_directory(directory, &sink);

    // derived state is not stored
    event.request_recalc(&ctx);
    write_announcements(writer, &announcements)?;

    let (tx, passings) = mpsc::channel();
    let reader = thread::spawn(move || read_passings(input, &tx));

    let mut summary = IngestSummary::default();
    loop {
        match passings.recv_timeout(idle) {
            Ok(passing) => {
                let outcome = event.ingest(&ctx, &passing);
                tracing::debug!(passing = %passing.describe(), ?outcome, "applied passing");
                summary.record(&outcome);
            }
            Err(RecvTimeoutError::Timeout) => event.tick(&ctx, Tod::now()),
            Err(RecvTimeoutError::Disconnected) => break,
        }
        write_announcements(writer, &announcements)?;
    }

    let reader = reader.join();
    if event.is_dirty() {
        event.request_recalc(&ctx);
        write_announcements(writer, &announcements)?;
    }

    // passings applied so far are kept even if the reader died
    store
        .save(&event.into_inner())
        .with_context(|| format!("failed to save {}", store.path().display()))?;
    summary.malformed =
        reader.map_err(|_| anyhow!("passing reader thread panicked, input was cut short"))?;
    tracing::info!(
        accepted = summary.accepted,
        ignored = summary.ignored,
        malformed = summary.malformed,
        "ingest complete"
    );
    Ok(summary)
}

/// Forwards parsed passings until input ends. Returns the number of lines
/// skipped as malformed.
fn read_passings<R: BufRead>(input: R, tx: &Sender<Passing>) -> usize {
    let mut malformed = 0;
    for (idx, line) in input.lines().enumerate() {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                tracing::warn!(error = %e, "failed to read input, stopping");
                break;
            }
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str::<Passing>(line) {
            Ok(passing) => {
                if tx.send(passing).is_err() {
                    break;
                }
            }
            Err(e) => {
                tracing::warn!(line = idx + 1, error = %e, "skipping malformed passing");
                malformed += 1;
            }
        }
    }
    malformed
}

fn write_announcements<W: Write>(writer: &mut W, rx: &Receiver<Announcement>) -> Result<()> {
    for announcement in rx.try_iter() {
        writeln!(writer, "{}", serde_json::to_string(&announcement)?)?;
    }
    Ok(())
}
