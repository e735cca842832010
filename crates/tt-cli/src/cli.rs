//! Command-line argument definitions.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tt_core::{EventKind, Tod};

/// Road time trial timing.
///
/// Classifies decoder passings against the start list and keeps standings,
/// team times and points tallies up to date.
#[derive(Debug, Parser)]
#[command(name = "tt", version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to config file.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Create a new event document.
    Init {
        /// Event kind: individual or team.
        #[arg(long, default_value = "individual")]
        kind: EventKind,

        /// JSON rider directory to load the start list from.
        #[arg(long)]
        riders: Option<PathBuf>,

        /// Replace an existing event document.
        #[arg(long)]
        force: bool,
    },

    /// Read JSON-lines passings from stdin and apply them.
    Ingest {
        /// Milliseconds without input before the event is ticked.
        #[arg(long, default_value_t = 500)]
        idle_ms: u64,
    },

    /// Enter places for the finish or an intermediate.
    Places {
        /// Places source: finish or an intermediate id.
        source: String,

        /// Rider numbers in finishing order; join ties with a hyphen.
        places: Vec<String>,
    },

    /// Set a status code (dns, dnf, dsq, otl, wd) on riders, or `ok` to
    /// return them to the race.
    Mark {
        code: String,

        #[arg(required = true)]
        bibs: Vec<String>,
    },

    /// Set the race start, or arm the timer to start on the next trigger.
    Start {
        /// Start time of day, e.g. 10:00:00.
        time: Option<Tod>,
    },

    /// Flag the results final, or arm the team finish.
    Finish {
        /// Treat every following team passing as a finish.
        #[arg(long)]
        arm: bool,
    },

    /// Show standings and tallies.
    Results {
        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Show event status.
    Status,
}
