//! Timing and results engine for road time trials.
//!
//! This crate contains the fundamental types and logic for:
//! - Passings: raw timing signals and the start/finish audit stores
//! - Classification: deciding what one passing means for one rider
//! - Recalculation: elapsed and team bunch times, rankings, time limits
//! - Contests: points, bonuses and countbacks from places strings
//!
//! Nothing here performs I/O. Rider lookups and live announcements are
//! supplied by the caller through [`Context`].

pub mod announce;
pub mod classifier;
pub mod config;
pub mod contest;
pub mod directory;
pub mod event;
pub mod passing;
pub mod recalc;
pub mod rider;
pub mod tod;
pub mod types;

pub use announce::{AnnounceSink, Announcement, ChannelSink, NullSink};
pub use classifier::{Line, Outcome, Rejection, classify};
pub use config::{
    Category, Contest, EventKind, Intermediate, PlacesSource, SplitSchema, TimingConfig,
};
pub use contest::{Countback, Tally, TallyStanding};
pub use directory::{CategoryDirectory, MemoryDirectory, RiderDirectory, RiderEntry, TeamEntry};
pub use event::{
    Context, EventState, RaceStatus, Results, SharedEvent, Standing, TeamStanding, TimerState,
};
pub use passing::{FinishMatch, Passing, PassingStore};
pub use recalc::{IndividualScoring, Scoring, TeamScoring, decode_limit, rank_times};
pub use rider::{Placing, Rider, RiderSet, SeenInsert};
pub use tod::{Tod, TodParseError};
pub use types::{Bib, Comment, SplitPoint, ValidationError};
