mod clock;
mod config;
mod track;

pub use clock::{Clock, Moment};
pub use config::{ConfigError, SessionConfig};
pub use track::{FinishedTrack, Track, TrackCursor, TrackId};

/// Control-thread -> capture-thread commands. Drained in full at the top of
/// each capture callback, so a command is applied with at most one callback's
/// latency.
#[derive(Debug)]
pub enum Command {
    /// Begin recording on a channel. The empty track is built on the control
    /// thread and travels with the command so the capture callback never
    /// allocates. `at` is the control-thread-visible moment, which fixes the
    /// track's initial beat.
    StartRecording {
        channel: usize,
        track: Track,
        at: Moment,
    },
    /// Finish the channel's recording at the next rounded beat boundary.
    StopRecording { channel: usize },
}

/// Capture-thread -> control-thread notifications, polled once per control
/// tick.
#[derive(Debug)]
pub enum Status {
    TrackComplete {
        channel: usize,
        finished: FinishedTrack,
    },
}
