use std::sync::Arc;
use std::sync::atomic::{AtomicI64, AtomicU8, AtomicU64, Ordering};

use looper_arena::{Pool, SampleAllocator};
use looper_transport::{Clock, FinishedTrack, Moment, Track};

use crate::target::{ActiveTargetCell, RecycleTarget, SampleTarget, TargetKind, TrackTarget};

/// Round a recording's elapsed length up to a musically meaningful loop
/// length: 1 beat, 2 beats, or the next multiple of 4. A tail under 5% of a
/// beat rounds down instead, so an almost-exact stop does not drag a whole
/// extra beat behind it. The thresholds are user-perceptible tuning
/// constants.
pub fn quantized_stop_beats(elapsed_beats: f64) -> u64 {
    let whole = elapsed_beats.floor() as u64;
    let tail = elapsed_beats - elapsed_beats.floor();
    let beats = if tail < 0.05 && whole > 0 {
        whole
    } else {
        whole + 1
    };
    match beats {
        0 | 1 => 1,
        2 => 2,
        b => b.div_ceil(4) * 4,
    }
}

enum RecorderState {
    Idle,
    Recording {
        track: Track,
        start_beat: u64,
    },
    StoppingBy {
        track: Track,
        start_beat: u64,
        beats: u64,
        /// Element count at which the loop is full.
        target_len: usize,
    },
}

const STATE_IDLE: u8 = 0;
const STATE_RECORDING: u8 = 1;
const STATE_STOPPING: u8 = 2;
const NO_START_BEAT: i64 = -1;

/// Recorder state shared with whoever is polling from the control side.
/// Beat counts are recomputed from the live track length every callback, so an
/// asynchronous observer never sees a value from before a stop.
#[derive(Clone)]
pub struct RecorderProbe {
    state: Arc<AtomicU8>,
    beat_count: Arc<AtomicU64>,
    start_beat: Arc<AtomicI64>,
}

impl RecorderProbe {
    pub fn new() -> Self {
        Self {
            state: Arc::new(AtomicU8::new(STATE_IDLE)),
            beat_count: Arc::new(AtomicU64::new(0)),
            start_beat: Arc::new(AtomicI64::new(NO_START_BEAT)),
        }
    }

    pub fn is_recording(&self) -> bool {
        self.state.load(Ordering::Acquire) != STATE_IDLE
    }

    /// Complete beats recorded so far on the live track.
    pub fn beat_count(&self) -> u64 {
        self.beat_count.load(Ordering::Acquire)
    }

    /// The beat the current recording started on, if one is in flight.
    pub fn start_beat(&self) -> Option<u64> {
        match self.start_beat.load(Ordering::Acquire) {
            NO_START_BEAT => None,
            beat => Some(beat as u64),
        }
    }

    fn publish(&self, state: u8, beat_count: u64, start_beat: Option<u64>) {
        self.state.store(state, Ordering::Release);
        self.beat_count.store(beat_count, Ordering::Release);
        self.start_beat.store(
            start_beat.map_or(NO_START_BEAT, |b| b as i64),
            Ordering::Release,
        );
    }
}

impl Default for RecorderProbe {
    fn default() -> Self {
        Self::new()
    }
}

/// Per-channel recording state machine.
///
/// Idle -> Recording -> StoppingBy(target) -> Idle. Stray commands (start
/// while busy, stop while idle) are expected races between control gestures
/// and are no-ops. There is no mid-recording cancellation; the only exits are
/// "never started" and "reached the quantized stop".
pub struct ChannelRecorder {
    channel: usize,
    state: RecorderState,
    recycle: RecycleTarget,
    /// This channel's private carving cursor. Each recorder owns one so
    /// simultaneous recordings on different channels never interleave their
    /// samples within a chunk.
    allocator: SampleAllocator,
    active: ActiveTargetCell,
    probe: RecorderProbe,
    preroll_elements: usize,
}

impl ChannelRecorder {
    pub fn new(channel: usize, pool: &Pool, preroll_elements: usize) -> Self {
        Self {
            channel,
            state: RecorderState::Idle,
            recycle: RecycleTarget::new(pool),
            allocator: SampleAllocator::new(),
            active: ActiveTargetCell::new(),
            probe: RecorderProbe::new(),
            preroll_elements,
        }
    }

    pub fn channel(&self) -> usize {
        self.channel
    }

    pub fn probe(&self) -> RecorderProbe {
        self.probe.clone()
    }

    /// Begin recording into `track`, seeded with pre-roll. No-op unless Idle.
    pub fn start(&mut self, mut track: Track, at: Moment, pool: &Pool) {
        if !matches!(self.state, RecorderState::Idle) {
            return;
        }

        let mut target = TrackTarget::new(pool, &mut self.allocator, &mut track);
        self.recycle
            .splice_tail_into(self.preroll_elements, pool, &mut target);
        // The spliced chunks now belong to the track; recycle starts over.
        self.recycle.reseed(pool);

        let start_beat = at.complete_beats();
        self.state = RecorderState::Recording { track, start_beat };
        self.active.set(TargetKind::Track);
        self.probe
            .publish(STATE_RECORDING, 0, Some(start_beat));
    }

    /// Fix the stop point at the rounded beat boundary. No-op unless Recording.
    pub fn request_stop(&mut self, clock: &Clock) {
        if !matches!(self.state, RecorderState::Recording { .. }) {
            return;
        }
        let RecorderState::Recording { track, start_beat } =
            std::mem::replace(&mut self.state, RecorderState::Idle)
        else {
            unreachable!()
        };

        let timepoints_per_beat = clock.timepoints_per_beat();
        let elapsed_beats = track.total_length() as f64 / timepoints_per_beat as f64;
        let beats = quantized_stop_beats(elapsed_beats);
        let target_len = (beats * timepoints_per_beat) as usize;

        self.state = RecorderState::StoppingBy {
            track,
            start_beat,
            beats,
            target_len,
        };
    }

    /// Route one buffer of this channel's captured elements through the
    /// currently active target.
    pub fn push(&mut self, input: &[f32], pool: &Pool) {
        match self.active.get() {
            TargetKind::Recycle => self.recycle.push(input),
            TargetKind::Track => match &mut self.state {
                RecorderState::Recording { track, .. }
                | RecorderState::StoppingBy { track, .. } => {
                    TrackTarget::new(pool, &mut self.allocator, track).push(input);
                }
                // A start raced a stop inside one callback; the buffer goes to
                // history instead.
                RecorderState::Idle => self.recycle.push(input),
            },
        }
    }

    /// Per-callback bookkeeping: refresh observer counters and, once a
    /// stopping track has reached its threshold, close it out.
    pub fn update(&mut self, clock: &Clock) -> Option<FinishedTrack> {
        let timepoints_per_beat = clock.timepoints_per_beat().max(1);

        let reached_threshold = matches!(
            &self.state,
            RecorderState::StoppingBy { track, target_len, .. }
                if track.total_length() >= *target_len
        );
        if reached_threshold {
            let RecorderState::StoppingBy {
                mut track,
                start_beat,
                beats,
                target_len,
            } = std::mem::replace(&mut self.state, RecorderState::Idle)
            else {
                unreachable!()
            };

            // The boundary is only checked once per callback, so the track
            // overran it by up to one buffer. Trim the excess and tell the
            // player how late it is starting.
            let overrun = track.total_length() - target_len;
            if overrun > 0 {
                track.trim_from_end(overrun);
            }
            self.active.set(TargetKind::Recycle);
            // Later recordings carve from a fresh chunk.
            self.allocator.end_chunk();
            self.probe.publish(STATE_IDLE, 0, None);

            return Some(FinishedTrack {
                track,
                skip: overrun,
                start_beat,
                beats,
            });
        }

        match &self.state {
            RecorderState::Idle => {}
            RecorderState::Recording { track, start_beat } => {
                self.probe.publish(
                    STATE_RECORDING,
                    track.total_length() as u64 / timepoints_per_beat,
                    Some(*start_beat),
                );
            }
            RecorderState::StoppingBy {
                track, start_beat, ..
            } => {
                self.probe.publish(
                    STATE_STOPPING,
                    track.total_length() as u64 / timepoints_per_beat,
                    Some(*start_beat),
                );
            }
        }
        None
    }
}
