use std::sync::Arc;

use looper_arena::Pool;
use looper_transport::{Clock, Command, SessionConfig, Status};

use crate::recorder::{ChannelRecorder, RecorderProbe};

/// Elements of per-channel scratch reserved up front; a hardware block larger
/// than this would be the first allocation on the capture thread.
const SCRATCH_RESERVE: usize = 16_384;

/// The capture side of the engine, driven one interleaved block at a time by
/// the input callback.
///
/// Per block: drain every pending command, advance the clock, de-interleave
/// into per-channel scratch, route each channel through its recorder's active
/// target, then let each recorder settle and ship any finished track back.
/// Commands are therefore applied with at most one callback's latency.
pub struct CaptureStation {
    clock: Arc<Clock>,
    pool: Arc<Pool>,
    recorders: Vec<ChannelRecorder>,
    commands: rtrb::Consumer<Command>,
    statuses: rtrb::Producer<Status>,
    /// Completed tracks that did not fit in the status ring, retried each
    /// block until they ship; a full ring must never lose a recording.
    outbox: Vec<Status>,
    scratch: Vec<Vec<f32>>,
    /// Interleave phase carried across blocks, so a buffer that ends
    /// mid-frame still routes every element to the right channel.
    phase: usize,
}

impl CaptureStation {
    pub fn new(
        config: &SessionConfig,
        clock: Arc<Clock>,
        pool: Arc<Pool>,
        commands: rtrb::Consumer<Command>,
        statuses: rtrb::Producer<Status>,
    ) -> Self {
        let channels = config.channels as usize;
        let recorders = (0..channels)
            .map(|channel| ChannelRecorder::new(channel, &pool, config.preroll_elements))
            .collect();
        let scratch = (0..channels)
            .map(|_| Vec::with_capacity(SCRATCH_RESERVE))
            .collect();
        Self {
            clock,
            pool,
            recorders,
            commands,
            statuses,
            outbox: Vec::with_capacity(channels),
            scratch,
            phase: 0,
        }
    }

    pub fn probes(&self) -> Vec<RecorderProbe> {
        self.recorders.iter().map(ChannelRecorder::probe).collect()
    }

    /// Process one hardware buffer of interleaved captured elements. The
    /// buffer may end mid-frame; it must be fully consumed before returning,
    /// since the driver reuses it.
    pub fn process_block(&mut self, interleaved: &[f32]) {
        let channels = self.recorders.len();

        while !self.outbox.is_empty() {
            let status = self.outbox.remove(0);
            if let Err(rtrb::PushError::Full(status)) = self.statuses.push(status) {
                self.outbox.insert(0, status);
                break;
            }
        }

        while let Ok(command) = self.commands.pop() {
            match command {
                Command::StartRecording { channel, track, at } => {
                    debug_assert!(channel < channels, "start for unknown channel {channel}");
                    if let Some(recorder) = self.recorders.get_mut(channel) {
                        recorder.start(track, at, &self.pool);
                    }
                }
                Command::StopRecording { channel } => {
                    debug_assert!(channel < channels, "stop for unknown channel {channel}");
                    if let Some(recorder) = self.recorders.get_mut(channel) {
                        recorder.request_stop(&self.clock);
                    }
                }
            }
        }

        self.clock.advance(interleaved.len());

        for scratch in &mut self.scratch {
            scratch.clear();
        }
        for (i, &value) in interleaved.iter().enumerate() {
            self.scratch[(self.phase + i) % channels].push(value);
        }
        self.phase = (self.phase + interleaved.len()) % channels;

        for (recorder, scratch) in self.recorders.iter_mut().zip(&self.scratch) {
            recorder.push(scratch, &self.pool);
        }

        for recorder in &mut self.recorders {
            if let Some(finished) = recorder.update(&self.clock) {
                let status = Status::TrackComplete {
                    channel: recorder.channel(),
                    finished,
                };
                // The outbox preserves completion order when the ring backs up.
                if self.outbox.is_empty() {
                    if let Err(rtrb::PushError::Full(status)) = self.statuses.push(status) {
                        self.outbox.push(status);
                    }
                } else {
                    self.outbox.push(status);
                }
            }
        }
    }
}
