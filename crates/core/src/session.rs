use std::path::Path;

use basedrop::Shared;
use looper_engine::{EngineHandle, PlayerCommand};
use looper_transport::{Command, FinishedTrack, Moment, SessionConfig, Status, Track, TrackId};

/// Control-surface facade over the running engine.
///
/// All methods are fire-and-forget against the audio threads: commands ride
/// the ring buffers, results come back through `poll`-driven queues and the
/// recorders' shared atomics. A command issued while the channel is already
/// in the requested state is silently ignored on the audio side.
pub struct Session {
    engine: EngineHandle,
    config: SessionConfig,
    /// Most recent finished-but-unclaimed track per channel.
    completed: Vec<Option<FinishedTrack>>,
    next_track_id: u64,
}

impl Session {
    pub fn start(config: SessionConfig) -> anyhow::Result<Self> {
        let engine = looper_engine::start(config)?;
        let completed = (0..config.channels as usize).map(|_| None).collect();
        Ok(Self {
            engine,
            config,
            completed,
            next_track_id: 1,
        })
    }

    pub fn from_config_file(path: &Path) -> anyhow::Result<Self> {
        Self::start(crate::load_config(path)?)
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn now(&self) -> Moment {
        self.engine.clock.now()
    }

    pub fn tempo(&self) -> f64 {
        self.engine.clock.tempo()
    }

    /// Change tempo. Meaningful only while no loops exist; the beat grid of
    /// anything already recorded does not follow.
    pub fn set_tempo(&mut self, tempo: f64) {
        self.engine.clock.set_tempo(tempo);
    }

    /// Ask a channel to start recording. The loop will be seeded with
    /// pre-roll, so it sounds like it started when the performer intended.
    pub fn start_recording(&mut self, channel: usize) -> TrackId {
        let id = TrackId(self.next_track_id);
        self.next_track_id += 1;
        let _ = self.engine.commands.push(Command::StartRecording {
            channel,
            track: Track::new(id),
            at: self.engine.clock.now(),
        });
        id
    }

    /// Ask a channel to finish its recording at the next rounded beat
    /// boundary.
    pub fn stop_recording(&mut self, channel: usize) {
        let _ = self.engine.commands.push(Command::StopRecording { channel });
    }

    /// Drain engine notifications and let the collector reclaim anything the
    /// audio threads released. Call once per control tick.
    pub fn poll(&mut self) {
        while let Ok(status) = self.engine.statuses.pop() {
            match status {
                Status::TrackComplete { channel, finished } => {
                    if let Some(slot) = self.completed.get_mut(channel) {
                        *slot = Some(finished);
                    }
                }
            }
        }
        self.engine.collector.collect();
    }

    pub fn try_take_completed_track(&mut self, channel: usize) -> Option<FinishedTrack> {
        self.poll();
        self.completed.get_mut(channel)?.take()
    }

    pub fn is_recording(&self, channel: usize) -> bool {
        self.engine.probes[channel].is_recording()
    }

    /// Complete beats recorded so far on a channel's live track.
    pub fn current_recording_beat_count(&self, channel: usize) -> u64 {
        self.engine.probes[channel].beat_count()
    }

    /// The beat the channel's current recording started on.
    pub fn current_recording_start_beat(&self, channel: usize) -> Option<u64> {
        self.engine.probes[channel].start_beat()
    }

    /// Hand a finished track to the playback path; it loops until stopped.
    pub fn play_track(&mut self, finished: FinishedTrack) {
        let shared = Shared::new(&self.engine.handle, finished);
        let _ = self.engine.players.push(PlayerCommand::Play(shared));
    }

    pub fn set_track_muted(&mut self, id: TrackId, muted: bool) {
        let _ = self
            .engine
            .players
            .push(PlayerCommand::SetMuted { id, muted });
    }

    pub fn stop_track(&mut self, id: TrackId) {
        let _ = self.engine.players.push(PlayerCommand::Stop { id });
    }
}
