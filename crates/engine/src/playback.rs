use basedrop::Shared;
use looper_transport::{FinishedTrack, TrackCursor, TrackId};

/// A finished loop shared with the output callback. Dropping the handle on
/// the audio thread defers the actual free to the collector.
pub type SharedLoop = Shared<FinishedTrack>;

/// Control-thread -> output-callback commands.
pub enum PlayerCommand {
    /// Schedule a finished loop; playback starts at its skip offset so the
    /// loop lands on the beat despite its late start.
    Play(SharedLoop),
    SetMuted { id: TrackId, muted: bool },
    Stop { id: TrackId },
}

struct LoopVoice {
    finished: SharedLoop,
    cursor: TrackCursor,
    muted: bool,
}

/// Voices reserved up front; performances with more simultaneous loops than
/// this take one allocation on the output callback.
const VOICE_RESERVE: usize = 32;

const SCRATCH_RESERVE: usize = 16_384;

/// The playback side of the engine: mixes every unmuted loop into the output
/// buffer, pull-style, one block per output callback.
pub struct PlaybackStation {
    voices: Vec<LoopVoice>,
    commands: rtrb::Consumer<PlayerCommand>,
    scratch: Vec<f32>,
}

impl PlaybackStation {
    pub fn new(commands: rtrb::Consumer<PlayerCommand>) -> Self {
        Self {
            voices: Vec::with_capacity(VOICE_RESERVE),
            commands,
            scratch: vec![0.0; SCRATCH_RESERVE],
        }
    }

    /// Fill one interleaved output block. A mono loop is spread across all
    /// output channels.
    pub fn process_block(&mut self, out: &mut [f32], channels: usize) {
        while let Ok(command) = self.commands.pop() {
            match command {
                PlayerCommand::Play(finished) => {
                    let cursor = TrackCursor::with_skip(&finished.track, finished.skip);
                    self.voices.push(LoopVoice {
                        finished,
                        cursor,
                        muted: false,
                    });
                }
                PlayerCommand::SetMuted { id, muted } => {
                    for voice in &mut self.voices {
                        if voice.finished.track.id() == id {
                            voice.muted = muted;
                        }
                    }
                }
                PlayerCommand::Stop { id } => {
                    self.voices.retain(|voice| voice.finished.track.id() != id);
                }
            }
        }

        out.fill(0.0);
        let frames = out.len() / channels;
        let scratch = &mut self.scratch[..frames.min(SCRATCH_RESERVE)];

        for voice in &mut self.voices {
            if voice.muted || voice.finished.track.is_empty() {
                continue;
            }
            let mut done = 0;
            while done < frames {
                let n = (frames - done).min(scratch.len());
                voice.cursor.read(&voice.finished.track, &mut scratch[..n]);
                for (frame, &value) in scratch[..n].iter().enumerate() {
                    let base = (done + frame) * channels;
                    for channel in 0..channels {
                        out[base + channel] += value;
                    }
                }
                done += n;
            }
        }
    }

    pub fn active_voices(&self) -> usize {
        self.voices.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use basedrop::Collector;
    use looper_arena::{ArenaConfig, Pool, SampleAllocator};
    use looper_transport::Track;

    fn finished_loop(data: &[f32], skip: usize, id: u64) -> (Collector, SharedLoop) {
        let pool = Pool::new(ArenaConfig {
            chunk_capacity: 256,
            chunk_count: 8,
        })
        .unwrap();
        let mut alloc = SampleAllocator::new();
        let sample = alloc.allocate(&pool, data.len());
        sample.fill_from(data);
        let mut track = Track::new(TrackId(id));
        track.append(sample);

        let collector = Collector::new();
        let shared = Shared::new(
            &collector.handle(),
            FinishedTrack {
                track,
                skip,
                start_beat: 0,
                beats: 1,
            },
        );
        (collector, shared)
    }

    #[test]
    fn mixes_a_loop_across_output_channels() {
        let (_collector, lp) = finished_loop(&[1.0, 2.0, 3.0, 4.0], 0, 1);
        let (mut tx, rx) = rtrb::RingBuffer::new(8);
        let mut station = PlaybackStation::new(rx);
        tx.push(PlayerCommand::Play(lp)).unwrap();

        let mut out = [0.0; 12]; // 6 stereo frames
        station.process_block(&mut out, 2);
        assert_eq!(
            out,
            [1.0, 1.0, 2.0, 2.0, 3.0, 3.0, 4.0, 4.0, 1.0, 1.0, 2.0, 2.0]
        );
    }

    #[test]
    fn skip_offsets_the_first_pull() {
        let (_collector, lp) = finished_loop(&[1.0, 2.0, 3.0, 4.0], 2, 1);
        let (mut tx, rx) = rtrb::RingBuffer::new(8);
        let mut station = PlaybackStation::new(rx);
        tx.push(PlayerCommand::Play(lp)).unwrap();

        let mut out = [0.0; 4];
        station.process_block(&mut out, 1);
        assert_eq!(out, [3.0, 4.0, 1.0, 2.0]);
    }

    #[test]
    fn mute_and_stop_take_effect_on_the_next_block() {
        let (_collector, lp) = finished_loop(&[1.0; 8], 0, 5);
        let (mut tx, rx) = rtrb::RingBuffer::new(8);
        let mut station = PlaybackStation::new(rx);
        tx.push(PlayerCommand::Play(lp)).unwrap();

        let mut out = [0.0; 4];
        station.process_block(&mut out, 1);
        assert_eq!(out, [1.0; 4]);

        tx.push(PlayerCommand::SetMuted {
            id: TrackId(5),
            muted: true,
        })
        .unwrap();
        station.process_block(&mut out, 1);
        assert_eq!(out, [0.0; 4]);
        assert_eq!(station.active_voices(), 1);

        tx.push(PlayerCommand::Stop { id: TrackId(5) }).unwrap();
        station.process_block(&mut out, 1);
        assert_eq!(station.active_voices(), 0);
    }
}
