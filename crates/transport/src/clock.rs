use std::sync::atomic::{AtomicU64, Ordering};

/// The session's musical clock.
///
/// The capture callback is the single owner of the element counter: it calls
/// `advance` once per hardware buffer. Everyone else takes `Moment` snapshots
/// through `now()`, so beat math never races a later tempo change.
///
/// Timepoints-per-beat is the integer floor of `sample_rate * 60 / bpm`,
/// recomputed once per tempo change. That trades a few microseconds of
/// per-beat drift in real time for exactness in sample count, which is what
/// buffer arithmetic has to stay honest in.
pub struct Clock {
    /// Cumulative captured audio elements across all channels.
    elements: AtomicU64,
    sample_rate: u32,
    channels: u32,
    beats_per_measure: u32,
    tempo_bits: AtomicU64,
    timepoints_per_beat: AtomicU64,
}

impl Clock {
    pub fn new(sample_rate: u32, channels: u32, tempo: f64, beats_per_measure: u32) -> Self {
        assert!(sample_rate > 0, "sample rate must be greater than 0");
        assert!(channels > 0, "channel count must be greater than 0");
        assert!(beats_per_measure > 0, "beats per measure must be greater than 0");
        let clock = Self {
            elements: AtomicU64::new(0),
            sample_rate,
            channels,
            beats_per_measure,
            tempo_bits: AtomicU64::new(0),
            timepoints_per_beat: AtomicU64::new(0),
        };
        clock.set_tempo(tempo);
        clock
    }

    /// Add `n` captured audio elements. Called only by the capture callback.
    pub fn advance(&self, n: usize) {
        self.elements.fetch_add(n as u64, Ordering::AcqRel);
    }

    /// Recompute timepoints-per-beat. Meaningful only while no recording or
    /// playback is in flight; the clock itself does not enforce that.
    pub fn set_tempo(&self, tempo: f64) {
        assert!(tempo > 0.0, "tempo must be greater than 0");
        let timepoints_per_beat = (self.sample_rate as f64 * 60.0 / tempo) as u64;
        self.tempo_bits.store(tempo.to_bits(), Ordering::Release);
        self.timepoints_per_beat
            .store(timepoints_per_beat, Ordering::Release);
    }

    pub fn tempo(&self) -> f64 {
        f64::from_bits(self.tempo_bits.load(Ordering::Acquire))
    }

    pub fn timepoints_per_beat(&self) -> u64 {
        self.timepoints_per_beat.load(Ordering::Acquire)
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u32 {
        self.channels
    }

    /// Snapshot the current timepoint count with the active tempo parameters.
    pub fn now(&self) -> Moment {
        let timepoints = self.elements.load(Ordering::Acquire) / self.channels as u64;
        self.moment_at(timepoints)
    }

    /// A Moment for an arbitrary timepoint count, under the active tempo.
    /// Lets a track length be read as a duration without touching the counter.
    pub fn moment_at(&self, timepoints: u64) -> Moment {
        Moment {
            timepoints,
            sample_rate: self.sample_rate,
            tempo: self.tempo(),
            timepoints_per_beat: self.timepoints_per_beat(),
            beats_per_measure: self.beats_per_measure,
        }
    }
}

/// An immutable timestamp with tempo context baked in. Created by a clock
/// query, consumed immediately, cheap to copy.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Moment {
    timepoints: u64,
    sample_rate: u32,
    tempo: f64,
    timepoints_per_beat: u64,
    beats_per_measure: u32,
}

impl Moment {
    pub fn timepoint_count(&self) -> u64 {
        self.timepoints
    }

    pub fn tempo(&self) -> f64 {
        self.tempo
    }

    pub fn timepoints_per_beat(&self) -> u64 {
        self.timepoints_per_beat
    }

    pub fn seconds(&self) -> f64 {
        self.timepoints as f64 / self.sample_rate as f64
    }

    pub fn beats(&self) -> f64 {
        self.timepoints as f64 / self.timepoints_per_beat as f64
    }

    pub fn complete_beats(&self) -> u64 {
        self.timepoints / self.timepoints_per_beat
    }

    pub fn fractional_beat(&self) -> f64 {
        self.timepoints_since_last_beat() as f64 / self.timepoints_per_beat as f64
    }

    pub fn timepoints_since_last_beat(&self) -> u64 {
        self.timepoints % self.timepoints_per_beat
    }

    pub fn measures(&self) -> u64 {
        self.complete_beats() / self.beats_per_measure as u64
    }

    pub fn beat_in_measure(&self) -> u64 {
        self.complete_beats() % self.beats_per_measure as u64
    }

    /// The same moment `n` timepoints earlier, clamped at zero.
    pub fn earlier_by(&self, n: u64) -> Moment {
        Moment {
            timepoints: self.timepoints.saturating_sub(n),
            ..*self
        }
    }

    pub fn plus_beats(&self, n: u64) -> Moment {
        Moment {
            timepoints: self.timepoints + n * self.timepoints_per_beat,
            ..*self
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clock() -> Clock {
        // 48k stereo at 120 BPM: 24_000 timepoints per beat.
        Clock::new(48_000, 2, 120.0, 4)
    }

    #[test]
    fn advance_is_monotonic() {
        let clock = clock();
        let mut last = clock.now().timepoint_count();
        for n in [0, 128, 0, 7, 4096] {
            clock.advance(n);
            let now = clock.now().timepoint_count();
            assert!(now >= last);
            last = now;
        }
    }

    #[test]
    fn timepoints_count_frames_not_elements() {
        let clock = clock();
        clock.advance(480); // 240 stereo frames
        assert_eq!(clock.now().timepoint_count(), 240);
    }

    #[test]
    fn complete_beats_is_integer_division() {
        for elements in [0usize, 2, 47_998, 48_000, 48_002, 480_000] {
            let clock = clock();
            clock.advance(elements);
            let moment = clock.now();
            assert_eq!(
                moment.complete_beats(),
                moment.timepoint_count() / moment.timepoints_per_beat()
            );
        }
    }

    #[test]
    fn beat_queries_agree() {
        let clock = clock();
        clock.advance(2 * 60_000); // 60_000 timepoints = 2.5 beats
        let moment = clock.now();
        assert_eq!(moment.complete_beats(), 2);
        assert!((moment.beats() - 2.5).abs() < 1e-9);
        assert!((moment.fractional_beat() - 0.5).abs() < 1e-9);
        assert_eq!(moment.timepoints_since_last_beat(), 12_000);
        assert!((moment.seconds() - 1.25).abs() < 1e-9);
    }

    #[test]
    fn measures_and_beat_in_measure() {
        let clock = clock();
        clock.advance(2 * 24_000 * 5); // 5 beats
        let moment = clock.now();
        assert_eq!(moment.measures(), 1);
        assert_eq!(moment.beat_in_measure(), 1);
    }

    #[test]
    fn earlier_by_clamps_at_zero() {
        let clock = clock();
        clock.advance(2 * 100);
        let moment = clock.now();
        assert_eq!(moment.earlier_by(40).timepoint_count(), 60);
        assert_eq!(moment.earlier_by(500).timepoint_count(), 0);
    }

    #[test]
    fn plus_beats_lands_on_beat_boundaries() {
        let clock = clock();
        clock.advance(2 * 10);
        let moment = clock.now().plus_beats(2);
        assert_eq!(moment.timepoint_count(), 10 + 2 * 24_000);
    }

    #[test]
    fn tempo_change_recomputes_timepoints_per_beat() {
        let clock = clock();
        assert_eq!(clock.timepoints_per_beat(), 24_000);
        clock.set_tempo(90.0);
        assert_eq!(clock.timepoints_per_beat(), 32_000);
        // 140 BPM does not divide evenly; the floor keeps sample math exact.
        clock.set_tempo(140.0);
        assert_eq!(clock.timepoints_per_beat(), 20_571);
    }
}
