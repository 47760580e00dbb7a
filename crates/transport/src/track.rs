use looper_arena::Sample;
use serde::{Deserialize, Serialize};

use crate::clock::{Clock, Moment};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackId(pub u64);

/// One recorded loop: an ordered sequence of coalesced Samples.
///
/// Adjacent samples are merged on append, so the stored entry count grows with
/// discontinuities (chunk rollovers, pre-roll splices), not with callback
/// count. Total length is kept as a running counter so the hot path never
/// scans the entry list.
#[derive(Debug, Clone)]
pub struct Track {
    id: TrackId,
    samples: Vec<Sample>,
    total_len: usize,
}

/// Entries reserved up front so appends on the capture thread stay
/// allocation-free for any realistic discontinuity count.
const ENTRY_RESERVE: usize = 64;

impl Track {
    pub fn new(id: TrackId) -> Self {
        Self {
            id,
            samples: Vec::with_capacity(ENTRY_RESERVE),
            total_len: 0,
        }
    }

    pub fn id(&self) -> TrackId {
        self.id
    }

    pub fn total_length(&self) -> usize {
        self.total_len
    }

    pub fn is_empty(&self) -> bool {
        self.total_len == 0
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    pub fn entry_count(&self) -> usize {
        self.samples.len()
    }

    /// The track's duration read against a clock's tempo parameters. A track
    /// holds one channel's elements, so one element is one timepoint.
    pub fn length_as_moment(&self, clock: &Clock) -> Moment {
        clock.moment_at(self.total_len as u64)
    }

    /// Append a sample, merging into the tail entry when adjacent.
    pub fn append(&mut self, sample: Sample) {
        if sample.is_empty() {
            return;
        }
        self.total_len += sample.len();
        match self.samples.last_mut() {
            Some(tail) if tail.adjacent_to(&sample) => *tail = tail.merge_with(&sample),
            _ => self.samples.push(sample),
        }
    }

    /// Remove `n` elements from the front: whole entries first, then shift the
    /// start of the final partially consumed entry.
    pub fn trim_from_start(&mut self, n: usize) {
        assert!(n <= self.total_len, "trimming more than the track length");
        let mut remaining = n;
        while remaining > 0 {
            let head_len = self.samples[0].len();
            if remaining >= head_len {
                self.samples.remove(0);
                remaining -= head_len;
            } else {
                self.samples[0] = self.samples[0].skip_front(remaining);
                remaining = 0;
            }
        }
        self.total_len -= n;
    }

    /// Remove `n` elements from the back: whole entries first, then shorten
    /// the final partially consumed entry. A trim that lands exactly on an
    /// entry boundary pops that entry whole rather than leaving a zero-length
    /// tail.
    pub fn trim_from_end(&mut self, n: usize) {
        assert!(n <= self.total_len, "trimming more than the track length");
        let mut remaining = n;
        while remaining > 0 {
            let tail_len = self.samples.last().map(Sample::len).unwrap_or(0);
            if remaining >= tail_len {
                self.samples.pop();
                remaining -= tail_len;
            } else {
                let tail = self.samples.last_mut().unwrap();
                *tail = tail.truncated(tail_len - remaining);
                remaining = 0;
            }
        }
        self.total_len -= n;
    }

    /// Copy the whole track out in order. Intended for tests and offline
    /// inspection, not the playback path.
    pub fn to_vec(&self) -> Vec<f32> {
        let mut out = Vec::with_capacity(self.total_len);
        for sample in &self.samples {
            out.extend(sample.to_vec());
        }
        out
    }
}

/// A recording handed back to the control thread, ready for playback.
#[derive(Debug)]
pub struct FinishedTrack {
    pub track: Track,
    /// Elements of late start playback should skip so the loop still lands on
    /// the beat. Equals the stop overrun trimmed from the track's end.
    pub skip: usize,
    /// Complete-beat count of the moment recording started.
    pub start_beat: u64,
    /// Quantized loop length in beats.
    pub beats: u64,
}

/// Streams a track's stored samples in order, wrapping at the end.
///
/// The playback driver pulls however many elements it needs per request; the
/// cursor walks (entry, offset) so a pull never rescans the sample list. A
/// cursor is only meaningful against the track it was created for.
#[derive(Debug, Clone)]
pub struct TrackCursor {
    entry: usize,
    offset: usize,
}

impl TrackCursor {
    pub fn new(track: &Track) -> Self {
        Self::with_skip(track, 0)
    }

    /// Start `skip` elements into the loop (modulo its length).
    pub fn with_skip(track: &Track, skip: usize) -> Self {
        let mut cursor = Self {
            entry: 0,
            offset: 0,
        };
        if track.total_length() > 0 {
            cursor.advance(track, skip % track.total_length());
        }
        cursor
    }

    /// Fill `out` from the track, wrapping as often as needed. An empty track
    /// yields silence.
    pub fn read(&mut self, track: &Track, out: &mut [f32]) {
        if track.is_empty() {
            out.fill(0.0);
            return;
        }
        let mut filled = 0;
        while filled < out.len() {
            let sample = &track.samples()[self.entry];
            let n = (sample.len() - self.offset).min(out.len() - filled);
            sample.read_into(self.offset, &mut out[filled..filled + n]);
            filled += n;
            self.advance(track, n);
        }
    }

    fn advance(&mut self, track: &Track, mut n: usize) {
        while n > 0 {
            let entry_len = track.samples()[self.entry].len();
            let step = n.min(entry_len - self.offset);
            self.offset += step;
            n -= step;
            if self.offset == entry_len {
                self.entry += 1;
                self.offset = 0;
                if self.entry == track.entry_count() {
                    self.entry = 0;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use looper_arena::{ArenaConfig, Pool, SampleAllocator};

    struct Arena {
        pool: Pool,
        alloc: SampleAllocator,
    }

    impl Arena {
        fn sample_of(&mut self, data: &[f32]) -> Sample {
            let sample = self.alloc.allocate(&self.pool, data.len());
            sample.fill_from(data);
            sample
        }

        fn end_chunk(&mut self) {
            self.alloc.end_chunk();
        }
    }

    fn arena() -> Arena {
        Arena {
            pool: Pool::new(ArenaConfig {
                chunk_capacity: 64,
                chunk_count: 16,
            })
            .unwrap(),
            alloc: SampleAllocator::new(),
        }
    }

    #[test]
    fn adjacent_appends_coalesce_into_one_entry() {
        let mut arena = arena();
        let mut track = Track::new(TrackId(1));
        for i in 0..5 {
            track.append(arena.sample_of(&[i as f32; 4]));
        }
        assert_eq!(track.entry_count(), 1);
        assert_eq!(track.total_length(), 20);
    }

    #[test]
    fn discontiguous_appends_stay_separate() {
        let mut arena = arena();
        let mut track = Track::new(TrackId(1));
        for i in 0..3 {
            track.append(arena.sample_of(&[i as f32; 4]));
            arena.end_chunk();
        }
        assert_eq!(track.entry_count(), 3);
        assert_eq!(track.total_length(), 12);
    }

    #[test]
    fn append_preserves_data_order() {
        let mut arena = arena();
        let mut track = Track::new(TrackId(1));
        track.append(arena.sample_of(&[1.0, 2.0]));
        arena.end_chunk();
        track.append(arena.sample_of(&[3.0, 4.0]));
        assert_eq!(track.to_vec(), vec![1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn trim_from_end_leaves_prefix_intact() {
        let mut arena = arena();
        let mut track = Track::new(TrackId(1));
        let data: Vec<f32> = (0..12).map(|i| i as f32).collect();
        track.append(arena.sample_of(&data[..6]));
        arena.end_chunk();
        track.append(arena.sample_of(&data[6..]));

        track.trim_from_end(8);
        assert_eq!(track.total_length(), 4);
        assert_eq!(track.to_vec(), data[..4].to_vec());
        track.trim_from_start(0);
        assert_eq!(track.total_length(), 4);
    }

    #[test]
    fn trim_from_start_drops_entries_then_shifts() {
        let mut arena = arena();
        let mut track = Track::new(TrackId(1));
        track.append(arena.sample_of(&[1.0, 2.0, 3.0]));
        arena.end_chunk();
        track.append(arena.sample_of(&[4.0, 5.0, 6.0]));

        track.trim_from_start(4);
        assert_eq!(track.total_length(), 2);
        assert_eq!(track.to_vec(), vec![5.0, 6.0]);
    }

    #[test]
    fn trim_everything_is_allowed_from_start() {
        let mut arena = arena();
        let mut track = Track::new(TrackId(1));
        track.append(arena.sample_of(&[1.0; 8]));
        track.trim_from_start(8);
        assert!(track.is_empty());
        assert_eq!(track.entry_count(), 0);
    }

    #[test]
    fn trim_exactly_one_entry_from_end_pops_it_whole() {
        let mut arena = arena();
        let mut track = Track::new(TrackId(1));
        track.append(arena.sample_of(&[1.0, 2.0, 3.0]));
        arena.end_chunk();
        track.append(arena.sample_of(&[4.0, 5.0]));

        track.trim_from_end(2);
        assert_eq!(track.entry_count(), 1);
        assert_eq!(track.to_vec(), vec![1.0, 2.0, 3.0]);
    }

    #[test]
    #[should_panic(expected = "trimming more than the track length")]
    fn overlong_trim_is_fatal() {
        let mut arena = arena();
        let mut track = Track::new(TrackId(1));
        track.append(arena.sample_of(&[1.0; 4]));
        track.trim_from_end(5);
    }

    #[test]
    fn cursor_wraps_across_entries() {
        let mut arena = arena();
        let mut track = Track::new(TrackId(1));
        track.append(arena.sample_of(&[1.0, 2.0, 3.0]));
        arena.end_chunk();
        track.append(arena.sample_of(&[4.0, 5.0]));

        let mut cursor = TrackCursor::new(&track);
        let mut out = [0.0; 12];
        cursor.read(&track, &mut out);
        assert_eq!(
            out,
            [1.0, 2.0, 3.0, 4.0, 5.0, 1.0, 2.0, 3.0, 4.0, 5.0, 1.0, 2.0]
        );
    }

    #[test]
    fn cursor_honors_skip() {
        let mut arena = arena();
        let mut track = Track::new(TrackId(1));
        track.append(arena.sample_of(&[1.0, 2.0, 3.0, 4.0]));

        let mut cursor = TrackCursor::with_skip(&track, 6);
        let mut out = [0.0; 4];
        cursor.read(&track, &mut out);
        assert_eq!(out, [3.0, 4.0, 1.0, 2.0]);
    }

    #[test]
    fn length_as_moment_counts_elements_as_timepoints() {
        // 100 timepoints per beat; the clock's channel count must not factor
        // into a per-channel track's duration.
        let mut arena = arena();
        let clock = Clock::new(100, 2, 60.0, 4);
        let mut track = Track::new(TrackId(1));
        track.append(arena.sample_of(&[0.0; 60]));
        arena.end_chunk();
        track.append(arena.sample_of(&[0.0; 40]));

        let moment = track.length_as_moment(&clock);
        assert_eq!(moment.timepoint_count(), 100);
        assert_eq!(moment.complete_beats(), 1);
    }
}
