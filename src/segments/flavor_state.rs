use super::segment::Segment;
use serde::{Deserialize, Serialize};

/// Segment configuration of a single flavor.
///
/// Holds the ordered sequence of pairwise non-overlapping segments, sorted
/// by start time, together with the full-line flag for the degenerate
/// configuration occupying the whole time axis. The flag and a non-empty
/// segment list are mutually exclusive.
///
/// Structural mutations go through [`insert`](FlavorState::insert),
/// [`remove`](FlavorState::remove) and
/// [`replace_end`](FlavorState::replace_end); all of them preserve
/// sortedness and non-overlap. Overlap detection for a proposed segment is
/// the caller's job (an overlapping proposal is an invalid move, not a
/// structural error) and is supported by the query operations below.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FlavorState {
    segments: Vec<Segment>,
    full_line: bool,
}

impl FlavorState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of segments.
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn is_full_line(&self) -> bool {
        self.full_line
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn segment(&self, k: usize) -> Segment {
        self.segments[k]
    }

    /// Switches the full-line flag. Only legal on an empty configuration.
    pub fn set_full_line(&mut self, on: bool) {
        debug_assert!(
            self.segments.is_empty(),
            "full-line toggle with {} segments present",
            self.segments.len()
        );
        self.full_line = on;
    }

    /// Whether the time point `t` lies inside the occupied region.
    ///
    /// A segment start counts as occupied, the matching end does not.
    pub fn occupied(&self, t: f64, beta: f64) -> bool {
        if self.full_line {
            return true;
        }
        let last = match self.segments.last() {
            Some(last) => last,
            None => return false,
        };
        if last.wraps() && t < last.t_end {
            return true;
        }
        let idx = self.segments.partition_point(|s| s.t_start <= t);
        if idx == 0 {
            return false;
        }
        let seg = &self.segments[idx - 1];
        t < seg.t_start + seg.length(beta)
    }

    /// Distance from `t` to the next segment start, walking forward along
    /// the periodic axis. Returns `beta` when there are no segments.
    pub fn gap_to_next_start(&self, t: f64, beta: f64) -> f64 {
        if self.segments.is_empty() {
            return beta;
        }
        let idx = self.segments.partition_point(|s| s.t_start <= t);
        if idx < self.segments.len() {
            self.segments[idx].t_start - t
        } else {
            self.segments[0].t_start + beta - t
        }
    }

    /// Distance from the start of segment `k` to the start of the next
    /// segment. Returns `beta` when `k` is the only segment.
    pub fn gap_between_starts(&self, k: usize, beta: f64) -> f64 {
        let n = self.segments.len();
        if n <= 1 {
            return beta;
        }
        let mut gap = self.segments[(k + 1) % n].t_start - self.segments[k].t_start;
        if gap <= 0.0 {
            gap += beta;
        }
        gap
    }

    /// Sorted position a segment starting at `t_start` would occupy.
    pub fn insert_index(&self, t_start: f64) -> usize {
        self.segments.partition_point(|s| s.t_start < t_start)
    }

    /// Inserts a segment at its sorted position and returns that position.
    /// The caller must have verified that the segment does not overlap.
    pub fn insert(&mut self, seg: Segment, beta: f64) -> usize {
        debug_assert!(!self.full_line, "insert into a full line");
        let idx = self.insert_index(seg.t_start);
        self.segments.insert(idx, seg);
        debug_assert!(self.invariants_hold(beta), "insert broke the configuration");
        idx
    }

    /// Removes and returns the segment at index `k`.
    pub fn remove(&mut self, k: usize) -> Segment {
        self.segments.remove(k)
    }

    /// Moves the end point of segment `k`. The caller must have verified
    /// that the new end stays within the gap to the next segment.
    pub fn replace_end(&mut self, k: usize, t_end: f64, beta: f64) {
        self.segments[k].t_end = t_end;
        debug_assert!(
            self.invariants_hold(beta),
            "end-point shift broke the configuration"
        );
    }

    /// Total overlap between a candidate segment and this flavor's
    /// occupation.
    pub fn overlap_with(&self, seg: &Segment, beta: f64) -> f64 {
        if self.full_line {
            return seg.length(beta);
        }
        self.segments.iter().map(|s| s.overlap(seg, beta)).sum()
    }

    /// Total occupied length.
    pub fn total_length(&self, beta: f64) -> f64 {
        if self.full_line {
            return beta;
        }
        self.segments.iter().map(|s| s.length(beta)).sum()
    }

    /// Verifies sortedness, non-overlap, segment ranges and the full-line
    /// exclusivity. Used in debug assertions and tests.
    pub fn invariants_hold(&self, beta: f64) -> bool {
        if self.full_line && !self.segments.is_empty() {
            return false;
        }
        let n = self.segments.len();
        for seg in &self.segments {
            if !(0.0..beta).contains(&seg.t_start) || seg.length(beta) <= 0.0 {
                return false;
            }
        }
        for w in self.segments.windows(2) {
            if Segment::cmp_by_start(&w[0], &w[1]) != std::cmp::Ordering::Less {
                return false;
            }
        }
        for k in 0..n {
            // Each segment must end no later than the next one starts.
            if self.segments[k].length(beta) > self.gap_between_starts(k, beta) + 1e-14 {
                return false;
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BETA: f64 = 10.0;

    fn state_with(segments: &[(f64, f64)]) -> FlavorState {
        let mut state = FlavorState::new();
        for &(s, e) in segments {
            state.insert(Segment::new(s, e), BETA);
        }
        state
    }

    #[test]
    fn insert_keeps_segments_sorted() {
        let state = state_with(&[(5.0, 6.0), (1.0, 2.0), (8.0, 9.0)]);
        let starts: Vec<f64> = state.segments().iter().map(|s| s.t_start).collect();
        assert_eq!(starts, vec![1.0, 5.0, 8.0]);
        assert!(state.invariants_hold(BETA));
    }

    #[test]
    fn occupied_inside_and_outside() {
        let state = state_with(&[(1.0, 2.0), (5.0, 7.0)]);
        assert!(state.occupied(1.5, BETA));
        assert!(state.occupied(1.0, BETA), "start point counts as occupied");
        assert!(!state.occupied(2.0, BETA), "end point does not");
        assert!(!state.occupied(3.0, BETA));
        assert!(state.occupied(6.999, BETA));
    }

    #[test]
    fn occupied_handles_wrapping_segment() {
        let state = state_with(&[(9.0, 1.0)]);
        assert!(state.occupied(9.5, BETA));
        assert!(state.occupied(0.5, BETA));
        assert!(!state.occupied(1.5, BETA));
    }

    #[test]
    fn occupied_on_full_line() {
        let mut state = FlavorState::new();
        state.set_full_line(true);
        assert!(state.occupied(3.3, BETA));
        assert_eq!(state.total_length(BETA), BETA);
    }

    #[test]
    fn gap_to_next_start_cases() {
        let empty = FlavorState::new();
        assert_eq!(empty.gap_to_next_start(4.0, BETA), BETA);

        let state = state_with(&[(1.0, 2.0), (5.0, 7.0)]);
        assert!((state.gap_to_next_start(3.0, BETA) - 2.0).abs() < 1e-12);
        // Past the last start: wraps to the first one
        assert!((state.gap_to_next_start(8.0, BETA) - 3.0).abs() < 1e-12);
    }

    #[test]
    fn gap_between_starts_cases() {
        let one = state_with(&[(2.0, 4.0)]);
        assert_eq!(one.gap_between_starts(0, BETA), BETA);

        let two = state_with(&[(1.0, 2.0), (6.0, 8.0)]);
        assert!((two.gap_between_starts(0, BETA) - 5.0).abs() < 1e-12);
        assert!((two.gap_between_starts(1, BETA) - 5.0).abs() < 1e-12);
    }

    #[test]
    fn remove_returns_the_segment() {
        let mut state = state_with(&[(1.0, 2.0), (5.0, 7.0)]);
        let seg = state.remove(1);
        assert_eq!(seg.t_start, 5.0);
        assert_eq!(state.len(), 1);
        assert!(state.invariants_hold(BETA));
    }

    #[test]
    fn overlap_with_sums_over_segments() {
        let state = state_with(&[(1.0, 3.0), (5.0, 7.0)]);
        let probe = Segment::new(2.0, 6.0);
        assert!((state.overlap_with(&probe, BETA) - 2.0).abs() < 1e-12);
    }

    #[test]
    fn overlap_with_full_line_is_the_probe_length() {
        let mut state = FlavorState::new();
        state.set_full_line(true);
        let probe = Segment::new(8.0, 2.0);
        assert!((state.overlap_with(&probe, BETA) - 4.0).abs() < 1e-12);
    }

    #[test]
    fn invariants_reject_overlap_and_full_line_conflicts() {
        let mut bad = FlavorState::new();
        bad.segments.push(Segment::new(1.0, 5.0));
        bad.segments.push(Segment::new(4.0, 6.0));
        assert!(!bad.invariants_hold(BETA));

        let mut conflict = FlavorState::new();
        conflict.segments.push(Segment::new(1.0, 2.0));
        conflict.full_line = true;
        assert!(!conflict.invariants_hold(BETA));
    }
}
