use super::monte_carlo_update::{AcceptedMove, MonteCarloUpdate, MoveKind};
use crate::segments::Segment;
use crate::system::ImpuritySystem;
use log::{debug, trace};

/// Moves the end point of a randomly chosen segment.
///
/// The new end is drawn uniformly in the window between the segment's
/// start and the start of the following segment; the reverse move draws
/// from the same window, so the proposal is symmetric and the acceptance
/// ratio is the plain weight ratio. In the determinant this is a
/// replacement of one row of the hybridization matrix.
///
/// # Fields
/// - `accept_count`: Tracks the number of updates that have been accepted.
/// - `reject_count`: Tracks the number of updates that have been rejected.
#[derive(Debug, Default)]
pub struct ShiftSegmentEnd {
    pub accept_count: usize,
    pub reject_count: usize,
}

impl ShiftSegmentEnd {
    pub fn new() -> Self {
        Self::default()
    }
}

impl MonteCarloUpdate for ShiftSegmentEnd {
    fn try_update(
        &mut self,
        system: &mut ImpuritySystem,
        rng: &mut impl rand::Rng,
    ) -> Option<AcceptedMove> {
        let flavor = rng.gen_range(0..system.n_flavors());
        let beta = system.beta();
        let state = system.store().flavor(flavor);
        let n = state.len();
        if n == 0 {
            trace!("Flavor {} has no segment to shift", flavor);
            return None;
        }

        let k = rng.gen_range(0..n);
        let seg = state.segment(k);
        let old_length = seg.length(beta);
        let l_max = state.gap_between_starts(k, beta);
        let new_length = rng.gen::<f64>() * l_max;
        if new_length <= 0.0 {
            return None;
        }
        let new_seg = Segment::from_start_length(seg.t_start, new_length, beta);
        trace!(
            "Proposing end shift of segment {} of flavor {}: {} -> {}",
            k,
            flavor,
            seg.t_end,
            new_seg.t_end
        );

        let local_ratio = (system.model().mu(flavor) * (new_length - old_length)
            - system.interaction_overlap(flavor, &new_seg)
            + system.interaction_overlap(flavor, &seg))
        .exp();
        let (det_ratio, w) =
            system
                .matrix(flavor)
                .shift_ratio(state, system.bath(), flavor, k, new_seg.t_end);
        let weight_ratio = local_ratio * det_ratio;
        let acceptance = weight_ratio.abs();
        trace!(
            "local = {}, determinant = {}, acceptance = {}",
            local_ratio,
            det_ratio,
            acceptance
        );

        if rng.gen::<f64>() < acceptance {
            system.apply_shift(flavor, k, new_seg.t_end, &w, det_ratio);
            self.accept_count += 1;
            debug!("End-point shift accepted");
            Some(AcceptedMove {
                flavor,
                kind: MoveKind::ShiftSegmentEnd,
                weight_ratio,
            })
        } else {
            self.reject_count += 1;
            debug!("End-point shift rejected");
            None
        }
    }
}
