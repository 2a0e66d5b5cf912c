use super::monte_carlo_update::{AcceptedMove, MonteCarloUpdate, MoveKind};
use crate::segments::Segment;
use crate::system::ImpuritySystem;
use log::{debug, trace};

/// The paired segment insertion/removal update.
///
/// Each attempt flips a fair coin between proposing a new segment and
/// proposing the removal of an existing one, so the two directions are
/// tried with equal probability and detailed balance reduces to the
/// configuration-space proposal densities: an insertion draws a start time
/// uniformly on `[0, beta)` and a length uniformly within the gap to the
/// next segment, a removal picks one of the `n` segments uniformly. The
/// acceptance ratios carry the resulting asymmetry factors
/// `beta * l_max / (n + 1)` and `n / (beta * l_max)`.
///
/// # Fields
/// - `accept_count`: Tracks the number of updates that have been accepted.
/// - `reject_count`: Tracks the number of updates that have been rejected.
#[derive(Debug, Default)]
pub struct InsertRemoveSegment {
    pub accept_count: usize,
    pub reject_count: usize,
}

impl InsertRemoveSegment {
    pub fn new() -> Self {
        Self::default()
    }

    fn insert_segment(
        &mut self,
        system: &mut ImpuritySystem,
        flavor: usize,
        rng: &mut impl rand::Rng,
    ) -> Option<AcceptedMove> {
        let beta = system.beta();
        let state = system.store().flavor(flavor);
        if state.is_full_line() {
            trace!("Flavor {} occupies the full line, nothing to insert", flavor);
            return None;
        }
        let n = state.len();

        let t_start: f64 = rng.gen::<f64>() * beta;
        if state.occupied(t_start, beta) {
            trace!("Start time {} is occupied, zero-probability move", t_start);
            return None;
        }
        let l_max = state.gap_to_next_start(t_start, beta);
        let length = rng.gen::<f64>() * l_max;
        if length <= 0.0 {
            return None;
        }
        let seg = Segment::from_start_length(t_start, length, beta);
        trace!(
            "Proposing segment [{}, {}) for flavor {} (l_max = {})",
            seg.t_start,
            seg.t_end,
            flavor,
            l_max
        );

        let local_ratio =
            (system.model().mu(flavor) * length - system.interaction_overlap(flavor, &seg)).exp();
        let pos = state.insert_index(seg.t_start);
        let plan =
            system
                .matrix(flavor)
                .insertion_ratio(state, system.bath(), flavor, &seg, pos);
        let weight_ratio = local_ratio * plan.ratio;
        let acceptance = weight_ratio.abs() * beta * l_max / (n as f64 + 1.0);
        trace!(
            "local = {}, determinant = {}, acceptance = {}",
            local_ratio,
            plan.ratio,
            acceptance
        );

        if rng.gen::<f64>() < acceptance {
            system.apply_insert(flavor, seg, &plan);
            self.accept_count += 1;
            debug!("Segment insertion accepted");
            Some(AcceptedMove {
                flavor,
                kind: MoveKind::InsertSegment,
                weight_ratio,
            })
        } else {
            self.reject_count += 1;
            debug!("Segment insertion rejected");
            None
        }
    }

    fn remove_segment(
        &mut self,
        system: &mut ImpuritySystem,
        flavor: usize,
        rng: &mut impl rand::Rng,
    ) -> Option<AcceptedMove> {
        let beta = system.beta();
        let state = system.store().flavor(flavor);
        let n = state.len();
        if n == 0 {
            trace!("Flavor {} has no segment to remove", flavor);
            return None;
        }

        let k = rng.gen_range(0..n);
        let seg = state.segment(k);
        let length = seg.length(beta);
        // The gap the reverse insertion would see, measured on the
        // configuration without this segment.
        let l_max = state.gap_between_starts(k, beta);
        trace!(
            "Proposing removal of segment {} of flavor {} (length = {}, l_max = {})",
            k,
            flavor,
            length,
            l_max
        );

        let local_ratio =
            (-system.model().mu(flavor) * length + system.interaction_overlap(flavor, &seg)).exp();
        let det_ratio = system.matrix(flavor).removal_ratio(k);
        let weight_ratio = local_ratio * det_ratio;
        let acceptance = weight_ratio.abs() * n as f64 / (beta * l_max);
        trace!(
            "local = {}, determinant = {}, acceptance = {}",
            local_ratio,
            det_ratio,
            acceptance
        );

        if rng.gen::<f64>() < acceptance {
            system.apply_remove(flavor, k);
            self.accept_count += 1;
            debug!("Segment removal accepted");
            Some(AcceptedMove {
                flavor,
                kind: MoveKind::RemoveSegment,
                weight_ratio,
            })
        } else {
            self.reject_count += 1;
            debug!("Segment removal rejected");
            None
        }
    }
}

impl MonteCarloUpdate for InsertRemoveSegment {
    fn try_update(
        &mut self,
        system: &mut ImpuritySystem,
        rng: &mut impl rand::Rng,
    ) -> Option<AcceptedMove> {
        let flavor = rng.gen_range(0..system.n_flavors());
        if rng.gen::<f64>() < 0.5 {
            self.insert_segment(system, flavor, rng)
        } else {
            self.remove_segment(system, flavor, rng)
        }
    }
}
