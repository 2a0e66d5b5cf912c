use super::monte_carlo_update::{AcceptedMove, MonteCarloUpdate, MoveKind};
use crate::system::ImpuritySystem;
use log::{debug, trace};

/// Toggles a flavor between the empty configuration and the full-line one
/// occupying the whole time axis.
///
/// Only legal when the flavor has no segments; with segments present the
/// proposal has zero probability. Both configurations carry no
/// hybridization end points, so the weight ratio is purely the chemical
/// potential and interaction-overlap factor and the proposal is symmetric.
///
/// # Fields
/// - `accept_count`: Tracks the number of updates that have been accepted.
/// - `reject_count`: Tracks the number of updates that have been rejected.
#[derive(Debug, Default)]
pub struct ToggleFullLine {
    pub accept_count: usize,
    pub reject_count: usize,
}

impl ToggleFullLine {
    pub fn new() -> Self {
        Self::default()
    }
}

impl MonteCarloUpdate for ToggleFullLine {
    fn try_update(
        &mut self,
        system: &mut ImpuritySystem,
        rng: &mut impl rand::Rng,
    ) -> Option<AcceptedMove> {
        let flavor = rng.gen_range(0..system.n_flavors());
        let state = system.store().flavor(flavor);
        if !state.is_empty() {
            trace!(
                "Flavor {} holds {} segments, full-line toggle has zero probability",
                flavor,
                state.len()
            );
            return None;
        }
        let beta = system.beta();
        let model = system.model();

        // Exponent for filling the whole line: chemical potential gain
        // minus the interaction cost against every other flavor.
        let mut exponent = model.mu(flavor) * beta;
        for other in 0..system.n_flavors() {
            if other != flavor {
                exponent -=
                    model.u(flavor, other) * system.store().flavor(other).total_length(beta);
            }
        }
        if state.is_full_line() {
            exponent = -exponent;
        }
        let weight_ratio = exponent.exp();
        trace!(
            "Proposing full-line toggle of flavor {} ({} -> {}), acceptance = {}",
            flavor,
            state.is_full_line(),
            !state.is_full_line(),
            weight_ratio
        );

        if rng.gen::<f64>() < weight_ratio {
            system.apply_toggle(flavor);
            self.accept_count += 1;
            debug!("Full-line toggle accepted");
            Some(AcceptedMove {
                flavor,
                kind: MoveKind::ToggleFullLine,
                weight_ratio,
            })
        } else {
            self.reject_count += 1;
            debug!("Full-line toggle rejected");
            None
        }
    }
}
