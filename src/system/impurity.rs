use crate::bath::HybridizationTable;
use crate::determinant::{HybMatrix, InsertPlan};
use crate::error::ConfigError;
use crate::model::LocalModel;
use crate::segments::{FlavorState, Segment, SegmentStore};
use log::warn;
use nalgebra::DVector;

/// The complete Monte Carlo state of one impurity problem: static model
/// and bath data, the per-flavor segment configurations, the per-flavor
/// inverse hybridization matrices and the running configuration sign.
///
/// Moves query the system for weight ingredients and commit accepted
/// changes through the `apply_*` operations, which mutate the segment
/// store, the matching matrix and the sign together so the state never
/// becomes inconsistent.
#[derive(Debug)]
pub struct ImpuritySystem {
    model: LocalModel,
    bath: HybridizationTable,
    store: SegmentStore,
    matrices: Vec<HybMatrix>,
    sign: f64,
}

impl ImpuritySystem {
    /// Builds an empty-configuration system after checking that the model
    /// and the bath table agree on flavor count and inverse temperature.
    pub fn new(model: LocalModel, bath: HybridizationTable) -> Result<Self, ConfigError> {
        if bath.flavors() != model.flavors() {
            return Err(ConfigError::BathFlavorMismatch {
                expected: model.flavors(),
                found: bath.flavors(),
            });
        }
        if bath.beta() != model.beta() {
            return Err(ConfigError::BathBetaMismatch {
                expected: model.beta(),
                found: bath.beta(),
            });
        }
        let store = SegmentStore::new(model.flavors(), model.beta());
        let matrices = (0..model.flavors()).map(|_| HybMatrix::empty()).collect();
        Ok(Self {
            model,
            bath,
            store,
            matrices,
            sign: 1.0,
        })
    }

    pub fn model(&self) -> &LocalModel {
        &self.model
    }

    pub fn bath(&self) -> &HybridizationTable {
        &self.bath
    }

    pub fn store(&self) -> &SegmentStore {
        &self.store
    }

    pub fn matrix(&self, flavor: usize) -> &HybMatrix {
        &self.matrices[flavor]
    }

    /// Sign of the current configuration's Monte Carlo weight.
    pub fn sign(&self) -> f64 {
        self.sign
    }

    pub fn beta(&self) -> f64 {
        self.model.beta()
    }

    pub fn n_flavors(&self) -> usize {
        self.model.flavors()
    }

    /// Interaction energy a candidate segment of `flavor` picks up from
    /// the occupation of all other flavors: `sum_f' U(flavor, f') *
    /// overlap(seg, f')`.
    pub fn interaction_overlap(&self, flavor: usize, seg: &Segment) -> f64 {
        let beta = self.beta();
        (0..self.n_flavors())
            .filter(|&f| f != flavor)
            .map(|f| self.model.u(flavor, f) * self.store.flavor(f).overlap_with(seg, beta))
            .sum()
    }

    /// Commits an accepted insertion: segment store, inverse matrix and
    /// sign change together.
    pub fn apply_insert(&mut self, flavor: usize, seg: Segment, plan: &InsertPlan) {
        let beta = self.beta();
        let pos = self.store.flavor_mut(flavor).insert(seg, beta);
        debug_assert_eq!(pos, plan.pos, "insertion position changed under the move");
        self.matrices[flavor].insert(plan);
        self.sign *= plan.ratio.signum();
    }

    /// Commits an accepted removal.
    pub fn apply_remove(&mut self, flavor: usize, k: usize) {
        let ratio = self.matrices[flavor].removal_ratio(k);
        self.store.flavor_mut(flavor).remove(k);
        self.matrices[flavor].remove(k);
        self.sign *= ratio.signum();
    }

    /// Commits an accepted end-point shift.
    pub fn apply_shift(
        &mut self,
        flavor: usize,
        k: usize,
        new_end: f64,
        w: &DVector<f64>,
        ratio: f64,
    ) {
        let beta = self.beta();
        self.store.flavor_mut(flavor).replace_end(k, new_end, beta);
        self.matrices[flavor].shift(k, w, ratio);
        self.sign *= ratio.signum();
    }

    /// Commits an accepted full-line toggle. No hybridization end points
    /// are involved, so neither the matrix nor the sign changes.
    pub fn apply_toggle(&mut self, flavor: usize) {
        let on = self.store.flavor(flavor).is_full_line();
        self.store.flavor_mut(flavor).set_full_line(!on);
    }

    /// Rebuilds every inverse matrix from scratch and reconciles the
    /// tracked sign with the directly recomputed determinant signs.
    /// Returns the largest drift observed across flavors.
    pub fn rebuild_matrices(&mut self, drift_tolerance: f64) -> f64 {
        let mut max_drift = 0.0f64;
        for flavor in 0..self.n_flavors() {
            let report =
                self.matrices[flavor].rebuild(self.store.flavor(flavor), &self.bath, flavor);
            if report.drift.is_nan() {
                continue;
            }
            max_drift = max_drift.max(report.drift);
            if report.drift > drift_tolerance {
                warn!(
                    "inverse matrix of flavor {} drifted by {:.3e} (tolerance {:.3e})",
                    flavor, report.drift, drift_tolerance
                );
            }
            if report.sign_flipped {
                warn!(
                    "determinant sign of flavor {} disagreed with the tracked value; corrected",
                    flavor
                );
                self.sign = -self.sign;
            }
        }
        max_drift
    }

    /// Snapshot of the mutable Monte Carlo state, used by checkpointing.
    pub fn capture(&self) -> (Vec<FlavorState>, Vec<HybMatrix>, f64) {
        (self.store.flavor_states(), self.matrices.clone(), self.sign)
    }

    /// Installs a previously captured Monte Carlo state. The caller is
    /// responsible for compatibility checks.
    pub fn restore(&mut self, flavors: Vec<FlavorState>, matrices: Vec<HybMatrix>, sign: f64) {
        self.store.replace_flavors(flavors);
        self.matrices = matrices;
        self.sign = sign;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    fn system(n_flavors: usize, beta: f64, u: f64) -> ImpuritySystem {
        let mut umat = Array2::from_elem((n_flavors, n_flavors), u);
        umat.diag_mut().fill(0.0);
        let model = LocalModel::new(beta, vec![0.0; n_flavors], umat).unwrap();
        let bath = HybridizationTable::tabulate(n_flavors, 200, beta, |_, _, _| 0.5).unwrap();
        ImpuritySystem::new(model, bath).unwrap()
    }

    #[test]
    fn rejects_mismatched_bath() {
        let model = LocalModel::new(2.0, vec![0.0], Array2::zeros((1, 1))).unwrap();
        let bath = HybridizationTable::tabulate(2, 10, 2.0, |_, _, _| 0.5).unwrap();
        let err = ImpuritySystem::new(model, bath).unwrap_err();
        assert!(matches!(err, ConfigError::BathFlavorMismatch { .. }));

        let model = LocalModel::new(2.0, vec![0.0], Array2::zeros((1, 1))).unwrap();
        let bath = HybridizationTable::tabulate(1, 10, 4.0, |_, _, _| 0.5).unwrap();
        let err = ImpuritySystem::new(model, bath).unwrap_err();
        assert!(matches!(err, ConfigError::BathBetaMismatch { .. }));
    }

    #[test]
    fn interaction_overlap_weights_other_flavors() {
        let mut sys = system(2, 10.0, 3.0);
        let beta = sys.beta();
        sys.store.flavor_mut(1).insert(Segment::new(2.0, 6.0), beta);
        let probe = Segment::new(4.0, 8.0);
        // Overlap [4, 6) with U = 3
        assert!((sys.interaction_overlap(0, &probe) - 6.0).abs() < 1e-12);
        // A flavor never overlaps with itself
        assert_eq!(sys.interaction_overlap(1, &probe), 0.0);
    }

    #[test]
    fn toggle_flips_the_flag_without_touching_sign() {
        let mut sys = system(1, 5.0, 0.0);
        assert!(!sys.store().flavor(0).is_full_line());
        sys.apply_toggle(0);
        assert!(sys.store().flavor(0).is_full_line());
        assert_eq!(sys.sign(), 1.0);
        sys.apply_toggle(0);
        assert!(!sys.store().flavor(0).is_full_line());
    }
}
