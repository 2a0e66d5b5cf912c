use super::accumulator::Accumulator;
use crate::system::ImpuritySystem;
use serde::{Deserialize, Serialize};

/// Scalar observables tracked alongside the Green's function: the average
/// configuration sign, and per flavor the density `n_f = L_f / beta` and
/// the hybridization-expansion order.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScalarMeasurements {
    pub sign: Accumulator,
    pub order: Vec<Accumulator>,
    pub density: Vec<Accumulator>,
}

impl ScalarMeasurements {
    pub fn new(n_flavors: usize, n_blocks: usize) -> Self {
        Self {
            sign: Accumulator::new(n_blocks),
            order: (0..n_flavors).map(|_| Accumulator::new(n_blocks)).collect(),
            density: (0..n_flavors).map(|_| Accumulator::new(n_blocks)).collect(),
        }
    }

    pub fn measure(&mut self, system: &ImpuritySystem) {
        let beta = system.beta();
        self.sign.add(system.sign());
        for flavor in 0..system.n_flavors() {
            let state = system.store().flavor(flavor);
            self.order[flavor].add(state.len() as f64);
            self.density[flavor].add(state.total_length(beta) / beta);
        }
    }

    pub fn reset(&mut self) {
        self.sign.clear();
        for acc in self.order.iter_mut().chain(self.density.iter_mut()) {
            acc.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bath::HybridizationTable;
    use crate::model::LocalModel;
    use crate::segments::Segment;
    use ndarray::Array2;

    #[test]
    fn tracks_sign_order_and_density() {
        let beta = 4.0;
        let model = LocalModel::new(beta, vec![0.0], Array2::zeros((1, 1))).unwrap();
        let bath = HybridizationTable::tabulate(1, 50, beta, |_, _, _| 0.5).unwrap();
        let mut sys = ImpuritySystem::new(model, bath).unwrap();
        let seg = Segment::new(1.0, 2.0);
        let state = sys.store().flavor(0);
        let plan =
            sys.matrix(0)
                .insertion_ratio(state, sys.bath(), 0, &seg, state.insert_index(1.0));
        sys.apply_insert(0, seg, &plan);

        let mut scalars = ScalarMeasurements::new(1, 8);
        scalars.measure(&sys);
        let (sign_mean, ..) = scalars.sign.statistics().unwrap();
        let (order_mean, ..) = scalars.order[0].statistics().unwrap();
        let (density_mean, ..) = scalars.density[0].statistics().unwrap();
        assert_eq!(sign_mean, 1.0);
        assert_eq!(order_mean, 1.0);
        assert!((density_mean - 0.25).abs() < 1e-12);
    }
}
