use crate::system::ImpuritySystem;
use ndarray::Array4;
use serde::{Deserialize, Serialize};

/// Estimator of the two-particle (four-point) correlator in the
/// particle-hole channel, binned over two imaginary-time differences.
///
/// For every flavor pair, each measurement accumulates the product of two
/// inverse-matrix entries, one per flavor, binned at their respective
/// antiperiodically folded time differences. For equal flavors the
/// exchange contraction is subtracted, each term binned at its own time
/// arguments. The cost per measurement is O(n^2 m^2) in the segment
/// counts, which is why the whole estimator sits behind an explicit
/// toggle.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FourPointAccumulator {
    beta: f64,
    n_bins: usize,
    /// Sign-weighted histogram, indexed `(f1, f2, bin1, bin2)`.
    hist: Array4<f64>,
    sign_sum: f64,
    n_meas: u64,
}

impl FourPointAccumulator {
    pub fn new(n_flavors: usize, n_bins: usize, beta: f64) -> Self {
        Self {
            beta,
            n_bins,
            hist: Array4::zeros((n_flavors, n_flavors, n_bins + 1, n_bins + 1)),
            sign_sum: 0.0,
            n_meas: 0,
        }
    }

    pub fn count(&self) -> u64 {
        self.n_meas
    }

    pub fn histogram(&self) -> &Array4<f64> {
        &self.hist
    }

    fn bin(&self, mut arg: f64) -> (usize, f64) {
        let mut fold_sign = 1.0;
        if arg < 0.0 {
            arg += self.beta;
            fold_sign = -1.0;
        }
        let bin = (arg / self.beta * self.n_bins as f64 + 0.5) as usize;
        (bin, fold_sign)
    }

    /// Records the current configuration.
    pub fn measure(&mut self, system: &ImpuritySystem) {
        let sign = system.sign();
        self.sign_sum += sign;
        self.n_meas += 1;
        let n_flavors = self.hist.dim().0;
        for f1 in 0..n_flavors {
            let state1 = system.store().flavor(f1);
            let m1 = system.matrix(f1).matrix();
            let n1 = state1.len();
            for f2 in 0..n_flavors {
                let state2 = system.store().flavor(f2);
                let m2 = system.matrix(f2).matrix();
                let n2 = state2.len();
                for i in 0..n1 {
                    for j in 0..n1 {
                        let (bin1, fold1) =
                            self.bin(state1.segment(i).t_end - state1.segment(j).t_start);
                        let direct1 = m1[(j, i)] * fold1;
                        for k in 0..n2 {
                            for l in 0..n2 {
                                let (bin2, fold2) = self
                                    .bin(state2.segment(k).t_end - state2.segment(l).t_start);
                                self.hist[(f1, f2, bin1, bin2)] +=
                                    direct1 * m2[(l, k)] * fold2 * sign;
                                if f1 == f2 {
                                    // Exchange contraction, binned at its
                                    // own time arguments
                                    let (bin_a, fold_a) = self
                                        .bin(state1.segment(i).t_end - state2.segment(l).t_start);
                                    let (bin_b, fold_b) = self
                                        .bin(state2.segment(k).t_end - state1.segment(j).t_start);
                                    self.hist[(f1, f2, bin_a, bin_b)] -=
                                        m1[(l, i)] * fold_a * m1[(j, k)] * fold_b * sign;
                                }
                            }
                        }
                    }
                }
            }
        }
    }

    /// Drops all measurements.
    pub fn reset(&mut self) {
        self.hist.fill(0.0);
        self.sign_sum = 0.0;
        self.n_meas = 0;
    }

    /// Normalized correlator on the bin nodes; the boundary nodes carry
    /// half-width bins along each axis.
    pub fn finalize(&self) -> Array4<f64> {
        let mut data = self.hist.clone();
        if self.n_meas == 0 || self.sign_sum == 0.0 {
            data.fill(0.0);
            return data;
        }
        let per_axis = self.n_bins as f64 / (self.beta * self.beta);
        let norm = per_axis * per_axis / self.sign_sum;
        data.mapv_inplace(|v| v * norm);
        let n = self.n_bins;
        let (f1s, f2s, _, _) = data.dim();
        for f1 in 0..f1s {
            for f2 in 0..f2s {
                for k in 0..=n {
                    data[(f1, f2, 0, k)] *= 2.0;
                    data[(f1, f2, n, k)] *= 2.0;
                    data[(f1, f2, k, 0)] *= 2.0;
                    data[(f1, f2, k, n)] *= 2.0;
                }
            }
        }
        data
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bath::HybridizationTable;
    use crate::model::LocalModel;
    use crate::segments::Segment;
    use ndarray::Array2;

    const BETA: f64 = 10.0;
    const F0: f64 = 0.5;

    fn system_with_segments(segs: &[&[(f64, f64)]]) -> ImpuritySystem {
        let n_flavors = segs.len();
        let model =
            LocalModel::new(BETA, vec![0.0; n_flavors], Array2::zeros((n_flavors, n_flavors)))
                .unwrap();
        let bath = HybridizationTable::tabulate(n_flavors, 100, BETA, |_, _, _| F0).unwrap();
        let mut sys = ImpuritySystem::new(model, bath).unwrap();
        for (flavor, flavor_segs) in segs.iter().enumerate() {
            for &(s, e) in flavor_segs.iter() {
                let seg = Segment::new(s, e);
                let state = sys.store().flavor(flavor);
                let plan = sys.matrix(flavor).insertion_ratio(
                    state,
                    sys.bath(),
                    flavor,
                    &seg,
                    state.insert_index(s),
                );
                sys.apply_insert(flavor, seg, &plan);
            }
        }
        sys
    }

    #[test]
    fn cross_flavor_product_lands_in_the_right_bins() {
        let sys = system_with_segments(&[&[(2.0, 5.0)], &[(1.0, 3.0)]]);
        let mut acc = FourPointAccumulator::new(2, 10, BETA);
        acc.measure(&sys);
        // Flavor 0: tau = 3 -> bin 3, M = 1/F; flavor 1: tau = 2 -> bin 2
        let expected = (1.0 / F0) * (1.0 / F0);
        assert!((acc.histogram()[(0, 1, 3, 2)] - expected).abs() < 1e-9);
        assert!((acc.histogram()[(1, 0, 2, 3)] - expected).abs() < 1e-9);
    }

    #[test]
    fn same_flavor_subtracts_the_exchange_term() {
        let sys = system_with_segments(&[&[(2.0, 5.0)]]);
        let mut acc = FourPointAccumulator::new(1, 10, BETA);
        acc.measure(&sys);
        // With a single segment the direct and exchange contractions bin
        // at the same spot and cancel exactly
        assert!(acc.histogram().iter().all(|&v| v.abs() < 1e-12));
    }

    #[test]
    fn empty_configuration_still_counts_the_sign() {
        let sys = system_with_segments(&[&[]]);
        let mut acc = FourPointAccumulator::new(1, 4, BETA);
        acc.measure(&sys);
        assert_eq!(acc.count(), 1);
        assert!(acc.histogram().iter().all(|&v| v == 0.0));
    }
}
