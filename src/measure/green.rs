use crate::system::ImpuritySystem;
use crate::utils::trig::{sincos_scalar, SinCosFn};
use ndarray::Array2;
use num_complex::Complex64;
use serde::{Deserialize, Serialize};

fn default_sincos() -> SinCosFn {
    sincos_scalar
}

/// Estimator of the single-particle imaginary-time Green's function.
///
/// At every measurement, each flavor contributes one term per pair of
/// (segment end, segment start) points: the time difference `e_i - s_j`
/// is folded antiperiodically into `[0, beta)` and binned on a uniform
/// mesh of `n_bins + 1` nodes, weighted by the inverse-matrix entry
/// `M[j][i]`, the folding sign and the configuration sign. With
/// flavor-diagonal hybridization matrices the off-diagonal components of
/// the one-particle function vanish identically, so only the diagonal is
/// accumulated.
///
/// The histogram, the sign-weighted measurement count and the running
/// sign total are all serializable, so measurements continue seamlessly
/// across a checkpoint. The sine/cosine routine used by the Matsubara
/// transform is an injected capability and is restored to the portable
/// fallback on deserialization.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GreenAccumulator {
    beta: f64,
    n_bins: usize,
    /// Sign-weighted histogram, indexed `(flavor, bin)`.
    hist: Array2<f64>,
    /// Sum of configuration signs over all measurements.
    sign_sum: f64,
    /// Number of measurements taken.
    n_meas: u64,
    #[serde(skip, default = "default_sincos")]
    sincos: SinCosFn,
}

impl GreenAccumulator {
    pub fn new(n_flavors: usize, n_bins: usize, beta: f64) -> Self {
        Self::with_sincos(n_flavors, n_bins, beta, sincos_scalar)
    }

    /// Creates an accumulator with a caller-supplied vectorized
    /// sine/cosine routine for the transform step.
    pub fn with_sincos(n_flavors: usize, n_bins: usize, beta: f64, sincos: SinCosFn) -> Self {
        Self {
            beta,
            n_bins,
            hist: Array2::zeros((n_flavors, n_bins + 1)),
            sign_sum: 0.0,
            n_meas: 0,
            sincos,
        }
    }

    pub fn n_bins(&self) -> usize {
        self.n_bins
    }

    pub fn flavors(&self) -> usize {
        self.hist.dim().0
    }

    /// Number of measurements taken so far.
    pub fn count(&self) -> u64 {
        self.n_meas
    }

    /// Sum of configuration signs over all measurements; the average sign
    /// is `sign_sum() / count()`.
    pub fn sign_sum(&self) -> f64 {
        self.sign_sum
    }

    /// Raw sign-weighted histogram, indexed `(flavor, bin)`.
    pub fn histogram(&self) -> &Array2<f64> {
        &self.hist
    }

    /// Records the current configuration.
    pub fn measure(&mut self, system: &ImpuritySystem) {
        let beta = self.beta;
        let sign = system.sign();
        self.sign_sum += sign;
        self.n_meas += 1;
        for flavor in 0..self.flavors() {
            let state = system.store().flavor(flavor);
            let m = system.matrix(flavor).matrix();
            let n = state.len();
            for i in 0..n {
                let t_end = state.segment(i).t_end;
                for j in 0..n {
                    let mut arg = t_end - state.segment(j).t_start;
                    let mut fold_sign = 1.0;
                    if arg < 0.0 {
                        arg += beta;
                        fold_sign = -1.0;
                    }
                    let bin = (arg / beta * self.n_bins as f64 + 0.5) as usize;
                    self.hist[(flavor, bin)] += m[(j, i)] * fold_sign * sign;
                }
            }
        }
    }

    /// Drops all measurements. Called at the end of thermalization.
    pub fn reset(&mut self) {
        self.hist.fill(0.0);
        self.sign_sum = 0.0;
        self.n_meas = 0;
    }

    /// Normalized imaginary-time Green's function on the bin nodes.
    pub fn finalize(&self) -> ItimeGreenFunction {
        let mut data = Array2::zeros(self.hist.dim());
        if self.n_meas > 0 && self.sign_sum != 0.0 {
            let norm = -(self.n_bins as f64) / (self.beta * self.beta * self.sign_sum);
            data.assign(&self.hist);
            data.mapv_inplace(|v| v * norm);
            // The first and last nodes carry half-width bins
            for flavor in 0..self.flavors() {
                data[(flavor, 0)] *= 2.0;
                data[(flavor, self.n_bins)] *= 2.0;
            }
        }
        ItimeGreenFunction {
            beta: self.beta,
            data,
        }
    }

    /// Matsubara-frequency Green's function on the first `n_freq`
    /// fermionic frequencies, by direct trapezoidal sine/cosine transform
    /// of the binned imaginary-time function.
    pub fn matsubara(&self, n_freq: usize) -> Array2<Complex64> {
        let itime = self.finalize();
        let n_nodes = self.n_bins + 1;
        let d_tau = self.beta / self.n_bins as f64;
        let mut out = Array2::zeros((self.flavors(), n_freq));
        let mut angles = vec![0.0; n_nodes];
        let mut sines = vec![0.0; n_nodes];
        let mut cosines = vec![0.0; n_nodes];
        for m in 0..n_freq {
            let omega = (2 * m + 1) as f64 * std::f64::consts::PI / self.beta;
            for (k, angle) in angles.iter_mut().enumerate() {
                *angle = omega * k as f64 * d_tau;
            }
            (self.sincos)(&angles, &mut sines, &mut cosines);
            for flavor in 0..self.flavors() {
                let mut re = 0.0;
                let mut im = 0.0;
                for k in 0..n_nodes {
                    // Trapezoidal weights on the closed interval [0, beta]
                    let weight = if k == 0 || k == self.n_bins { 0.5 } else { 1.0 };
                    let g = itime.data[(flavor, k)] * weight;
                    re += g * cosines[k];
                    im += g * sines[k];
                }
                out[(flavor, m)] = Complex64::new(re * d_tau, im * d_tau);
            }
        }
        out
    }
}

/// Finalized imaginary-time Green's function on a uniform tau mesh.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ItimeGreenFunction {
    beta: f64,
    /// Values indexed `(flavor, bin)`.
    data: Array2<f64>,
}

impl ItimeGreenFunction {
    pub fn beta(&self) -> f64 {
        self.beta
    }

    pub fn flavors(&self) -> usize {
        self.data.dim().0
    }

    pub fn n_bins(&self) -> usize {
        self.data.dim().1 - 1
    }

    /// Tau value of one mesh node.
    pub fn tau(&self, k: usize) -> f64 {
        self.beta * k as f64 / self.n_bins() as f64
    }

    pub fn value(&self, flavor: usize, k: usize) -> f64 {
        self.data[(flavor, k)]
    }

    pub fn values(&self) -> &Array2<f64> {
        &self.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bath::HybridizationTable;
    use crate::model::LocalModel;
    use crate::segments::Segment;
    use ndarray::Array2 as NdArray2;

    const BETA: f64 = 10.0;
    const F0: f64 = 0.5;

    fn one_segment_system(t_start: f64, t_end: f64) -> ImpuritySystem {
        let model = LocalModel::new(BETA, vec![0.0], NdArray2::zeros((1, 1))).unwrap();
        let bath = HybridizationTable::tabulate(1, 100, BETA, |_, _, _| F0).unwrap();
        let mut sys = ImpuritySystem::new(model, bath).unwrap();
        let seg = Segment::new(t_start, t_end);
        let state = sys.store().flavor(0);
        let plan = sys
            .matrix(0)
            .insertion_ratio(state, sys.bath(), 0, &seg, state.insert_index(t_start));
        sys.apply_insert(0, seg, &plan);
        sys
    }

    #[test]
    fn single_pair_lands_in_the_right_bin() {
        let sys = one_segment_system(2.0, 5.0);
        let mut acc = GreenAccumulator::new(1, 10, BETA);
        acc.measure(&sys);
        assert_eq!(acc.count(), 1);
        assert_eq!(acc.sign_sum(), 1.0);
        // One (end, start) pair at tau = 3.0 -> bin 3, weight M = 1/F
        let expected = 1.0 / F0;
        assert!((acc.histogram()[(0, 3)] - expected).abs() < 1e-9);
        let other: f64 = acc
            .histogram()
            .iter()
            .enumerate()
            .filter(|(k, _)| *k != 3)
            .map(|(_, v)| v.abs())
            .sum();
        assert_eq!(other, 0.0, "only one bin may be filled");
    }

    #[test]
    fn wrapping_pair_folds_with_a_sign() {
        // Segment [8, 1): the end-start difference is negative and folds
        // antiperiodically
        let sys = one_segment_system(8.0, 1.0);
        let mut acc = GreenAccumulator::new(1, 10, BETA);
        acc.measure(&sys);
        // arg = 1 - 8 = -7 -> tau = 3, fold sign = -1; M = 1/F(-7) = -1/F(3)
        let expected = (1.0 / -F0) * -1.0;
        assert!((acc.histogram()[(0, 3)] - expected).abs() < 1e-9);
    }

    #[test]
    fn finalize_normalizes_and_doubles_the_edge_bins() {
        let sys = one_segment_system(2.0, 5.0);
        let mut acc = GreenAccumulator::new(1, 10, BETA);
        acc.measure(&sys);
        let green = acc.finalize();
        let expected = -(1.0 / F0) * 10.0 / (BETA * BETA);
        assert!((green.value(0, 3) - expected).abs() < 1e-9);
        assert_eq!(green.tau(3), 3.0);
        // Untouched interior bins stay zero
        assert_eq!(green.value(0, 5), 0.0);
    }

    #[test]
    fn finalize_of_empty_accumulator_is_zero() {
        let acc = GreenAccumulator::new(2, 4, BETA);
        let green = acc.finalize();
        assert!(green.values().iter().all(|&v| v == 0.0));
    }

    #[test]
    fn matsubara_matches_direct_transform() {
        let sys = one_segment_system(2.0, 5.0);
        let mut acc = GreenAccumulator::new(1, 20, BETA);
        acc.measure(&sys);
        let coeffs = acc.matsubara(3);
        let green = acc.finalize();
        let d_tau = BETA / 20.0;
        for m in 0..3 {
            let omega = (2 * m + 1) as f64 * std::f64::consts::PI / BETA;
            let mut expected = Complex64::new(0.0, 0.0);
            for k in 0..=20 {
                let weight = if k == 0 || k == 20 { 0.5 } else { 1.0 };
                let tau = k as f64 * d_tau;
                expected += Complex64::new(0.0, omega * tau).exp()
                    * green.value(0, k)
                    * weight
                    * d_tau;
            }
            assert!((coeffs[(0, m)] - expected).norm() < 1e-12);
        }
    }

    #[test]
    fn reset_clears_measurements() {
        let sys = one_segment_system(2.0, 5.0);
        let mut acc = GreenAccumulator::new(1, 10, BETA);
        acc.measure(&sys);
        acc.reset();
        assert_eq!(acc.count(), 0);
        assert!(acc.histogram().iter().all(|&v| v == 0.0));
    }
}
