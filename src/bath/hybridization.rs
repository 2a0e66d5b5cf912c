use crate::error::ConfigError;
use ndarray::Array3;
use serde::{Deserialize, Serialize};

/// Tabulated hybridization function on a uniform imaginary-time mesh.
///
/// The table stores one curve per flavor pair, sampled on `n_tau + 1`
/// equidistant points covering `[0, beta]`. Evaluation linearly
/// interpolates between mesh points; negative time arguments are folded
/// back with the fermionic antiperiodic extension
/// `F(tau) = -F(tau + beta)`.
///
/// # Example
/// ```
/// use cthyb::bath::HybridizationTable;
///
/// // Constant hybridization, one flavor
/// let table = HybridizationTable::tabulate(1, 100, 10.0, |_, _, _| 0.5).unwrap();
/// assert_eq!(table.eval(0, 0, 3.7), 0.5);
/// assert_eq!(table.eval(0, 0, -3.7), -0.5);
/// ```
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HybridizationTable {
    beta: f64,
    /// Mesh values indexed `(f1, f2, tau_index)`.
    data: Array3<f64>,
}

impl HybridizationTable {
    /// Builds a table by sampling `f(f1, f2, tau)` on the mesh.
    pub fn tabulate<F>(
        n_flavors: usize,
        n_tau: usize,
        beta: f64,
        f: F,
    ) -> Result<Self, ConfigError>
    where
        F: Fn(usize, usize, f64) -> f64,
    {
        if !(beta > 0.0) {
            return Err(ConfigError::NonPositiveBeta(beta));
        }
        if n_flavors == 0 {
            return Err(ConfigError::NoFlavors);
        }
        if n_tau < 1 {
            return Err(ConfigError::MeshTooSmall(n_tau + 1));
        }
        let data = Array3::from_shape_fn((n_flavors, n_flavors, n_tau + 1), |(f1, f2, k)| {
            f(f1, f2, beta * k as f64 / n_tau as f64)
        });
        Self::from_mesh(beta, data)
    }

    /// Builds a table from raw mesh data indexed `(f1, f2, tau_index)`.
    ///
    /// # Errors
    /// Returns a [`ConfigError`] if the mesh has fewer than two tau points,
    /// if the two flavor axes disagree, or if any value is non-finite.
    pub fn from_mesh(beta: f64, data: Array3<f64>) -> Result<Self, ConfigError> {
        if !(beta > 0.0) {
            return Err(ConfigError::NonPositiveBeta(beta));
        }
        let (f1, f2, n_points) = data.dim();
        if f1 == 0 {
            return Err(ConfigError::NoFlavors);
        }
        if f1 != f2 {
            return Err(ConfigError::BathFlavorMismatch {
                expected: f1,
                found: f2,
            });
        }
        if n_points < 2 {
            return Err(ConfigError::MeshTooSmall(n_points));
        }
        if data.iter().any(|v| !v.is_finite()) {
            return Err(ConfigError::NonFinite {
                context: "hybridization table",
            });
        }
        Ok(Self { beta, data })
    }

    /// Inverse temperature the table was sampled for.
    pub fn beta(&self) -> f64 {
        self.beta
    }

    /// Number of flavors covered by the table.
    pub fn flavors(&self) -> usize {
        self.data.dim().0
    }

    /// Number of mesh intervals.
    pub fn n_tau(&self) -> usize {
        self.data.dim().2 - 1
    }

    /// Evaluates the hybridization function at a time difference
    /// `tau` in `(-beta, beta)` by linear interpolation.
    pub fn eval(&self, f1: usize, f2: usize, tau: f64) -> f64 {
        debug_assert!(
            tau > -self.beta && tau < self.beta,
            "time difference out of range: tau={}, beta={}",
            tau,
            self.beta
        );
        let (tau, sign) = if tau < 0.0 {
            (tau + self.beta, -1.0)
        } else {
            (tau, 1.0)
        };
        let n_tau = self.n_tau();
        let x = tau / self.beta * n_tau as f64;
        let k = (x as usize).min(n_tau - 1);
        let frac = x - k as f64;
        let lower = self.data[(f1, f2, k)];
        let upper = self.data[(f1, f2, k + 1)];
        sign * (lower + frac * (upper - lower))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array3;

    #[test]
    fn exact_on_mesh_points() {
        let beta = 2.0;
        let table = HybridizationTable::tabulate(1, 4, beta, |_, _, tau| tau * tau).unwrap();
        for k in 0..=4 {
            let tau = beta * k as f64 / 4.0;
            let expected = tau * tau;
            // The last mesh point is reached through the final interval
            assert!(
                (table.eval(0, 0, tau.min(beta - 1e-12)) - expected).abs() < 1e-9,
                "mesh point {} mismatch",
                k
            );
        }
    }

    #[test]
    fn linear_between_mesh_points() {
        let table = HybridizationTable::tabulate(1, 2, 1.0, |_, _, tau| tau).unwrap();
        assert!((table.eval(0, 0, 0.25) - 0.25).abs() < 1e-12);
        assert!((table.eval(0, 0, 0.75) - 0.75).abs() < 1e-12);
    }

    #[test]
    fn antiperiodic_extension_for_negative_times() {
        let table = HybridizationTable::tabulate(1, 10, 5.0, |_, _, tau| 1.0 + tau).unwrap();
        // F(-tau) = -F(beta - tau)
        let tau = 1.5;
        assert!((table.eval(0, 0, -tau) + table.eval(0, 0, 5.0 - tau)).abs() < 1e-12);
    }

    #[test]
    fn serves_flavor_pairs() {
        let table =
            HybridizationTable::tabulate(2, 4, 1.0, |f1, f2, _| (f1 + 2 * f2) as f64).unwrap();
        assert_eq!(table.eval(1, 0, 0.5), 1.0);
        assert_eq!(table.eval(0, 1, 0.5), 2.0);
    }

    #[test]
    fn rejects_tiny_mesh() {
        let err = HybridizationTable::from_mesh(1.0, Array3::zeros((1, 1, 1))).unwrap_err();
        assert!(matches!(err, ConfigError::MeshTooSmall(1)));
    }

    #[test]
    fn rejects_non_finite_values() {
        let err =
            HybridizationTable::tabulate(1, 2, 1.0, |_, _, _| f64::INFINITY).unwrap_err();
        assert!(matches!(err, ConfigError::NonFinite { .. }));
    }
}
