use crate::error::ConfigError;
use ndarray::Array2;
use serde::{Deserialize, Serialize};

/// Static description of the local impurity problem: inverse temperature,
/// per-flavor chemical potential and the flavor-pair interaction tensor.
///
/// The interaction tensor is a symmetric matrix with zero diagonal; the
/// entry `u[(f1, f2)]` is the density-density coupling paid per unit of
/// imaginary-time overlap between occupied stretches of the two flavors.
/// All fields are immutable after construction.
///
/// # Example
/// ```
/// use cthyb::model::LocalModel;
/// use ndarray::array;
///
/// let model = LocalModel::new(10.0, vec![0.5, 0.5], array![[0.0, 2.0], [2.0, 0.0]]).unwrap();
/// assert_eq!(model.flavors(), 2);
/// assert_eq!(model.u(0, 1), 2.0);
/// ```
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LocalModel {
    beta: f64,
    mu: Vec<f64>,
    u: Array2<f64>,
}

impl LocalModel {
    /// Validates and builds a model.
    ///
    /// # Errors
    /// Returns a [`ConfigError`] if `beta` is not positive, if the flavor
    /// count is zero, if the interaction matrix is not square and symmetric
    /// with one row per flavor, or if any entry is non-finite.
    pub fn new(beta: f64, mu: Vec<f64>, u: Array2<f64>) -> Result<Self, ConfigError> {
        if !(beta > 0.0) {
            return Err(ConfigError::NonPositiveBeta(beta));
        }
        let n_flavors = mu.len();
        if n_flavors == 0 {
            return Err(ConfigError::NoFlavors);
        }
        if mu.iter().any(|m| !m.is_finite()) {
            return Err(ConfigError::NonFinite {
                context: "chemical potential",
            });
        }
        let (rows, cols) = u.dim();
        if rows != n_flavors || cols != n_flavors {
            return Err(ConfigError::InteractionShape {
                expected: n_flavors,
                rows,
                cols,
            });
        }
        if u.iter().any(|v| !v.is_finite()) {
            return Err(ConfigError::NonFinite {
                context: "interaction matrix",
            });
        }
        for f1 in 0..n_flavors {
            for f2 in (f1 + 1)..n_flavors {
                if u[(f1, f2)] != u[(f2, f1)] {
                    return Err(ConfigError::InteractionAsymmetry {
                        f1,
                        f2,
                        left: u[(f1, f2)],
                        right: u[(f2, f1)],
                    });
                }
            }
        }
        Ok(Self { beta, mu, u })
    }

    /// Inverse temperature, the length of the imaginary-time axis.
    pub fn beta(&self) -> f64 {
        self.beta
    }

    /// Number of orbital/spin flavors.
    pub fn flavors(&self) -> usize {
        self.mu.len()
    }

    /// Chemical potential of one flavor.
    pub fn mu(&self, flavor: usize) -> f64 {
        self.mu[flavor]
    }

    /// Interaction strength between a flavor pair.
    pub fn u(&self, f1: usize, f2: usize) -> f64 {
        self.u[(f1, f2)]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn accepts_valid_model() {
        let model =
            LocalModel::new(4.0, vec![0.1, -0.2], array![[0.0, 1.5], [1.5, 0.0]]).unwrap();
        assert_eq!(model.beta(), 4.0);
        assert_eq!(model.mu(1), -0.2);
        assert_eq!(model.u(1, 0), 1.5);
    }

    #[test]
    fn rejects_non_positive_beta() {
        let err = LocalModel::new(0.0, vec![0.0], array![[0.0]]).unwrap_err();
        assert!(matches!(err, ConfigError::NonPositiveBeta(_)));
        let err = LocalModel::new(-1.0, vec![0.0], array![[0.0]]).unwrap_err();
        assert!(matches!(err, ConfigError::NonPositiveBeta(_)));
    }

    #[test]
    fn rejects_empty_flavor_list() {
        let err = LocalModel::new(1.0, vec![], Array2::zeros((0, 0))).unwrap_err();
        assert!(matches!(err, ConfigError::NoFlavors));
    }

    #[test]
    fn rejects_shape_mismatch() {
        let err = LocalModel::new(1.0, vec![0.0, 0.0], array![[0.0]]).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InteractionShape {
                expected: 2,
                rows: 1,
                cols: 1
            }
        ));
    }

    #[test]
    fn rejects_asymmetric_interaction() {
        let err =
            LocalModel::new(1.0, vec![0.0, 0.0], array![[0.0, 1.0], [2.0, 0.0]]).unwrap_err();
        assert!(matches!(err, ConfigError::InteractionAsymmetry { .. }));
    }

    #[test]
    fn rejects_non_finite_entries() {
        let err = LocalModel::new(1.0, vec![f64::NAN], array![[0.0]]).unwrap_err();
        assert!(matches!(err, ConfigError::NonFinite { .. }));
    }
}
