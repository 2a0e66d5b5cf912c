use crate::error::ConfigError;
use crate::model::LocalModel;
use ndarray::Array2;
use serde::{Deserialize, Serialize};

/// Relative probabilities of the move types attempted during a sweep.
///
/// Only the ratios matter; the weights are normalized when drawing. The
/// paired insertion/removal update carries one weight for both
/// directions, so any weight assignment satisfies detailed balance.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct MoveWeights {
    pub insert_remove: f64,
    pub shift: f64,
    pub toggle_full_line: f64,
}

impl Default for MoveWeights {
    fn default() -> Self {
        Self {
            insert_remove: 1.0,
            shift: 0.5,
            toggle_full_line: 0.1,
        }
    }
}

impl MoveWeights {
    pub fn total(&self) -> f64 {
        self.insert_remove + self.shift + self.toggle_full_line
    }
}

fn default_drift_tolerance() -> f64 {
    1e-8
}

/// Typed solver parameters, as handed over by the outer harness.
///
/// The hybridization table is supplied separately (it is bulky and often
/// produced by the self-consistency loop); everything else needed to set
/// up a run lives here. `validate` must pass before any sweep runs.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SolverConfig {
    /// Inverse temperature.
    pub beta: f64,
    /// Chemical potential per flavor; the length doubles as the flavor
    /// count.
    pub mu: Vec<f64>,
    /// Interaction tensor, one row/column per flavor.
    pub u: Array2<f64>,
    /// Number of imaginary-time bins of the Green's function histogram.
    pub n_bins: usize,
    /// Number of Matsubara frequencies of the transformed result.
    pub n_matsubara: usize,
    /// Sweeps discarded before measuring starts.
    pub thermalization_sweeps: u64,
    /// Measured sweeps after thermalization.
    pub total_sweeps: u64,
    /// Measure every this many sweeps.
    pub measurement_interval: u64,
    /// Rebuild the inverse matrices from scratch every this many sweeps.
    pub recompute_interval: u64,
    /// Drift above which a rebuild logs a warning.
    #[serde(default = "default_drift_tolerance")]
    pub drift_tolerance: f64,
    #[serde(default)]
    pub move_weights: MoveWeights,
    /// Wall-clock budget in seconds, checked at sweep boundaries.
    #[serde(default)]
    pub max_seconds: Option<u64>,
    /// Enables the two-particle correlator measurement.
    #[serde(default)]
    pub measure_fourpoint: bool,
}

impl SolverConfig {
    /// Checks every parameter that is not already covered by
    /// [`LocalModel::new`].
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.n_bins == 0 {
            return Err(ConfigError::NonPositiveParameter {
                what: "time-bin count",
            });
        }
        if self.total_sweeps == 0 {
            return Err(ConfigError::NonPositiveParameter {
                what: "measured sweep count",
            });
        }
        if self.measurement_interval == 0 {
            return Err(ConfigError::NonPositiveParameter {
                what: "measurement interval",
            });
        }
        if self.recompute_interval == 0 {
            return Err(ConfigError::NonPositiveParameter {
                what: "matrix recompute interval",
            });
        }
        if !(self.drift_tolerance > 0.0) {
            return Err(ConfigError::NonPositiveParameter {
                what: "drift tolerance",
            });
        }
        let w = &self.move_weights;
        if w.insert_remove < 0.0
            || w.shift < 0.0
            || w.toggle_full_line < 0.0
            || !(w.total() > 0.0)
        {
            return Err(ConfigError::BadMoveWeights);
        }
        Ok(())
    }

    /// Builds the validated interaction model described by this
    /// configuration.
    pub fn model(&self) -> Result<LocalModel, ConfigError> {
        LocalModel::new(self.beta, self.mu.clone(), self.u.clone())
    }

    pub fn n_flavors(&self) -> usize {
        self.mu.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> SolverConfig {
        SolverConfig {
            beta: 10.0,
            mu: vec![0.0],
            u: Array2::zeros((1, 1)),
            n_bins: 50,
            n_matsubara: 20,
            thermalization_sweeps: 100,
            total_sweeps: 1000,
            measurement_interval: 5,
            recompute_interval: 100,
            drift_tolerance: 1e-8,
            move_weights: MoveWeights::default(),
            max_seconds: None,
            measure_fourpoint: false,
        }
    }

    #[test]
    fn base_config_is_valid() {
        base_config().validate().unwrap();
        base_config().model().unwrap();
    }

    #[test]
    fn rejects_zero_intervals() {
        let mut config = base_config();
        config.measurement_interval = 0;
        assert!(config.validate().is_err());

        let mut config = base_config();
        config.recompute_interval = 0;
        assert!(config.validate().is_err());

        let mut config = base_config();
        config.n_bins = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_bad_move_weights() {
        let mut config = base_config();
        config.move_weights.shift = -1.0;
        assert!(matches!(
            config.validate().unwrap_err(),
            ConfigError::BadMoveWeights
        ));

        let mut config = base_config();
        config.move_weights = MoveWeights {
            insert_remove: 0.0,
            shift: 0.0,
            toggle_full_line: 0.0,
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn config_round_trips_through_json() {
        let config = base_config();
        let text = serde_json::to_string(&config).unwrap();
        let back: SolverConfig = serde_json::from_str(&text).unwrap();
        assert_eq!(back.beta, config.beta);
        assert_eq!(back.n_bins, config.n_bins);
        assert_eq!(back.move_weights.shift, config.move_weights.shift);
    }
}
