use super::checkpoint::Checkpoint;
use super::config::SolverConfig;
use super::traits::MonteCarloRun;
use crate::bath::HybridizationTable;
use crate::error::{CheckpointError, ConfigError};
use crate::measure::{FourPointAccumulator, GreenAccumulator, ItimeGreenFunction, ScalarMeasurements};
use crate::system::ImpuritySystem;
use crate::updates::{InsertRemoveSegment, MonteCarloUpdate, ShiftSegmentEnd, ToggleFullLine};
use crate::utils::trig::SinCosFn;
use log::{debug, info};
use ndarray::{Array2, Array4};
use num_complex::Complex64;
use rand::Rng;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Instant;

const SCALAR_BLOCKS: usize = 256;

/// One Markov chain of the segment sampler.
///
/// Owns the model, the bath table, the segment configurations with their
/// inverse matrices, the accumulators and the random-number stream, and
/// advances them strictly sequentially: propose, accept or reject, then
/// measure at the configured interval once thermalized. The outer
/// harness drives the chain through [`MonteCarloRun`]; several
/// independent chains may run in parallel and are merged externally.
pub struct ImpuritySolver<R> {
    config: SolverConfig,
    system: ImpuritySystem,
    insert_remove: InsertRemoveSegment,
    shift: ShiftSegmentEnd,
    toggle: ToggleFullLine,
    green: GreenAccumulator,
    fourpoint: Option<FourPointAccumulator>,
    scalars: ScalarMeasurements,
    sweeps_done: u64,
    rng: R,
    started: Instant,
}

impl<R: Rng + Clone> ImpuritySolver<R> {
    /// Validates the configuration and builds a solver starting from the
    /// empty configuration.
    pub fn new(
        config: SolverConfig,
        bath: HybridizationTable,
        rng: R,
    ) -> Result<Self, ConfigError> {
        Self::with_sincos(config, bath, rng, crate::utils::trig::sincos_scalar)
    }

    /// Same as [`new`](Self::new) with a caller-supplied vectorized
    /// sine/cosine routine for the transform step.
    pub fn with_sincos(
        config: SolverConfig,
        bath: HybridizationTable,
        rng: R,
        sincos: SinCosFn,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let model = config.model()?;
        let n_flavors = model.flavors();
        let system = ImpuritySystem::new(model, bath)?;
        let green = GreenAccumulator::with_sincos(n_flavors, config.n_bins, config.beta, sincos);
        let fourpoint = config
            .measure_fourpoint
            .then(|| FourPointAccumulator::new(n_flavors, config.n_bins, config.beta));
        let scalars = ScalarMeasurements::new(n_flavors, SCALAR_BLOCKS);
        info!(
            "solver set up: {} flavors, beta = {}, {} + {} sweeps",
            n_flavors, config.beta, config.thermalization_sweeps, config.total_sweeps
        );
        Ok(Self {
            config,
            system,
            insert_remove: InsertRemoveSegment::new(),
            shift: ShiftSegmentEnd::new(),
            toggle: ToggleFullLine::new(),
            green,
            fourpoint,
            scalars,
            sweeps_done: 0,
            rng,
            started: Instant::now(),
        })
    }

    pub fn config(&self) -> &SolverConfig {
        &self.config
    }

    pub fn system(&self) -> &ImpuritySystem {
        &self.system
    }

    pub fn sweeps_done(&self) -> u64 {
        self.sweeps_done
    }

    pub fn green(&self) -> &GreenAccumulator {
        &self.green
    }

    pub fn scalars(&self) -> &ScalarMeasurements {
        &self.scalars
    }

    /// Finalized imaginary-time Green's function.
    pub fn green_function(&self) -> ItimeGreenFunction {
        self.green.finalize()
    }

    /// Finalized Matsubara-frequency Green's function.
    pub fn matsubara_function(&self) -> Array2<Complex64> {
        self.green.matsubara(self.config.n_matsubara)
    }

    /// Finalized two-particle correlator, when its measurement is enabled.
    pub fn fourpoint_function(&self) -> Option<Array4<f64>> {
        self.fourpoint.as_ref().map(|acc| acc.finalize())
    }

    /// Whether the wall-clock budget is spent. Checked at sweep
    /// boundaries only, so the chain always stops in a consistent state.
    pub fn budget_exhausted(&self) -> bool {
        match self.config.max_seconds {
            Some(limit) => self.started.elapsed().as_secs() >= limit,
            None => false,
        }
    }

    /// Advances until the sweep budget is complete or the wall-clock
    /// budget runs out, whichever comes first.
    pub fn run(&mut self) {
        while !self.is_complete() {
            if self.budget_exhausted() {
                info!(
                    "wall-clock budget exhausted after {} sweeps, stopping cleanly",
                    self.sweeps_done
                );
                return;
            }
            self.advance_sweep();
        }
        info!(
            "run complete: {} sweeps, {} measurements",
            self.sweeps_done,
            self.green.count()
        );
    }

    fn attempt_one_move(&mut self) {
        let weights = self.config.move_weights;
        let draw = self.rng.gen::<f64>() * weights.total();
        if draw < weights.insert_remove {
            self.insert_remove.try_update(&mut self.system, &mut self.rng);
        } else if draw < weights.insert_remove + weights.shift {
            self.shift.try_update(&mut self.system, &mut self.rng);
        } else {
            self.toggle.try_update(&mut self.system, &mut self.rng);
        }
    }

    fn measure(&mut self) {
        self.green.measure(&self.system);
        if let Some(fourpoint) = self.fourpoint.as_mut() {
            fourpoint.measure(&self.system);
        }
        self.scalars.measure(&self.system);
    }
}

impl<R: Rng + Clone> MonteCarloRun for ImpuritySolver<R> {
    type Snapshot = Checkpoint<R>;

    fn advance_sweep(&mut self) {
        for _ in 0..self.system.n_flavors() {
            self.attempt_one_move();
        }
        self.sweeps_done += 1;

        if self.sweeps_done == self.config.thermalization_sweeps {
            debug!("thermalization finished, clearing accumulators");
            self.green.reset();
            if let Some(fourpoint) = self.fourpoint.as_mut() {
                fourpoint.reset();
            }
            self.scalars.reset();
        }

        let therm = self.config.thermalization_sweeps;
        if self.sweeps_done > therm
            && (self.sweeps_done - therm) % self.config.measurement_interval == 0
        {
            self.measure();
        }

        if self.sweeps_done % self.config.recompute_interval == 0 {
            let drift = self.system.rebuild_matrices(self.config.drift_tolerance);
            debug!(
                "periodic matrix rebuild at sweep {}: max drift {:.3e}",
                self.sweeps_done, drift
            );
        }
    }

    fn is_thermalized(&self) -> bool {
        self.sweeps_done >= self.config.thermalization_sweeps
    }

    fn is_complete(&self) -> bool {
        self.sweeps_done >= self.config.thermalization_sweeps + self.config.total_sweeps
    }

    fn progress(&self) -> f64 {
        if !self.is_thermalized() {
            return 0.0;
        }
        let measured = self.sweeps_done - self.config.thermalization_sweeps;
        (measured as f64 / self.config.total_sweeps as f64).min(1.0)
    }

    fn save_checkpoint(&self) -> Checkpoint<R> {
        let (flavors, matrices, sign) = self.system.capture();
        Checkpoint {
            flavors,
            matrices,
            sign,
            green: self.green.clone(),
            fourpoint: self.fourpoint.clone(),
            scalars: self.scalars.clone(),
            sweeps_done: self.sweeps_done,
            rng: self.rng.clone(),
        }
    }

    fn restore_checkpoint(&mut self, snapshot: Checkpoint<R>) -> Result<(), CheckpointError> {
        let n_flavors = self.system.n_flavors();
        if snapshot.flavors.len() != n_flavors {
            return Err(CheckpointError::FlavorMismatch {
                expected: n_flavors,
                found: snapshot.flavors.len(),
            });
        }
        if snapshot.matrices.len() != n_flavors {
            return Err(CheckpointError::FlavorMismatch {
                expected: n_flavors,
                found: snapshot.matrices.len(),
            });
        }
        if snapshot.green.n_bins() != self.config.n_bins
            || snapshot.green.flavors() != n_flavors
        {
            return Err(CheckpointError::BinMismatch {
                expected: self.config.n_bins,
                found: snapshot.green.n_bins(),
            });
        }
        for (flavor, (state, matrix)) in snapshot
            .flavors
            .iter()
            .zip(snapshot.matrices.iter())
            .enumerate()
        {
            if matrix.n() != state.len() {
                return Err(CheckpointError::MatrixShape {
                    flavor,
                    rows: matrix.n(),
                    cols: matrix.n(),
                    segments: state.len(),
                });
            }
        }
        self.system
            .restore(snapshot.flavors, snapshot.matrices, snapshot.sign);
        self.green = snapshot.green;
        self.fourpoint = snapshot.fourpoint;
        self.scalars = snapshot.scalars;
        self.sweeps_done = snapshot.sweeps_done;
        self.rng = snapshot.rng;
        self.started = Instant::now();
        info!("checkpoint restored at sweep {}", self.sweeps_done);
        Ok(())
    }
}

impl<R: Rng + Clone + Serialize + DeserializeOwned> ImpuritySolver<R> {
    /// Saves the current state to a JSON checkpoint file. Meant to be
    /// called at sweep boundaries.
    pub fn checkpoint_to_file(&self, filename: &str) -> Result<(), CheckpointError> {
        self.save_checkpoint().save_to_file(filename)
    }

    /// Restores the state from a JSON checkpoint file.
    pub fn restore_from_file(&mut self, filename: &str) -> Result<(), CheckpointError> {
        let snapshot = Checkpoint::load_from_file(filename)?;
        self.restore_checkpoint(snapshot)
    }
}
