use crate::error::CheckpointError;

/// Capability interface the outer Monte Carlo harness drives a solver
/// through: advance one sweep at a time, query progress, and capture or
/// install a snapshot at sweep boundaries. No subclassing is involved;
/// the scheduler owns the loop and the solver owns its state.
pub trait MonteCarloRun {
    /// Full serializable state captured at a sweep boundary.
    type Snapshot;

    /// Runs one sweep: proposes moves, updates the configuration and, in
    /// the measurement phase, records the observables.
    fn advance_sweep(&mut self);

    /// Whether thermalization sweeps have finished.
    fn is_thermalized(&self) -> bool;

    /// Whether all measured sweeps have finished.
    fn is_complete(&self) -> bool;

    /// Fraction of the measurement phase done, in `[0, 1]`.
    fn progress(&self) -> f64;

    /// Captures the state needed to resume identically.
    fn save_checkpoint(&self) -> Self::Snapshot;

    /// Installs a snapshot, after compatibility checks.
    fn restore_checkpoint(&mut self, snapshot: Self::Snapshot) -> Result<(), CheckpointError>;
}
