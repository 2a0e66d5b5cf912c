use crate::determinant::HybMatrix;
use crate::error::CheckpointError;
use crate::measure::{FourPointAccumulator, GreenAccumulator, ScalarMeasurements};
use crate::segments::FlavorState;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter};

/// Everything needed to resume a run exactly where it stopped: the
/// segment configurations, the inverse matrices, the sign, every
/// accumulator, the sweep counter and the random-number stream.
///
/// Restoring a checkpoint and continuing is observationally
/// indistinguishable from never having stopped, for a fixed stream.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Checkpoint<R> {
    pub flavors: Vec<FlavorState>,
    pub matrices: Vec<HybMatrix>,
    pub sign: f64,
    pub green: GreenAccumulator,
    pub fourpoint: Option<FourPointAccumulator>,
    pub scalars: ScalarMeasurements,
    pub sweeps_done: u64,
    pub rng: R,
}

impl<R: Serialize> Checkpoint<R> {
    /// Writes the checkpoint to a JSON file.
    pub fn save_to_file(&self, filename: &str) -> Result<(), CheckpointError> {
        let file = File::create(filename)?;
        let writer = BufWriter::new(file);
        serde_json::to_writer(writer, &self)?;
        Ok(())
    }
}

impl<R: DeserializeOwned> Checkpoint<R> {
    /// Reads a checkpoint back from a JSON file.
    pub fn load_from_file(filename: &str) -> Result<Self, CheckpointError> {
        let file = File::open(filename)?;
        let reader = BufReader::new(file);
        let checkpoint = serde_json::from_reader(reader)?;
        Ok(checkpoint)
    }
}
