use thiserror::Error;

/// Errors detected while validating solver input, before any sweep runs.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("inverse temperature must be positive, got {0}")]
    NonPositiveBeta(f64),

    #[error("at least one flavor is required")]
    NoFlavors,

    #[error("interaction matrix must be {expected}x{expected}, got {rows}x{cols}")]
    InteractionShape {
        expected: usize,
        rows: usize,
        cols: usize,
    },

    #[error("interaction matrix must be symmetric: u[{f1}][{f2}] = {left}, u[{f2}][{f1}] = {right}")]
    InteractionAsymmetry {
        f1: usize,
        f2: usize,
        left: f64,
        right: f64,
    },

    #[error("chemical potential list has {got} entries for {expected} flavors")]
    ChemicalPotentialLength { expected: usize, got: usize },

    #[error("non-finite value in {context}")]
    NonFinite { context: &'static str },

    #[error("hybridization mesh needs at least two tau points, got {0}")]
    MeshTooSmall(usize),

    #[error("hybridization table covers {found} flavors, model has {expected}")]
    BathFlavorMismatch { expected: usize, found: usize },

    #[error("hybridization table tabulated for beta = {found}, model has beta = {expected}")]
    BathBetaMismatch { expected: f64, found: f64 },

    #[error("{what} must be positive")]
    NonPositiveParameter { what: &'static str },

    #[error("move weights must be non-negative with a positive sum")]
    BadMoveWeights,
}

/// Errors raised when saving or restoring a solver checkpoint.
#[derive(Error, Debug)]
pub enum CheckpointError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("flavor count mismatch: checkpoint has {found}, solver expects {expected}")]
    FlavorMismatch { expected: usize, found: usize },

    #[error("time-bin count mismatch: checkpoint has {found}, solver expects {expected}")]
    BinMismatch { expected: usize, found: usize },

    #[error(
        "inverse matrix for flavor {flavor} is {rows}x{cols}, configuration has {segments} segments"
    )]
    MatrixShape {
        flavor: usize,
        rows: usize,
        cols: usize,
        segments: usize,
    },
}
