pub mod hyb_matrix;

pub use hyb_matrix::{HybMatrix, InsertPlan, RebuildReport};
