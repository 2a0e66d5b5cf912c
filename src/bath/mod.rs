pub mod hybridization;

pub use hybridization::HybridizationTable;
