pub mod accumulator;
pub mod fourpoint;
pub mod green;
pub mod scalars;

pub use accumulator::Accumulator;
pub use fourpoint::FourPointAccumulator;
pub use green::{GreenAccumulator, ItimeGreenFunction};
pub use scalars::ScalarMeasurements;
