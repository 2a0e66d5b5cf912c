pub mod full_line;
pub mod insert_remove;
pub mod monte_carlo_update;
pub mod shift;

pub use full_line::ToggleFullLine;
pub use insert_remove::InsertRemoveSegment;
pub use monte_carlo_update::{AcceptedMove, MonteCarloUpdate, MoveKind};
pub use shift::ShiftSegmentEnd;
