pub mod flavor_state;
pub mod segment;
pub mod store;

pub use flavor_state::FlavorState;
pub use segment::Segment;
pub use store::SegmentStore;
