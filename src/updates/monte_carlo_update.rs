use crate::system::ImpuritySystem;

/// The move types of the segment sampler.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MoveKind {
    InsertSegment,
    RemoveSegment,
    ShiftSegmentEnd,
    ToggleFullLine,
}

/// Record of an accepted move, returned by
/// [`MonteCarloUpdate::try_update`].
#[derive(Clone, Copy, Debug)]
pub struct AcceptedMove {
    /// Flavor whose configuration changed.
    pub flavor: usize,
    /// Which move was applied.
    pub kind: MoveKind,
    /// Signed weight ratio `w(new) / w(old)` of the accepted change (local
    /// interaction part times determinant part, without the proposal
    /// factor).
    pub weight_ratio: f64,
}

/// A Metropolis-Hastings update of the segment configuration.
///
/// `try_update` proposes one move, runs the acceptance test and, on
/// acceptance, commits the change to the system atomically. A rejected or
/// structurally invalid proposal returns `None` and leaves the system
/// untouched.
pub trait MonteCarloUpdate {
    fn try_update(
        &mut self,
        system: &mut ImpuritySystem,
        rng: &mut impl rand::Rng,
    ) -> Option<AcceptedMove>;
}
