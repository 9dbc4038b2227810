// Rawkeys Frame Phase
// Per-frame classification of a tracked key

use strum_macros::{AsRefStr, Display, EnumIter};

/// Phase of a key for the current frame.
///
/// Phases only change at frame boundaries, when the tracker reconciles them
/// against the set of physically pressed keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, AsRefStr, EnumIter)]
#[strum(serialize_all = "lowercase")]
pub enum Phase {
    /// Pressed since the previous frame boundary.
    Down,
    /// Pressed continuously across at least one frame boundary.
    Held,
    /// Released since the previous frame boundary. Visible for one frame.
    Up,
}

impl Phase {
    /// Phase a key in this phase takes at the next frame boundary,
    /// before pressed-set reconciliation. `None` means the key settles.
    pub(crate) fn next(self) -> Option<Phase> {
        match self {
            Phase::Down | Phase::Held => Some(Phase::Held),
            Phase::Up => None,
        }
    }
}
