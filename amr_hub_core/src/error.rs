use crate::Time;

/// Represents errors raised by the spatial model, the task scheduler and the
/// simulation loop.
///
/// Everything except [`AbmError::InvariantViolation`] is raised at the point
/// of violation and left to the caller to handle; nothing is retried.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AbmError {
    /// Malformed, non-closed or non-positive-area rooms, duplicate room IDs.
    #[error("Invalid room definition: {0}")]
    InvalidRoom(String),

    /// Malformed or mis-connected doors.
    #[error("Invalid door definition: {0}")]
    InvalidDoor(String),

    /// Operation not valid for a room's spatial/topological mode, or a
    /// sampling budget that ran out.
    #[error("Simulation mode error: {0}")]
    SimulationMode(String),

    /// Time value outside the allowed range.
    #[error("Invalid time value encountered: {0}")]
    Time(String),

    #[error("Negative time value encountered: {0}. Time must be non-negative.")]
    NegativeTime(Time),

    /// Distance requested between locations in different buildings or floors.
    #[error("Invalid distance calculation between {scope}: {from} and {to}.")]
    InvalidDistance {
        scope: DistanceScope,
        from: String,
        to: String,
    },

    /// Agent movement parameters that are not positive and finite.
    #[error("Invalid agent parameter: {0}")]
    InvalidAgent(String),

    /// Internal consistency failure. The run must be aborted.
    #[error("Invariant violated: {0}")]
    InvariantViolation(String),
}

impl AbmError {
    /// Returns true for errors that indicate a programming error rather than
    /// bad input.
    pub fn is_fatal(&self) -> bool {
        matches!(self, AbmError::InvariantViolation(_))
    }
}

/// Which scoping key differed in an [`AbmError::InvalidDistance`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DistanceScope {
    Buildings,
    Floors,
}

impl std::fmt::Display for DistanceScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DistanceScope::Buildings => write!(f, "buildings"),
            DistanceScope::Floors => write!(f, "floors"),
        }
    }
}

pub type Result<T> = std::result::Result<T, AbmError>;
