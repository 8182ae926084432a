use ulid::Ulid;

use crate::calendar::DayToken;

#[derive(Debug)]
pub enum EngineError {
    /// Unknown room or reservation, or a reservation that is not in the state
    /// (or not owned by the caller) the operation requires.
    NotFound(String),
    /// Requested days already booked or held.
    Conflict(Vec<DayToken>),
    CapacityExceeded {
        max: u32,
        requested: u32,
    },
    Validation(&'static str),
    LimitExceeded(&'static str),
    /// Room still has booked or held days.
    HasAllocations(Ulid),
    WalError(String),
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineError::NotFound(key) => write!(f, "{key}: not found or not in expected state"),
            EngineError::Conflict(days) => {
                write!(f, "dates unavailable: ")?;
                for (i, day) in days.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{day}")?;
                }
                Ok(())
            }
            EngineError::CapacityExceeded { max, requested } => {
                write!(f, "room sleeps at most {max} guests, {requested} requested")
            }
            EngineError::Validation(msg) => write!(f, "invalid request: {msg}"),
            EngineError::LimitExceeded(msg) => write!(f, "limit exceeded: {msg}"),
            EngineError::HasAllocations(id) => {
                write!(f, "room {id} still has booked or held dates")
            }
            EngineError::WalError(e) => write!(f, "WAL error: {e}"),
        }
    }
}

impl std::error::Error for EngineError {}

impl EngineError {
    pub(crate) fn not_found(key: impl std::fmt::Display) -> Self {
        EngineError::NotFound(key.to_string())
    }
}
