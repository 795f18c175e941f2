// per-candidate mapped/unmapped transitions
use std::fmt;

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeType {
    Addition,
    Removal,
}

impl fmt::Display for ChangeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChangeType::Addition => f.write_str("addition"),
            ChangeType::Removal => f.write_str("removal"),
        }
    }
}

/// Whether an attract function has applied a candidate's mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CandidateState {
    Unmapped,
    Mapped,
}

#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
#[error("{change} is not a valid transition for a {state:?} candidate")]
pub struct TransitionError {
    pub state: CandidateState,
    pub change: ChangeType,
}

impl CandidateState {
    /// Unmapped --Addition--> Mapped --Removal--> Unmapped. Anything else is rejected.
    pub fn apply(self, change: ChangeType) -> Result<CandidateState, TransitionError> {
        match (self, change) {
            (CandidateState::Unmapped, ChangeType::Addition) => Ok(CandidateState::Mapped),
            (CandidateState::Mapped, ChangeType::Removal) => Ok(CandidateState::Unmapped),
            (state, change) => Err(TransitionError { state, change }),
        }
    }
}
