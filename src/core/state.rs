// edge states of the reflexion analysis
use serde::{Deserialize, Serialize};

use crate::core::types::EdgeId;

/*
Specified: architecture edge exists

Convergent: specified ∧ implemented

Divergent: implemented ∧ not specified

Absent: specified ∧ not implemented

Allowed / ImplicitlyAllowed / Unmapped: implementation edges only
*/
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EdgeState {
    #[default]
    Undefined,
    Specified,
    Absent,
    Convergent,
    Allowed,
    ImplicitlyAllowed,
    Divergent,
    Unmapped,
}

impl EdgeState {
    /// Allowed by a specified architecture edge or implicitly (self use,
    /// dependency to a parent).
    pub fn is_allowed(self) -> bool {
        matches!(self, EdgeState::Allowed | EdgeState::ImplicitlyAllowed)
    }

    pub fn is_violation(self) -> bool {
        matches!(self, EdgeState::Divergent | EdgeState::Absent)
    }
}

/// A single edge whose live classification changed during an analysis run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EdgeChange {
    pub edge: EdgeId,
    pub old_state: EdgeState,
    pub new_state: EdgeState,
}
