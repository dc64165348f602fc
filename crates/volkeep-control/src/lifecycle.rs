//! Control loop state machine.
//!
//! # State Machine
//!
//! ```text
//!          ┌───────────────────┐  login failed   ┌──────────┐
//!   ──────▶│  Unauthenticated  │────────────────▶│ Sleeping │
//!          └─────────┬─────────┘◀────────────────└──────────┘
//!                    │ login ok     credential      ▲    │
//!                    ▼              expired         │    │
//!          ┌───────────────────┐                    │    │ credential
//!          │   Authenticated   │                    │    │ valid
//!          └─────────┬─────────┘                    │    │
//!                    │                              │    │
//!                    ▼                              │    │
//!          ┌───────────────────┐  cycle done        │    │
//!          │       Cycle       │────────────────────┘    │
//!          └───────────────────┘◀────────────────────────┘
//!
//!   Any state except Cycle ──(shutdown)──▶ ShuttingDown
//! ```
//!
//! Shutdown is only observed at cycle boundaries, so a running cycle always
//! finishes its batch first.

use std::fmt;

/// The states of the control loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LoopState {
    /// No valid credential.
    Unauthenticated,
    /// Logged in, about to start a cycle.
    Authenticated,
    /// Running one reconciliation cycle.
    Cycle,
    /// Waiting for the next cycle or login attempt.
    Sleeping,
    /// Shutdown requested; the loop exits.
    ShuttingDown,
}

impl LoopState {
    /// Lowercase name for logging.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Unauthenticated => "unauthenticated",
            Self::Authenticated => "authenticated",
            Self::Cycle => "cycle",
            Self::Sleeping => "sleeping",
            Self::ShuttingDown => "shutting_down",
        }
    }
}

impl fmt::Display for LoopState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Check if a state transition is valid according to the state machine.
#[must_use]
pub const fn is_valid_transition(from: LoopState, to: LoopState) -> bool {
    use LoopState::{Authenticated, Cycle, ShuttingDown, Sleeping, Unauthenticated};

    matches!(
        (from, to),
        (Unauthenticated, Authenticated | Sleeping)
            | (Authenticated, Cycle)
            | (Cycle, Sleeping)
            | (Sleeping, Unauthenticated | Cycle)
            | (Unauthenticated | Authenticated | Sleeping, ShuttingDown)
    )
}

/// Returns the list of valid target states from the given state.
#[must_use]
pub fn valid_transitions_from(state: LoopState) -> Vec<LoopState> {
    use LoopState::{Authenticated, Cycle, ShuttingDown, Sleeping, Unauthenticated};

    match state {
        Unauthenticated => vec![Authenticated, Sleeping, ShuttingDown],
        Authenticated => vec![Cycle, ShuttingDown],
        Cycle => vec![Sleeping],
        Sleeping => vec![Unauthenticated, Cycle, ShuttingDown],
        ShuttingDown => vec![],
    }
}

/// Returns true if the loop stops in this state.
#[must_use]
pub const fn is_terminal(state: LoopState) -> bool {
    matches!(state, LoopState::ShuttingDown)
}
