//! Shared reconciliation state types.

use std::fmt;

/// Phase of the reconciliation state machine.
///
/// A pass walks `Idle -> Checking -> Draining -> Settling -> Idle`; a pass that
/// finds the device offline or unauthenticated goes straight back to `Idle`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SyncPhase {
    #[default]
    Idle,
    Checking,
    Draining,
    Settling,
}

impl SyncPhase {
    pub const fn is_idle(self) -> bool {
        matches!(self, Self::Idle)
    }
}

impl fmt::Display for SyncPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Idle => "idle",
            Self::Checking => "checking",
            Self::Draining => "draining",
            Self::Settling => "settling",
        };
        f.write_str(label)
    }
}
