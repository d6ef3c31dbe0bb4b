//! Engine run-state machine.

use std::fmt;

use crate::fault::EngineFault;

/// Execution-engine state machine.
///
/// `Idle` until a program is loaded, `Ready` after loading, `Running` once the
/// first instruction retires, then `Halted` or `Faulted`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum EngineState {
    /// No program loaded.
    #[default]
    Idle,
    /// Program loaded, nothing executed yet.
    Ready,
    /// At least one instruction executed and more may follow.
    Running,
    /// Program finished; further steps do nothing.
    Halted,
    /// An instruction faulted; state is frozen at the faulting instruction.
    Faulted(EngineFault),
}

impl EngineState {
    /// Returns the fault, if this state is `Faulted`.
    #[must_use]
    pub const fn fault(self) -> Option<EngineFault> {
        match self {
            Self::Faulted(fault) => Some(fault),
            Self::Idle | Self::Ready | Self::Running | Self::Halted => None,
        }
    }

    /// Returns `true` when `step` may execute an instruction.
    #[must_use]
    pub const fn can_step(self) -> bool {
        matches!(self, Self::Ready | Self::Running)
    }

    /// Returns `true` for `Halted` and `Faulted`.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Halted | Self::Faulted(_))
    }
}

impl fmt::Display for EngineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => f.write_str("idle"),
            Self::Ready => f.write_str("ready"),
            Self::Running => f.write_str("running"),
            Self::Halted => f.write_str("halted"),
            Self::Faulted(fault) => write!(f, "faulted: {fault}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::EngineState;
    use crate::fault::EngineFault;

    #[test]
    fn default_state_is_idle() {
        assert_eq!(EngineState::default(), EngineState::Idle);
    }

    #[test]
    fn fault_accessor_reports_only_faulted_variant() {
        assert_eq!(EngineState::Running.fault(), None);
        assert_eq!(EngineState::Halted.fault(), None);
        assert_eq!(
            EngineState::Faulted(EngineFault::DivideByZero).fault(),
            Some(EngineFault::DivideByZero)
        );
    }

    #[test]
    fn only_ready_and_running_can_step() {
        assert!(EngineState::Ready.can_step());
        assert!(EngineState::Running.can_step());
        assert!(!EngineState::Idle.can_step());
        assert!(!EngineState::Halted.can_step());
        assert!(!EngineState::Faulted(EngineFault::IllegalAddressing).can_step());
    }
}
