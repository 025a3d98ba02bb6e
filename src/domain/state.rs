//! Lifecycle state of a domain.

use std::fmt::Display;

/// Indicates where a domain is in its lifecycle.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum DomainState {
    /// Defined but never started.
    #[default]
    Off,
    /// The namespaced init is running.
    Running,
    /// An interrupt was delivered; the init has not been reaped yet.
    ShuttingDown,
    /// Was running, now terminated and reaped.
    ShutOff,
}

impl DomainState {
    pub fn can_start(&self) -> bool {
        matches!(self, DomainState::Off | DomainState::ShutOff)
    }

    /// Undefine is only permitted while the init is not alive.
    pub fn can_undefine(&self) -> bool {
        matches!(self, DomainState::Off | DomainState::ShutOff)
    }
}

impl Display for DomainState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let print = match *self {
            Self::Off => "off",
            Self::Running => "running",
            Self::ShuttingDown => "shutting-down",
            Self::ShutOff => "shut-off",
        };

        write!(f, "{print}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_off_state() {
        let state = DomainState::default();
        assert_eq!(state, DomainState::Off);
        assert!(state.can_start());
        assert!(state.can_undefine());
    }

    #[test]
    fn test_running_state() {
        let state = DomainState::Running;
        assert!(!state.can_start());
        assert!(!state.can_undefine());
    }

    #[test]
    fn test_shutting_down_state() {
        let state = DomainState::ShuttingDown;
        assert!(!state.can_start());
        assert!(!state.can_undefine());
    }

    #[test]
    fn test_shut_off_state() {
        let state = DomainState::ShutOff;
        assert!(state.can_start());
        assert!(state.can_undefine());
    }

    #[test]
    fn test_display() {
        assert_eq!(DomainState::ShuttingDown.to_string(), "shutting-down");
    }
}
