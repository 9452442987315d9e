//! Attach/release state machine for a render session.

use volscope_core::{Result, VolumeError};

/// Lifecycle state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    /// No render resources exist. Initial and terminal state.
    #[default]
    Detached,
    /// Window, renderer, view and interactor are all live.
    Attached,
}

impl SessionState {
    /// Returns the display name.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            SessionState::Detached => "detached",
            SessionState::Attached => "attached",
        }
    }
}

/// Guards operations against the current [`SessionState`].
///
/// Violations are logged at error level and returned. In strict mode they
/// panic instead. `Options::strict_lifecycle` enables strict mode by default
/// in debug builds only.
#[derive(Debug, Clone, Default)]
pub struct SessionLifecycle {
    state: SessionState,
    strict: bool,
}

impl SessionLifecycle {
    /// Creates a detached lifecycle.
    #[must_use]
    pub fn new(strict: bool) -> Self {
        Self {
            state: SessionState::Detached,
            strict,
        }
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Returns whether violations panic.
    #[must_use]
    pub fn is_strict(&self) -> bool {
        self.strict
    }

    /// Checks that `operation` may run while attached.
    pub fn require_attached(&self, operation: &str) -> Result<()> {
        match self.state {
            SessionState::Attached => Ok(()),
            SessionState::Detached => Err(self.violation(operation, VolumeError::SessionNotAttached)),
        }
    }

    /// Checks that `operation` may run while detached.
    pub fn require_detached(&self, operation: &str) -> Result<()> {
        match self.state {
            SessionState::Detached => Ok(()),
            SessionState::Attached => Err(self.violation(operation, VolumeError::ViewAlreadyAttached)),
        }
    }

    /// Moves to `Attached`.
    pub fn attach(&mut self) {
        self.transition(SessionState::Attached);
    }

    /// Moves to `Detached`. Returns whether the state changed.
    pub fn detach(&mut self) -> bool {
        self.transition(SessionState::Detached)
    }

    fn transition(&mut self, next: SessionState) -> bool {
        if self.state == next {
            return false;
        }
        log::debug!("session {} -> {}", self.state.name(), next.name());
        self.state = next;
        true
    }

    fn violation(&self, operation: &str, error: VolumeError) -> VolumeError {
        assert!(
            !self.strict,
            "{operation} called while {}: {error}",
            self.state.name()
        );
        log::error!("{operation} called while {}: {error}", self.state.name());
        error
    }
}
