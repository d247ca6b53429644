use serde::Serialize;

use crate::token::ExpiryCheck;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SessionPhase {
    Active,
    /// Token is inside the warning horizon; nothing is forced yet.
    Warning,
    /// The logout modal is up, either because the token expired or because
    /// the user asked to log out.
    ExpiredPendingConfirmation,
    /// Terminal for this monitor.
    LoggedOut,
}

/// Everything that can move the session state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    /// Periodic check result
    Tick(ExpiryCheck),
    /// An API request was rejected or refused for an expired token
    TokenExpired,
    ManualLogout,
    CloseModal,
    LoggedOut,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonitorState {
    pub show_logout_modal: bool,
    pub is_expired: bool,
    pub phase: SessionPhase,
}

impl Default for MonitorState {
    fn default() -> Self {
        Self::active()
    }
}

impl MonitorState {
    pub fn active() -> Self {
        Self {
            show_logout_modal: false,
            is_expired: false,
            phase: SessionPhase::Active,
        }
    }

    fn pending(is_expired: bool) -> Self {
        Self {
            show_logout_modal: true,
            is_expired,
            phase: SessionPhase::ExpiredPendingConfirmation,
        }
    }

    pub fn is_logged_out(&self) -> bool {
        self.phase == SessionPhase::LoggedOut
    }

    /// Apply one event. Every event maps to a fixed target state, so replaying
    /// an event (or racing two triggers for the same condition) converges.
    pub fn apply(&mut self, event: SessionEvent) {
        if self.is_logged_out() {
            return;
        }
        *self = match event {
            SessionEvent::Tick(check) if check.is_expired => Self::pending(true),
            SessionEvent::Tick(check) => match self.phase {
                SessionPhase::Active if check.is_expiring_soon => Self {
                    phase: SessionPhase::Warning,
                    ..*self
                },
                SessionPhase::Warning if !check.is_expiring_soon => Self::active(),
                _ => *self,
            },
            SessionEvent::TokenExpired => Self::pending(true),
            SessionEvent::ManualLogout => Self::pending(false),
            SessionEvent::CloseModal => Self::active(),
            SessionEvent::LoggedOut => Self {
                show_logout_modal: false,
                is_expired: false,
                phase: SessionPhase::LoggedOut,
            },
        };
    }
}
