//! Session lifecycle monitoring.
//!
//! This module provides:
//! - `SessionMonitor`: polls the current token every 30 seconds and listens
//!   for the "token expired" signal, driving the logout confirmation modal
//! - `MonitorState` / `SessionPhase`: the observable state machine
//! - `AuthSession`: the auth collaborator the monitor reads from and logs out through
//! - `TokenExpiredSignal`: the edge-triggered expiry notification
//!
//! State flows `Active` → (`Warning`) → `ExpiredPendingConfirmation` →
//! `LoggedOut`. A new login gets a new monitor.

pub mod monitor;
pub mod signal;
pub mod source;
pub mod state;

pub use monitor::{MonitorHandle, SessionMonitor};
pub use signal::TokenExpiredSignal;
pub use source::{AuthSession, SessionSnapshot};
pub use state::{MonitorState, SessionEvent, SessionPhase};
