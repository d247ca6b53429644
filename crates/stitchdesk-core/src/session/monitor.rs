use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::token::TokenInspector;

use super::signal::TokenExpiredSignal;
use super::source::AuthSession;
use super::state::{MonitorState, SessionEvent, SessionPhase};

/// Lower bound for the poll period; tokio rejects a zero interval.
const MIN_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Watches one authenticated session and decides when it has to end.
///
/// Two independent triggers feed the state machine: a periodic token check
/// and the [`TokenExpiredSignal`]. Both write fixed target states, so their
/// ordering does not matter. UI collaborators read the state through
/// [`state`](Self::state) or [`subscribe`](Self::subscribe) and drive the
/// modal through [`close_modal`](Self::close_modal),
/// [`manual_logout`](Self::manual_logout) and
/// [`force_logout`](Self::force_logout).
pub struct SessionMonitor {
    auth: Arc<dyn AuthSession>,
    inspector: TokenInspector,
    signal: TokenExpiredSignal,
    poll_interval: Duration,
    state: watch::Sender<MonitorState>,
    logging_out: AtomicBool,
    // Parent of every loop started by this monitor; cancelled on logout.
    shutdown: CancellationToken,
}

impl SessionMonitor {
    pub fn new(
        auth: Arc<dyn AuthSession>,
        signal: TokenExpiredSignal,
        inspector: TokenInspector,
        poll_interval: Duration,
    ) -> Self {
        let (state, _) = watch::channel(MonitorState::active());
        Self {
            auth,
            inspector,
            signal,
            poll_interval,
            state,
            logging_out: AtomicBool::new(false),
            shutdown: CancellationToken::new(),
        }
    }

    pub fn from_config(
        auth: Arc<dyn AuthSession>,
        signal: TokenExpiredSignal,
        config: &Config,
    ) -> Self {
        Self::new(
            auth,
            signal,
            TokenInspector::from_config(config),
            config.poll_interval(),
        )
    }

    /// Start the check loop and the signal listener.
    ///
    /// The first check runs immediately. The loop ends on logout, on
    /// [`MonitorHandle::shutdown`], or when the handle is dropped.
    pub fn start(self: &Arc<Self>) -> MonitorHandle {
        // Subscribe before spawning so a signal raised right after start is kept
        let expired_rx = self.signal.subscribe();
        let cancel = self.shutdown.child_token();
        let monitor = Arc::clone(self);
        let loop_cancel = cancel.clone();
        let task = tokio::spawn(async move { monitor.run(expired_rx, loop_cancel).await });
        info!(interval_secs = self.poll_interval.as_secs(), "Session monitor started");
        MonitorHandle {
            cancel,
            task: Some(task),
        }
    }

    pub fn state(&self) -> MonitorState {
        *self.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<MonitorState> {
        self.state.subscribe()
    }

    /// Run one token check now, outside the poll schedule.
    ///
    /// Does nothing while the session is not authenticated.
    pub fn check_now(&self) {
        let snapshot = self.auth.snapshot();
        let Some(token) = snapshot.token.as_deref().filter(|_| snapshot.is_authenticated) else {
            return;
        };

        let check = self.inspector.check_at(Some(token), chrono::Utc::now());
        if check.is_expired {
            info!("Token is expired");
        } else if check.is_expiring_soon {
            debug!("Token is expiring soon");
        }
        self.apply(SessionEvent::Tick(check));
    }

    /// The user asked to log out; show the confirmation without marking expiry.
    pub fn manual_logout(&self) {
        self.apply(SessionEvent::ManualLogout);
    }

    /// Close the modal without logging out. An expired token stays in use
    /// until the next check or the next rejected request.
    pub fn close_modal(&self) {
        self.apply(SessionEvent::CloseModal);
    }

    /// The modal's cancel action: an expiry notice cannot be dismissed, so it
    /// confirms the logout; a user-initiated logout is simply closed.
    pub async fn dismiss(&self) {
        let state = self.state();
        if state.show_logout_modal && state.is_expired {
            self.force_logout().await;
        } else {
            self.close_modal();
        }
    }

    /// Confirm the logout: run the logout effect, then end the session locally
    /// whether or not the effect succeeded.
    pub async fn force_logout(&self) {
        if self.state().is_logged_out() || self.logging_out.swap(true, Ordering::SeqCst) {
            debug!("Logout already done or in progress");
            return;
        }

        info!("Logging out");
        if let Err(e) = self.auth.logout().await {
            error!(error = %e, "Logout failed, ending session locally");
        }
        self.apply(SessionEvent::LoggedOut);
        self.shutdown.cancel();
    }

    fn apply(&self, event: SessionEvent) {
        self.state.send_if_modified(|state| {
            let before = *state;
            state.apply(event);
            let changed = *state != before;
            if changed {
                debug!(?event, from = ?before.phase, to = ?state.phase, "Session state changed");
            }
            changed
        });
    }

    async fn run(&self, mut expired_rx: broadcast::Receiver<()>, cancel: CancellationToken) {
        let period = self.poll_interval.max(MIN_POLL_INTERVAL);
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut polling = true;

        loop {
            tokio::select! {
                biased;

                _ = cancel.cancelled() => break,

                received = expired_rx.recv() => match received {
                    Ok(()) | Err(RecvError::Lagged(_)) => {
                        info!("Token expired signal received");
                        self.apply(SessionEvent::TokenExpired);
                    }
                    Err(RecvError::Closed) => {
                        warn!("Token expired signal closed");
                        break;
                    }
                },

                _ = ticker.tick(), if polling => {
                    if self.auth.snapshot().is_authenticated {
                        self.check_now();
                    } else {
                        debug!("Not authenticated, polling stopped");
                        polling = false;
                    }
                }
            }

            if self.state().phase == SessionPhase::LoggedOut {
                break;
            }
        }
        debug!("Session monitor stopped");
    }
}

/// Owner of a running monitor loop. Dropping it stops the loop.
pub struct MonitorHandle {
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl MonitorHandle {
    /// Stop the loop and wait for it to finish.
    pub async fn shutdown(mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                warn!(error = %e, "Session monitor task failed");
            }
        }
    }

    pub fn is_finished(&self) -> bool {
        self.task.as_ref().map(|t| t.is_finished()).unwrap_or(true)
    }
}

impl Drop for MonitorHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

// ============================================================================
// Tests
// ============================================================================
