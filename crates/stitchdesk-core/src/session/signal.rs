use tokio::sync::broadcast;
use tracing::debug;

/// Pending signals per listener; extra signals collapse into a lag, which
/// listeners treat the same as a signal.
const SIGNAL_CAPACITY: usize = 8;

/// Fire-and-forget "token expired" notification.
///
/// Raised by the API layer when it refuses or loses a request because of the
/// token; observed by the session monitor. Clones share one channel.
#[derive(Debug, Clone)]
pub struct TokenExpiredSignal {
    tx: broadcast::Sender<()>,
}

impl Default for TokenExpiredSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl TokenExpiredSignal {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(SIGNAL_CAPACITY);
        Self { tx }
    }

    pub fn notify(&self) {
        // No listeners is fine: nobody is monitoring the session.
        let listeners = self.tx.send(()).unwrap_or(0);
        debug!(listeners, "Token expired signal raised");
    }

    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.tx.subscribe()
    }

    pub fn listener_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_notify_reaches_all_listeners() {
        let signal = TokenExpiredSignal::new();
        let mut a = signal.subscribe();
        let mut b = signal.clone().subscribe();
        assert_eq!(signal.listener_count(), 2);

        signal.notify();
        assert!(a.recv().await.is_ok());
        assert!(b.recv().await.is_ok());
    }

    #[test]
    fn test_notify_without_listeners_is_silent() {
        TokenExpiredSignal::default().notify();
    }
}
