use anyhow::Result;
use async_trait::async_trait;

/// What the monitor reads from the auth collaborator on each check.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub token: Option<String>,
    pub is_authenticated: bool,
}

/// The external authentication collaborator.
///
/// The monitor never mutates session state itself; it reads snapshots and
/// asks for a logout.
#[async_trait]
pub trait AuthSession: Send + Sync {
    fn snapshot(&self) -> SessionSnapshot;

    /// End the session. Implementations must clear local credentials even
    /// when they return an error.
    async fn logout(&self) -> Result<()>;
}
