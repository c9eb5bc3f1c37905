//! Client connection liveness
//!
//! The HTTP layer owns the connection and hands the export a
//! [`ConnectionStatus`] to poll before each page.

use tokio_util::sync::CancellationToken;

/// Reports whether the client is still there to receive the export.
pub trait ConnectionStatus: Send + Sync {
    fn is_open(&self) -> bool;
}

/// A cancelled token means the client went away.
impl ConnectionStatus for CancellationToken {
    fn is_open(&self) -> bool {
        !self.is_cancelled()
    }
}

/// Connection that never closes, for exports with no client attached.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysOpen;

impl ConnectionStatus for AlwaysOpen {
    fn is_open(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancellation_token_status() {
        let token = CancellationToken::new();
        let status: &dyn ConnectionStatus = &token;
        assert!(status.is_open());

        token.cancel();
        assert!(!status.is_open());
        assert!(AlwaysOpen.is_open());
    }
}
