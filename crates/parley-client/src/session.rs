//! Connection phase and session bookkeeping.

use std::fmt;
use std::time::Duration;

use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

/// Where the client is in its connection lifecycle.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Phase {
    /// No token yet.
    #[default]
    Unauthenticated,
    /// Logged in, no stream open.
    Authenticated,
    /// Stream open and the handshake sent, nothing received yet.
    HandshakeSent,
    /// Receiving frames.
    Streaming,
    /// A stream was open and has ended. `connect` may be called again.
    Closed,
}

impl Phase {
    /// Lowercase name for logs.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unauthenticated => "unauthenticated",
            Self::Authenticated => "authenticated",
            Self::HandshakeSent => "handshake_sent",
            Self::Streaming => "streaming",
            Self::Closed => "closed",
        }
    }

    /// A stream is open in this phase.
    pub fn is_open(self) -> bool {
        matches!(self, Self::HandshakeSent | Self::Streaming)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Handle on the receive loop that is currently running.
#[derive(Debug)]
pub(crate) struct ActiveConnection {
    /// Cancelling stops the loop and, through child tokens, the heartbeat.
    pub(crate) shutdown: CancellationToken,
    /// Fires once the loop has exited. Taken by the first `close` caller.
    pub(crate) closed: Option<oneshot::Receiver<()>>,
}

/// Everything the lifecycle owns besides the state store.
#[derive(Debug, Default)]
pub(crate) struct Session {
    pub(crate) phase: Phase,
    pub(crate) token: Option<String>,
    pub(crate) email: Option<String>,
    pub(crate) gateway: Option<String>,
    pub(crate) heartbeat_interval: Option<Duration>,
    pub(crate) connection: Option<ActiveConnection>,
}

impl Session {
    /// Move to `next` unless the session was closed underneath the loop.
    pub(crate) fn advance(&mut self, next: Phase) {
        if self.phase != Phase::Closed && self.phase != next {
            tracing::info!(from = %self.phase, to = %next, "connection phase changed");
            self.phase = next;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_unauthenticated() {
        let session = Session::default();
        assert_eq!(session.phase, Phase::Unauthenticated);
        assert!(session.token.is_none());
        assert!(session.connection.is_none());
    }

    #[test]
    fn advance_never_leaves_closed() {
        let mut session = Session {
            phase: Phase::Closed,
            ..Session::default()
        };
        session.advance(Phase::Streaming);
        assert_eq!(session.phase, Phase::Closed);

        session.phase = Phase::HandshakeSent;
        session.advance(Phase::Streaming);
        assert_eq!(session.phase, Phase::Streaming);
    }

    #[test]
    fn open_phases() {
        assert!(Phase::HandshakeSent.is_open());
        assert!(Phase::Streaming.is_open());
        assert!(!Phase::Closed.is_open());
        assert!(!Phase::Authenticated.is_open());
        assert_eq!(Phase::HandshakeSent.to_string(), "handshake_sent");
    }
}
