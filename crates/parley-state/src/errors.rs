//! State mutation error types.

use thiserror::Error;

/// Reasons a gateway payload could not be applied to the store.
#[derive(Debug, Error)]
pub enum StateError {
    /// The payload did not have the expected shape.
    #[error("malformed {event} payload: {source}")]
    Malformed {
        /// Lowercase event identifier.
        event: &'static str,
        /// Underlying decode failure.
        #[source]
        source: serde_json::Error,
    },
    /// A required field was absent.
    #[error("{event} payload is missing `{field}`")]
    MissingField {
        /// Lowercase event identifier.
        event: &'static str,
        /// Name of the absent field.
        field: &'static str,
    },
    /// The payload names a server the store does not know.
    #[error("unknown server {0}")]
    UnknownServer(String),
    /// The payload names a channel the store does not know.
    #[error("unknown channel {0}")]
    UnknownChannel(String),
    /// The payload names a role the store does not know.
    #[error("unknown role {0}")]
    UnknownRole(String),
    /// The payload names a member the store does not know.
    #[error("unknown member {user_id} in server {server_id}")]
    UnknownMember {
        /// Server searched.
        server_id: String,
        /// User id looked up.
        user_id: String,
    },
    /// The event has no state mutation (the raw hook).
    #[error("event {0} does not mutate state")]
    NotApplicable(&'static str),
}

/// Result type for state operations.
pub type Result<T> = std::result::Result<T, StateError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_messages() {
        let err = StateError::MissingField {
            event: "guild_delete",
            field: "id",
        };
        assert_eq!(err.to_string(), "guild_delete payload is missing `id`");
        assert_eq!(
            StateError::UnknownServer("9".into()).to_string(),
            "unknown server 9"
        );
    }

    #[test]
    fn malformed_keeps_source() {
        let source = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err = StateError::Malformed {
            event: "ready",
            source,
        };
        assert!(std::error::Error::source(&err).is_some());
        assert!(err.to_string().starts_with("malformed ready payload"));
    }
}
