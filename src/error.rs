//! Error taxonomy for the shared WebSocket core.
//!
//! [`SharedWsError`] is the central error type. Only creation-time failures
//! ([`SharedWsError::BindFailure`]) and encoding failures are ever returned to
//! a caller as `Err`. Per-connection and server-wide runtime failures are
//! logged and surfaced as notices or sink events, never unwound past
//! `poll`/`broadcast`.

use crate::domain::ConnectionId;

/// Errors produced by registries, servers, and listeners.
///
/// # Error Code Ranges
///
/// | Range     | Category        | Surfaced as                  |
/// |-----------|-----------------|------------------------------|
/// | 1000–1999 | Creation        | `Err` from `acquire`/`attach` |
/// | 2000–2999 | Per-connection  | broadcast notice / log       |
/// | 3000–3999 | Server-wide     | `on_error` sink event / log  |
/// | 4000–4999 | Encoding        | `Err` from `send_json`       |
#[derive(Debug, thiserror::Error)]
pub enum SharedWsError {
    /// The port could not be bound (in use, permission denied, invalid).
    #[error("failed to bind port {port}: {reason}")]
    BindFailure {
        /// Port as requested by the caller.
        port: i64,
        /// Underlying cause.
        reason: String,
    },

    /// A frame could not be queued for one connection.
    #[error("send to {0} failed: connection already closed")]
    SendFailure(ConnectionId),

    /// Failure of the transport itself, not tied to one connection.
    #[error("transport error: {0}")]
    TransportError(String),

    /// A connection could not be closed during teardown.
    #[error("close error on {connection}: {reason}")]
    CloseError {
        /// Connection being closed.
        connection: ConnectionId,
        /// Underlying cause.
        reason: String,
    },

    /// A value could not be serialized for sending.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl SharedWsError {
    /// Builds a [`SharedWsError::BindFailure`] for a port outside `1..=65535`.
    #[must_use]
    pub fn invalid_port(port: i64) -> Self {
        Self::BindFailure {
            port,
            reason: "port must be in 1..=65535".to_string(),
        }
    }

    /// Builds a [`SharedWsError::BindFailure`] from an I/O error.
    #[must_use]
    pub fn bind(port: u16, err: &std::io::Error) -> Self {
        Self::BindFailure {
            port: i64::from(port),
            reason: err.to_string(),
        }
    }

    /// Returns the numeric error code for this variant.
    #[must_use]
    pub const fn error_code(&self) -> u32 {
        match self {
            Self::BindFailure { .. } => 1001,
            Self::SendFailure(_) => 2001,
            Self::CloseError { .. } => 2002,
            Self::TransportError(_) => 3001,
            Self::Serialization(_) => 4001,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_follow_ranges() {
        assert_eq!(SharedWsError::invalid_port(0).error_code(), 1001);
        assert_eq!(
            SharedWsError::SendFailure(ConnectionId::from_raw(1)).error_code(),
            2001
        );
        assert_eq!(
            SharedWsError::TransportError("x".to_string()).error_code(),
            3001
        );
    }

    #[test]
    fn bind_failure_message_names_port() {
        let err = std::io::Error::new(std::io::ErrorKind::AddrInUse, "address in use");
        let msg = SharedWsError::bind(8080, &err).to_string();
        assert!(msg.contains("8080"));
        assert!(msg.contains("address in use"));
    }
}
