use thiserror::Error;

use boltr::error::BoltError;

/// An error reported by the database, as carried on a Bolt FAILURE message.
///
/// Only the status code and message cross the gateway boundary; Bolt-level
/// details (connection state, pointers into the stream) never reach clients.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerError {
    pub code: String,
    pub message: String,
}

impl ServerError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        ServerError {
            code: code.into(),
            message: message.into(),
        }
    }

    /// Transient errors are safe to retry inside a managed transaction.
    pub fn is_transient(&self) -> bool {
        self.code.starts_with("Neo.TransientError.")
            || self.code == "Neo.ClientError.Security.AuthorizationExpired"
    }

    pub fn is_syntax_error(&self) -> bool {
        self.code == "Neo.ClientError.Statement.SyntaxError"
    }
}

impl std::fmt::Display for ServerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

/// Gateway error taxonomy.
///
/// The disposition per kind:
/// - `InvalidQuery` / `InvalidParameter` surface as 400 and are never retried.
/// - `Database` is captured per statement in the batch API and terminates the
///   stream in the streaming API.
/// - `Auth` surfaces as 401.
/// - `Transport` surfaces as 500; managed transactions see driver-level
///   retries before one is raised.
#[derive(Error, Debug)]
pub enum GatewayError {
    /// The statement failed `EXPLAIN` with a syntax error. Carries the
    /// normalized query text (trimmed, without the `EXPLAIN` prefix).
    #[error("invalid query: {0}")]
    InvalidQuery(String),

    /// A JSON parameter failed type-codec validation.
    #[error("{0}")]
    InvalidParameter(String),

    /// Any other server-reported error.
    #[error("{0}")]
    Database(ServerError),

    /// Basic credentials were rejected.
    #[error("invalid credentials")]
    Auth,

    /// Bolt connection lost, DNS failure, or a protocol violation.
    #[error("transport failure: {0}")]
    Transport(String),
}

impl GatewayError {
    /// Folds a Bolt-level error into the gateway taxonomy.
    pub fn from_bolt(err: BoltError) -> Self {
        match err {
            BoltError::Query { code, message } => {
                GatewayError::Database(ServerError::new(code, message))
            }
            BoltError::Transaction(message) => GatewayError::Database(ServerError::new(
                "Neo.DatabaseError.Transaction.TransactionStartFailed",
                message,
            )),
            BoltError::Authentication(message) => {
                log::warn!("bolt authentication rejected: {}", message);
                GatewayError::Transport(format!("authentication handshake failed: {}", message))
            }
            BoltError::Io(e) => GatewayError::Transport(e.to_string()),
            BoltError::Protocol(m)
            | BoltError::Session(m)
            | BoltError::ResourceExhausted(m)
            | BoltError::Backend(m) => GatewayError::Transport(m),
        }
    }

    /// Whether a managed transaction may retry after this error.
    pub fn is_retriable(&self) -> bool {
        match self {
            GatewayError::Database(e) => e.is_transient(),
            GatewayError::Transport(_) => true,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        let e = ServerError::new("Neo.TransientError.General.DatabaseUnavailable", "busy");
        assert!(e.is_transient());
        let e = ServerError::new("Neo.ClientError.Statement.SyntaxError", "bad");
        assert!(!e.is_transient());
        assert!(e.is_syntax_error());
    }

    #[test]
    fn test_bolt_query_error_maps_to_database() {
        let err = GatewayError::from_bolt(BoltError::Query {
            code: "Neo.ClientError.Schema.ConstraintValidationFailed".into(),
            message: "already exists".into(),
        });
        match err {
            GatewayError::Database(e) => {
                assert_eq!(e.code, "Neo.ClientError.Schema.ConstraintValidationFailed");
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_io_error_is_retriable() {
        let err = GatewayError::from_bolt(BoltError::Io(std::io::Error::other("reset")));
        assert!(err.is_retriable());
    }
}
