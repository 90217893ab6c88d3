//! Typed error hierarchy for the production board.
//!
//! Three enums cover the three seams where things can go wrong:
//! - `StoreError`: the local placement store
//! - `GatewayError`: the remote persistence gateway
//! - `BoardError`: what the board controller hands back to its caller

use thiserror::Error;

/// Errors from the local placement store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Failed to access placement file at {path}: {source}")]
    Io {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Placement under key '{key}' is unreadable: {source}")]
    Corrupt {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to serialize placement: {0}")]
    Serialize(#[source] serde_json::Error),

    #[error("Placement store lock poisoned")]
    LockPoisoned,
}

/// Errors from the remote persistence gateway. All of them lead to the same
/// rollback; the variants only exist for logging.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("Remote store request failed: {0}")]
    Transport(#[source] reqwest::Error),

    #[error("Remote store did not answer in time")]
    Timeout,

    #[error("Remote store rejected the update ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("Remote store error: {0}")]
    Other(String),
}

impl From<reqwest::Error> for GatewayError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            GatewayError::Timeout
        } else {
            GatewayError::Transport(err)
        }
    }
}

/// Errors surfaced by the board controller.
#[derive(Debug, Error)]
pub enum BoardError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Could not persist move of card {card_id}: {source}")]
    Persistence {
        card_id: String,
        #[source]
        source: GatewayError,
    },

    #[error("Project source unavailable: {0}")]
    Source(#[source] anyhow::Error),

    #[error("Board state lock poisoned")]
    LockPoisoned,

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_error_io_carries_path() {
        use std::path::PathBuf;
        let path = PathBuf::from("/data/production-kanban-state.json");
        let err = StoreError::Io {
            path: path.clone(),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        };
        match &err {
            StoreError::Io { path: p, source } => {
                assert_eq!(p, &path);
                assert_eq!(source.kind(), std::io::ErrorKind::PermissionDenied);
            }
            _ => panic!("Expected Io"),
        }
        assert!(err.to_string().contains("production-kanban-state.json"));
    }

    #[test]
    fn gateway_error_rejected_carries_status() {
        let err = GatewayError::Rejected {
            status: 401,
            message: "JWT expired".into(),
        };
        assert!(err.to_string().contains("401"));
        assert!(err.to_string().contains("JWT expired"));
    }

    #[test]
    fn board_error_converts_from_store_error() {
        let err: BoardError = StoreError::LockPoisoned.into();
        assert!(matches!(err, BoardError::Store(StoreError::LockPoisoned)));
    }

    #[test]
    fn board_error_persistence_names_card() {
        let err = BoardError::Persistence {
            card_id: "42".into(),
            source: GatewayError::Timeout,
        };
        assert!(err.to_string().contains("42"));
        let source = std::error::Error::source(&err).expect("source");
        assert!(source.to_string().contains("in time"));
    }

    #[test]
    fn board_error_other_keeps_gateway_source_chain() {
        let err: BoardError = anyhow::Error::new(GatewayError::Rejected {
            status: 400,
            message: "bad url".into(),
        })
        .context("Failed to build remote gateway")
        .into();

        assert_eq!(err.to_string(), "Failed to build remote gateway");
        let source = std::error::Error::source(&err).expect("source chain kept");
        let gateway = source
            .downcast_ref::<GatewayError>()
            .expect("source should be the gateway error");
        assert!(matches!(gateway, GatewayError::Rejected { status: 400, .. }));
    }

    #[test]
    fn all_error_types_implement_std_error_trait() {
        fn assert_std_error<E: std::error::Error>(_: &E) {}
        assert_std_error(&StoreError::LockPoisoned);
        assert_std_error(&GatewayError::Timeout);
        assert_std_error(&BoardError::LockPoisoned);
    }
}
