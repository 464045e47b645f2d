//! # AppError
//!
//! Centralized error handling for Photo Battle.
//! Storage ports speak `anyhow`; the engine classifies those failures into
//! the variants below at the operation boundary.

use serde::Serialize;
use thiserror::Error;

/// The primary error type for all pb-core operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AppError {
    /// Fewer than two distinct candidates. A recognised empty state, not a crash.
    #[error("not enough photos: this group needs at least 2 photos to start battles")]
    EmptyPool,

    /// The candidate pool could not be fetched (network, auth, server)
    #[error("failed to load photos: {0}")]
    FetchFailure(String),

    /// The vote could not be persisted; nothing was recorded
    #[error("failed to record vote: {0}")]
    VoteWriteFailure(String),

    /// Validation failure (e.g., self-battle, blank group name)
    #[error("validation error: {0}")]
    ValidationError(String),

    /// Resource not found (e.g., Session, Group)
    #[error("{0} not found with ID {1}")]
    NotFound(String, String),

    /// A vote for this session is still awaiting confirmation
    #[error("a vote is already in flight for this session")]
    VoteInFlight,

    /// The session was torn down
    #[error("session is closed")]
    SessionClosed,

    /// Infrastructure failure outside the battle flow
    #[error("internal service error: {0}")]
    Internal(String),
}

impl AppError {
    /// Whether the user can simply repeat the action that failed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AppError::FetchFailure(_) | AppError::VoteWriteFailure(_) | AppError::VoteInFlight
        )
    }

    pub(crate) fn fetch(err: anyhow::Error) -> Self {
        AppError::FetchFailure(format!("{err:#}"))
    }

    pub(crate) fn vote_write(err: anyhow::Error) -> Self {
        AppError::VoteWriteFailure(format!("{err:#}"))
    }
}

/// Which step of a round failed; kept in session state for the UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Fetch,
    VoteWrite,
}

/// A Result type specialized for Photo Battle logic.
pub type Result<T> = std::result::Result<T, AppError>;
