//! A module containing the [`DigestError`] enum, which covers the basic error types.

/// Represents any type of error that could happen when using this crate.
///
/// Recoverable upstream conditions (rate limits, transport hiccups) are absorbed
/// inside the clients' retry loops and never surface here; anything that reaches a
/// `DigestError` aborts the current harvest run.
#[derive(thiserror::Error, Debug)]
pub enum DigestError {
    // --------
    // --- Internal errors
    // --------
    /// An error that happened when interacting with the SQLite database.
    #[error(transparent)]
    Sqlite(#[from] sqlx::Error),
    /// An error that happened when sending an external request.
    #[error(transparent)]
    ExternalRequest(#[from] reqwest::Error),
    /// An error that happened when (de)serializing JSON.
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    /// An error that happened when touching the filesystem.
    #[error(transparent)]
    Io(#[from] std::io::Error),
    /// An internal error.
    #[error("internal error: {0}")]
    Internal(String),

    // --------
    // --- Upstream errors
    // --------
    /// An upstream returned a status code outside the handled set.
    #[error("got unhandled HTTP status {0}")]
    UnhandledStatus(u16),
    /// A retry loop was cancelled through its shutdown listener.
    #[error("operation was cancelled")]
    Cancelled,
}

/// Shortcut for creating an internal error, by formatting a message.
///
/// See [`DigestError::Internal`].
#[macro_export]
macro_rules! internal {
    ($($t:tt)*) => {{
        $crate::error::DigestError::Internal($crate::error::__private::format!($($t)*))
    }};
}

#[doc(hidden)]
pub mod __private {
    pub use std::format;
}

/// Represents the result of a computation that could return a [`DigestError`].
pub type DigestResult<T = ()> = Result<T, DigestError>;
