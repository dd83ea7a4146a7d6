use crypto_core::CryptoError;
use thiserror::Error;

pub type AppResult<T> = Result<T, AppError>;

/// Failure taxonomy for the messaging core.
///
/// Callers branch on the variant, never on the message text. `Validation`,
/// `Permission` and `NotFound` are surfaced as-is; `Decryption` is recovered
/// per message inside list operations; `Transport` is logged and swallowed by
/// the publishers.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AppError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("permission denied: {0}")]
    Permission(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("decryption error: {0}")]
    Decryption(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("database error: {0}")]
    Database(String),

    /// Pool exhausted, connection dropped or similar; safe to retry.
    #[error("service unavailable: {0}")]
    Unavailable(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn not_friends() -> Self {
        AppError::Permission("not friends".to_string())
    }

    /// Stable machine-readable code for the boundary layer.
    pub fn error_code(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::Permission(_) => "PERMISSION_DENIED",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::Decryption(_) => "DECRYPTION_FAILED",
            AppError::Transport(_) => "TRANSPORT_ERROR",
            AppError::Database(_) => "DATABASE_ERROR",
            AppError::Unavailable(_) => "SERVICE_UNAVAILABLE",
            AppError::Config(_) => "CONFIG_ERROR",
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Returns whether retrying the same call may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, AppError::Unavailable(_) | AppError::Transport(_))
    }
}

impl From<sqlx::Error> for AppError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                AppError::Unavailable(e.to_string())
            }
            other => AppError::Database(other.to_string()),
        }
    }
}

impl From<redis::RedisError> for AppError {
    fn from(e: redis::RedisError) -> Self {
        AppError::Transport(e.to_string())
    }
}

impl From<CryptoError> for AppError {
    fn from(e: CryptoError) -> Self {
        if e.is_decryption_failure() {
            AppError::Decryption(e.to_string())
        } else {
            AppError::Internal(e.to_string())
        }
    }
}

impl From<sqlx::migrate::MigrateError> for AppError {
    fn from(e: sqlx::migrate::MigrateError) -> Self {
        AppError::Database(format!("migration failed: {e}"))
    }
}
