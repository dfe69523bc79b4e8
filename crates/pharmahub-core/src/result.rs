//! Convenience result type alias for PharmaHub.

use crate::error::AppError;

/// A specialized `Result` type for PharmaHub operations.
pub type AppResult<T> = Result<T, AppError>;
