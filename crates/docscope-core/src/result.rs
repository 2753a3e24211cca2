//! Convenience result type alias for DocScope.

use crate::error::AppError;

/// A specialized `Result` type for DocScope operations.
pub type AppResult<T> = Result<T, AppError>;
