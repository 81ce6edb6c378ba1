use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    /// Malformed input (unknown transaction type, blank required field, bad date range).
    /// Nothing was written.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Customer not found: {0}")]
    CustomerNotFound(String),

    #[error("Menu item not found: {0}")]
    MenuItemNotFound(String),

    #[error("Menu item already exists: {0}")]
    MenuItemAlreadyExists(String),

    /// A balance would leave the representable range. Nothing was written.
    #[error("Balance out of range: {0}")]
    BalanceOutOfRange(String),

    /// Persistence was unavailable or a write conflicted. Any atomic unit in flight was
    /// rolled back, so the operation can be retried.
    #[error("Storage failure: {0:#}")]
    Storage(#[from] anyhow::Error),
}

impl AppError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, AppError::Storage(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            AppError::CustomerNotFound(_) | AppError::MenuItemNotFound(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_storage_failures_are_retryable() {
        assert!(AppError::Storage(anyhow::anyhow!("database is locked")).is_retryable());
        assert!(!AppError::InvalidArgument("type".into()).is_retryable());
        assert!(!AppError::CustomerNotFound("42".into()).is_retryable());
        assert!(!AppError::BalanceOutOfRange("42".into()).is_retryable());
    }

    #[test]
    fn test_not_found_classification() {
        assert!(AppError::CustomerNotFound("42".into()).is_not_found());
        assert!(AppError::MenuItemNotFound("7".into()).is_not_found());
        assert!(!AppError::MenuItemAlreadyExists("Tea".into()).is_not_found());
    }
}
