// ⚠️ Ledger errors
//
// Insufficient funds is not here: a rejected withdrawal is the `false`
// result of `LedgerService::withdraw`, not an error.

use thiserror::Error;

use crate::entities::AccountNumber;

/// Failure reported by a storage backend.
///
/// Carries the attempted operation and the key it was applied to so callers
/// can log and respond without knowing the backend.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("storage error during {operation} ({key}): {message}")]
pub struct StorageError {
    pub operation: &'static str,
    pub key: String,
    pub message: String,
}

impl StorageError {
    pub fn new(operation: &'static str, key: impl Into<String>, message: impl ToString) -> Self {
        Self {
            operation,
            key: key.into(),
            message: message.to_string(),
        }
    }
}

/// Errors surfaced by `LedgerService` operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("{entity} not found: {key}")]
    NotFound { entity: &'static str, key: String },

    #[error("Bank already exists: {0}")]
    DuplicateName(String),

    #[error("Player {player} already has an account in bank {bank}")]
    DuplicateAccount { bank: String, player: String },

    #[error("No free account number in bank {bank} after {attempts} attempts")]
    AllocationExhausted { bank: String, attempts: u32 },

    #[error("Invalid amount: {0}")]
    InvalidAmount(i64),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl LedgerError {
    pub fn bank_not_found(name: &str) -> Self {
        LedgerError::NotFound {
            entity: "bank",
            key: name.to_string(),
        }
    }

    pub fn account_not_found(bank: &str, key: impl std::fmt::Display) -> Self {
        LedgerError::NotFound {
            entity: "account",
            key: format!("{}/{}", bank, key),
        }
    }

    pub fn number_not_found(bank: &str, number: AccountNumber) -> Self {
        Self::account_not_found(bank, number)
    }

    /// True for lookups that missed; callers typically offer to create.
    pub fn is_not_found(&self) -> bool {
        matches!(self, LedgerError::NotFound { .. })
    }
}

pub type LedgerResult<T> = Result<T, LedgerError>;
