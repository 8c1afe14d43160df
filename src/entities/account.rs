// 💳 Account Entity - a player's balance and PIN under one bank
//
// Identity: (bank_id, account_number). The account number is unique inside
// its bank and is the handle for PIN-protected lookups.
//
// Accounts are never deleted individually. Balance changes only go through
// LedgerService, which re-reads the stored value before mutating it.

use serde::{Deserialize, Serialize};

/// Account numbers are plain integers, unique within a bank
pub type AccountNumber = i64;

// ============================================================================
// ACCOUNT KEY
// ============================================================================

/// Identity of an account across the whole ledger
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AccountKey {
    pub bank_id: i64,
    pub account_number: AccountNumber,
}

impl std::fmt::Display for AccountKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}#{}", self.bank_id, self.account_number)
    }
}

// ============================================================================
// ACCOUNT ENTITY
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// Owning bank (relation only, the bank does not own the row)
    pub bank_id: i64,

    /// Account holder key
    pub player: String,

    pub account_number: AccountNumber,

    /// Smallest currency unit. Never negative after a withdrawal.
    pub balance: i64,

    /// None until the holder sets one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pin: Option<String>,
}

impl Account {
    /// Create a new, PIN-less account value (not yet persisted)
    pub fn new(
        bank_id: i64,
        player: impl Into<String>,
        account_number: AccountNumber,
        balance: i64,
    ) -> Self {
        Account {
            bank_id,
            player: player.into(),
            account_number,
            balance,
            pin: None,
        }
    }

    pub fn key(&self) -> AccountKey {
        AccountKey {
            bank_id: self.bank_id,
            account_number: self.account_number,
        }
    }

    /// Balance after withdrawing `amount`, or None if that would overdraw
    pub fn balance_after_withdraw(&self, amount: i64) -> Option<i64> {
        self.balance.checked_sub(amount).filter(|b| *b >= 0)
    }

    /// Balance after depositing `amount`, or None on overflow
    pub fn balance_after_deposit(&self, amount: i64) -> Option<i64> {
        self.balance.checked_add(amount)
    }

    /// Check a PIN against the stored one. No PIN set never matches.
    pub fn pin_matches(&self, candidate: &str) -> bool {
        self.pin.as_deref() == Some(candidate)
    }

    pub fn has_pin(&self) -> bool {
        self.pin.is_some()
    }

    /// Mask account number (show only last 4 digits)
    ///
    /// Example: 123456789012 → "*9012"
    pub fn masked_number(&self) -> String {
        let digits = self.account_number.to_string();
        if digits.len() <= 4 {
            return digits;
        }
        format!("*{}", &digits[digits.len() - 4..])
    }
}

// ============================================================================
// TESTS
// ============================================================================
