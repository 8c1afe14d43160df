// 🏦 Bank Entity - named container of player accounts
//
// The name is the lookup key for callers and is unique across the ledger.
// The id is assigned by the store; a Bank with id 0 has not been saved yet.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use super::account::{Account, AccountNumber};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bank {
    /// Store-assigned identifier (0 = unsaved)
    pub id: i64,

    /// Unique, case-sensitive name
    pub name: String,

    /// In-world lot the bank is placed on. Opaque to the ledger.
    pub lot_id: i64,

    /// Accounts loaded with the bank. Persisted independently.
    #[serde(default)]
    pub accounts: Vec<Account>,
}

impl Bank {
    /// Create a new bank value that has not been persisted
    pub fn new(name: impl Into<String>, lot_id: i64) -> Self {
        Bank {
            id: 0,
            name: name.into(),
            lot_id,
            accounts: Vec::new(),
        }
    }

    pub fn is_persisted(&self) -> bool {
        self.id != 0
    }

    /// All account numbers currently loaded for this bank
    pub fn account_numbers(&self) -> HashSet<AccountNumber> {
        self.accounts.iter().map(|a| a.account_number).collect()
    }

    pub fn find_by_player(&self, player: &str) -> Option<&Account> {
        self.accounts.iter().find(|a| a.player == player)
    }

    /// Sum of all loaded balances. Saturates instead of overflowing.
    pub fn total_deposits(&self) -> i64 {
        self.accounts
            .iter()
            .fold(0i64, |acc, a| acc.saturating_add(a.balance))
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn bank_with_accounts() -> Bank {
        let mut bank = Bank::new("Central", 5);
        bank.id = 1;
        bank.accounts.push(Account::new(1, "Alice", 1000, 100));
        bank.accounts.push(Account::new(1, "Bob", 1001, 250));
        bank
    }

    #[test]
    fn test_bank_creation() {
        let bank = Bank::new("Central", 5);

        assert_eq!(bank.id, 0);
        assert!(!bank.is_persisted());
        assert_eq!(bank.name, "Central");
        assert_eq!(bank.lot_id, 5);
        assert!(bank.accounts.is_empty());
    }

    #[test]
    fn test_bank_lookups() {
        let bank = bank_with_accounts();

        assert_eq!(bank.find_by_player("Bob").unwrap().account_number, 1001);
        assert!(bank.find_by_player("alice").is_none()); // case-sensitive
        assert!(bank.find_by_player("Carol").is_none());
    }

    #[test]
    fn test_account_numbers_and_totals() {
        let bank = bank_with_accounts();

        let numbers = bank.account_numbers();
        assert_eq!(numbers.len(), 2);
        assert!(numbers.contains(&1000));
        assert!(numbers.contains(&1001));
        assert_eq!(bank.total_deposits(), 350);
    }
}
