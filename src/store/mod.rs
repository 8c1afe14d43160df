// 🗄️ Ledger Store - persistence contract
//
// Stores keep rows durable. The only uniqueness they enforce is the account
// number within a bank. Bank names, one account per player and balance
// rules all belong to LedgerService.

pub mod memory;
pub mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use crate::entities::{Account, AccountNumber, Bank};
use crate::error::StorageError;

pub type StoreResult<T> = Result<T, StorageError>;

/// Everything the ledger needs from a persistence backend.
///
/// Implementations must be safe to call from many threads at once. Failures
/// are reported, not retried.
pub trait LedgerStore: Send + Sync {
    /// Bank by exact name, with its full account set
    fn load_bank(&self, name: &str) -> StoreResult<Option<Bank>>;

    /// Insert a new bank (id 0) or update an existing one. Returns the id.
    fn save_bank(&self, bank: &Bank) -> StoreResult<i64>;

    /// Remove a bank and the accounts filed under it
    fn delete_bank(&self, bank_id: i64) -> StoreResult<()>;

    fn load_accounts(&self, bank_id: i64) -> StoreResult<Vec<Account>>;

    fn load_account_by_player(&self, bank_id: i64, player: &str) -> StoreResult<Option<Account>>;

    fn load_account_by_number(
        &self,
        bank_id: i64,
        account_number: AccountNumber,
    ) -> StoreResult<Option<Account>>;

    /// Upsert keyed by (bank_id, account_number). Used when opening accounts.
    fn save_account(&self, account: &Account) -> StoreResult<()>;

    /// Overwrite the balance of an existing account. Fails when the row is
    /// gone, so a balance change can never re-create a deleted account.
    fn update_balance(
        &self,
        bank_id: i64,
        account_number: AccountNumber,
        balance: i64,
    ) -> StoreResult<()>;

    fn set_pin(&self, bank_id: i64, account_number: AccountNumber, pin: &str) -> StoreResult<()>;
}

/// Shared key formatting for storage diagnostics
pub(crate) fn account_key(bank_id: i64, account_number: AccountNumber) -> String {
    format!("{}#{}", bank_id, account_number)
}

impl<S> LedgerStore for std::sync::Arc<S>
where
    S: LedgerStore + ?Sized,
{
    fn load_bank(&self, name: &str) -> StoreResult<Option<Bank>> {
        (**self).load_bank(name)
    }

    fn save_bank(&self, bank: &Bank) -> StoreResult<i64> {
        (**self).save_bank(bank)
    }

    fn delete_bank(&self, bank_id: i64) -> StoreResult<()> {
        (**self).delete_bank(bank_id)
    }

    fn load_accounts(&self, bank_id: i64) -> StoreResult<Vec<Account>> {
        (**self).load_accounts(bank_id)
    }

    fn load_account_by_player(&self, bank_id: i64, player: &str) -> StoreResult<Option<Account>> {
        (**self).load_account_by_player(bank_id, player)
    }

    fn load_account_by_number(
        &self,
        bank_id: i64,
        account_number: AccountNumber,
    ) -> StoreResult<Option<Account>> {
        (**self).load_account_by_number(bank_id, account_number)
    }

    fn save_account(&self, account: &Account) -> StoreResult<()> {
        (**self).save_account(account)
    }

    fn update_balance(
        &self,
        bank_id: i64,
        account_number: AccountNumber,
        balance: i64,
    ) -> StoreResult<()> {
        (**self).update_balance(bank_id, account_number, balance)
    }

    fn set_pin(&self, bank_id: i64, account_number: AccountNumber, pin: &str) -> StoreResult<()> {
        (**self).set_pin(bank_id, account_number, pin)
    }
}
