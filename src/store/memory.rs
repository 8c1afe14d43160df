// In-memory store for tests and throwaway runs.
//
// All tables sit behind one RwLock held only for the duration of a single
// call. Per-account serialization is the ledger's job, not this store's.

use std::collections::BTreeMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::{account_key, LedgerStore, StoreResult};
use crate::entities::{Account, AccountNumber, Bank};
use crate::error::StorageError;

#[derive(Default)]
struct Tables {
    next_bank_id: i64,
    /// id → bank row (accounts left empty)
    banks: BTreeMap<i64, Bank>,
    accounts: BTreeMap<(i64, AccountNumber), Account>,
}

#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, Tables> {
        self.tables.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Tables> {
        self.tables.write().unwrap_or_else(|e| e.into_inner())
    }

    pub fn bank_count(&self) -> usize {
        self.read().banks.len()
    }

    pub fn account_count(&self) -> usize {
        self.read().accounts.len()
    }
}

impl Tables {
    fn accounts_of(&self, bank_id: i64) -> Vec<Account> {
        self.accounts
            .range((bank_id, AccountNumber::MIN)..=(bank_id, AccountNumber::MAX))
            .map(|(_, a)| a.clone())
            .collect()
    }
}

impl LedgerStore for MemoryStore {
    fn load_bank(&self, name: &str) -> StoreResult<Option<Bank>> {
        let tables = self.read();
        // Oldest row first, matching the SQLite store
        Ok(tables.banks.values().find(|row| row.name == name).map(|row| {
            let mut bank = row.clone();
            bank.accounts = tables.accounts_of(bank.id);
            bank
        }))
    }

    fn save_bank(&self, bank: &Bank) -> StoreResult<i64> {
        let mut tables = self.write();

        let id = if bank.is_persisted() {
            bank.id
        } else {
            tables.next_bank_id += 1;
            tables.next_bank_id
        };

        let mut row = bank.clone();
        row.id = id;
        row.accounts.clear();
        tables.banks.insert(id, row);

        Ok(id)
    }

    fn delete_bank(&self, bank_id: i64) -> StoreResult<()> {
        let mut tables = self.write();
        tables.banks.remove(&bank_id);
        tables.accounts.retain(|(b, _), _| *b != bank_id);
        Ok(())
    }

    fn load_accounts(&self, bank_id: i64) -> StoreResult<Vec<Account>> {
        Ok(self.read().accounts_of(bank_id))
    }

    fn load_account_by_player(&self, bank_id: i64, player: &str) -> StoreResult<Option<Account>> {
        Ok(self
            .read()
            .accounts_of(bank_id)
            .into_iter()
            .find(|a| a.player == player))
    }

    fn load_account_by_number(
        &self,
        bank_id: i64,
        account_number: AccountNumber,
    ) -> StoreResult<Option<Account>> {
        Ok(self.read().accounts.get(&(bank_id, account_number)).cloned())
    }

    fn save_account(&self, account: &Account) -> StoreResult<()> {
        self.write()
            .accounts
            .insert((account.bank_id, account.account_number), account.clone());
        Ok(())
    }

    fn update_balance(
        &self,
        bank_id: i64,
        account_number: AccountNumber,
        balance: i64,
    ) -> StoreResult<()> {
        let mut tables = self.write();
        match tables.accounts.get_mut(&(bank_id, account_number)) {
            Some(account) => {
                account.balance = balance;
                Ok(())
            }
            None => Err(StorageError::new(
                "update_balance",
                account_key(bank_id, account_number),
                "no such account",
            )),
        }
    }

    fn set_pin(&self, bank_id: i64, account_number: AccountNumber, pin: &str) -> StoreResult<()> {
        let mut tables = self.write();
        match tables.accounts.get_mut(&(bank_id, account_number)) {
            Some(account) => {
                account.pin = Some(pin.to_string());
                Ok(())
            }
            None => Err(StorageError::new(
                "set_pin",
                account_key(bank_id, account_number),
                "no such account",
            )),
        }
    }
}
