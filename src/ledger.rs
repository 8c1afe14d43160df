// 🏛️ Ledger Service - banks, accounts, deposits and withdrawals
//
// Invariants owned here (not by the store):
// - bank names are unique
// - one account per (bank, player); account numbers unique per bank
// - a withdrawal never takes a balance below zero
// - balance and PIN changes on one account are linearizable
//
// Every mutation re-reads the stored account inside a lock scoped to that
// account, so a caller's stale copy can never overwrite a newer balance.
// Locks are keyed: bank name for bank create/delete, bank id for account
// creation, (bank id, account number) for balance and PIN changes.

use std::sync::Arc;

use crate::audit::{AuditSink, LedgerEvent, TracingAuditSink};
use crate::config::LedgerConfig;
use crate::entities::{Account, AccountKey, AccountNumber, Bank};
use crate::error::{LedgerError, LedgerResult};
use crate::locks::KeyedLocks;
use crate::numbering::AccountNumberGenerator;
use crate::store::LedgerStore;

pub struct LedgerService<S: LedgerStore> {
    store: S,
    numbers: AccountNumberGenerator,
    audit: Arc<dyn AuditSink>,
    bank_locks: KeyedLocks<String>,
    creation_locks: KeyedLocks<i64>,
    account_locks: KeyedLocks<AccountKey>,
}

impl<S: LedgerStore> LedgerService<S> {
    /// Service with sequential numbering and tracing-only audit
    pub fn new(store: S) -> Self {
        LedgerService {
            store,
            numbers: AccountNumberGenerator::default(),
            audit: Arc::new(TracingAuditSink),
            bank_locks: KeyedLocks::new(),
            creation_locks: KeyedLocks::new(),
            account_locks: KeyedLocks::new(),
        }
    }

    pub fn from_config(store: S, config: &LedgerConfig) -> Self {
        Self::new(store).with_generator(config.number_generator())
    }

    pub fn with_generator(mut self, numbers: AccountNumberGenerator) -> Self {
        self.numbers = numbers;
        self
    }

    pub fn with_audit(mut self, audit: Arc<dyn AuditSink>) -> Self {
        self.audit = audit;
        self
    }

    // ========================================================================
    // BANKS
    // ========================================================================

    pub fn create_bank(&self, name: &str, lot_id: i64) -> LedgerResult<Bank> {
        let bank = self.bank_locks.with_lock(&name.to_string(), || -> LedgerResult<Bank> {
            if self.store.load_bank(name)?.is_some() {
                return Err(LedgerError::DuplicateName(name.to_string()));
            }

            let mut bank = Bank::new(name, lot_id);
            bank.id = self.store.save_bank(&bank)?;
            Ok(bank)
        })?;

        tracing::info!(bank = %bank.name, bank_id = bank.id, lot_id, "bank created");
        self.emit(LedgerEvent::bank_created(&bank));
        Ok(bank)
    }

    /// Bank with its full, freshly loaded account set
    pub fn get_bank(&self, name: &str) -> LedgerResult<Bank> {
        self.store
            .load_bank(name)?
            .ok_or_else(|| LedgerError::bank_not_found(name))
    }

    /// Remove a bank together with its accounts.
    ///
    /// Balances are not checked; emptying the bank first is up to the caller.
    pub fn delete_bank(&self, bank: &Bank) -> LedgerResult<()> {
        let removed = self.bank_locks.with_lock(&bank.name, || {
            self.creation_locks.with_lock(&bank.id, || -> LedgerResult<Bank> {
                let current = self
                    .store
                    .load_bank(&bank.name)?
                    .filter(|b| b.id == bank.id)
                    .ok_or_else(|| LedgerError::bank_not_found(&bank.name))?;

                self.store.delete_bank(current.id)?;
                Ok(current)
            })
        })?;

        if !removed.accounts.is_empty() {
            tracing::warn!(
                bank = %removed.name,
                accounts = removed.accounts.len(),
                total = removed.total_deposits(),
                "bank deleted with open accounts"
            );
        } else {
            tracing::info!(bank = %removed.name, bank_id = removed.id, "bank deleted");
        }
        self.emit(LedgerEvent::bank_deleted(&removed));
        Ok(())
    }

    // ========================================================================
    // ACCOUNTS
    // ========================================================================

    /// Open an account for `player` with a fresh account number
    pub fn create_account(
        &self,
        bank: &Bank,
        player: &str,
        starting_balance: i64,
    ) -> LedgerResult<Account> {
        if starting_balance < 0 {
            return Err(LedgerError::InvalidAmount(starting_balance));
        }

        let account = self.creation_locks.with_lock(&bank.id, || -> LedgerResult<Account> {
            let current = self
                .store
                .load_bank(&bank.name)?
                .filter(|b| b.id == bank.id)
                .ok_or_else(|| LedgerError::bank_not_found(&bank.name))?;

            if current.find_by_player(player).is_some() {
                return Err(LedgerError::DuplicateAccount {
                    bank: bank.name.clone(),
                    player: player.to_string(),
                });
            }

            let number = self
                .numbers
                .allocate(&current.account_numbers())
                .map_err(|e| LedgerError::AllocationExhausted {
                    bank: bank.name.clone(),
                    attempts: e.attempts,
                })?;

            let account = Account::new(bank.id, player, number, starting_balance);
            self.store.save_account(&account)?;
            Ok(account)
        })?;

        tracing::info!(
            bank = %bank.name,
            player = %account.player,
            account_number = account.account_number,
            balance = account.balance,
            "account created"
        );
        self.emit(LedgerEvent::account_created(&account));
        Ok(account)
    }

    pub fn get_account_by_player(&self, bank: &Bank, player: &str) -> LedgerResult<Account> {
        self.store
            .load_account_by_player(bank.id, player)?
            .ok_or_else(|| LedgerError::account_not_found(&bank.name, player))
    }

    pub fn get_account_by_number(
        &self,
        bank: &Bank,
        account_number: AccountNumber,
    ) -> LedgerResult<Account> {
        self.store
            .load_account_by_number(bank.id, account_number)?
            .ok_or_else(|| LedgerError::number_not_found(&bank.name, account_number))
    }

    /// Overwrite the PIN. Checking the old PIN is the caller's job.
    pub fn set_pin(&self, account: &Account, new_pin: &str) -> LedgerResult<()> {
        let key = account.key();
        let current = self.account_locks.with_lock(&key, || -> LedgerResult<Account> {
            let current = self.load_fresh(key)?;
            self.store.set_pin(key.bank_id, key.account_number, new_pin)?;
            Ok(current)
        })?;

        tracing::info!(account = %key, player = %current.player, "pin changed");
        self.emit(LedgerEvent::pin_changed(&current));
        Ok(())
    }

    /// Compare against the stored PIN. An account without a PIN never matches.
    pub fn verify_pin(&self, account: &Account, pin: &str) -> LedgerResult<bool> {
        Ok(self.load_fresh(account.key())?.pin_matches(pin))
    }

    // ========================================================================
    // BALANCES
    // ========================================================================

    /// Add `amount` to the stored balance. Returns the updated account.
    pub fn deposit(&self, bank: &Bank, account: &Account, amount: i64) -> LedgerResult<Account> {
        if amount < 0 {
            return Err(LedgerError::InvalidAmount(amount));
        }

        let key = AccountKey {
            bank_id: bank.id,
            account_number: account.account_number,
        };

        let updated = self.account_locks.with_lock(&key, || -> LedgerResult<Account> {
            let current = self.load_fresh(key)?;
            let balance = current
                .balance_after_deposit(amount)
                .ok_or(LedgerError::InvalidAmount(amount))?;

            self.store.update_balance(key.bank_id, key.account_number, balance)?;
            Ok(Account { balance, ..current })
        })?;

        tracing::debug!(account = %key, amount, balance = updated.balance, "deposit");
        self.emit(LedgerEvent::deposit(&updated, amount));
        Ok(updated)
    }

    /// Take `amount` from the stored balance.
    ///
    /// Returns `false` and changes nothing when the balance is too low.
    pub fn withdraw(&self, bank: &Bank, account: &Account, amount: i64) -> LedgerResult<bool> {
        if amount < 0 {
            return Err(LedgerError::InvalidAmount(amount));
        }

        let key = AccountKey {
            bank_id: bank.id,
            account_number: account.account_number,
        };

        let (event, applied) =
            self.account_locks.with_lock(&key, || -> LedgerResult<(LedgerEvent, bool)> {
                let current = self.load_fresh(key)?;
                match current.balance_after_withdraw(amount) {
                    None => Ok((LedgerEvent::withdraw_rejected(&current, amount), false)),
                    Some(balance) => {
                        self.store
                            .update_balance(key.bank_id, key.account_number, balance)?;
                        let updated = Account { balance, ..current };
                        Ok((LedgerEvent::withdraw_applied(&updated, amount), true))
                    }
                }
            })?;

        if applied {
            tracing::debug!(account = %key, amount, balance = ?event.balance, "withdraw applied");
        } else {
            tracing::debug!(account = %key, amount, balance = ?event.balance, "withdraw rejected");
        }
        self.emit(event);
        Ok(applied)
    }

    // ========================================================================
    // INTERNALS
    // ========================================================================

    fn load_fresh(&self, key: AccountKey) -> LedgerResult<Account> {
        self.store
            .load_account_by_number(key.bank_id, key.account_number)?
            .ok_or_else(|| {
                LedgerError::number_not_found(&key.bank_id.to_string(), key.account_number)
            })
    }

    fn emit(&self, event: LedgerEvent) {
        if let Err(e) = self.audit.record(&event) {
            tracing::warn!(
                error = %e,
                kind = event.kind.as_str(),
                event_id = %event.event_id,
                "audit sink failed"
            );
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
