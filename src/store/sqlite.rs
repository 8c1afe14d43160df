// SQLite-backed ledger store (rusqlite + WAL)
//
// One connection behind a mutex. The mutex is held for a single statement
// or a single short transaction, never across ledger logic.

use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use super::{account_key, LedgerStore, StoreResult};
use crate::audit::{AuditSink, LedgerEvent};
use crate::entities::{Account, AccountNumber, Bank};
use crate::error::StorageError;

const ACCOUNT_COLUMNS: &str =
    "bank_id, player_name, account_number, account_balance, account_pin";

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) a database file and make sure the schema exists
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref();
        let conn = Connection::open(path)
            .map_err(|e| StorageError::new("open", path.display().to_string(), e))?;
        Self::from_connection(conn)
    }

    pub fn open_in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| StorageError::new("open", ":memory:", e))?;
        Self::from_connection(conn)
    }

    pub fn from_connection(conn: Connection) -> StoreResult<Self> {
        setup_database(&conn).map_err(|e| StorageError::new("setup_database", "schema", e))?;
        Ok(SqliteStore {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        // A panic mid-statement leaves SQLite consistent; keep serving
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }

    // ========================================================================
    // AUDIT TRAIL
    // ========================================================================

    /// Insert event into the audit trail
    pub fn insert_event(&self, event: &LedgerEvent) -> StoreResult<()> {
        let data_json = serde_json::to_string(event)
            .map_err(|e| StorageError::new("insert_event", event.event_id.clone(), e))?;

        self.conn()
            .execute(
                "INSERT INTO events (
                    event_id, timestamp, event_type, bank_id, account_number, data
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    event.event_id,
                    event.timestamp.to_rfc3339(),
                    event.kind.as_str(),
                    event.bank_id,
                    event.account_number,
                    data_json,
                ],
            )
            .map_err(|e| StorageError::new("insert_event", event.event_id.clone(), e))?;

        Ok(())
    }

    /// Events for one account, oldest first
    pub fn events_for_account(
        &self,
        bank_id: i64,
        account_number: AccountNumber,
    ) -> StoreResult<Vec<LedgerEvent>> {
        let key = account_key(bank_id, account_number);
        self.query_events(
            "SELECT data FROM events
             WHERE bank_id = ?1 AND account_number = ?2
             ORDER BY id ASC",
            params![bank_id, account_number],
            &key,
        )
    }

    /// Events for one bank (bank-level and account-level), oldest first
    pub fn events_for_bank(&self, bank_id: i64) -> StoreResult<Vec<LedgerEvent>> {
        self.query_events(
            "SELECT data FROM events WHERE bank_id = ?1 ORDER BY id ASC",
            params![bank_id],
            &bank_id.to_string(),
        )
    }

    fn query_events(
        &self,
        sql: &str,
        params: &[&dyn rusqlite::ToSql],
        key: &str,
    ) -> StoreResult<Vec<LedgerEvent>> {
        let err = |e: rusqlite::Error| StorageError::new("load_events", key, e);
        let conn = self.conn();
        let mut stmt = conn.prepare(sql).map_err(err)?;

        let rows = stmt
            .query_map(params, |row| row.get::<_, String>(0))
            .map_err(err)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(err)?;

        rows.iter()
            .map(|json| {
                serde_json::from_str(json).map_err(|e| StorageError::new("load_events", key, e))
            })
            .collect()
    }
}

impl AuditSink for SqliteStore {
    fn record(&self, event: &LedgerEvent) -> Result<(), StorageError> {
        self.insert_event(event)
    }
}

// ============================================================================
// SCHEMA
// ============================================================================

pub fn setup_database(conn: &Connection) -> rusqlite::Result<()> {
    // Enable WAL mode for crash recovery
    conn.pragma_update(None, "journal_mode", "WAL")?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS banks (
            bank_id INTEGER PRIMARY KEY AUTOINCREMENT,
            bank_name TEXT NOT NULL,
            lot_id INTEGER NOT NULL,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    // (bank_id, account_number) is the only uniqueness the store enforces.
    // Bank names are kept unique by the ledger's per-name lock.
    conn.execute(
        "CREATE TABLE IF NOT EXISTS bank_accounts (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            bank_id INTEGER NOT NULL,
            player_name TEXT NOT NULL,
            account_number INTEGER NOT NULL,
            account_balance INTEGER NOT NULL DEFAULT 0,
            account_pin TEXT,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
            UNIQUE (bank_id, account_number)
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS events (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            event_id TEXT UNIQUE NOT NULL,
            timestamp TEXT NOT NULL,
            event_type TEXT NOT NULL,
            bank_id INTEGER NOT NULL,
            account_number INTEGER,
            data TEXT NOT NULL,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_banks_name ON banks(bank_name)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_accounts_player ON bank_accounts(bank_id, player_name)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_events_account ON events(bank_id, account_number)",
        [],
    )?;

    Ok(())
}

fn account_from_row(row: &Row<'_>) -> rusqlite::Result<Account> {
    Ok(Account {
        bank_id: row.get(0)?,
        player: row.get(1)?,
        account_number: row.get(2)?,
        balance: row.get(3)?,
        pin: row.get(4)?,
    })
}

// ============================================================================
// STORE CONTRACT
// ============================================================================

impl LedgerStore for SqliteStore {
    fn load_bank(&self, name: &str) -> StoreResult<Option<Bank>> {
        let bank = self
            .conn()
            .query_row(
                "SELECT bank_id, bank_name, lot_id FROM banks WHERE bank_name = ?1
                 ORDER BY bank_id LIMIT 1",
                params![name],
                |row| {
                    Ok(Bank {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        lot_id: row.get(2)?,
                        accounts: Vec::new(),
                    })
                },
            )
            .optional()
            .map_err(|e| StorageError::new("load_bank", name, e))?;

        match bank {
            Some(mut bank) => {
                bank.accounts = self.load_accounts(bank.id)?;
                Ok(Some(bank))
            }
            None => Ok(None),
        }
    }

    fn save_bank(&self, bank: &Bank) -> StoreResult<i64> {
        let conn = self.conn();
        let err = |e: rusqlite::Error| StorageError::new("save_bank", bank.name.clone(), e);

        if bank.is_persisted() {
            conn.execute(
                "UPDATE banks SET bank_name = ?1, lot_id = ?2 WHERE bank_id = ?3",
                params![bank.name, bank.lot_id, bank.id],
            )
            .map_err(err)?;
            return Ok(bank.id);
        }

        conn.execute(
            "INSERT INTO banks (bank_name, lot_id) VALUES (?1, ?2)",
            params![bank.name, bank.lot_id],
        )
        .map_err(err)?;

        Ok(conn.last_insert_rowid())
    }

    fn delete_bank(&self, bank_id: i64) -> StoreResult<()> {
        let key = bank_id.to_string();
        let err = |e: rusqlite::Error| StorageError::new("delete_bank", key.clone(), e);

        let mut conn = self.conn();
        let tx = conn.transaction().map_err(err)?;
        tx.execute("DELETE FROM bank_accounts WHERE bank_id = ?1", params![bank_id])
            .map_err(err)?;
        tx.execute("DELETE FROM banks WHERE bank_id = ?1", params![bank_id])
            .map_err(err)?;
        tx.commit().map_err(err)?;

        Ok(())
    }

    fn load_accounts(&self, bank_id: i64) -> StoreResult<Vec<Account>> {
        let err = |e: rusqlite::Error| StorageError::new("load_accounts", bank_id.to_string(), e);
        let conn = self.conn();
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {} FROM bank_accounts WHERE bank_id = ?1 ORDER BY account_number",
                ACCOUNT_COLUMNS
            ))
            .map_err(err)?;

        let accounts = stmt
            .query_map(params![bank_id], account_from_row)
            .map_err(err)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(err)?;

        Ok(accounts)
    }

    fn load_account_by_player(&self, bank_id: i64, player: &str) -> StoreResult<Option<Account>> {
        self.conn()
            .query_row(
                &format!(
                    "SELECT {} FROM bank_accounts
                     WHERE bank_id = ?1 AND player_name = ?2
                     ORDER BY account_number LIMIT 1",
                    ACCOUNT_COLUMNS
                ),
                params![bank_id, player],
                account_from_row,
            )
            .optional()
            .map_err(|e| StorageError::new("load_account", format!("{}/{}", bank_id, player), e))
    }

    fn load_account_by_number(
        &self,
        bank_id: i64,
        account_number: AccountNumber,
    ) -> StoreResult<Option<Account>> {
        self.conn()
            .query_row(
                &format!(
                    "SELECT {} FROM bank_accounts WHERE bank_id = ?1 AND account_number = ?2",
                    ACCOUNT_COLUMNS
                ),
                params![bank_id, account_number],
                account_from_row,
            )
            .optional()
            .map_err(|e| StorageError::new("load_account", account_key(bank_id, account_number), e))
    }

    fn save_account(&self, account: &Account) -> StoreResult<()> {
        self.conn()
            .execute(
                "INSERT INTO bank_accounts (
                    bank_id, player_name, account_number, account_balance, account_pin
                ) VALUES (?1, ?2, ?3, ?4, ?5)
                ON CONFLICT (bank_id, account_number) DO UPDATE SET
                    player_name = excluded.player_name,
                    account_balance = excluded.account_balance,
                    account_pin = excluded.account_pin",
                params![
                    account.bank_id,
                    account.player,
                    account.account_number,
                    account.balance,
                    account.pin,
                ],
            )
            .map_err(|e| {
                let key = account_key(account.bank_id, account.account_number);
                StorageError::new("save_account", key, e)
            })?;

        Ok(())
    }

    fn update_balance(
        &self,
        bank_id: i64,
        account_number: AccountNumber,
        balance: i64,
    ) -> StoreResult<()> {
        let key = account_key(bank_id, account_number);
        let changed = self
            .conn()
            .execute(
                "UPDATE bank_accounts SET account_balance = ?1
                 WHERE bank_id = ?2 AND account_number = ?3",
                params![balance, bank_id, account_number],
            )
            .map_err(|e| StorageError::new("update_balance", key.clone(), e))?;

        if changed == 0 {
            return Err(StorageError::new("update_balance", key, "no such account"));
        }
        Ok(())
    }

    fn set_pin(&self, bank_id: i64, account_number: AccountNumber, pin: &str) -> StoreResult<()> {
        let key = account_key(bank_id, account_number);
        let changed = self
            .conn()
            .execute(
                "UPDATE bank_accounts SET account_pin = ?1
                 WHERE bank_id = ?2 AND account_number = ?3",
                params![pin, bank_id, account_number],
            )
            .map_err(|e| StorageError::new("set_pin", key.clone(), e))?;

        if changed == 0 {
            return Err(StorageError::new("set_pin", key, "no such account"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::EventKind;

    fn store_with_bank() -> (SqliteStore, i64) {
        let store = SqliteStore::open_in_memory().unwrap();
        let id = store.save_bank(&Bank::new("Central", 5)).unwrap();
        (store, id)
    }

    #[test]
    fn test_bank_round_trip() {
        let (store, id) = store_with_bank();
        store.save_account(&Account::new(id, "Alice", 1000, 100)).unwrap();

        let bank = store.load_bank("Central").unwrap().unwrap();
        assert_eq!(bank.id, id);
        assert_eq!(bank.name, "Central");
        assert_eq!(bank.lot_id, 5);
        assert_eq!(bank.accounts, vec![Account::new(id, "Alice", 1000, 100)]);

        assert!(store.load_bank("Nowhere").unwrap().is_none());
    }

    #[test]
    fn test_bank_names_not_unique_in_store() {
        let (store, first) = store_with_bank();

        // Name uniqueness is the ledger's rule; the store keeps both rows
        let second = store.save_bank(&Bank::new("Central", 7)).unwrap();
        assert_ne!(first, second);

        // Lookups resolve to the oldest row
        assert_eq!(store.load_bank("Central").unwrap().unwrap().id, first);
    }

    #[test]
    fn test_duplicate_account_number_is_storage_error() {
        let (store, id) = store_with_bank();
        store.save_account(&Account::new(id, "Alice", 1000, 100)).unwrap();

        let conn = store.conn();
        let err = conn.execute(
            "INSERT INTO bank_accounts (bank_id, player_name, account_number) VALUES (?1, ?2, ?3)",
            params![id, "Bob", 1000],
        );
        assert!(err.is_err());
    }

    #[test]
    fn test_save_account_upserts() {
        let (store, id) = store_with_bank();
        let mut account = Account::new(id, "Alice", 1000, 100);
        store.save_account(&account).unwrap();

        account.balance = 40;
        store.save_account(&account).unwrap();

        let accounts = store.load_accounts(id).unwrap();
        assert_eq!(accounts.len(), 1);
        assert_eq!(accounts[0].balance, 40);
    }

    #[test]
    fn test_update_balance_only_touches_existing_rows() {
        let (store, id) = store_with_bank();
        store.save_account(&Account::new(id, "Alice", 1000, 100)).unwrap();

        store.update_balance(id, 1000, 70).unwrap();
        assert_eq!(store.load_account_by_number(id, 1000).unwrap().unwrap().balance, 70);

        store.delete_bank(id).unwrap();
        let err = store.update_balance(id, 1000, 90).unwrap_err();
        assert_eq!(err.operation, "update_balance");
        assert_eq!(err.key, format!("{}#1000", id));
        assert!(store.load_accounts(id).unwrap().is_empty());
    }

    #[test]
    fn test_lookups_by_player_and_number() {
        let (store, id) = store_with_bank();
        store.save_account(&Account::new(id, "Alice", 1000, 1)).unwrap();
        store.save_account(&Account::new(id, "Bob", 1001, 2)).unwrap();

        let bob = store.load_account_by_player(id, "Bob").unwrap().unwrap();
        assert_eq!(bob.account_number, 1001);

        let alice = store.load_account_by_number(id, 1000).unwrap().unwrap();
        assert_eq!(alice.player, "Alice");

        assert!(store.load_account_by_number(id + 1, 1000).unwrap().is_none());
        assert!(store.load_account_by_player(id, "Carol").unwrap().is_none());
    }

    #[test]
    fn test_set_pin_is_bank_scoped() {
        let (store, a) = store_with_bank();
        let b = store.save_bank(&Bank::new("Harbor", 6)).unwrap();
        store.save_account(&Account::new(a, "Alice", 1000, 0)).unwrap();
        store.save_account(&Account::new(b, "Zed", 1000, 0)).unwrap();

        store.set_pin(a, 1000, "4321").unwrap();

        let alice = store.load_account_by_number(a, 1000).unwrap().unwrap();
        let zed = store.load_account_by_number(b, 1000).unwrap().unwrap();
        assert_eq!(alice.pin.as_deref(), Some("4321"));
        assert_eq!(zed.pin, None);

        assert!(store.set_pin(a, 9999, "0000").is_err());
    }

    #[test]
    fn test_delete_bank_cascades() {
        let (store, id) = store_with_bank();
        store.save_account(&Account::new(id, "Alice", 1000, 10)).unwrap();

        store.delete_bank(id).unwrap();

        assert!(store.load_bank("Central").unwrap().is_none());
        assert!(store.load_accounts(id).unwrap().is_empty());
    }

    #[test]
    fn test_event_log() {
        let (store, id) = store_with_bank();
        let account = Account::new(id, "Alice", 1000, 100);

        store.record(&LedgerEvent::account_created(&account)).unwrap();
        store.record(&LedgerEvent::withdraw_rejected(&account, 500)).unwrap();

        let events = store.events_for_account(id, 1000).unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].kind, EventKind::AccountCreated);
        assert_eq!(events[1].kind, EventKind::WithdrawRejected);
        assert_eq!(events[1].amount, Some(500));

        assert_eq!(store.events_for_bank(id).unwrap().len(), 2);
        assert!(store.events_for_account(id, 1001).unwrap().is_empty());
    }
}
