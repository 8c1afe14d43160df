// 📜 Audit trail - one event per ledger mutation
//
// The ledger notifies a sink after each successful mutation (and after a
// rejected withdrawal). Sinks are one-way: a failing sink is logged and the
// business operation still succeeds. PIN values never appear in events.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Mutex;

use crate::entities::{Account, AccountNumber, Bank};
use crate::error::StorageError;

// ============================================================================
// EVENT
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventKind {
    BankCreated,
    BankDeleted,
    AccountCreated,
    Deposit,
    WithdrawRejected,
    WithdrawApplied,
    PinChanged,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::BankCreated => "BankCreated",
            EventKind::BankDeleted => "BankDeleted",
            EventKind::AccountCreated => "AccountCreated",
            EventKind::Deposit => "Deposit",
            EventKind::WithdrawRejected => "WithdrawRejected",
            EventKind::WithdrawApplied => "WithdrawApplied",
            EventKind::PinChanged => "PinChanged",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEvent {
    pub event_id: String,
    pub timestamp: DateTime<Utc>,
    pub kind: EventKind,
    pub bank_id: i64,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub account_number: Option<AccountNumber>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub player: Option<String>,

    /// Requested deposit/withdraw amount
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<i64>,

    /// Balance after the operation (unchanged balance for a rejection)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub balance: Option<i64>,
}

impl LedgerEvent {
    fn new(kind: EventKind, bank_id: i64) -> Self {
        LedgerEvent {
            event_id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            kind,
            bank_id,
            account_number: None,
            player: None,
            amount: None,
            balance: None,
        }
    }

    fn for_account(kind: EventKind, account: &Account) -> Self {
        let mut event = Self::new(kind, account.bank_id);
        event.account_number = Some(account.account_number);
        event.player = Some(account.player.clone());
        event
    }

    pub fn bank_created(bank: &Bank) -> Self {
        Self::new(EventKind::BankCreated, bank.id)
    }

    pub fn bank_deleted(bank: &Bank) -> Self {
        Self::new(EventKind::BankDeleted, bank.id)
    }

    pub fn account_created(account: &Account) -> Self {
        let mut event = Self::for_account(EventKind::AccountCreated, account);
        event.balance = Some(account.balance);
        event
    }

    /// `account` is the state after the deposit
    pub fn deposit(account: &Account, amount: i64) -> Self {
        let mut event = Self::for_account(EventKind::Deposit, account);
        event.amount = Some(amount);
        event.balance = Some(account.balance);
        event
    }

    /// `account` is the untouched stored state
    pub fn withdraw_rejected(account: &Account, amount: i64) -> Self {
        let mut event = Self::for_account(EventKind::WithdrawRejected, account);
        event.amount = Some(amount);
        event.balance = Some(account.balance);
        event
    }

    /// `account` is the state after the withdrawal
    pub fn withdraw_applied(account: &Account, amount: i64) -> Self {
        let mut event = Self::for_account(EventKind::WithdrawApplied, account);
        event.amount = Some(amount);
        event.balance = Some(account.balance);
        event
    }

    pub fn pin_changed(account: &Account) -> Self {
        Self::for_account(EventKind::PinChanged, account)
    }
}

// ============================================================================
// SINKS
// ============================================================================

/// Receiver of ledger events
pub trait AuditSink: Send + Sync {
    fn record(&self, event: &LedgerEvent) -> Result<(), StorageError>;
}

/// Emits every event as a structured `tracing` record
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn record(&self, event: &LedgerEvent) -> Result<(), StorageError> {
        tracing::info!(
            target: "bank_ledger::audit",
            event_id = %event.event_id,
            kind = event.kind.as_str(),
            bank_id = event.bank_id,
            account_number = ?event.account_number,
            player = ?event.player,
            amount = ?event.amount,
            balance = ?event.balance,
            "ledger event"
        );
        Ok(())
    }
}

/// Keeps events in memory, in arrival order
#[derive(Debug, Default)]
pub struct MemoryAuditSink {
    events: Mutex<Vec<LedgerEvent>>,
}

impl MemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<LedgerEvent> {
        self.events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn kinds(&self) -> Vec<EventKind> {
        self.events().iter().map(|e| e.kind).collect()
    }
}

impl AuditSink for MemoryAuditSink {
    fn record(&self, event: &LedgerEvent) -> Result<(), StorageError> {
        self.events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(event.clone());
        Ok(())
    }
}

/// Forwards each event to several sinks. Every sink is tried; the first
/// failure is returned.
pub struct FanoutAuditSink {
    sinks: Vec<std::sync::Arc<dyn AuditSink>>,
}

impl FanoutAuditSink {
    pub fn new(sinks: Vec<std::sync::Arc<dyn AuditSink>>) -> Self {
        FanoutAuditSink { sinks }
    }
}

impl AuditSink for FanoutAuditSink {
    fn record(&self, event: &LedgerEvent) -> Result<(), StorageError> {
        let mut first_error = None;
        for sink in &self.sinks {
            if let Err(e) = sink.record(event) {
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    struct FailingSink;

    impl AuditSink for FailingSink {
        fn record(&self, _event: &LedgerEvent) -> Result<(), StorageError> {
            Err(StorageError::new("record_event", "audit", "sink offline"))
        }
    }

    #[test]
    fn test_event_constructors() {
        let mut account = Account::new(1, "Alice", 1000, 150);
        account.pin = Some("4321".to_string());

        let deposit = LedgerEvent::deposit(&account, 50);
        assert_eq!(deposit.kind, EventKind::Deposit);
        assert_eq!(deposit.bank_id, 1);
        assert_eq!(deposit.account_number, Some(1000));
        assert_eq!(deposit.amount, Some(50));
        assert_eq!(deposit.balance, Some(150));

        let pin = LedgerEvent::pin_changed(&account);
        let json = serde_json::to_string(&pin).unwrap();
        assert!(!json.contains("4321"));
        assert!(pin.amount.is_none());
    }

    #[test]
    fn test_event_type_column_matches_serialized_kind() {
        // The events table stores as_str(); the JSON payload stores serde's name
        for kind in [
            EventKind::BankCreated,
            EventKind::AccountCreated,
            EventKind::WithdrawRejected,
            EventKind::PinChanged,
        ] {
            let json = serde_json::to_string(&kind).unwrap();
            assert_eq!(json, format!("\"{}\"", kind.as_str()));
        }
    }

    #[test]
    fn test_memory_sink_keeps_order() {
        let sink = MemoryAuditSink::new();
        let account = Account::new(1, "Alice", 1000, 0);

        sink.record(&LedgerEvent::account_created(&account)).unwrap();
        sink.record(&LedgerEvent::withdraw_rejected(&account, 10)).unwrap();

        assert_eq!(
            sink.kinds(),
            vec![EventKind::AccountCreated, EventKind::WithdrawRejected]
        );
    }

    #[test]
    fn test_fanout_reaches_every_sink() {
        let memory = Arc::new(MemoryAuditSink::new());
        let sinks: Vec<Arc<dyn AuditSink>> = vec![
            Arc::new(FailingSink),
            memory.clone(),
            Arc::new(TracingAuditSink),
        ];
        let fanout = FanoutAuditSink::new(sinks);

        let bank = Bank::new("Central", 5);
        let result = fanout.record(&LedgerEvent::bank_created(&bank));

        assert!(result.is_err());
        assert_eq!(memory.kinds(), vec![EventKind::BankCreated]);
    }
}
