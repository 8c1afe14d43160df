// Bank Ledger - Core Library
// Exposes all modules for use in the CLI, API server, and tests

pub mod audit;
pub mod config;
pub mod entities;
pub mod error;
pub mod ledger;
pub mod locks;
pub mod numbering;
pub mod store;

// Re-export commonly used types
pub use audit::{
    AuditSink, EventKind, FanoutAuditSink, LedgerEvent, MemoryAuditSink, TracingAuditSink,
};
pub use config::LedgerConfig;
pub use entities::{Account, AccountKey, AccountNumber, Bank};
pub use error::{LedgerError, LedgerResult, StorageError};
pub use ledger::LedgerService;
pub use numbering::{AccountNumberGenerator, NumberingStrategy};
pub use store::{LedgerStore, MemoryStore, SqliteStore};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
