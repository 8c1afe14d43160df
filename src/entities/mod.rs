// Entity Models
//
// Bank and Account are plain values. Neither owns the other: accounts carry
// a bank_id and are persisted on their own.

pub mod account;
pub mod bank;

pub use account::{Account, AccountKey, AccountNumber};
pub use bank::Bank;
