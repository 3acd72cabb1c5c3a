//! FileMart Treasury
//!
//! Value accounting for bid escrow and owner payouts.

pub mod account_ledger;

pub use account_ledger::{InMemoryValueLedger, LedgerError, MockValueLedger, ValueLedger};
