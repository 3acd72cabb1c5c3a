//! Account ledger backing escrow and settlement.
//!
//! Provides a small, deterministic interface for crediting, debiting and
//! transferring value between identities. The marketplace holds bid escrow
//! in [`Identity::ESCROW`] and pays owners out of it on acceptance.

use filemart_types::{Amount, Identity};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LedgerError {
    #[error("insufficient funds in {account}: needed {needed}, available {available}")]
    InsufficientFunds {
        account: Identity,
        needed: Amount,
        available: Amount,
    },

    #[error("balance overflow crediting {account}")]
    Overflow { account: Identity },

    #[error("ledger rejected operation: {0}")]
    Rejected(String),
}

pub type Result<T> = std::result::Result<T, LedgerError>;

/// Value-transfer primitive the settlement engine depends on.
pub trait ValueLedger: Send + Sync {
    /// Current balance of `account` (zero if never seen).
    fn balance(&self, account: &Identity) -> Amount;

    /// Add `amount` to `account`.
    fn credit(&mut self, account: &Identity, amount: Amount) -> Result<()>;

    /// Remove `amount` from `account`; fails without effect if not covered.
    fn debit(&mut self, account: &Identity, amount: Amount) -> Result<()>;

    /// Sum of all balances.
    fn total_supply(&self) -> Amount;

    /// Snapshot of every non-zero balance.
    fn balances(&self) -> BTreeMap<Identity, Amount>;

    /// Move `amount` from `from` to `to`. Either both sides apply or neither.
    fn transfer(&mut self, from: &Identity, to: &Identity, amount: Amount) -> Result<()> {
        self.debit(from, amount)?;
        if let Err(err) = self.credit(to, amount) {
            self.credit(from, amount)?;
            return Err(err);
        }
        Ok(())
    }
}

// -----------------------------------------------------------------------------
// In-memory implementation
// -----------------------------------------------------------------------------
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InMemoryValueLedger {
    balances: BTreeMap<Identity, Amount>,
}

impl InMemoryValueLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a ledger from persisted balances.
    pub fn from_balances(balances: BTreeMap<Identity, Amount>) -> Self {
        let balances = balances
            .into_iter()
            .filter(|(_, amount)| !amount.is_zero())
            .collect();
        Self { balances }
    }
}

impl ValueLedger for InMemoryValueLedger {
    fn balance(&self, account: &Identity) -> Amount {
        self.balances.get(account).copied().unwrap_or_default()
    }

    fn credit(&mut self, account: &Identity, amount: Amount) -> Result<()> {
        if amount.is_zero() {
            return Ok(());
        }
        let current = self.balance(account);
        let updated = current
            .checked_add(amount)
            .ok_or(LedgerError::Overflow { account: *account })?;
        self.balances.insert(*account, updated);
        Ok(())
    }

    fn debit(&mut self, account: &Identity, amount: Amount) -> Result<()> {
        if amount.is_zero() {
            return Ok(());
        }
        let current = self.balance(account);
        let updated = current
            .checked_sub(amount)
            .ok_or(LedgerError::InsufficientFunds {
                account: *account,
                needed: amount,
                available: current,
            })?;
        if updated.is_zero() {
            self.balances.remove(account);
        } else {
            self.balances.insert(*account, updated);
        }
        Ok(())
    }

    fn total_supply(&self) -> Amount {
        self.balances.values().copied().sum()
    }

    fn balances(&self) -> BTreeMap<Identity, Amount> {
        self.balances.clone()
    }
}

// -----------------------------------------------------------------------------
// Mock ledger (records calls and can inject failures)
// -----------------------------------------------------------------------------
#[derive(Debug, Clone, Default)]
pub struct MockValueLedger {
    inner: InMemoryValueLedger,
    credit_calls: Vec<(Identity, Amount)>,
    debit_calls: Vec<(Identity, Amount)>,
    fail_credit_to: Option<Identity>,
}

impl MockValueLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent credit to `account` fail with `Rejected`.
    pub fn fail_credits_to(&mut self, account: Identity) {
        self.fail_credit_to = Some(account);
    }

    pub fn clear_failures(&mut self) {
        self.fail_credit_to = None;
    }

    pub fn get_credit_calls(&self) -> &[(Identity, Amount)] {
        &self.credit_calls
    }

    pub fn get_debit_calls(&self) -> &[(Identity, Amount)] {
        &self.debit_calls
    }

    pub fn clear_calls(&mut self) {
        self.credit_calls.clear();
        self.debit_calls.clear();
    }
}

impl ValueLedger for MockValueLedger {
    fn balance(&self, account: &Identity) -> Amount {
        self.inner.balance(account)
    }

    fn credit(&mut self, account: &Identity, amount: Amount) -> Result<()> {
        self.credit_calls.push((*account, amount));
        if self.fail_credit_to == Some(*account) {
            return Err(LedgerError::Rejected(format!("credit to {account} refused")));
        }
        self.inner.credit(account, amount)
    }

    fn debit(&mut self, account: &Identity, amount: Amount) -> Result<()> {
        self.debit_calls.push((*account, amount));
        self.inner.debit(account, amount)
    }

    fn total_supply(&self) -> Amount {
        self.inner.total_supply()
    }

    fn balances(&self) -> BTreeMap<Identity, Amount> {
        self.inner.balances()
    }
}
