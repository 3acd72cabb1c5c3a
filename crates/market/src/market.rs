//! Marketplace facade.
//!
//! [`Market`] owns the tables and the value ledger behind one lock. Every
//! mutating call runs as a single [`StateTx`]: on `Ok` it commits, on `Err`
//! every write (including value movements) is unwound before the lock is
//! released, so readers never observe a partially applied operation.

use crate::config::MarketConfig;
use crate::errors::{MarketError, Result};
use crate::events::{MarketEvent, MarketEventKind};
use crate::settlement::Settlement;
use crate::snapshot::MarketSnapshot;
use crate::state::{MarketState, StateTx};
use filemart_treasury::{InMemoryValueLedger, LedgerError, ValueLedger};
use filemart_types::{
    AccessEntry, Amount, Bid, FileRecord, Identity, OwnerListing, Role, RoleFlags,
};
use parking_lot::RwLock;
use tracing::{debug, info, warn};

struct Inner<L> {
    state: MarketState,
    ledger: L,
}

pub struct Market<L: ValueLedger = InMemoryValueLedger> {
    config: MarketConfig,
    inner: RwLock<Inner<L>>,
}

impl Market<InMemoryValueLedger> {
    pub fn new(config: MarketConfig) -> Self {
        Self::with_ledger(config, InMemoryValueLedger::new())
    }

    /// Rebuild a market from a persisted snapshot.
    pub fn restore(config: MarketConfig, snapshot: &MarketSnapshot) -> Result<Self> {
        let state = MarketState::from_snapshot(snapshot)?;
        let ledger = InMemoryValueLedger::from_balances(snapshot.balances.clone());
        let escrow = ledger.balance(&Identity::ESCROW);
        if escrow != state.active_escrow() {
            return Err(MarketError::CorruptSnapshot {
                reason: format!(
                    "escrow balance {escrow} does not cover active bids {}",
                    state.active_escrow()
                ),
            });
        }
        info!(
            bids = state.bids().len(),
            owners = state.data_owners().len(),
            events = state.events().len(),
            "restored market from snapshot"
        );
        Ok(Self {
            config,
            inner: RwLock::new(Inner { state, ledger }),
        })
    }
}

impl Default for Market<InMemoryValueLedger> {
    fn default() -> Self {
        Self::new(MarketConfig::default())
    }
}

impl<L: ValueLedger> Market<L> {
    pub fn with_ledger(config: MarketConfig, ledger: L) -> Self {
        Self {
            config,
            inner: RwLock::new(Inner {
                state: MarketState::new(),
                ledger,
            }),
        }
    }

    pub fn config(&self) -> &MarketConfig {
        &self.config
    }

    /// Run `f` as one all-or-nothing transaction.
    pub fn transact<T>(&self, f: impl FnOnce(&mut StateTx<'_, L>) -> Result<T>) -> Result<T> {
        let mut guard = self.inner.write();
        let Inner { state, ledger } = &mut *guard;
        let mut tx = StateTx::begin(state, ledger, &self.config);
        match f(&mut tx) {
            Ok(value) => {
                tx.commit();
                Ok(value)
            }
            Err(err) => {
                tx.rollback();
                warn!(error = %err, "market operation rejected");
                Err(err)
            }
        }
    }

    /// Run `f` against a consistent view of the tables.
    pub fn read<T>(&self, f: impl FnOnce(&MarketState) -> T) -> T {
        f(&self.inner.read().state)
    }

    /// Direct access to the underlying ledger, bypassing market bookkeeping.
    ///
    /// Nothing here is journaled or checked. Moving value in or out of
    /// [`Identity::ESCROW`] breaks the rule that escrow equals the sum of
    /// active bid prices, and a snapshot taken afterwards fails
    /// [`Market::restore`]. Intended for ledger fault injection in tests.
    pub fn with_ledger_mut<T>(&self, f: impl FnOnce(&mut L) -> T) -> T {
        f(&mut self.inner.write().ledger)
    }

    // ---------------------------------------------------------------------
    // Identity & role registry
    // ---------------------------------------------------------------------

    pub fn register_as_data_owner(&self, caller: &Identity) -> Result<()> {
        self.transact(|tx| tx.register(caller, Role::DataOwner))?;
        info!(%caller, "registered data owner");
        Ok(())
    }

    pub fn register_as_data_requester(&self, caller: &Identity) -> Result<()> {
        self.transact(|tx| tx.register(caller, Role::DataRequester))?;
        info!(%caller, "registered data requester");
        Ok(())
    }

    pub fn get_role(&self, caller: &Identity) -> RoleFlags {
        self.read(|state| state.role_flags(caller))
    }

    pub fn role_of(&self, caller: &Identity) -> Role {
        self.read(|state| state.role_of(caller))
    }

    // ---------------------------------------------------------------------
    // File registry
    // ---------------------------------------------------------------------

    pub fn add(
        &self,
        caller: &Identity,
        locator: impl Into<String>,
        name: impl Into<String>,
    ) -> Result<usize> {
        let record = FileRecord::new(locator, name);
        let position = self.transact(|tx| tx.add_file(caller, record))?;
        debug!(owner = %caller, position, "file added");
        Ok(position)
    }

    pub fn display(&self, requesting_caller: &Identity, target_owner: &Identity) -> Result<Vec<FileRecord>> {
        self.read(|state| state.display(requesting_caller, target_owner))
    }

    pub fn list_all_files(&self) -> Vec<OwnerListing> {
        self.read(MarketState::list_all_files)
    }

    // ---------------------------------------------------------------------
    // Access control ledger
    // ---------------------------------------------------------------------

    pub fn allow(&self, owner: &Identity, requester: &Identity) -> Result<()> {
        self.transact(|tx| tx.allow(owner, requester))?;
        info!(%owner, %requester, "access granted");
        Ok(())
    }

    pub fn disallow(&self, owner: &Identity, requester: &Identity) -> Result<()> {
        self.transact(|tx| tx.disallow(owner, requester))?;
        info!(%owner, %requester, "access revoked");
        Ok(())
    }

    pub fn share_access(&self, owner: &Identity) -> Vec<Identity> {
        self.read(|state| state.share_access(owner))
    }

    pub fn get_accessible_data_owners(&self, caller: &Identity) -> Vec<AccessEntry> {
        self.read(|state| state.accessible_data_owners(caller))
    }

    pub fn has_access(&self, owner: &Identity, requester: &Identity) -> bool {
        self.read(|state| state.has_access(owner, requester))
    }

    // ---------------------------------------------------------------------
    // Bid book & settlement
    // ---------------------------------------------------------------------

    pub fn place_bid(
        &self,
        requester: &Identity,
        target_owner: &Identity,
        amount: Amount,
        escrowed_value: Amount,
    ) -> Result<u64> {
        let index =
            self.transact(|tx| tx.place_bid(requester, target_owner, amount, escrowed_value))?;
        info!(index, %requester, owner = %target_owner, %amount, "bid placed");
        Ok(index)
    }

    pub fn get_bids(&self) -> Vec<Bid> {
        self.read(|state| state.bids().to_vec())
    }

    pub fn get_bid(&self, index: u64) -> Result<Bid> {
        self.read(|state| state.bid(index).cloned())
    }

    pub fn bids_for_owner(&self, owner: &Identity) -> Vec<Bid> {
        self.read(|state| state.bids_for_owner(owner))
    }

    pub fn bids_by_requester(&self, requester: &Identity) -> Vec<Bid> {
        self.read(|state| state.bids_by_requester(requester))
    }

    pub fn withdraw_bid(&self, caller: &Identity, index: u64) -> Result<Amount> {
        let refund = self.transact(|tx| tx.withdraw_bid(caller, index))?;
        info!(index, requester = %caller, %refund, "bid withdrawn");
        Ok(refund)
    }

    pub fn accept_bid(&self, caller: &Identity, bid_index: u64) -> Result<Settlement> {
        let settlement = self.transact(|tx| tx.accept_bid(caller, bid_index))?;
        info!(
            index = bid_index,
            owner = %settlement.data_owner,
            requester = %settlement.data_requester,
            price = %settlement.price,
            "bid accepted"
        );
        Ok(settlement)
    }

    // ---------------------------------------------------------------------
    // Balances
    // ---------------------------------------------------------------------

    /// Credit `account` with fresh value (development faucet).
    pub fn fund(&self, account: &Identity, amount: Amount) -> Result<()> {
        self.transact(|tx| {
            if account.is_escrow() {
                return Err(MarketError::unauthorized(account, "escrow cannot be funded"));
            }
            if amount.is_zero() {
                return Err(LedgerError::Rejected("funding amount must be positive".into()).into());
            }
            tx.credit(account, amount)?;
            tx.emit(MarketEventKind::Funded {
                account: *account,
                amount,
            });
            Ok(())
        })?;
        info!(%account, %amount, "account funded");
        Ok(())
    }

    pub fn balance_of(&self, account: &Identity) -> Amount {
        self.inner.read().ledger.balance(account)
    }

    pub fn escrow_balance(&self) -> Amount {
        self.balance_of(&Identity::ESCROW)
    }

    pub fn total_supply(&self) -> Amount {
        self.inner.read().ledger.total_supply()
    }

    // ---------------------------------------------------------------------
    // Journal & persistence
    // ---------------------------------------------------------------------

    pub fn events(&self) -> Vec<MarketEvent> {
        self.read(|state| state.events().to_vec())
    }

    /// Events with `sequence >= from`.
    pub fn events_since(&self, from: u64) -> Vec<MarketEvent> {
        self.read(|state| {
            state
                .events()
                .iter()
                .skip(usize::try_from(from).unwrap_or(usize::MAX))
                .cloned()
                .collect()
        })
    }

    pub fn snapshot(&self) -> MarketSnapshot {
        let inner = self.inner.read();
        inner.state.to_snapshot(inner.ledger.balances())
    }
}
