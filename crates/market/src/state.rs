//! Ledger tables and the transaction that mutates them.
//!
//! Every write made through [`StateTx`] records an [`Undo`] entry. A
//! transaction either commits, keeping its writes, or rolls back by
//! replaying the journal in reverse. Value movements go straight to the
//! [`ValueLedger`] and are compensated on rollback.

use crate::config::MarketConfig;
use crate::errors::Result;
use crate::events::{MarketEvent, MarketEventKind};
use filemart_treasury::ValueLedger;
use filemart_types::{Amount, Bid, FileRecord, Identity, Role};
use std::collections::HashMap;
use tracing::{error, warn};

/// All marketplace tables. Mutated only through [`StateTx`].
#[derive(Debug, Clone, Default)]
pub struct MarketState {
    pub(crate) roles: HashMap<Identity, Role>,
    /// Data owners in registration order.
    pub(crate) owners: Vec<Identity>,
    pub(crate) files: HashMap<Identity, Vec<FileRecord>>,
    pub(crate) grants: HashMap<(Identity, Identity), bool>,
    /// owner -> requesters currently granted, in grant order.
    pub(crate) shared_with: HashMap<Identity, Vec<Identity>>,
    /// requester -> owners that ever touched its grant, first-touch order.
    pub(crate) accessible: HashMap<Identity, Vec<Identity>>,
    pub(crate) bids: Vec<Bid>,
    pub(crate) events: Vec<MarketEvent>,
}

impl MarketState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> &[MarketEvent] {
        &self.events
    }

    pub(crate) fn next_bid_index(&self) -> u64 {
        self.bids.len() as u64
    }
}

#[derive(Debug)]
pub(crate) enum Undo {
    RoleAssigned {
        caller: Identity,
        listed_owner: bool,
    },
    FileAppended {
        owner: Identity,
    },
    GrantChanged {
        owner: Identity,
        requester: Identity,
        previous: Option<bool>,
        shared_position: Option<usize>,
        reverse_added: bool,
    },
    BidAppended,
    BidReplaced {
        previous: Bid,
    },
    Transferred {
        from: Identity,
        to: Identity,
        amount: Amount,
    },
    Credited {
        account: Identity,
        amount: Amount,
    },
    EventAppended,
}

/// Write access to the market for the span of one operation.
pub struct StateTx<'a, L: ValueLedger> {
    pub(crate) state: &'a mut MarketState,
    pub(crate) ledger: &'a mut L,
    pub(crate) config: &'a MarketConfig,
    journal: Vec<Undo>,
    finished: bool,
}

impl<'a, L: ValueLedger> StateTx<'a, L> {
    pub(crate) fn begin(
        state: &'a mut MarketState,
        ledger: &'a mut L,
        config: &'a MarketConfig,
    ) -> Self {
        Self {
            state,
            ledger,
            config,
            journal: Vec::new(),
            finished: false,
        }
    }

    /// Read-only view of the tables, including writes made so far.
    pub fn state(&self) -> &MarketState {
        self.state
    }

    pub fn config(&self) -> &MarketConfig {
        self.config
    }

    pub fn balance_of(&self, account: &Identity) -> Amount {
        self.ledger.balance(account)
    }

    pub(crate) fn record(&mut self, undo: Undo) {
        self.journal.push(undo);
    }

    pub(crate) fn emit(&mut self, kind: MarketEventKind) {
        let sequence = self.state.events.len() as u64;
        self.state.events.push(MarketEvent { sequence, kind });
        self.journal.push(Undo::EventAppended);
    }

    /// Move value between accounts through the ledger.
    pub(crate) fn transfer(&mut self, from: &Identity, to: &Identity, amount: Amount) -> Result<()> {
        self.ledger.transfer(from, to, amount)?;
        self.journal.push(Undo::Transferred {
            from: *from,
            to: *to,
            amount,
        });
        Ok(())
    }

    /// Mint `amount` into `account`.
    pub(crate) fn credit(&mut self, account: &Identity, amount: Amount) -> Result<()> {
        self.ledger.credit(account, amount)?;
        self.journal.push(Undo::Credited {
            account: *account,
            amount,
        });
        Ok(())
    }

    /// Keep every write made in this transaction.
    pub fn commit(mut self) {
        self.journal.clear();
        self.finished = true;
    }

    /// Discard every write made in this transaction.
    pub fn rollback(mut self) {
        self.unwind();
    }

    fn unwind(&mut self) {
        if self.finished {
            return;
        }
        self.finished = true;
        if !self.journal.is_empty() {
            warn!(writes = self.journal.len(), "rolling back market transaction");
        }
        while let Some(undo) = self.journal.pop() {
            self.revert(undo);
        }
    }

    fn revert(&mut self, undo: Undo) {
        let state = &mut *self.state;
        match undo {
            Undo::RoleAssigned {
                caller,
                listed_owner,
            } => {
                state.roles.remove(&caller);
                if listed_owner {
                    state.owners.pop();
                }
            }
            Undo::FileAppended { owner } => {
                if let Some(files) = state.files.get_mut(&owner) {
                    files.pop();
                    if files.is_empty() {
                        state.files.remove(&owner);
                    }
                }
            }
            Undo::GrantChanged {
                owner,
                requester,
                previous,
                shared_position,
                reverse_added,
            } => {
                match previous {
                    Some(granted) => {
                        state.grants.insert((owner, requester), granted);
                    }
                    None => {
                        state.grants.remove(&(owner, requester));
                    }
                }
                let shared = state.shared_with.entry(owner).or_default();
                shared.retain(|r| *r != requester);
                if let Some(position) = shared_position {
                    shared.insert(position.min(shared.len()), requester);
                }
                if shared.is_empty() {
                    state.shared_with.remove(&owner);
                }
                if reverse_added {
                    if let Some(owners) = state.accessible.get_mut(&requester) {
                        owners.pop();
                        if owners.is_empty() {
                            state.accessible.remove(&requester);
                        }
                    }
                }
            }
            Undo::BidAppended => {
                state.bids.pop();
            }
            Undo::BidReplaced { previous } => {
                if let Some(slot) = state.bids.get_mut(previous.index as usize) {
                    *slot = previous;
                }
            }
            Undo::Transferred { from, to, amount } => {
                if let Err(err) = self.ledger.transfer(&to, &from, amount) {
                    error!(%from, %to, %amount, error = %err, "failed to compensate transfer");
                }
            }
            Undo::Credited { account, amount } => {
                if let Err(err) = self.ledger.debit(&account, amount) {
                    error!(%account, %amount, error = %err, "failed to compensate credit");
                }
            }
            Undo::EventAppended => {
                state.events.pop();
            }
        }
    }
}

impl<L: ValueLedger> Drop for StateTx<'_, L> {
    fn drop(&mut self) {
        self.unwind();
    }
}
