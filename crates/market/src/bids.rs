//! Bid book: escrowed offers from requesters to data owners.

use crate::errors::{MarketError, Result};
use crate::events::MarketEventKind;
use crate::state::{MarketState, StateTx, Undo};
use filemart_treasury::ValueLedger;
use filemart_types::{Amount, Bid, BidStatus, Identity, Role};

impl MarketState {
    /// Full bid history, including inactive bids.
    pub fn bids(&self) -> &[Bid] {
        &self.bids
    }

    pub fn bid(&self, index: u64) -> Result<&Bid> {
        usize::try_from(index)
            .ok()
            .and_then(|i| self.bids.get(i))
            .ok_or(MarketError::BidNotFound { index })
    }

    pub fn bids_for_owner(&self, owner: &Identity) -> Vec<Bid> {
        self.bids
            .iter()
            .filter(|bid| bid.data_owner == *owner)
            .cloned()
            .collect()
    }

    pub fn bids_by_requester(&self, requester: &Identity) -> Vec<Bid> {
        self.bids
            .iter()
            .filter(|bid| bid.data_requester == *requester)
            .cloned()
            .collect()
    }

    /// Sum of prices of all active bids; equals the escrow balance.
    pub fn active_escrow(&self) -> Amount {
        self.bids
            .iter()
            .filter(|bid| bid.active)
            .map(|bid| bid.price)
            .sum()
    }
}

impl<L: ValueLedger> StateTx<'_, L> {
    /// Escrow `escrowed_value` from `requester` and open a bid on `target_owner`.
    pub fn place_bid(
        &mut self,
        requester: &Identity,
        target_owner: &Identity,
        amount: Amount,
        escrowed_value: Amount,
    ) -> Result<u64> {
        self.require_role(requester, Role::DataRequester, "placing bids")?;
        if amount.is_zero() {
            return Err(MarketError::invalid_bid("amount must be greater than zero"));
        }
        if amount < self.config.min_bid {
            return Err(MarketError::invalid_bid(format!(
                "amount {amount} below minimum {}",
                self.config.min_bid
            )));
        }
        if escrowed_value != amount {
            return Err(MarketError::invalid_bid(format!(
                "escrowed value {escrowed_value} does not match amount {amount}"
            )));
        }
        if !self.state.is_data_owner(target_owner) {
            return Err(MarketError::invalid_bid(format!(
                "{target_owner} is not a registered data owner"
            )));
        }

        self.transfer(requester, &Identity::ESCROW, escrowed_value)?;

        let index = self.state.next_bid_index();
        self.state
            .bids
            .push(Bid::new(index, *requester, *target_owner, amount));
        self.record(Undo::BidAppended);
        self.emit(MarketEventKind::BidPlaced {
            index,
            requester: *requester,
            owner: *target_owner,
            price: amount,
        });
        Ok(index)
    }

    /// Return an active bid's escrow to its requester and close it.
    pub fn withdraw_bid(&mut self, caller: &Identity, index: u64) -> Result<Amount> {
        let bid = self.active_bid(index)?;
        if bid.data_requester != *caller {
            return Err(MarketError::unauthorized(
                caller,
                format!("only the requester may withdraw bid {index}"),
            ));
        }

        self.transfer(&Identity::ESCROW, caller, bid.price)?;
        self.close_bid(&bid, BidStatus::Withdrawn)?;
        self.emit(MarketEventKind::BidWithdrawn {
            index,
            requester: *caller,
            refund: bid.price,
        });
        Ok(bid.price)
    }

    /// Copy of the bid at `index`, provided it is still active.
    pub(crate) fn active_bid(&self, index: u64) -> Result<Bid> {
        let bid = self.state.bid(index)?;
        if !bid.active {
            return Err(MarketError::AlreadyInactive { index });
        }
        Ok(bid.clone())
    }

    pub(crate) fn close_bid(&mut self, bid: &Bid, status: BidStatus) -> Result<()> {
        let slot = self
            .state
            .bids
            .get_mut(bid.index as usize)
            .ok_or(MarketError::BidNotFound { index: bid.index })?;
        let previous = slot.clone();
        if !slot.close(status) {
            return Err(MarketError::AlreadyInactive { index: bid.index });
        }
        self.record(Undo::BidReplaced { previous });
        Ok(())
    }
}
