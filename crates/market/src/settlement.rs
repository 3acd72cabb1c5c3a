//! Settlement engine.
//!
//! Accepting a bid pays the escrowed price to the owner, closes the bid and
//! grants the bidder access. The three writes happen inside one
//! [`StateTx`]; if any of them fails the transaction unwinds all of them.

use crate::errors::{MarketError, Result};
use crate::events::MarketEventKind;
use crate::state::StateTx;
use filemart_treasury::ValueLedger;
use filemart_types::{Amount, BidStatus, Identity};
use serde::{Deserialize, Serialize};

/// Receipt for an accepted bid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settlement {
    pub bid_index: u64,
    pub data_owner: Identity,
    pub data_requester: Identity,
    pub price: Amount,
}

impl<L: ValueLedger> StateTx<'_, L> {
    pub fn accept_bid(&mut self, caller: &Identity, bid_index: u64) -> Result<Settlement> {
        let bid = self.active_bid(bid_index)?;
        if bid.data_owner != *caller {
            return Err(MarketError::unauthorized(
                caller,
                format!("bid {bid_index} is addressed to {}", bid.data_owner),
            ));
        }

        self.transfer(&Identity::ESCROW, &bid.data_owner, bid.price)?;
        self.close_bid(&bid, BidStatus::Accepted)?;
        self.set_grant(&bid.data_owner, &bid.data_requester, true);
        self.emit(MarketEventKind::BidAccepted {
            index: bid_index,
            owner: bid.data_owner,
            requester: bid.data_requester,
            price: bid.price,
        });

        Ok(Settlement {
            bid_index,
            data_owner: bid.data_owner,
            data_requester: bid.data_requester,
            price: bid.price,
        })
    }
}
