//! Error types for marketplace operations

use filemart_treasury::LedgerError;
use filemart_types::Identity;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MarketError {
    #[error("{caller} already holds a role")]
    AlreadyRegistered { caller: Identity },

    #[error("unauthorized {caller}: {reason}")]
    Unauthorized { caller: Identity, reason: String },

    #[error("{requester} has no access to files of {owner}")]
    AccessDenied { requester: Identity, owner: Identity },

    #[error("invalid bid: {reason}")]
    InvalidBid { reason: String },

    #[error("bid {index} is no longer active")]
    AlreadyInactive { index: u64 },

    #[error("bid {index} not found")]
    BidNotFound { index: u64 },

    #[error("invalid file record: {reason}")]
    InvalidFile { reason: String },

    #[error("{owner} reached the limit of {limit} files")]
    CapacityExceeded { owner: Identity, limit: usize },

    #[error("corrupt snapshot: {reason}")]
    CorruptSnapshot { reason: String },

    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),
}

impl MarketError {
    pub(crate) fn unauthorized(caller: &Identity, reason: impl Into<String>) -> Self {
        MarketError::Unauthorized {
            caller: *caller,
            reason: reason.into(),
        }
    }

    pub(crate) fn invalid_bid(reason: impl Into<String>) -> Self {
        MarketError::InvalidBid {
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, MarketError>;
