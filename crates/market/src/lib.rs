//! FileMart marketplace core.
//!
//! Data owners register file references, data requesters escrow value in
//! bids against an owner, and accepting a bid pays the owner and grants the
//! requester access to the owner's files. All state lives in a [`Market`],
//! which serialises mutations and applies each one atomically.

pub mod access;
pub mod bids;
pub mod config;
pub mod errors;
pub mod events;
pub mod files;
pub mod market;
pub mod registry;
pub mod settlement;
pub mod snapshot;
pub mod state;

pub use config::MarketConfig;
pub use errors::*;
pub use events::{MarketEvent, MarketEventKind};
pub use market::Market;
pub use settlement::Settlement;
pub use snapshot::{MarketSnapshot, SNAPSHOT_VERSION};
pub use state::{MarketState, StateTx};

#[cfg(test)]
mod tests;
