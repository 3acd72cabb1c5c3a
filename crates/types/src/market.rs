//! Records exchanged across the marketplace read surface.

use crate::amount::Amount;
use crate::identity::Identity;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Role bound to an identity. Immutable once it leaves `Unset`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    #[default]
    Unset,
    DataOwner,
    DataRequester,
}

impl Role {
    pub fn is_set(self) -> bool {
        self != Role::Unset
    }

    pub fn flags(self) -> RoleFlags {
        RoleFlags {
            is_data_owner: self == Role::DataOwner,
            is_data_requester: self == Role::DataRequester,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Role::Unset => "unset",
            Role::DataOwner => "data owner",
            Role::DataRequester => "data requester",
        };
        f.write_str(s)
    }
}

/// Flag pair returned by `get_role`. Both false iff the role is unset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleFlags {
    pub is_data_owner: bool,
    pub is_data_requester: bool,
}

/// A file reference registered by a data owner.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FileRecord {
    /// Opaque retrieval locator produced by the storage network.
    pub locator: String,
    /// Display name.
    pub name: String,
}

impl FileRecord {
    pub fn new(locator: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            locator: locator.into(),
            name: name.into(),
        }
    }
}

/// Lifecycle state of a bid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BidStatus {
    Active,
    Accepted,
    Withdrawn,
}

/// An escrowed offer from a requester to one data owner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bid {
    pub index: u64,
    pub data_requester: Identity,
    pub data_owner: Identity,
    pub price: Amount,
    /// True until the bid is accepted or withdrawn.
    pub active: bool,
    pub status: BidStatus,
}

impl Bid {
    pub fn new(index: u64, data_requester: Identity, data_owner: Identity, price: Amount) -> Self {
        Self {
            index,
            data_requester,
            data_owner,
            price,
            active: true,
            status: BidStatus::Active,
        }
    }

    /// Move out of `Active`. Returns false if the bid was already inactive.
    pub fn close(&mut self, status: BidStatus) -> bool {
        if !self.active || status == BidStatus::Active {
            return false;
        }
        self.active = false;
        self.status = status;
        true
    }
}

/// Row of the reverse access index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessEntry {
    pub data_owner: Identity,
    pub access: bool,
}

/// File names published by one owner, as seen by unauthenticated browsers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnerListing {
    pub owner: Identity,
    pub file_names: Vec<String>,
}

impl OwnerListing {
    /// Split listings into the index-aligned `(addresses, names)` pair wallets expect.
    pub fn into_parallel(listings: Vec<OwnerListing>) -> (Vec<Identity>, Vec<Vec<String>>) {
        listings
            .into_iter()
            .map(|listing| (listing.owner, listing.file_names))
            .unzip()
    }
}
