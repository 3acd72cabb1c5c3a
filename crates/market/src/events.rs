//! Append-only journal of committed marketplace mutations.

use filemart_types::{Amount, Identity, Role};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketEvent {
    /// Position in the journal, starting at zero.
    pub sequence: u64,
    pub kind: MarketEventKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarketEventKind {
    RoleRegistered {
        identity: Identity,
        role: Role,
    },
    /// Only the name is journaled; locators stay behind the access check.
    FileAdded {
        owner: Identity,
        name: String,
        position: usize,
    },
    AccessChanged {
        owner: Identity,
        requester: Identity,
        granted: bool,
    },
    BidPlaced {
        index: u64,
        requester: Identity,
        owner: Identity,
        price: Amount,
    },
    BidAccepted {
        index: u64,
        owner: Identity,
        requester: Identity,
        price: Amount,
    },
    BidWithdrawn {
        index: u64,
        requester: Identity,
        refund: Amount,
    },
    Funded {
        account: Identity,
        amount: Amount,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serialized_form_names_the_kind() {
        let event = MarketEvent {
            sequence: 3,
            kind: MarketEventKind::AccessChanged {
                owner: Identity::new([1; 20]),
                requester: Identity::new([2; 20]),
                granted: true,
            },
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["sequence"], 3);
        assert_eq!(value["kind"]["access_changed"]["granted"], true);

        let back: MarketEvent = serde_json::from_value(value).unwrap();
        assert_eq!(back, event);
    }
}
