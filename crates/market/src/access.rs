//! Access control ledger.
//!
//! Grants are keyed by `(owner, requester)` and default to `false`. Two
//! indices are kept beside the grant table:
//!
//! * `shared_with[owner]` lists requesters whose grant is currently true,
//!   in grant order. Revoking removes the entry; re-granting appends it at
//!   the end.
//! * `accessible[requester]` lists every owner that ever set a grant for
//!   that requester, in first-touch order. Entries are never removed so
//!   revocations stay visible.

use crate::errors::Result;
use crate::events::MarketEventKind;
use crate::state::{MarketState, StateTx, Undo};
use filemart_treasury::ValueLedger;
use filemart_types::{AccessEntry, Identity, Role};

impl MarketState {
    pub fn has_access(&self, owner: &Identity, requester: &Identity) -> bool {
        self.grants
            .get(&(*owner, *requester))
            .copied()
            .unwrap_or(false)
    }

    /// Requesters currently granted by `owner`.
    pub fn share_access(&self, owner: &Identity) -> Vec<Identity> {
        self.shared_with.get(owner).cloned().unwrap_or_default()
    }

    /// Every owner that ever granted or revoked `requester`, with current state.
    pub fn accessible_data_owners(&self, requester: &Identity) -> Vec<AccessEntry> {
        self.accessible
            .get(requester)
            .map(|owners| {
                owners
                    .iter()
                    .map(|owner| AccessEntry {
                        data_owner: *owner,
                        access: self.has_access(owner, requester),
                    })
                    .collect()
            })
            .unwrap_or_default()
    }
}

impl<L: ValueLedger> StateTx<'_, L> {
    pub fn allow(&mut self, owner: &Identity, requester: &Identity) -> Result<()> {
        self.require_role(owner, Role::DataOwner, "granting access")?;
        self.set_grant(owner, requester, true);
        Ok(())
    }

    /// Revoke a grant. Revoking a pair that was never granted is a no-op.
    pub fn disallow(&mut self, owner: &Identity, requester: &Identity) -> Result<()> {
        self.require_role(owner, Role::DataOwner, "revoking access")?;
        self.set_grant(owner, requester, false);
        Ok(())
    }

    /// Write a grant and keep both indices in step.
    pub(crate) fn set_grant(&mut self, owner: &Identity, requester: &Identity, granted: bool) {
        let state = &mut *self.state;
        let previous = state.grants.insert((*owner, *requester), granted);

        let shared = state.shared_with.entry(*owner).or_default();
        let shared_position = shared.iter().position(|r| r == requester);
        match (granted, shared_position) {
            (true, None) => shared.push(*requester),
            (false, Some(position)) => {
                shared.remove(position);
            }
            _ => {}
        }
        if shared.is_empty() {
            state.shared_with.remove(owner);
        }

        let owners = state.accessible.entry(*requester).or_default();
        let reverse_added = !owners.contains(owner);
        if reverse_added {
            owners.push(*owner);
        }

        self.record(Undo::GrantChanged {
            owner: *owner,
            requester: *requester,
            previous,
            shared_position,
            reverse_added,
        });
        self.emit(MarketEventKind::AccessChanged {
            owner: *owner,
            requester: *requester,
            granted,
        });
    }
}
