//! Serializable image of the whole market, used for persistence.

use crate::errors::{MarketError, Result};
use crate::events::MarketEvent;
use crate::state::MarketState;
use filemart_types::{Amount, Bid, BidStatus, FileRecord, Identity, Role};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

pub const SNAPSHOT_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleRecord {
    pub identity: Identity,
    pub role: Role,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnerFiles {
    pub owner: Identity,
    pub files: Vec<FileRecord>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrantRecord {
    pub owner: Identity,
    pub requester: Identity,
    pub granted: bool,
}

/// Ordered identity list keyed by one identity (grant indices).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityList {
    pub key: Identity,
    pub members: Vec<Identity>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketSnapshot {
    pub version: u32,
    pub roles: Vec<RoleRecord>,
    pub owners: Vec<Identity>,
    pub files: Vec<OwnerFiles>,
    pub grants: Vec<GrantRecord>,
    pub shared_with: Vec<IdentityList>,
    pub accessible: Vec<IdentityList>,
    pub bids: Vec<Bid>,
    pub events: Vec<MarketEvent>,
    pub balances: BTreeMap<Identity, Amount>,
}

impl Default for MarketSnapshot {
    fn default() -> Self {
        MarketState::new().to_snapshot(BTreeMap::new())
    }
}

fn sorted_lists(map: &std::collections::HashMap<Identity, Vec<Identity>>) -> Vec<IdentityList> {
    let mut lists: Vec<IdentityList> = map
        .iter()
        .map(|(key, members)| IdentityList {
            key: *key,
            members: members.clone(),
        })
        .collect();
    lists.sort_by(|a, b| a.key.cmp(&b.key));
    lists
}

fn has_duplicates(members: &[Identity]) -> bool {
    let mut seen = HashSet::new();
    members.iter().any(|member| !seen.insert(*member))
}

fn corrupt(reason: impl Into<String>) -> MarketError {
    MarketError::CorruptSnapshot {
        reason: reason.into(),
    }
}

impl MarketState {
    pub fn to_snapshot(&self, balances: BTreeMap<Identity, Amount>) -> MarketSnapshot {
        let mut roles: Vec<RoleRecord> = self
            .roles
            .iter()
            .map(|(identity, role)| RoleRecord {
                identity: *identity,
                role: *role,
            })
            .collect();
        roles.sort_by(|a, b| a.identity.cmp(&b.identity));

        let mut files: Vec<OwnerFiles> = self
            .files
            .iter()
            .map(|(owner, files)| OwnerFiles {
                owner: *owner,
                files: files.clone(),
            })
            .collect();
        files.sort_by(|a, b| a.owner.cmp(&b.owner));

        let mut grants: Vec<GrantRecord> = self
            .grants
            .iter()
            .map(|((owner, requester), granted)| GrantRecord {
                owner: *owner,
                requester: *requester,
                granted: *granted,
            })
            .collect();
        grants.sort_by(|a, b| (a.owner, a.requester).cmp(&(b.owner, b.requester)));

        MarketSnapshot {
            version: SNAPSHOT_VERSION,
            roles,
            owners: self.owners.clone(),
            files,
            grants,
            shared_with: sorted_lists(&self.shared_with),
            accessible: sorted_lists(&self.accessible),
            bids: self.bids.clone(),
            events: self.events.clone(),
            balances,
        }
    }

    /// Rebuild tables from a snapshot, rejecting inconsistent images.
    pub fn from_snapshot(snapshot: &MarketSnapshot) -> Result<Self> {
        if snapshot.version != SNAPSHOT_VERSION {
            return Err(corrupt(format!(
                "unsupported snapshot version {}",
                snapshot.version
            )));
        }

        let mut state = MarketState::new();
        for record in &snapshot.roles {
            if !record.role.is_set() || record.identity.is_escrow() {
                return Err(corrupt(format!("invalid role entry for {}", record.identity)));
            }
            if state.roles.insert(record.identity, record.role).is_some() {
                return Err(corrupt(format!("duplicate role for {}", record.identity)));
            }
        }

        let mut seen = HashSet::new();
        for owner in &snapshot.owners {
            if !seen.insert(*owner) || !state.is_data_owner(owner) {
                return Err(corrupt(format!("owner list entry {owner} is invalid")));
            }
        }
        let owner_roles = state
            .roles
            .values()
            .filter(|role| **role == Role::DataOwner)
            .count();
        if owner_roles != snapshot.owners.len() {
            return Err(corrupt("owner list does not match role table"));
        }
        state.owners = snapshot.owners.clone();

        for entry in &snapshot.files {
            if !state.is_data_owner(&entry.owner) {
                return Err(corrupt(format!("files held by non-owner {}", entry.owner)));
            }
            if !entry.files.is_empty() {
                state.files.insert(entry.owner, entry.files.clone());
            }
        }

        for grant in &snapshot.grants {
            state
                .grants
                .insert((grant.owner, grant.requester), grant.granted);
        }
        for list in &snapshot.shared_with {
            if list.members.iter().any(|r| !state.has_access(&list.key, r)) {
                return Err(corrupt(format!("share list of {} names revoked requester", list.key)));
            }
            if has_duplicates(&list.members) {
                return Err(corrupt(format!("share list of {} repeats a requester", list.key)));
            }
            if !list.members.is_empty() {
                state.shared_with.insert(list.key, list.members.clone());
            }
        }
        for ((owner, requester), granted) in &state.grants {
            let shared = state
                .shared_with
                .get(owner)
                .is_some_and(|members| members.contains(requester));
            if *granted && !shared {
                return Err(corrupt(format!(
                    "grant from {owner} to {requester} missing from share list"
                )));
            }
        }
        for list in &snapshot.accessible {
            if list
                .members
                .iter()
                .any(|owner| !state.grants.contains_key(&(*owner, list.key)))
            {
                return Err(corrupt(format!("reverse index of {} has no grant", list.key)));
            }
            if has_duplicates(&list.members) {
                return Err(corrupt(format!("reverse index of {} repeats an owner", list.key)));
            }
            if !list.members.is_empty() {
                state.accessible.insert(list.key, list.members.clone());
            }
        }
        for (owner, requester) in state.grants.keys() {
            let listed = state
                .accessible
                .get(requester)
                .is_some_and(|owners| owners.contains(owner));
            if !listed {
                return Err(corrupt(format!(
                    "grant from {owner} to {requester} missing from reverse index"
                )));
            }
        }

        for (position, bid) in snapshot.bids.iter().enumerate() {
            if bid.index != position as u64 {
                return Err(corrupt(format!("bid at position {position} has index {}", bid.index)));
            }
            if bid.active != (bid.status == BidStatus::Active) {
                return Err(corrupt(format!("bid {} has inconsistent status", bid.index)));
            }
        }
        state.bids = snapshot.bids.clone();

        for (position, event) in snapshot.events.iter().enumerate() {
            if event.sequence != position as u64 {
                return Err(corrupt(format!("event at position {position} out of sequence")));
            }
        }
        state.events = snapshot.events.clone();

        Ok(state)
    }
}
