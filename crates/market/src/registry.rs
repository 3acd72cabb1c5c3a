//! Identity & role registry.

use crate::errors::{MarketError, Result};
use crate::events::MarketEventKind;
use crate::state::{MarketState, StateTx, Undo};
use filemart_treasury::ValueLedger;
use filemart_types::{Identity, Role, RoleFlags};

impl MarketState {
    pub fn role_of(&self, identity: &Identity) -> Role {
        self.roles.get(identity).copied().unwrap_or_default()
    }

    pub fn role_flags(&self, identity: &Identity) -> RoleFlags {
        self.role_of(identity).flags()
    }

    pub fn is_data_owner(&self, identity: &Identity) -> bool {
        self.role_of(identity) == Role::DataOwner
    }

    pub fn is_data_requester(&self, identity: &Identity) -> bool {
        self.role_of(identity) == Role::DataRequester
    }

    /// Registered data owners in registration order.
    pub fn data_owners(&self) -> &[Identity] {
        &self.owners
    }
}

impl<L: ValueLedger> StateTx<'_, L> {
    /// Bind `role` to `caller`. A role can be assigned once per identity.
    pub fn register(&mut self, caller: &Identity, role: Role) -> Result<()> {
        if !role.is_set() {
            return Err(MarketError::unauthorized(caller, "cannot register the unset role"));
        }
        if caller.is_escrow() {
            return Err(MarketError::unauthorized(caller, "escrow account cannot hold a role"));
        }
        if self.state.role_of(caller).is_set() {
            return Err(MarketError::AlreadyRegistered { caller: *caller });
        }

        self.state.roles.insert(*caller, role);
        let listed_owner = role == Role::DataOwner;
        if listed_owner {
            self.state.owners.push(*caller);
        }
        self.record(Undo::RoleAssigned {
            caller: *caller,
            listed_owner,
        });
        self.emit(MarketEventKind::RoleRegistered {
            identity: *caller,
            role,
        });
        Ok(())
    }

    pub(crate) fn require_role(&self, caller: &Identity, role: Role, action: &str) -> Result<()> {
        if self.state.role_of(caller) != role {
            return Err(MarketError::unauthorized(
                caller,
                format!("{action} requires the {role} role"),
            ));
        }
        Ok(())
    }
}
