//! Per-owner file registry.

use crate::errors::{MarketError, Result};
use crate::events::MarketEventKind;
use crate::state::{MarketState, StateTx, Undo};
use filemart_treasury::ValueLedger;
use filemart_types::{FileRecord, Identity, OwnerListing, Role};

impl MarketState {
    /// Files registered by `owner`, in insertion order.
    pub fn files_of(&self, owner: &Identity) -> &[FileRecord] {
        self.files.get(owner).map(Vec::as_slice).unwrap_or_default()
    }

    /// Files of `target_owner` as visible to `requesting_caller`.
    pub fn display(
        &self,
        requesting_caller: &Identity,
        target_owner: &Identity,
    ) -> Result<Vec<FileRecord>> {
        if requesting_caller != target_owner
            && !self.has_access(target_owner, requesting_caller)
        {
            return Err(MarketError::AccessDenied {
                requester: *requesting_caller,
                owner: *target_owner,
            });
        }
        Ok(self.files_of(target_owner).to_vec())
    }

    /// Names of every owner's files. Locators are never exposed here.
    pub fn list_all_files(&self) -> Vec<OwnerListing> {
        self.owners
            .iter()
            .map(|owner| OwnerListing {
                owner: *owner,
                file_names: self
                    .files_of(owner)
                    .iter()
                    .map(|file| file.name.clone())
                    .collect(),
            })
            .collect()
    }
}

impl<L: ValueLedger> StateTx<'_, L> {
    /// Append a file to the caller's registry. Returns its position.
    pub fn add_file(&mut self, caller: &Identity, record: FileRecord) -> Result<usize> {
        self.require_role(caller, Role::DataOwner, "adding files")?;
        self.validate_file(&record)?;

        let limit = self.config.max_files_per_owner;
        if self.state.files_of(caller).len() >= limit {
            return Err(MarketError::CapacityExceeded {
                owner: *caller,
                limit,
            });
        }

        let files = self.state.files.entry(*caller).or_default();
        let position = files.len();
        let name = record.name.clone();
        files.push(record);
        self.record(Undo::FileAppended { owner: *caller });
        self.emit(MarketEventKind::FileAdded {
            owner: *caller,
            name,
            position,
        });
        Ok(position)
    }

    fn validate_file(&self, record: &FileRecord) -> Result<()> {
        let invalid = |reason: String| Err(MarketError::InvalidFile { reason });
        if record.locator.trim().is_empty() {
            return invalid("locator is empty".into());
        }
        if record.name.trim().is_empty() {
            return invalid("name is empty".into());
        }
        if record.locator.len() > self.config.max_locator_len {
            return invalid(format!(
                "locator longer than {} bytes",
                self.config.max_locator_len
            ));
        }
        if record.name.len() > self.config.max_name_len {
            return invalid(format!("name longer than {} bytes", self.config.max_name_len));
        }
        Ok(())
    }
}
