//! Device identity persistence.

use crate::error::Result;
use crate::storage::{Slot, SlotStore};
use crate::types::DeviceIdentity;

/// Create-or-load access to the identity slot.
pub struct IdentityStore<'a> {
    store: &'a dyn SlotStore,
}

impl<'a> IdentityStore<'a> {
    pub fn new(store: &'a dyn SlotStore) -> Self {
        Self { store }
    }

    /// The persisted identity, if any. Blank contents count as absent.
    pub fn load(&self) -> Result<Option<DeviceIdentity>> {
        Ok(self
            .store
            .read(Slot::Identity)?
            .map(|raw| raw.trim().to_string())
            .filter(|hint| !hint.is_empty())
            .map(DeviceIdentity::new))
    }

    /// Load the identity, generating and persisting one on first use.
    pub fn get_or_create(&self) -> Result<DeviceIdentity> {
        if let Some(identity) = self.load()? {
            tracing::debug!("loaded device identity");
            return Ok(identity);
        }

        let identity = DeviceIdentity::generate();
        self.store.write(Slot::Identity, identity.as_str())?;
        tracing::info!("created device identity");
        Ok(identity)
    }
}
