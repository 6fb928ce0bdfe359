//! Tunnel configuration generation.

use std::path::PathBuf;

use crate::error::{Error, Result};
use crate::remote::RemoteExchange;
use crate::storage::{Slot, SlotStore};
use crate::types::{DeviceToken, TunnelConfig};

pub struct ConfigGenerator<'a> {
    remote: &'a dyn RemoteExchange,
    store: &'a dyn SlotStore,
}

impl<'a> ConfigGenerator<'a> {
    pub fn new(remote: &'a dyn RemoteExchange, store: &'a dyn SlotStore) -> Self {
        Self { remote, store }
    }

    /// Exchange `token` for fresh configuration text.
    pub fn generate(&self, token: &DeviceToken) -> Result<TunnelConfig> {
        let text = self.remote.request_config(token).map_err(|e| match e {
            Error::ConfigExchangeFailed(detail) => Error::ConfigExchangeFailed(detail),
            other => Error::ConfigExchangeFailed(other.to_string()),
        })?;
        if text.trim().is_empty() {
            return Err(Error::ConfigExchangeFailed(
                "remote returned an empty configuration".into(),
            ));
        }
        tracing::info!("tunnel configuration generated");
        Ok(TunnelConfig::new(text))
    }

    /// Write `config` over the config slot and return where it lives.
    pub fn persist(&self, config: &TunnelConfig) -> Result<PathBuf> {
        self.store.write(Slot::Config, config.as_str())?;
        Ok(self.store.location(Slot::Config))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;
    use crate::testing::StaticRemote;
    use crate::types::DeviceIdentity;

    #[test]
    fn each_generation_replaces_the_previous_config() {
        let remote = StaticRemote::accepting("AB123");
        let store = MemoryStore::default();
        let generator = ConfigGenerator::new(&remote, &store);
        let token = remote
            .request_token(&DeviceIdentity::new("hint"), "AB123")
            .unwrap();

        let first = generator.generate(&token).unwrap();
        generator.persist(&first).unwrap();
        let second = generator.generate(&token).unwrap();
        let path = generator.persist(&second).unwrap();

        assert_ne!(first, second);
        assert_eq!(store.read(Slot::Config).unwrap().as_deref(), Some(second.as_str()));
        assert!(path.ends_with("teleport.conf"));
    }

    #[test]
    fn remote_failure_is_config_exchange_failed() {
        let remote = StaticRemote::accepting("AB123");
        let token = remote
            .request_token(&DeviceIdentity::new("hint"), "AB123")
            .unwrap();
        remote.fail_config_with("token expired");
        let store = MemoryStore::default();

        let err = ConfigGenerator::new(&remote, &store)
            .generate(&token)
            .unwrap_err();
        match err {
            Error::ConfigExchangeFailed(detail) => assert!(detail.contains("token expired")),
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(!store.exists(Slot::Config));
    }

    #[test]
    fn unknown_token_is_config_exchange_failed() {
        let remote = StaticRemote::accepting("AB123");
        let store = MemoryStore::default();
        let err = ConfigGenerator::new(&remote, &store)
            .generate(&DeviceToken::new("never-issued"))
            .unwrap_err();
        assert!(matches!(err, Error::ConfigExchangeFailed(_)));
    }
}
