//! Device token issuance and persistence.
//!
//! The PIN is only ever passed through to the remote service; it is never
//! written to storage.

use crate::error::{Error, Result};
use crate::remote::RemoteExchange;
use crate::storage::{Slot, SlotStore};
use crate::types::{DeviceIdentity, DeviceToken};

pub struct TokenExchange<'a> {
    remote: &'a dyn RemoteExchange,
    store: &'a dyn SlotStore,
}

impl<'a> TokenExchange<'a> {
    pub fn new(remote: &'a dyn RemoteExchange, store: &'a dyn SlotStore) -> Self {
        Self { remote, store }
    }

    /// Exchange identity + PIN for a new token. Does not persist it.
    pub fn issue_token(&self, identity: &DeviceIdentity, pin: &str) -> Result<DeviceToken> {
        let pin = pin.trim();
        if pin.is_empty() {
            return Err(Error::InvalidPin);
        }
        let token = self.remote.request_token(identity, pin)?;
        tracing::info!("device token issued");
        Ok(token)
    }

    /// Persist `token`, replacing any previous one.
    pub fn store_token(&self, token: &DeviceToken) -> Result<()> {
        self.store.write(Slot::Token, token.as_str())
    }

    /// The previously persisted token, for refresh without a PIN.
    pub fn load_token(&self) -> Result<DeviceToken> {
        self.store
            .read(Slot::Token)?
            .map(DeviceToken::new)
            .filter(|token| !token.is_empty())
            .ok_or(Error::NoTokenPresent)
    }

    pub fn has_token(&self) -> bool {
        self.store.exists(Slot::Token)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;
    use crate::testing::StaticRemote;

    #[test]
    fn issued_token_round_trips_through_storage() {
        let remote = StaticRemote::accepting("AB123");
        let store = MemoryStore::default();
        let tokens = TokenExchange::new(&remote, &store);
        let identity = DeviceIdentity::new("hint");

        let issued = tokens.issue_token(&identity, "AB123").unwrap();
        tokens.store_token(&issued).unwrap();
        assert_eq!(tokens.load_token().unwrap(), issued);
    }

    /// Hands back whatever text it was built with.
    struct PaddedRemote(&'static str);

    impl RemoteExchange for PaddedRemote {
        fn request_token(&self, _: &DeviceIdentity, _: &str) -> Result<DeviceToken> {
            Ok(DeviceToken::new(self.0))
        }

        fn request_config(&self, _: &DeviceToken) -> Result<String> {
            Err(Error::ConfigExchangeFailed("unused".into()))
        }
    }

    #[test]
    fn padded_token_is_stored_as_issued() {
        let remote = PaddedRemote("tok-1\n");
        let store = MemoryStore::default();
        let tokens = TokenExchange::new(&remote, &store);

        let issued = tokens.issue_token(&DeviceIdentity::new("hint"), "AB123").unwrap();
        tokens.store_token(&issued).unwrap();

        assert_eq!(issued.as_str(), "tok-1");
        assert_eq!(store.read(Slot::Token).unwrap().as_deref(), Some("tok-1"));
        assert_eq!(tokens.load_token().unwrap(), issued);
    }

    #[test]
    fn pin_is_trimmed_and_never_stored() {
        let remote = StaticRemote::accepting("AB123");
        let store = MemoryStore::default();
        let tokens = TokenExchange::new(&remote, &store);

        let token = tokens
            .issue_token(&DeviceIdentity::new("hint"), "  AB123\n")
            .unwrap();
        tokens.store_token(&token).unwrap();

        for slot in Slot::ALL {
            let contents = store.read(slot).unwrap().unwrap_or_default();
            assert!(!contents.contains("AB123"), "{slot} slot leaked the PIN");
        }
    }

    #[test]
    fn empty_pin_rejected_without_remote_call() {
        let remote = StaticRemote::accepting("AB123");
        let store = MemoryStore::default();
        let tokens = TokenExchange::new(&remote, &store);

        let err = tokens.issue_token(&DeviceIdentity::new("hint"), "   ").unwrap_err();
        assert!(matches!(err, Error::InvalidPin));
        assert_eq!(remote.token_requests(), 0);
    }

    #[test]
    fn wrong_pin_is_invalid_pin() {
        let remote = StaticRemote::accepting("AB123");
        let store = MemoryStore::default();
        let err = TokenExchange::new(&remote, &store)
            .issue_token(&DeviceIdentity::new("hint"), "XY789")
            .unwrap_err();
        assert!(matches!(err, Error::InvalidPin));
    }

    #[test]
    fn missing_token_reported() {
        let remote = StaticRemote::accepting("AB123");
        let store = MemoryStore::default();
        let tokens = TokenExchange::new(&remote, &store);
        assert!(matches!(tokens.load_token(), Err(Error::NoTokenPresent)));

        store.write(Slot::Token, "\n").unwrap();
        assert!(matches!(tokens.load_token(), Err(Error::NoTokenPresent)));
    }

    #[test]
    fn refresh_overwrites_previous_token() {
        let remote = StaticRemote::accepting("AB123");
        let store = MemoryStore::default();
        let tokens = TokenExchange::new(&remote, &store);
        let identity = DeviceIdentity::new("hint");

        let first = tokens.issue_token(&identity, "AB123").unwrap();
        tokens.store_token(&first).unwrap();
        let second = tokens.issue_token(&identity, "AB123").unwrap();
        tokens.store_token(&second).unwrap();

        assert_ne!(first, second);
        assert_eq!(tokens.load_token().unwrap(), second);
    }
}
