//! Values exchanged between the lifecycle components.

use std::fmt;

/// Stable per-installation client fingerprint ("client hint").
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceIdentity(String);

impl DeviceIdentity {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// A fresh random identity.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Opaque credential issued by the remote service.
#[derive(Clone, PartialEq, Eq)]
pub struct DeviceToken(String);

impl DeviceToken {
    /// Surrounding whitespace is not part of the token.
    pub fn new(value: impl AsRef<str>) -> Self {
        Self(value.as_ref().trim().to_string())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

// Never log credentials.
impl fmt::Debug for DeviceToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("DeviceToken(***)")
    }
}

/// Configuration text for the tunnel (addresses, keys, peers).
#[derive(Clone, PartialEq, Eq)]
pub struct TunnelConfig(String);

impl TunnelConfig {
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

// Contains the interface private key.
impl fmt::Debug for TunnelConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TunnelConfig({} bytes)", self.0.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_identities_differ() {
        let a = DeviceIdentity::generate();
        let b = DeviceIdentity::generate();
        assert_ne!(a, b);
        assert_eq!(a.as_str().len(), 36);
    }

    #[test]
    fn debug_output_hides_secrets() {
        let token = DeviceToken::new("secret-token");
        assert!(!format!("{token:?}").contains("secret"));

        let config = TunnelConfig::new("[Interface]\nPrivateKey = abc");
        assert!(!format!("{config:?}").contains("PrivateKey"));
    }

    #[test]
    fn token_whitespace_is_dropped() {
        assert_eq!(DeviceToken::new(" tok-1\r\n").as_str(), "tok-1");
        assert!(DeviceToken::new("\n").is_empty());
    }
}
