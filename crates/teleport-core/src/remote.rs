//! Remote credential and configuration exchange.
//!
//! The lifecycle only depends on [`RemoteExchange`]; [`HttpExchange`] is the
//! JSON-over-HTTPS binding used by the `teleport` binary.

use std::fmt;

use reqwest::StatusCode;
use reqwest::blocking::{Client, Response};
use serde::{Deserialize, Serialize};

use crate::config::RemoteConfig;
use crate::error::{Error, Result};
use crate::types::{DeviceIdentity, DeviceToken};

/// Remote collaborator issuing device tokens and tunnel configurations.
pub trait RemoteExchange {
    /// Exchange identity + PIN for a device token.
    ///
    /// Fails with [`Error::InvalidPin`] or [`Error::RemoteUnavailable`].
    fn request_token(&self, identity: &DeviceIdentity, pin: &str) -> Result<DeviceToken>;

    /// Exchange a device token for tunnel configuration text.
    ///
    /// Fails with [`Error::ConfigExchangeFailed`].
    fn request_config(&self, token: &DeviceToken) -> Result<String>;
}

#[derive(Serialize)]
struct TokenRequest<'a> {
    client_hint: &'a str,
    pin: &'a str,
}

#[derive(Deserialize)]
struct TokenResponse {
    device_token: String,
}

#[derive(Serialize)]
struct ConnectRequest<'a> {
    device_token: &'a str,
}

#[derive(Deserialize)]
struct ConnectResponse {
    config: String,
}

/// Blocking HTTP client for the Teleport service.
pub struct HttpExchange {
    http: Client,
    base_url: String,
}

impl fmt::Debug for HttpExchange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpExchange")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl HttpExchange {
    pub fn new(config: &RemoteConfig) -> Result<Self> {
        if config.base_url.is_empty() {
            return Err(Error::Config("remote base_url is empty".into()));
        }

        // reqwest is built with rustls-no-provider; `Err` only means a
        // provider is already installed.
        let _ = rustls::crypto::ring::default_provider().install_default();

        let mut builder = Client::builder()
            .timeout(config.timeout())
            .user_agent(concat!("teleport/", env!("CARGO_PKG_VERSION")));
        if !config.use_system_proxy {
            builder = builder.no_proxy();
        }
        let http = builder
            .build()
            .map_err(|e| Error::Config(format!("failed to build HTTP client: {e}")))?;

        let base_url = config.base_url.trim_end_matches('/').to_string();
        Ok(Self { http, base_url })
    }

    pub(crate) fn endpoint(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }
}

impl RemoteExchange for HttpExchange {
    fn request_token(&self, identity: &DeviceIdentity, pin: &str) -> Result<DeviceToken> {
        let url = self.endpoint("/device-token");
        tracing::debug!("requesting device token: POST {url}");

        let resp = self
            .http
            .post(&url)
            .json(&TokenRequest {
                client_hint: identity.as_str(),
                pin,
            })
            .send()
            .map_err(|e| Error::RemoteUnavailable(e.to_string()))?;

        let status = resp.status();
        if matches!(
            status,
            StatusCode::BAD_REQUEST | StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN
        ) {
            return Err(Error::InvalidPin);
        }
        if !status.is_success() {
            return Err(Error::RemoteUnavailable(describe_failure(resp)));
        }

        let body: TokenResponse = resp
            .json()
            .map_err(|e| Error::RemoteUnavailable(format!("malformed token response: {e}")))?;
        let token = DeviceToken::new(body.device_token);
        if token.is_empty() {
            return Err(Error::RemoteUnavailable("empty device token".into()));
        }
        Ok(token)
    }

    fn request_config(&self, token: &DeviceToken) -> Result<String> {
        let url = self.endpoint("/connect");
        tracing::debug!("requesting tunnel config: POST {url}");

        let resp = self
            .http
            .post(&url)
            .json(&ConnectRequest {
                device_token: token.as_str(),
            })
            .send()
            .map_err(|e| Error::ConfigExchangeFailed(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(Error::ConfigExchangeFailed(describe_failure(resp)));
        }

        let body: ConnectResponse = resp
            .json()
            .map_err(|e| Error::ConfigExchangeFailed(format!("malformed config response: {e}")))?;
        Ok(body.config)
    }
}

/// `HTTP <code>: <body>` for a non-success response.
fn describe_failure(resp: Response) -> String {
    let status = resp.status();
    let body = resp.text().unwrap_or_default();
    let body = body.trim();
    if body.is_empty() {
        format!(
            "HTTP {}: {}",
            status.as_u16(),
            status.canonical_reason().unwrap_or("Unknown")
        )
    } else {
        format!("HTTP {}: {body}", status.as_u16())
    }
}
