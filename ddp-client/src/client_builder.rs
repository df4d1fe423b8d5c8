//! Client builder and server addressing
//!
//! `ClientBuilder` collects everything needed before a [`DdpClient`] exists:
//! where the server lives, whether to answer pings, observability, and an
//! optional reconnection policy. Nothing touches the network until
//! `connect()` is called on the built client.
//!
//! # Examples
//!
//! ```rust,no_run
//! use ddp_client::{ClientBuilder, ExponentialBackoff};
//!
//! # async fn example() -> ddp_core::Result<()> {
//! // Plain client on a non-default port
//! let client = ClientBuilder::new("localhost").port(4000).build()?;
//! client.connect().await?;
//!
//! // Reconnecting client over TLS
//! let client = ClientBuilder::new("app.example.com")
//!     .secure(true)
//!     .port(443)
//!     .with_reconnect(Box::new(ExponentialBackoff::default()))
//!     .build_reconnecting()?;
//! client.connect().await?;
//! # Ok(())
//! # }
//! ```

use crate::connection::ConnectionOptions;
use crate::reconnect::{ExponentialBackoff, ReconnectionStrategy};
use crate::supervisor::ReconnectingClient;
use crate::{ClientMetrics, DdpClient};
use ddp_core::{Error, ObservabilityConfig, Result};
use std::fmt;
use std::sync::Arc;
use tokio_tungstenite::tungstenite::http::Uri;

/// Port Meteor servers listen on by default
pub const DEFAULT_PORT: u16 = 3000;

/// Endpoint path of the DDP WebSocket
pub const DEFAULT_PATH: &str = "/websocket";

/// A validated server location
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerAddress {
    host: String,
    port: u16,
    secure: bool,
    path: String,
}

impl ServerAddress {
    /// `ws://host:port/websocket`, falling back to port 3000
    pub fn new(host: impl Into<String>, port: Option<u16>) -> Result<Self> {
        Self::parse(host.into(), port.unwrap_or(DEFAULT_PORT), false, DEFAULT_PATH)
    }

    fn parse(host: String, port: u16, secure: bool, path: &str) -> Result<Self> {
        let host = host.trim().to_string();
        if host.is_empty() {
            return Err(Error::InvalidAddress("host is empty".to_string()));
        }
        if host.contains(char::is_whitespace) || host.contains('/') {
            return Err(Error::InvalidAddress(format!("invalid host '{}'", host)));
        }

        let path = if path.starts_with('/') {
            path.to_string()
        } else {
            format!("/{}", path)
        };

        let address = Self {
            host,
            port,
            secure,
            path,
        };
        address
            .url()
            .parse::<Uri>()
            .map_err(|e| Error::InvalidAddress(format!("{}: {}", address.url(), e)))?;
        Ok(address)
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn is_secure(&self) -> bool {
        self.secure
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Transport URL, `scheme://host:port/path`
    pub fn url(&self) -> String {
        let scheme = if self.secure { "wss" } else { "ws" };
        // Bare IPv6 literals need brackets in a URL authority
        if self.host.contains(':') && !self.host.starts_with('[') {
            format!("{}://[{}]:{}{}", scheme, self.host, self.port, self.path)
        } else {
            format!("{}://{}:{}{}", scheme, self.host, self.port, self.path)
        }
    }
}

impl fmt::Display for ServerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.url())
    }
}

/// Builder for configuring and creating a DDP client
pub struct ClientBuilder {
    host: String,
    port: u16,
    secure: bool,
    path: String,
    auto_pong: bool,
    reconnect_strategy: Option<Box<dyn ReconnectionStrategy>>,
    observability_config: Option<ObservabilityConfig>,
    service_name: Option<String>,
}

impl ClientBuilder {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: DEFAULT_PORT,
            secure: false,
            path: DEFAULT_PATH.to_string(),
            auto_pong: false,
            reconnect_strategy: None,
            observability_config: None,
            service_name: None,
        }
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Use `wss` instead of `ws`
    pub fn secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    /// Answer server `ping` frames with `pong` automatically
    pub fn auto_pong(mut self, enabled: bool) -> Self {
        self.auto_pong = enabled;
        self
    }

    /// Strategy used by [`ClientBuilder::build_reconnecting`]
    pub fn with_reconnect(mut self, strategy: Box<dyn ReconnectionStrategy>) -> Self {
        self.reconnect_strategy = Some(strategy);
        self
    }

    pub fn with_default_reconnect(mut self) -> Self {
        self.reconnect_strategy = Some(Box::new(ExponentialBackoff::default()));
        self
    }

    /// Enable OpenTelemetry observability with custom configuration
    pub fn with_observability(mut self, config: ObservabilityConfig) -> Self {
        self.observability_config = Some(config);
        self
    }

    pub fn with_default_observability(mut self) -> Self {
        self.observability_config = Some(ObservabilityConfig::default());
        self
    }

    /// Set service name for observability (used if observability is enabled)
    pub fn service_name(mut self, name: impl Into<String>) -> Self {
        self.service_name = Some(name.into());
        self
    }

    /// The address this builder would connect to
    pub fn address(&self) -> Result<ServerAddress> {
        ServerAddress::parse(self.host.clone(), self.port, self.secure, &self.path)
    }

    /// Build a single-connection client
    pub fn build(self) -> Result<DdpClient> {
        let address = self.address()?;
        let metrics = self.init_metrics()?;
        let options = ConnectionOptions {
            auto_pong: self.auto_pong,
        };
        Ok(DdpClient::from_parts(address, options, metrics))
    }

    /// Build a client that reopens the connection after it drops
    ///
    /// Uses exponential backoff unless a strategy was given.
    pub fn build_reconnecting(mut self) -> Result<ReconnectingClient> {
        let strategy = self
            .reconnect_strategy
            .take()
            .unwrap_or_else(|| Box::new(ExponentialBackoff::default()));
        let client = self.build()?;
        Ok(ReconnectingClient::new(client, strategy))
    }

    fn init_metrics(&self) -> Result<Option<Arc<ClientMetrics>>> {
        let Some(mut config) = self.observability_config.clone() else {
            return Ok(None);
        };
        if let Some(ref name) = self.service_name {
            config.service_name = name.clone();
        }

        ddp_core::init_observability(config.clone())
            .map_err(|e| Error::Internal(format!("Failed to initialize observability: {}", e)))?;

        Ok(Some(Arc::new(ClientMetrics::new(config.service_name))))
    }
}
