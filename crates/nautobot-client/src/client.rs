//! Nautobot API client
//!
//! The root connection object. It owns the transport and connection
//! settings and hands out [`App`] namespaces, which hand out endpoints.
//! Cloning is cheap and clones share the same transport.

use crate::app::{App, PluginsApp};
use crate::config::ClientConfig;
use crate::error::{NautobotError, Result};
use crate::query::Request;
use crate::transport::{HttpClient, Transport};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

struct ClientInner {
    transport: Arc<dyn Transport>,
    base_url: String,
    token: Option<String>,
    threading: bool,
    max_workers: usize,
    api_version: Option<String>,
    default_filters: Vec<(String, String)>,
}

/// Nautobot API client
#[derive(Clone)]
pub struct NautobotClient {
    inner: Arc<ClientInner>,
}

impl NautobotClient {
    /// Create a new Nautobot client
    ///
    /// # Arguments
    /// * `url` - Nautobot base URL without `/api` (e.g., "http://nautobot:8080")
    /// * `token` - API token for authentication
    pub fn new(url: impl Into<String>, token: impl Into<String>) -> Result<Self> {
        Self::from_config(ClientConfig::new(url, Some(token.into())))
    }

    /// Create a client backed by reqwest from a full configuration
    pub fn from_config(config: ClientConfig) -> Result<Self> {
        let transport = HttpClient::from_config(&config)?;
        Ok(Self::with_transport(config, Arc::new(transport)))
    }

    /// Create a client sending requests through a custom transport
    pub fn with_transport(config: ClientConfig, transport: Arc<dyn Transport>) -> Self {
        let base_url = config.api_url();
        info!(
            "Nautobot client for {} (threading: {}, api version: {})",
            base_url,
            config.threading,
            config.api_version.as_deref().unwrap_or("server default")
        );

        Self {
            inner: Arc::new(ClientInner {
                transport,
                base_url,
                token: config.token,
                threading: config.threading,
                max_workers: config.max_workers.max(1),
                api_version: config.api_version,
                default_filters: config.default_filters,
            }),
        }
    }

    /// Get the base URL of the REST API (ends in `/api`)
    pub fn base_url(&self) -> &str {
        &self.inner.base_url
    }

    /// API token, if any
    pub fn token(&self) -> Option<&str> {
        self.inner.token.as_deref()
    }

    /// Whether list calls fetch pages concurrently
    pub fn threading(&self) -> bool {
        self.inner.threading
    }

    /// Pages in flight at once when threading
    pub fn max_workers(&self) -> usize {
        self.inner.max_workers
    }

    /// Pinned API version sent in `Accept`
    pub fn api_version(&self) -> Option<&str> {
        self.inner.api_version.as_deref()
    }

    /// Filters added to every list, get and count call
    pub fn default_filters(&self) -> &[(String, String)] {
        &self.inner.default_filters
    }

    /// Shared handle to the transport
    pub fn transport(&self) -> Arc<dyn Transport> {
        Arc::clone(&self.inner.transport)
    }

    /// Start a request against an absolute URL with this client's settings
    pub fn request(&self, url: &str) -> Request {
        Request::new(url, self)
    }

    /// Namespace for an arbitrary app (e.g. `"dcim"`)
    pub fn app(&self, name: &str) -> App {
        App::new(self.clone(), name)
    }

    /// Devices, racks, cables and interfaces
    pub fn dcim(&self) -> App {
        self.app("dcim")
    }

    /// Prefixes, addresses and VLANs
    pub fn ipam(&self) -> App {
        self.app("ipam")
    }

    /// Circuits, providers and terminations
    pub fn circuits(&self) -> App {
        self.app("circuits")
    }

    /// Tenants and tenant groups
    pub fn tenancy(&self) -> App {
        self.app("tenancy")
    }

    /// Jobs, custom fields, tags and the change log
    pub fn extras(&self) -> App {
        self.app("extras")
    }

    /// Clusters and virtual machines
    pub fn virtualization(&self) -> App {
        self.app("virtualization")
    }

    /// Users, groups and tokens
    pub fn users(&self) -> App {
        self.app("users")
    }

    /// Cloud accounts, networks and services
    pub fn cloud(&self) -> App {
        self.app("cloud")
    }

    /// Wireless networks and radio profiles
    pub fn wireless(&self) -> App {
        self.app("wireless")
    }

    /// VPN tunnels and profiles
    pub fn vpn(&self) -> App {
        self.app("vpn")
    }

    /// The `load-balancers` app
    pub fn load_balancers(&self) -> App {
        self.app("load-balancers")
    }

    /// Namespace for installed Nautobot apps under `/api/plugins/`
    pub fn plugins(&self) -> PluginsApp {
        PluginsApp::new(self.clone())
    }

    /// Gets the API version of Nautobot from the `API-Version` header
    ///
    /// Returns an empty string when the server does not send the header.
    pub async fn version(&self) -> Result<String> {
        self.request(self.base_url()).get_version().await
    }

    /// Gets the status information from `/api/status/`
    pub async fn status(&self) -> Result<Value> {
        self.request(self.base_url()).get_status().await
    }

    /// Returns the OpenAPI document
    pub async fn openapi(&self) -> Result<Value> {
        self.request(self.base_url()).get_openapi().await
    }

    /// Validate the API token by making a simple authenticated request.
    ///
    /// # Returns
    /// * `Ok(())` - Token is valid and Nautobot is reachable
    /// * `Err(NautobotError)` - Token is invalid or Nautobot is unreachable
    pub async fn validate_token(&self) -> Result<()> {
        debug!("Validating Nautobot token and connectivity");
        match self.status().await {
            Ok(_) => {
                debug!("Token validated successfully");
                Ok(())
            }
            Err(NautobotError::Request { status: 401 | 403, .. }) => Err(NautobotError::Config(
                "Invalid token: the server rejected the credentials".to_string(),
            )),
            Err(err) => Err(err),
        }
    }
}

impl fmt::Debug for NautobotClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NautobotClient")
            .field("base_url", &self.inner.base_url)
            .field("token", &self.inner.token.as_ref().map(|_| "<redacted>"))
            .field("threading", &self.inner.threading)
            .field("max_workers", &self.inner.max_workers)
            .field("api_version", &self.inner.api_version)
            .finish_non_exhaustive()
    }
}
