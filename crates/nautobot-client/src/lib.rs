//! Nautobot REST API Client
//!
//! A Rust client library for the Nautobot REST API. Collections are reached
//! through app namespaces, list calls page through results (optionally with
//! several pages in flight), and responses come back as [`Record`]s that
//! fetch missing details on demand and save only the fields that changed.
//!
//! # Example
//!
//! ```no_run
//! use nautobot_client::{Filters, NautobotClient};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = NautobotClient::new("http://nautobot:8080", "your-api-token")?;
//! let devices = client.dcim().endpoint("devices");
//!
//! // Every leaf switch
//! let leaves = devices.filter(&Filters::new().add("role", "leaf")).await?;
//! println!("{} leaves", leaves.len());
//!
//! // Partial update of one device
//! if let Some(mut device) = devices.get_by(&Filters::new().add("name", "sw1")).await? {
//!     device.set("serial", "ABC123");
//!     device.save().await?;
//! }
//!
//! // Next free address of a prefix
//! if let Some(prefix) = client.ipam().endpoint("prefixes").get(42).await? {
//!     let ip = prefix.available_ips()?.create(&serde_json::json!({})).await?;
//!     println!("allocated {}", ip[0]);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Features
//!
//! - **Pagination**: follows `next` links, or fetches the remaining pages
//!   concurrently when threading is enabled
//! - **Lazy records**: nested references expand on first access to a missing field
//! - **Diff-based saves**: only changed fields are PATCHed
//! - **Bulk operations**: bulk create, update and delete on any endpoint
//! - **Testing**: `test-util` exposes an in-memory transport

pub mod app;
pub mod client;
pub mod config;
pub mod endpoint;
pub mod error;
pub mod models;
pub mod query;
pub mod response;
pub mod transport;
#[cfg(any(test, feature = "test-util"))]
pub mod mock;

pub use app::{App, PluginsApp};
pub use client::NautobotClient;
pub use config::ClientConfig;
pub use endpoint::{
    BulkItem, Choices, DetailEndpoint, Endpoint, Filters, JobRef, JobsEndpoint, ListOptions,
};
pub use error::{NautobotError, Result};
pub use models::DisplayRule;
pub use query::{PaginatedResponse, Request, calc_pages};
pub use response::{Expansion, Field, Record, TraceHop};
pub use transport::{HttpClient, HttpMethod, HttpRequest, HttpResponse, Transport};
#[cfg(any(test, feature = "test-util"))]
pub use mock::MockTransport;
