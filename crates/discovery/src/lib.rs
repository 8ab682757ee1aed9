//! Replboot Discovery - where the replicas live
//!
//! This crate provides:
//! - `Endpoint`: one replica process (`host:port`)
//! - `EndpointDiscovery`: the query every bootstrap step starts with
//! - `MarathonDiscovery`: discovery through the Marathon `/v2/apps` API
//! - `ServiceAccount`: optional DC/OS service-account login
//!
//! Discovered lists are always sorted by `(host, port)` so that every
//! replica looking at the same scheduler state agrees on which one is first.

mod endpoint;
mod marathon;
mod service_account;

pub use endpoint::*;
pub use marathon::*;
pub use service_account::*;

use async_trait::async_trait;
use thiserror::Error;

/// Discovery errors
#[derive(Error, Debug)]
pub enum DiscoveryError {
    #[error("Scheduler request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Scheduler returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Invalid scheduler response: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Source of the live replica endpoints for this service
#[async_trait]
pub trait EndpointDiscovery: Send + Sync {
    /// Current live endpoints, sorted by `(host, port)` and de-duplicated
    async fn list_replica_endpoints(&self) -> Result<Vec<Endpoint>, DiscoveryError>;
}
