//! Replica endpoints

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum EndpointParseError {
    #[error("Missing port in endpoint: {0}")]
    MissingPort(String),

    #[error("Invalid port in endpoint: {0}")]
    InvalidPort(String),

    #[error("Empty host in endpoint: {0}")]
    EmptyHost(String),
}

/// A `(host, port)` pair identifying one replica process.
///
/// Ordering is by host, then port. Field order matters for the derived `Ord`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
}

impl Endpoint {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Sort and de-duplicate a discovered list into its canonical order
    pub fn canonical(mut endpoints: Vec<Endpoint>) -> Vec<Endpoint> {
        endpoints.sort();
        endpoints.dedup();
        endpoints
    }

    /// Whether `self` is the first endpoint of a canonical list
    pub fn is_first_of(&self, endpoints: &[Endpoint]) -> bool {
        endpoints.first() == Some(self)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

impl FromStr for Endpoint {
    type Err = EndpointParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (host, port) = s
            .rsplit_once(':')
            .ok_or_else(|| EndpointParseError::MissingPort(s.to_string()))?;
        if host.is_empty() {
            return Err(EndpointParseError::EmptyHost(s.to_string()));
        }
        let port = port
            .parse()
            .map_err(|_| EndpointParseError::InvalidPort(s.to_string()))?;
        Ok(Self::new(host, port))
    }
}
