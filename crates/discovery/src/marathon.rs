//! Endpoint discovery through the Marathon REST API
//!
//! `GET {base_url}/v2/apps/{app_id}` returns the app with its running tasks;
//! every `(host, port)` pair of every task is one candidate replica.

use crate::{DiscoveryError, Endpoint, EndpointDiscovery, ServiceAccount};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, error};

/// Configuration for Marathon discovery
#[derive(Debug, Clone)]
pub struct MarathonConfig {
    /// Scheduler base URL (e.g., "http://leader.mesos:8080")
    pub base_url: String,

    /// Marathon app id of this replica set
    pub app_id: String,

    /// Request timeout
    pub timeout: Duration,

    /// Optional service account used to obtain an auth token
    pub service_account: Option<ServiceAccount>,
}

impl Default for MarathonConfig {
    fn default() -> Self {
        Self {
            base_url: "http://leader.mesos:8080".to_string(),
            app_id: String::new(),
            timeout: Duration::from_secs(10),
            service_account: None,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct AppResponse {
    #[serde(default)]
    app: Option<App>,
}

#[derive(Debug, Default, Deserialize)]
struct App {
    #[serde(default)]
    tasks: Vec<Task>,
}

#[derive(Debug, Deserialize)]
struct Task {
    host: String,
    #[serde(default)]
    ports: Vec<u16>,
}

/// Decode an app response body into its canonical endpoint list
pub fn parse_app_endpoints(body: &str) -> Result<Vec<Endpoint>, serde_json::Error> {
    let resp: AppResponse = serde_json::from_str(body)?;
    let endpoints = resp
        .app
        .unwrap_or_default()
        .tasks
        .into_iter()
        .flat_map(|task| {
            let host = task.host;
            task.ports
                .into_iter()
                .map(move |port| Endpoint::new(host.clone(), port))
        })
        .collect();
    Ok(Endpoint::canonical(endpoints))
}

/// Marathon-backed endpoint discovery
pub struct MarathonDiscovery {
    client: Client,
    login_client: Client,
    config: MarathonConfig,
}

impl MarathonDiscovery {
    pub fn new(config: MarathonConfig) -> Result<Self, DiscoveryError> {
        let client = Client::builder().timeout(config.timeout).build()?;
        // The login endpoint is usually served with the cluster's own CA.
        let login_client = Client::builder()
            .timeout(config.timeout)
            .danger_accept_invalid_certs(true)
            .build()?;

        Ok(Self {
            client,
            login_client,
            config,
        })
    }

    /// URL of the app resource
    pub fn app_url(&self) -> String {
        format!(
            "{}/v2/apps/{}",
            self.config.base_url.trim_end_matches('/'),
            self.config.app_id.trim_matches('/')
        )
    }

    async fn auth_token(&self) -> Option<String> {
        let account = self.config.service_account.as_ref()?;
        match account.login(&self.login_client).await {
            Ok(token) => Some(token),
            Err(e) => {
                error!("Failed to generate auth token: {}", e);
                None
            }
        }
    }
}

#[async_trait]
impl EndpointDiscovery for MarathonDiscovery {
    async fn list_replica_endpoints(&self) -> Result<Vec<Endpoint>, DiscoveryError> {
        let url = self.app_url();
        let mut request = self.client.get(&url);
        if let Some(token) = self.auth_token().await {
            request = request.header("Authorization", format!("token={}", token));
        }

        let resp = request.send().await?;
        let status = resp.status();
        let body = resp.text().await?;
        if status != reqwest::StatusCode::OK {
            return Err(DiscoveryError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let endpoints = parse_app_endpoints(&body)?;
        debug!("Discovered {} replica endpoints from {}", endpoints.len(), url);
        Ok(endpoints)
    }
}
