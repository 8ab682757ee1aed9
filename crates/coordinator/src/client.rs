//! Cluster command client
//!
//! Every call opens its own driver client, runs one command against `admin`
//! and shuts the client down again. Nothing is pooled across attempts.

use crate::{AdminCommand, CommandReply, Credentials};
use async_trait::async_trait;
use mongodb::Client;
use mongodb::error::ErrorKind;
use mongodb::options::{ClientOptions, Credential, ServerAddress};
use replboot_discovery::Endpoint;
use std::time::Duration;
use tracing::{debug, error, warn};

/// Where a command is sent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target<'a> {
    /// This process's own instance, directly, before any set exists
    Local,
    /// The replica set reachable through the discovered endpoints
    ReplicaSet(&'a [Endpoint]),
}

/// Executes one administrative command.
///
/// `None` means the target could not be reached (timeout, refusal, failed
/// authentication). Callers treat it as "not ready yet".
#[async_trait]
pub trait CommandClient: Send + Sync {
    async fn execute(
        &self,
        command: &AdminCommand,
        target: Target<'_>,
        credentials: Option<&Credentials>,
    ) -> Option<CommandReply>;
}

fn server_address(endpoint: &Endpoint) -> ServerAddress {
    ServerAddress::Tcp {
        host: endpoint.host.clone(),
        port: Some(endpoint.port),
    }
}

/// Command client speaking the MongoDB wire protocol
pub struct MongoCommandClient {
    local: Endpoint,
    replica_set: String,
    timeout: Duration,
}

impl MongoCommandClient {
    pub fn new(local: Endpoint, replica_set: impl Into<String>, timeout: Duration) -> Self {
        Self {
            local,
            replica_set: replica_set.into(),
            timeout,
        }
    }

    /// Driver options for one call, `None` if there is nothing to connect to
    pub fn options(
        &self,
        target: Target<'_>,
        credentials: Option<&Credentials>,
    ) -> Option<ClientOptions> {
        let mut options = ClientOptions::default();
        match target {
            Target::Local => {
                options.hosts = vec![server_address(&self.local)];
                options.direct_connection = Some(true);
            }
            Target::ReplicaSet([]) => return None,
            Target::ReplicaSet(endpoints) => {
                options.hosts = endpoints.iter().map(server_address).collect();
                options.repl_set_name = Some(self.replica_set.clone());
            }
        }

        options.credential = credentials.map(|creds| {
            let mut credential = Credential::default();
            credential.username = Some(creds.username.clone());
            credential.password = Some(creds.password.clone());
            credential.source = Some("admin".to_string());
            credential
        });
        options.server_selection_timeout = Some(self.timeout);
        options.connect_timeout = Some(self.timeout);
        options.app_name = Some("replboot".to_string());
        Some(options)
    }
}

#[async_trait]
impl CommandClient for MongoCommandClient {
    async fn execute(
        &self,
        command: &AdminCommand,
        target: Target<'_>,
        credentials: Option<&Credentials>,
    ) -> Option<CommandReply> {
        let Some(options) = self.options(target, credentials) else {
            warn!("No endpoints to send {} to", command.name());
            return None;
        };

        let client = match Client::with_options(options) {
            Ok(client) => client,
            Err(e) => {
                warn!("Failed to create client for {}: {}", command.name(), e);
                return None;
            }
        };

        let result = client
            .database("admin")
            .run_command(command.document().clone(), None)
            .await;
        client.shutdown().await;

        match result {
            Ok(doc) => {
                debug!("{} replied: {}", command.name(), doc);
                Some(CommandReply::new(doc))
            }
            Err(e) => match &*e.kind {
                ErrorKind::Command(failure) => {
                    error!("{} failed: {}: {}", command.name(), failure.code, failure.message);
                    Some(CommandReply::rejected(
                        failure.code,
                        &failure.code_name,
                        &failure.message,
                    ))
                }
                _ => {
                    warn!("{} could not be delivered: {}", command.name(), e);
                    None
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Role;

    fn client() -> MongoCommandClient {
        MongoCommandClient::new(Endpoint::new("10.0.0.1", 27017), "rs", Duration::from_secs(2))
    }

    #[test]
    fn test_local_options() {
        let options = client().options(Target::Local, None).unwrap();
        assert_eq!(
            options.hosts,
            vec![ServerAddress::Tcp {
                host: "10.0.0.1".to_string(),
                port: Some(27017),
            }]
        );
        assert_eq!(options.direct_connection, Some(true));
        assert!(options.repl_set_name.is_none());
        assert!(options.credential.is_none());
        assert_eq!(options.server_selection_timeout, Some(Duration::from_secs(2)));
    }

    #[test]
    fn test_replica_set_options() {
        let endpoints = vec![Endpoint::new("h1", 100), Endpoint::new("h2", 100)];
        let creds = Credentials::new("cluster_admin", "pw", Role::ClusterAdmin);

        let options = client()
            .options(Target::ReplicaSet(&endpoints), Some(&creds))
            .unwrap();

        assert_eq!(options.hosts.len(), 2);
        assert_eq!(options.repl_set_name.as_deref(), Some("rs"));
        assert_ne!(options.direct_connection, Some(true));
        let credential = options.credential.unwrap();
        assert_eq!(credential.username.as_deref(), Some("cluster_admin"));
        assert_eq!(credential.source.as_deref(), Some("admin"));
    }

    #[test]
    fn test_empty_replica_set_has_no_options() {
        assert!(client().options(Target::ReplicaSet(&[]), None).is_none());
    }

    #[tokio::test]
    async fn test_unreachable_target_is_absent() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let client = MongoCommandClient::new(
            Endpoint::new("127.0.0.1", port),
            "rs",
            Duration::from_millis(200),
        );
        let reply = client
            .execute(&AdminCommand::is_master(), Target::Local, None)
            .await;
        assert!(reply.is_none());
    }
}
