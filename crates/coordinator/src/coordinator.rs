//! Bootstrap coordinator
//!
//! Every operation is idempotent and safe to run from every replica at once.
//! Safety comes from two things only: all replicas agree on who is first
//! (canonically sorted discovery), and "already done" replies count as
//! success. There is no state between invocations.

use crate::{
    AdminAccounts, AdminCommand, CommandClient, CommandReply, ConfigError, Credentials,
    IdempotentCodes, ReplicaSetConfig, Role, Target,
};
use replboot_discovery::{DiscoveryError, Endpoint, EndpointDiscovery};
use thiserror::Error;
use tracing::info;

/// Why an attempt did not converge
#[derive(Error, Debug)]
pub enum Pending {
    #[error("discovery failed: {0}")]
    Discovery(#[from] DiscoveryError),

    #[error("target unreachable")]
    Unreachable,

    #[error("command rejected (code {code:?}): {message}")]
    Rejected { code: Option<i32>, message: String },

    #[error("{0}")]
    Waiting(&'static str),
}

/// Errors that no amount of retrying will fix
#[derive(Error, Debug)]
pub enum CoordinatorError {
    #[error("replSetGetConfig reply has no config document")]
    MissingConfig,

    #[error("Invalid replica set config: {0}")]
    InvalidConfig(#[from] ConfigError),
}

/// Result of one attempt
#[derive(Debug)]
pub enum Outcome {
    Converged,
    Pending(Pending),
    Fatal(CoordinatorError),
}

impl Outcome {
    pub fn is_converged(&self) -> bool {
        matches!(self, Outcome::Converged)
    }
}

/// Bootstrap state machine for one replica
pub struct Coordinator<D, C> {
    discovery: D,
    client: C,
    local: Endpoint,
    replica_set: String,
    accounts: AdminAccounts,
    codes: IdempotentCodes,
}

impl<D, C> Coordinator<D, C>
where
    D: EndpointDiscovery,
    C: CommandClient,
{
    /// `local` is the endpoint this replica advertises to its peers
    pub fn new(
        discovery: D,
        client: C,
        local: Endpoint,
        replica_set: impl Into<String>,
        accounts: AdminAccounts,
    ) -> Self {
        Self {
            discovery,
            client,
            local,
            replica_set: replica_set.into(),
            accounts,
            codes: IdempotentCodes::default(),
        }
    }

    pub fn with_codes(mut self, codes: IdempotentCodes) -> Self {
        self.codes = codes;
        self
    }

    pub fn local_endpoint(&self) -> &Endpoint {
        &self.local
    }

    /// Whether this replica heads the canonical endpoint list
    pub async fn is_first_replica(&self) -> Result<bool, DiscoveryError> {
        let endpoints = self.discovery.list_replica_endpoints().await?;
        Ok(self.local.is_first_of(&endpoints))
    }

    pub async fn initiate_replica_set(&self) -> Outcome {
        self.initiate().await.unwrap_or_else(Outcome::Pending)
    }

    pub async fn create_user_administrator(&self) -> Outcome {
        self.create_account(Role::UserAdmin).await
    }

    pub async fn create_cluster_administrator(&self) -> Outcome {
        self.create_account(Role::ClusterAdmin).await
    }

    pub async fn create_backup_user(&self) -> Outcome {
        self.create_account(Role::Backup).await
    }

    pub async fn create_cluster_monitor_user(&self) -> Outcome {
        self.create_account(Role::ClusterMonitor).await
    }

    /// Create the account for `role`, once, from the first replica
    pub async fn create_account(&self, role: Role) -> Outcome {
        self.try_create_account(role)
            .await
            .unwrap_or_else(Outcome::Pending)
    }

    pub async fn add_replica_to_replica_set(&self) -> Outcome {
        self.add_replica().await.unwrap_or_else(Outcome::Pending)
    }

    async fn discover(&self) -> Result<Vec<Endpoint>, Pending> {
        Ok(self.discovery.list_replica_endpoints().await?)
    }

    /// Run one command; a reply counts if `ok: 1` or its code is in `accepted`
    async fn run(
        &self,
        command: AdminCommand,
        target: Target<'_>,
        credentials: Option<&Credentials>,
        accepted: &[i32],
    ) -> Result<CommandReply, Pending> {
        let reply = self
            .client
            .execute(&command, target, credentials)
            .await
            .ok_or(Pending::Unreachable)?;

        if reply.is_ok_or_code(accepted) {
            Ok(reply)
        } else {
            Err(Pending::Rejected {
                code: reply.code(),
                message: reply.message().to_string(),
            })
        }
    }

    async fn initiate(&self) -> Result<Outcome, Pending> {
        let endpoints = self.discover().await?;

        // A running set wins over any election: a restarted replica with
        // empty data may sort first and must not start a second set.
        let status = self
            .run(
                AdminCommand::replset_get_status(),
                Target::ReplicaSet(&endpoints),
                Some(&self.accounts.cluster_admin),
                &[],
            )
            .await;
        match status {
            Ok(_) => {
                info!("Replica set initiated.");
                return Ok(Outcome::Converged);
            }
            Err(reason) if !self.local.is_first_of(&endpoints) => {
                info!("Waiting for replica set to be initiated...");
                return Err(reason);
            }
            Err(_) => {}
        }

        info!("Initiating replica set {} from {}...", self.replica_set, self.local);
        let config = ReplicaSetConfig::initial(&self.replica_set, &self.local);
        self.run(
            AdminCommand::replset_initiate(&config),
            Target::Local,
            None,
            &self.codes.already_initialized,
        )
        .await?;
        info!("Replica set initiated.");
        Ok(Outcome::Converged)
    }

    async fn try_create_account(&self, role: Role) -> Result<Outcome, Pending> {
        let endpoints = self.discover().await?;
        if !self.local.is_first_of(&endpoints) {
            info!("The first replica creates the {}.", role.describe());
            return Ok(Outcome::Converged);
        }

        let user_admin = &self.accounts.user_admin;
        let account = self.accounts.get(role);
        let existing = self
            .client
            .execute(
                &AdminCommand::users_info(&account.username),
                Target::Local,
                Some(user_admin),
            )
            .await;
        if existing.is_some_and(|reply| has_users(&reply)) {
            info!("The {} already exists.", role.describe());
            return Ok(Outcome::Converged);
        }

        if role != Role::UserAdmin {
            let reply = self
                .run(AdminCommand::is_master(), Target::Local, Some(user_admin), &[])
                .await?;
            if !reply.document().get_bool("ismaster").unwrap_or(false) {
                return Err(Pending::Waiting("local replica is not primary yet"));
            }
        }

        info!("Creating {} {}...", role.describe(), account.username);
        // The user administrator is created under the localhost exception,
        // everything after it under the user administrator.
        let acting = (role != Role::UserAdmin).then_some(user_admin);
        self.run(
            AdminCommand::create_user(account),
            Target::Local,
            acting,
            &self.codes.user_exists,
        )
        .await?;
        info!("The {} was created.", role.describe());
        Ok(Outcome::Converged)
    }

    async fn add_replica(&self) -> Result<Outcome, Pending> {
        let endpoints = self.discover().await?;
        let cluster_admin = Some(&self.accounts.cluster_admin);

        let reply = self
            .run(
                AdminCommand::replset_get_config(),
                Target::ReplicaSet(&endpoints),
                cluster_admin,
                &[],
            )
            .await?;
        let Ok(raw) = reply.document().get_document("config") else {
            return Ok(Outcome::Fatal(CoordinatorError::MissingConfig));
        };
        let current = match ReplicaSetConfig::from_document(raw) {
            Ok(config) => config,
            Err(e) => return Ok(Outcome::Fatal(e.into())),
        };

        if current.contains(&self.local) {
            info!("Replica {} is already a member of the replica set.", self.local);
            return Ok(Outcome::Converged);
        }

        let proposal = current.successor(&endpoints, &self.local);
        info!(
            "Proposing replica set config version {} with {} member(s)...",
            proposal.version,
            proposal.members.len()
        );
        // Never forced: a forced reconfig can break the engine's quorum rules.
        self.run(
            AdminCommand::replset_reconfig(&proposal, false),
            Target::ReplicaSet(&endpoints),
            cluster_admin,
            &[],
        )
        .await?;
        info!("Replica {} added to the replica set.", self.local);
        Ok(Outcome::Converged)
    }
}

fn has_users(reply: &CommandReply) -> bool {
    reply.is_ok()
        && reply
            .document()
            .get_array("users")
            .is_ok_and(|users| !users.is_empty())
}
