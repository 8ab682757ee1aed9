//! Replboot CLI
//!
//! Bootstrap steps for a replica set whose members are scheduled by
//! Marathon. Every subcommand is idempotent and exits non-zero if its
//! operation does not converge within its retry budget.

mod config;

use anyhow::{Result, bail};
use clap::{Parser, Subcommand};
use replboot_coordinator::{Coordinator, MongoCommandClient, Outcome, RetryPolicy};
use replboot_discovery::MarathonDiscovery;
use std::path::PathBuf;
use tracing::{Level, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use config::BootstrapConfig;

/// Replboot - replica-set bootstrap for Marathon
#[derive(Parser, Debug)]
#[command(name = "replboot")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, env = "REPLBOOT_CONFIG")]
    config: Option<PathBuf>,

    /// Run in verbose mode
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
enum Commands {
    /// Initiate the replica set from the first replica
    InitiateReplicaSet,
    /// Create the user administrator
    CreateUserAdministrator,
    /// Create the cluster administrator
    CreateClusterAdministrator,
    /// Create the backup user
    CreateBackupUser,
    /// Create the cluster monitor user
    CreateClusterMonitorUser,
    /// Add this replica to the replica set
    AddReplicaToReplicaSet,
}

impl Commands {
    fn failure(self) -> &'static str {
        match self {
            Commands::InitiateReplicaSet => "Failed to init replica set.",
            Commands::CreateUserAdministrator => "Failed to create user administrator.",
            Commands::CreateClusterAdministrator => "Failed to create cluster administrator.",
            Commands::CreateBackupUser => "Failed to create backup user.",
            Commands::CreateClusterMonitorUser => "Failed to create cluster monitor user.",
            Commands::AddReplicaToReplicaSet => "Failed to add replica to replica set.",
        }
    }

    fn policy(self, config: &BootstrapConfig) -> RetryPolicy {
        match self {
            Commands::InitiateReplicaSet => config.initiate_policy(),
            _ => config.steady_policy(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let level = if args.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::from_default_env().add_directive(level.into()))
        .with_target(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    info!("Replboot v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let mut config = match &args.config {
        Some(path) => {
            let config = BootstrapConfig::load(path).await?;
            info!("Loaded configuration from {}", path.display());
            config
        }
        None => BootstrapConfig::default(),
    };
    config.apply_env(|var| std::env::var(var).ok())?;
    config.validate()?;

    let discovery = MarathonDiscovery::new(config.marathon())?;
    let client = MongoCommandClient::new(
        config.local_address()?,
        config.replica.replica_set.clone(),
        config.command_timeout(),
    );
    let coordinator = Coordinator::new(
        discovery,
        client,
        config.local_endpoint(),
        config.replica.replica_set.clone(),
        config.admin_accounts(),
    )
    .with_codes(config.idempotent_codes());

    info!(
        "Replica {} of {}: {:?}",
        coordinator.local_endpoint(),
        config.scheduler.app_id,
        args.command
    );

    let command = args.command;
    let policy = command.policy(&config);
    let outcome = match command {
        Commands::InitiateReplicaSet => {
            policy
                .run("initiate-replica-set", || coordinator.initiate_replica_set())
                .await
        }
        Commands::CreateUserAdministrator => {
            policy
                .run("create-user-administrator", || {
                    coordinator.create_user_administrator()
                })
                .await
        }
        Commands::CreateClusterAdministrator => {
            policy
                .run("create-cluster-administrator", || {
                    coordinator.create_cluster_administrator()
                })
                .await
        }
        Commands::CreateBackupUser => {
            policy
                .run("create-backup-user", || coordinator.create_backup_user())
                .await
        }
        Commands::CreateClusterMonitorUser => {
            policy
                .run("create-cluster-monitor-user", || {
                    coordinator.create_cluster_monitor_user()
                })
                .await
        }
        Commands::AddReplicaToReplicaSet => {
            info!("Updating replica set config...");
            policy
                .run("add-replica-to-replica-set", || {
                    coordinator.add_replica_to_replica_set()
                })
                .await
        }
    };

    match outcome {
        Outcome::Converged => Ok(()),
        Outcome::Pending(reason) => bail!("{} Last attempt: {}", command.failure(), reason),
        Outcome::Fatal(e) => bail!("{} {}", command.failure(), e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subcommand_names() {
        let args = Args::parse_from(["replboot", "initiate-replica-set"]);
        assert_eq!(args.command, Commands::InitiateReplicaSet);

        let args = Args::parse_from(["replboot", "-v", "add-replica-to-replica-set"]);
        assert!(args.verbose);
        assert_eq!(args.command, Commands::AddReplicaToReplicaSet);

        let args = Args::parse_from(["replboot", "create-cluster-monitor-user"]);
        assert_eq!(args.command, Commands::CreateClusterMonitorUser);
    }

    #[test]
    fn test_initiate_uses_cold_start_budget() {
        let config = BootstrapConfig::default();
        assert_eq!(
            Commands::InitiateReplicaSet.policy(&config),
            RetryPolicy::cold_start()
        );
        assert_eq!(
            Commands::CreateUserAdministrator.policy(&config),
            RetryPolicy::steady()
        );
    }

    #[test]
    fn test_clap_definition() {
        use clap::CommandFactory;
        Args::command().debug_assert();
    }
}
