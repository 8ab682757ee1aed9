//! Bootstrap configuration
//!
//! Loaded from an optional TOML file, then overlaid with the environment
//! Marathon and the app definition provide.

use anyhow::{Context, Result, bail};
use replboot_coordinator::{AdminAccounts, Credentials, IdempotentCodes, RetryPolicy, Role};
use replboot_discovery::{Endpoint, MarathonConfig, ServiceAccount};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use tracing::error;

/// Bootstrap configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BootstrapConfig {
    /// Scheduler (Marathon) configuration
    #[serde(default)]
    pub scheduler: SchedulerConfig,

    /// This replica
    #[serde(default)]
    pub replica: ReplicaConfig,

    /// Administrative accounts
    #[serde(default)]
    pub accounts: AccountsConfig,

    /// Polling budgets
    #[serde(default)]
    pub retry: RetryConfig,

    /// Driver settings
    #[serde(default)]
    pub mongo: MongoConfig,
}

impl BootstrapConfig {
    /// Load configuration from file
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("reading {}", path.display()))?;
        let config: BootstrapConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// Overlay values from the environment (`lookup` is `std::env::var` in production)
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        let strings: [(&str, &mut String); 12] = [
            ("MARATHON_APP_ID", &mut self.scheduler.app_id),
            ("MARATHON_API_URL", &mut self.scheduler.base_url),
            ("HOST", &mut self.replica.host),
            ("MONGO_REPLICA_SET", &mut self.replica.replica_set),
            ("MONGO_USER_ADMIN_USERNAME", &mut self.accounts.user_admin.username),
            ("MONGO_USER_ADMIN_PASSWORD", &mut self.accounts.user_admin.password),
            ("MONGO_CLUSTER_ADMIN_USERNAME", &mut self.accounts.cluster_admin.username),
            ("MONGO_CLUSTER_ADMIN_PASSWORD", &mut self.accounts.cluster_admin.password),
            ("MONGO_BACKUP_USERNAME", &mut self.accounts.backup.username),
            ("MONGO_BACKUP_PASSWORD", &mut self.accounts.backup.password),
            ("MONGO_CLUSTER_MONITOR_USERNAME", &mut self.accounts.cluster_monitor.username),
            ("MONGO_CLUSTER_MONITOR_PASSWORD", &mut self.accounts.cluster_monitor.password),
        ];
        for (var, field) in strings {
            if let Some(value) = lookup(var) {
                *field = value;
            }
        }

        if let Some(value) = lookup("DCOS_SERVICE_ACCOUNT_CREDENTIAL") {
            self.scheduler.service_account_credential = Some(value);
        }
        if let Some(value) = lookup("PORT0") {
            self.replica.port = value
                .trim()
                .parse()
                .with_context(|| format!("PORT0 is not a port: {}", value))?;
        }
        Ok(())
    }

    /// Reject configurations no operation can run with
    pub fn validate(&self) -> Result<()> {
        if self.scheduler.app_id.trim_matches('/').is_empty() {
            bail!("Marathon app id is not set (MARATHON_APP_ID)");
        }
        if self.replica.replica_set.is_empty() {
            bail!("Replica set name is empty");
        }
        if self.retry.max_attempts == 0 || self.retry.initiate_max_attempts == 0 {
            bail!("Retry budgets must allow at least one attempt");
        }
        self.local_address()?;
        Ok(())
    }

    /// Endpoint this replica advertises to its peers
    pub fn local_endpoint(&self) -> Endpoint {
        Endpoint::new(self.replica.host.clone(), self.replica.port)
    }

    /// Address of the local instance for direct commands
    pub fn local_address(&self) -> Result<Endpoint> {
        let address = &self.replica.local_address;
        address
            .parse()
            .with_context(|| format!("invalid local_address {}", address))
    }

    pub fn admin_accounts(&self) -> AdminAccounts {
        let accounts = &self.accounts;
        AdminAccounts {
            user_admin: accounts.user_admin.credentials(Role::UserAdmin),
            cluster_admin: accounts.cluster_admin.credentials(Role::ClusterAdmin),
            backup: accounts.backup.credentials(Role::Backup),
            cluster_monitor: accounts.cluster_monitor.credentials(Role::ClusterMonitor),
        }
    }

    /// Parsed service account; invalid credentials are logged and ignored
    pub fn service_account(&self) -> Option<ServiceAccount> {
        let raw = self.scheduler.service_account_credential.as_deref()?;
        match ServiceAccount::from_json(raw) {
            Ok(account) => Some(account),
            Err(e) => {
                error!("{}", e);
                None
            }
        }
    }

    pub fn marathon(&self) -> MarathonConfig {
        MarathonConfig {
            base_url: self.scheduler.base_url.clone(),
            app_id: self.scheduler.app_id.clone(),
            timeout: Duration::from_secs(self.scheduler.timeout_secs),
            service_account: self.service_account(),
        }
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.mongo.timeout_secs)
    }

    pub fn idempotent_codes(&self) -> IdempotentCodes {
        self.mongo.codes.clone()
    }

    /// Budget for steady-state operations
    pub fn steady_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.retry.max_attempts,
            Duration::from_secs(self.retry.interval_secs),
        )
    }

    /// Budget for set creation
    pub fn initiate_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.retry.initiate_max_attempts,
            Duration::from_secs(self.retry.interval_secs),
        )
    }
}

/// Scheduler configuration
#[derive(Debug, Clone, Deserialize)]
pub struct SchedulerConfig {
    /// Marathon API base URL
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Marathon app id of the replica set
    #[serde(default)]
    pub app_id: String,

    /// Service account credential JSON
    #[serde(default)]
    pub service_account_credential: Option<String>,

    /// Request timeout in seconds
    #[serde(default = "default_scheduler_timeout")]
    pub timeout_secs: u64,
}

fn default_base_url() -> String {
    "http://leader.mesos:8080".to_string()
}

fn default_scheduler_timeout() -> u64 {
    10
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            app_id: String::new(),
            service_account_credential: None,
            timeout_secs: default_scheduler_timeout(),
        }
    }
}

/// Replica configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ReplicaConfig {
    /// Advertised host
    #[serde(default = "default_host")]
    pub host: String,

    /// Advertised port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Replica set name
    #[serde(default = "default_replica_set")]
    pub replica_set: String,

    /// Address of the local instance. Loopback, so that bootstrap commands
    /// fall under the localhost exception before any account exists.
    #[serde(default = "default_local_address")]
    pub local_address: String,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    27017
}

fn default_replica_set() -> String {
    "rs".to_string()
}

fn default_local_address() -> String {
    "127.0.0.1:27017".to_string()
}

impl Default for ReplicaConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            replica_set: default_replica_set(),
            local_address: default_local_address(),
        }
    }
}

/// One account
#[derive(Debug, Clone, Deserialize)]
pub struct AccountConfig {
    pub username: String,
    pub password: String,
}

impl AccountConfig {
    fn new(name: &str) -> Self {
        Self {
            username: name.to_string(),
            password: name.to_string(),
        }
    }

    fn credentials(&self, role: Role) -> Credentials {
        Credentials::new(self.username.clone(), self.password.clone(), role)
    }
}

/// Administrative accounts
#[derive(Debug, Clone, Deserialize)]
pub struct AccountsConfig {
    #[serde(default = "default_user_admin")]
    pub user_admin: AccountConfig,

    #[serde(default = "default_cluster_admin")]
    pub cluster_admin: AccountConfig,

    #[serde(default = "default_backup")]
    pub backup: AccountConfig,

    #[serde(default = "default_cluster_monitor")]
    pub cluster_monitor: AccountConfig,
}

fn default_user_admin() -> AccountConfig {
    AccountConfig::new("user_admin")
}

fn default_cluster_admin() -> AccountConfig {
    AccountConfig::new("cluster_admin")
}

fn default_backup() -> AccountConfig {
    AccountConfig::new("backup_user")
}

fn default_cluster_monitor() -> AccountConfig {
    AccountConfig::new("cluster_monitor_user")
}

impl Default for AccountsConfig {
    fn default() -> Self {
        Self {
            user_admin: default_user_admin(),
            cluster_admin: default_cluster_admin(),
            backup: default_backup(),
            cluster_monitor: default_cluster_monitor(),
        }
    }
}

/// Polling budgets
#[derive(Debug, Clone, Deserialize)]
pub struct RetryConfig {
    /// Attempts for steady-state operations
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Attempts for set creation
    #[serde(default = "default_initiate_max_attempts")]
    pub initiate_max_attempts: u32,

    /// Seconds between attempts
    #[serde(default = "default_interval")]
    pub interval_secs: u64,
}

fn default_max_attempts() -> u32 {
    RetryPolicy::steady().max_attempts
}

fn default_initiate_max_attempts() -> u32 {
    RetryPolicy::cold_start().max_attempts
}

fn default_interval() -> u64 {
    10
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initiate_max_attempts: default_initiate_max_attempts(),
            interval_secs: default_interval(),
        }
    }
}

/// Driver settings
#[derive(Debug, Clone, Deserialize)]
pub struct MongoConfig {
    /// Server selection and connect timeout in seconds
    #[serde(default = "default_mongo_timeout")]
    pub timeout_secs: u64,

    /// Error codes treated as "already done"
    #[serde(default)]
    pub codes: IdempotentCodes,
}

fn default_mongo_timeout() -> u64 {
    5
}

impl Default for MongoConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_mongo_timeout(),
            codes: IdempotentCodes::default(),
        }
    }
}
