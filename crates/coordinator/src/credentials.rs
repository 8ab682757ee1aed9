//! Administrative accounts

use serde::Deserialize;
use std::fmt;

/// Fixed administrative roles, each granted on the `admin` database
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    UserAdmin,
    ClusterAdmin,
    Backup,
    ClusterMonitor,
}

impl Role {
    /// Built-in role name granted by `createUser`
    pub fn builtin_role(self) -> &'static str {
        match self {
            Role::UserAdmin => "userAdminAnyDatabase",
            Role::ClusterAdmin => "clusterAdmin",
            Role::Backup => "backup",
            Role::ClusterMonitor => "clusterMonitor",
        }
    }

    pub fn describe(self) -> &'static str {
        match self {
            Role::UserAdmin => "user administrator",
            Role::ClusterAdmin => "cluster administrator",
            Role::Backup => "backup user",
            Role::ClusterMonitor => "cluster monitor user",
        }
    }
}

#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
    pub role: Role,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>, role: Role) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            role,
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("role", &self.role)
            .finish()
    }
}

/// The four administrative accounts, loaded once at startup
#[derive(Debug, Clone)]
pub struct AdminAccounts {
    pub user_admin: Credentials,
    pub cluster_admin: Credentials,
    pub backup: Credentials,
    pub cluster_monitor: Credentials,
}

impl AdminAccounts {
    pub fn get(&self, role: Role) -> &Credentials {
        match role {
            Role::UserAdmin => &self.user_admin,
            Role::ClusterAdmin => &self.cluster_admin,
            Role::Backup => &self.backup,
            Role::ClusterMonitor => &self.cluster_monitor,
        }
    }
}

impl Default for AdminAccounts {
    fn default() -> Self {
        Self {
            user_admin: Credentials::new("user_admin", "user_admin", Role::UserAdmin),
            cluster_admin: Credentials::new("cluster_admin", "cluster_admin", Role::ClusterAdmin),
            backup: Credentials::new("backup_user", "backup_user", Role::Backup),
            cluster_monitor: Credentials::new(
                "cluster_monitor_user",
                "cluster_monitor_user",
                Role::ClusterMonitor,
            ),
        }
    }
}

/// Error codes meaning "the requested state already holds"
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct IdempotentCodes {
    /// Returned by `replSetInitiate` against an initialized set
    #[serde(default = "default_already_initialized")]
    pub already_initialized: Vec<i32>,

    /// Returned by `createUser` for an existing account
    #[serde(default = "default_user_exists")]
    pub user_exists: Vec<i32>,
}

/// AlreadyInitialized
pub const ALREADY_INITIALIZED: i32 = 23;
/// DuplicateKey
pub const DUPLICATE_KEY: i32 = 11000;
/// Location51003, "User already exists"
pub const USER_ALREADY_EXISTS: i32 = 51003;

fn default_already_initialized() -> Vec<i32> {
    vec![ALREADY_INITIALIZED]
}

fn default_user_exists() -> Vec<i32> {
    vec![DUPLICATE_KEY, USER_ALREADY_EXISTS]
}

impl Default for IdempotentCodes {
    fn default() -> Self {
        Self {
            already_initialized: default_already_initialized(),
            user_exists: default_user_exists(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_redacts_password() {
        let creds = Credentials::new("cluster_admin", "hunter2", Role::ClusterAdmin);
        let debug = format!("{:?}", creds);
        assert!(debug.contains("cluster_admin"));
        assert!(!debug.contains("hunter2"));
    }

    #[test]
    fn test_accounts_by_role() {
        let accounts = AdminAccounts::default();
        for role in [
            Role::UserAdmin,
            Role::ClusterAdmin,
            Role::Backup,
            Role::ClusterMonitor,
        ] {
            assert_eq!(accounts.get(role).role, role);
        }
        assert_eq!(accounts.get(Role::Backup).username, "backup_user");
    }

    #[test]
    fn test_default_codes() {
        let codes = IdempotentCodes::default();
        assert_eq!(codes.already_initialized, vec![23]);
        assert_eq!(codes.user_exists, vec![11000, 51003]);
    }
}
