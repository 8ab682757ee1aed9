//! Administrative command documents
//!
//! The command name must be the first key of the document, so every command
//! is built with `doc!` in wire order and never re-sorted.

use crate::{Credentials, ReplicaSetConfig};
use bson::{Document, doc};

/// One administrative request against the `admin` database
#[derive(Debug, Clone, PartialEq)]
pub struct AdminCommand(Document);

impl AdminCommand {
    /// `replSetInitiate` with a brand-new configuration
    pub fn replset_initiate(config: &ReplicaSetConfig) -> Self {
        Self(doc! { "replSetInitiate": config.to_document() })
    }

    pub fn replset_get_status() -> Self {
        Self(doc! { "replSetGetStatus": 1 })
    }

    pub fn replset_get_config() -> Self {
        Self(doc! { "replSetGetConfig": 1 })
    }

    /// `replSetReconfig` proposing `config` as the successor
    pub fn replset_reconfig(config: &ReplicaSetConfig, force: bool) -> Self {
        Self(doc! {
            "replSetReconfig": config.to_document(),
            "force": force,
        })
    }

    /// `createUser` granting the account's role on `admin`
    pub fn create_user(account: &Credentials) -> Self {
        Self(doc! {
            "createUser": account.username.as_str(),
            "pwd": account.password.as_str(),
            "roles": [ { "role": account.role.builtin_role(), "db": "admin" } ],
        })
    }

    pub fn users_info(username: &str) -> Self {
        Self(doc! { "usersInfo": username })
    }

    pub fn is_master() -> Self {
        Self(doc! { "isMaster": 1 })
    }

    /// Command name (the first key)
    pub fn name(&self) -> &str {
        self.0.keys().next().map(String::as_str).unwrap_or_default()
    }

    pub fn document(&self) -> &Document {
        &self.0
    }

    pub fn into_document(self) -> Document {
        self.0
    }
}
