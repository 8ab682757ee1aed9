//! Scenario Test Harness
#![allow(dead_code)]
//!
//! In-memory stand-ins for the scheduler and the storage engine, recording
//! every command a coordinator issues.

use async_trait::async_trait;
use bson::Document;
use parking_lot::Mutex;
use replboot_coordinator::{
    AdminAccounts, AdminCommand, CommandClient, CommandReply, Coordinator, Credentials, Target,
};
use replboot_discovery::{DiscoveryError, Endpoint, EndpointDiscovery};
use std::sync::Arc;

pub fn ep(s: &str) -> Endpoint {
    s.parse().unwrap()
}

/// Discovery answering from a shared, mutable endpoint list
#[derive(Clone, Default)]
pub struct FakeDiscovery {
    /// `None` simulates an unreachable scheduler
    endpoints: Arc<Mutex<Option<Vec<Endpoint>>>>,
}

impl FakeDiscovery {
    pub fn new(endpoints: &[&str]) -> Self {
        let fake = Self::default();
        fake.set(endpoints);
        fake
    }

    pub fn unreachable() -> Self {
        Self::default()
    }

    pub fn set(&self, endpoints: &[&str]) {
        *self.endpoints.lock() = Some(endpoints.iter().map(|s| ep(s)).collect());
    }
}

#[async_trait]
impl EndpointDiscovery for FakeDiscovery {
    async fn list_replica_endpoints(&self) -> Result<Vec<Endpoint>, DiscoveryError> {
        match self.endpoints.lock().clone() {
            Some(endpoints) => Ok(Endpoint::canonical(endpoints)),
            None => Err(DiscoveryError::Status {
                status: 503,
                body: "no leader".to_string(),
            }),
        }
    }
}

/// Where a recorded command went
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Sent {
    Local,
    ReplicaSet(Vec<Endpoint>),
}

#[derive(Debug, Clone)]
pub struct Call {
    pub name: String,
    pub document: Document,
    pub target: Sent,
    pub username: Option<String>,
}

type Responder = dyn Fn(&Call) -> Option<CommandReply> + Send + Sync;

/// Command client recording calls and answering through a responder
#[derive(Clone)]
pub struct FakeClient {
    calls: Arc<Mutex<Vec<Call>>>,
    responder: Arc<Responder>,
}

impl FakeClient {
    pub fn new(responder: impl Fn(&Call) -> Option<CommandReply> + Send + Sync + 'static) -> Self {
        Self {
            calls: Arc::new(Mutex::new(Vec::new())),
            responder: Arc::new(responder),
        }
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    pub fn names(&self) -> Vec<String> {
        self.calls.lock().iter().map(|c| c.name.clone()).collect()
    }

    pub fn find(&self, name: &str) -> Option<Call> {
        self.calls.lock().iter().find(|c| c.name == name).cloned()
    }
}

#[async_trait]
impl CommandClient for FakeClient {
    async fn execute(
        &self,
        command: &AdminCommand,
        target: Target<'_>,
        credentials: Option<&Credentials>,
    ) -> Option<CommandReply> {
        let call = Call {
            name: command.name().to_string(),
            document: command.document().clone(),
            target: match target {
                Target::Local => Sent::Local,
                Target::ReplicaSet(endpoints) => Sent::ReplicaSet(endpoints.to_vec()),
            },
            username: credentials.map(|c| c.username.clone()),
        };
        let reply = (self.responder)(&call);
        self.calls.lock().push(call);
        reply
    }
}

pub fn ok() -> Option<CommandReply> {
    Some(CommandReply::new(bson::doc! { "ok": 1.0 }))
}

pub fn ok_with(mut doc: Document) -> Option<CommandReply> {
    doc.insert("ok", 1.0);
    Some(CommandReply::new(doc))
}

pub fn rejected(code: i32, code_name: &str) -> Option<CommandReply> {
    Some(CommandReply::rejected(code, code_name, code_name))
}

pub fn coordinator(
    discovery: &FakeDiscovery,
    client: &FakeClient,
    local: &str,
) -> Coordinator<FakeDiscovery, FakeClient> {
    Coordinator::new(
        discovery.clone(),
        client.clone(),
        ep(local),
        "rs",
        AdminAccounts::default(),
    )
}
