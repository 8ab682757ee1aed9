//! Replica-set membership configuration
//!
//! The storage engine owns the configuration. Here we only decode the current
//! one and compute the successor to propose: same set, version + 1, stale
//! members evicted, the joining replica appended under a fresh id.

use bson::{Bson, Document, doc};
use replboot_discovery::Endpoint;
use std::collections::HashSet;
use thiserror::Error;

use crate::reply::numeric;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("Missing or invalid field: {0}")]
    Field(&'static str),

    #[error("Invalid member entry: {0}")]
    Member(String),

    #[error("Duplicate member id: {0}")]
    DuplicateMemberId(i64),

    #[error("Invalid config version: {0}")]
    Version(i64),
}

/// Fields this module writes itself; everything else is carried over
const MANAGED_FIELDS: [&str; 5] = ["_id", "version", "protocolVersion", "members", "term"];

fn int_bson(value: i64) -> Bson {
    match i32::try_from(value) {
        Ok(v) => Bson::Int32(v),
        Err(_) => Bson::Int64(value),
    }
}

fn carried_over(doc: &Document, managed: &[&str]) -> Document {
    doc.iter()
        .filter(|(key, _)| !managed.contains(&key.as_str()))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}

/// One `(memberId, host)` entry plus any member settings (priority, votes...)
#[derive(Debug, Clone, PartialEq)]
pub struct ReplicaMember {
    pub id: i64,
    pub host: String,
    pub extra: Document,
}

impl ReplicaMember {
    pub fn new(id: i64, endpoint: &Endpoint) -> Self {
        Self {
            id,
            host: endpoint.to_string(),
            extra: Document::new(),
        }
    }

    pub fn endpoint(&self) -> Option<Endpoint> {
        self.host.parse().ok()
    }

    /// Whether this member is the replica at `endpoint`
    pub fn is(&self, endpoint: &Endpoint) -> bool {
        self.endpoint().as_ref() == Some(endpoint) || self.host == endpoint.to_string()
    }

    fn from_document(doc: &Document) -> Result<Self, ConfigError> {
        let id = numeric(doc, "_id")
            .filter(|id| *id >= 0)
            .ok_or_else(|| ConfigError::Member(format!("bad _id in {}", doc)))?;
        let host = doc
            .get_str("host")
            .map_err(|_| ConfigError::Member(format!("bad host in {}", doc)))?
            .to_string();

        Ok(Self {
            id,
            host,
            extra: carried_over(doc, &["_id", "host"]),
        })
    }

    fn to_document(&self) -> Document {
        let mut doc = doc! {
            "_id": int_bson(self.id),
            "host": self.host.as_str(),
        };
        doc.extend(self.extra.clone());
        doc
    }
}

/// A replica-set configuration document
#[derive(Debug, Clone, PartialEq)]
pub struct ReplicaSetConfig {
    pub id: String,
    pub version: i64,
    pub protocol_version: i64,
    pub members: Vec<ReplicaMember>,
    /// Set-level fields (settings, writeConcernMajorityJournalDefault...)
    pub extra: Document,
}

impl ReplicaSetConfig {
    /// One-member configuration for a brand-new set
    pub fn initial(set_name: &str, endpoint: &Endpoint) -> Self {
        Self {
            id: set_name.to_string(),
            version: 1,
            protocol_version: 1,
            members: vec![ReplicaMember::new(0, endpoint)],
            extra: Document::new(),
        }
    }

    /// Decode the `config` document of a `replSetGetConfig` reply
    pub fn from_document(doc: &Document) -> Result<Self, ConfigError> {
        let id = doc
            .get_str("_id")
            .map_err(|_| ConfigError::Field("_id"))?
            .to_string();
        let version = numeric(doc, "version").ok_or(ConfigError::Field("version"))?;
        if version < 1 {
            return Err(ConfigError::Version(version));
        }
        let protocol_version = numeric(doc, "protocolVersion").unwrap_or(1);

        let raw_members = doc
            .get_array("members")
            .map_err(|_| ConfigError::Field("members"))?;
        let mut seen = HashSet::new();
        let mut members = Vec::with_capacity(raw_members.len());
        for raw in raw_members {
            let member_doc = raw
                .as_document()
                .ok_or_else(|| ConfigError::Member(raw.to_string()))?;
            let member = ReplicaMember::from_document(member_doc)?;
            if !seen.insert(member.id) {
                return Err(ConfigError::DuplicateMemberId(member.id));
            }
            members.push(member);
        }

        Ok(Self {
            id,
            version,
            protocol_version,
            members,
            extra: carried_over(doc, &MANAGED_FIELDS),
        })
    }

    pub fn to_document(&self) -> Document {
        let members: Vec<Bson> = self
            .members
            .iter()
            .map(|m| Bson::Document(m.to_document()))
            .collect();
        let mut doc = doc! {
            "_id": self.id.as_str(),
            "version": int_bson(self.version),
            "protocolVersion": int_bson(self.protocol_version),
            "members": members,
        };
        doc.extend(self.extra.clone());
        doc
    }

    pub fn contains(&self, endpoint: &Endpoint) -> bool {
        self.members.iter().any(|m| m.is(endpoint))
    }

    /// `max(existing ids) + 1`, or 0 for an empty member list
    pub fn next_member_id(&self) -> i64 {
        self.members.iter().map(|m| m.id).max().map_or(0, |id| id + 1)
    }

    /// Successor configuration admitting `joining`.
    ///
    /// Members whose endpoint is absent from `live` are evicted. The new id is
    /// computed over the current members, evicted ones included, so ids are
    /// never reused within a version step.
    pub fn successor(&self, live: &[Endpoint], joining: &Endpoint) -> Self {
        let mut members: Vec<ReplicaMember> = self
            .members
            .iter()
            .filter(|m| !m.is(joining))
            .filter(|m| m.endpoint().is_some_and(|e| live.contains(&e)))
            .cloned()
            .collect();
        members.push(ReplicaMember::new(self.next_member_id(), joining));

        Self {
            id: self.id.clone(),
            version: self.version + 1,
            protocol_version: self.protocol_version,
            members,
            extra: self.extra.clone(),
        }
    }

    /// Proposal for `joining` given the current configuration, if any.
    ///
    /// Library helper for callers that may have no readable configuration;
    /// without one the proposal is the one-member initial set.
    pub fn propose(
        current: Option<&ReplicaSetConfig>,
        set_name: &str,
        live: &[Endpoint],
        joining: &Endpoint,
    ) -> Self {
        match current {
            Some(config) => config.successor(live, joining),
            None => Self::initial(set_name, joining),
        }
    }
}
