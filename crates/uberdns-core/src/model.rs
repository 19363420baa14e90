//! Data model shared by the API, the stores and the notification pipeline
//!
//! `Domain` and `Record` serialize with the field names the downstream
//! resolver decodes (`ID`, `Name`, `IP`, ...). Changing them breaks cache
//! invalidation silently, so they are pinned with explicit renames.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The caller behind a request
///
/// Resolved per request and never cached. `User::anonymous()` (id 0) stands
/// for "unauthenticated".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub is_admin: bool,
    pub is_staff: bool,
}

impl User {
    /// The unauthenticated identity
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn is_authenticated(&self) -> bool {
        self.id != 0
    }

    /// Admins and staff share every elevated permission
    pub fn is_privileged(&self) -> bool {
        self.is_authenticated() && (self.is_admin || self.is_staff)
    }
}

/// A persisted API key
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey {
    pub key: String,
    pub created_on: DateTime<Utc>,
    pub user_id: i64,
}

impl std::fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiKey")
            .field("key", &"<REDACTED>")
            .field("created_on", &self.created_on)
            .field("user_id", &self.user_id)
            .finish()
    }
}

impl ApiKey {
    /// Whether the key was issued before the retention window opened
    ///
    /// The window is measured in calendar months, so a key issued on
    /// 31 January with a one-month window expires at the end of February.
    pub fn is_expired(&self, retention_months: u32, now: DateTime<Utc>) -> bool {
        match now.checked_sub_months(chrono::Months::new(retention_months)) {
            Some(cutoff) => self.created_on < cutoff,
            None => false,
        }
    }
}

/// A DNS zone managed through the API
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Domain {
    #[serde(rename = "ID")]
    pub id: i64,
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "CreatedOn")]
    pub created_on: DateTime<Utc>,
}

/// A domain row about to be inserted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewDomain {
    pub name: String,
    pub created_on: DateTime<Utc>,
}

/// An address record inside a domain
///
/// `name` is unique within `domain_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    #[serde(rename = "ID")]
    pub id: i64,
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "IP")]
    pub ip: String,
    #[serde(rename = "TTL")]
    pub ttl: i64,
    #[serde(rename = "CreatedOn")]
    pub created_on: DateTime<Utc>,
    #[serde(rename = "DomainID")]
    pub domain_id: i64,
    #[serde(rename = "OwnerID")]
    pub owner_id: i64,
}

/// A record row about to be inserted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewRecord {
    pub name: String,
    pub ip: String,
    pub ttl: i64,
    pub created_on: DateTime<Utc>,
    pub domain_id: i64,
    pub owner_id: i64,
}

impl NewRecord {
    /// The row as stored, once the store has assigned an id
    pub fn with_id(self, id: i64) -> Record {
        Record {
            id,
            name: self.name,
            ip: self.ip,
            ttl: self.ttl,
            created_on: self.created_on,
            domain_id: self.domain_id,
            owner_id: self.owner_id,
        }
    }
}

/// A fully qualified record name split at its first label
///
/// `"www.example.com"` is record `"www"` in domain `"example.com"`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fqdn {
    pub record: String,
    pub domain: String,
}

impl Fqdn {
    pub fn parse(fqdn: &str) -> crate::Result<Self> {
        let fqdn = fqdn.trim().trim_end_matches('.');
        match fqdn.split_once('.') {
            Some((record, domain)) if !record.is_empty() && !domain.is_empty() => Ok(Self {
                record: record.to_string(),
                domain: domain.to_string(),
            }),
            _ => Err(crate::Error::invalid_input(format!(
                "'{}' is not a fully qualified record name",
                fqdn
            ))),
        }
    }
}

impl std::fmt::Display for Fqdn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.record, self.domain)
    }
}

/// What the resolver cache should do with the attached snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheAction {
    Create,
    Purge,
    Update,
}

impl CacheAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheAction::Create => "create",
            CacheAction::Purge => "purge",
            CacheAction::Update => "update",
        }
    }
}

impl std::fmt::Display for CacheAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which entity a control message describes
///
/// Each kind has its own queue and publisher worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Domain,
    Record,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Domain => "domain",
            EntityKind::Record => "record",
        }
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entity mutation, as published on the cache channel
///
/// Wire format:
///
/// ```json
/// {"Action":"create","Type":"record","Object":"{\"ID\":1,\"Name\":\"www\",...}"}
/// ```
///
/// `Object` is itself a JSON string holding the snapshot taken at mutation time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheControlMessage {
    #[serde(rename = "Action")]
    pub action: CacheAction,
    #[serde(rename = "Type")]
    pub kind: EntityKind,
    #[serde(rename = "Object")]
    pub object: String,
}

impl CacheControlMessage {
    pub fn for_domain(action: CacheAction, domain: &Domain) -> crate::Result<Self> {
        Ok(Self {
            action,
            kind: EntityKind::Domain,
            object: serde_json::to_string(domain)?,
        })
    }

    pub fn for_record(action: CacheAction, record: &Record) -> crate::Result<Self> {
        Ok(Self {
            action,
            kind: EntityKind::Record,
            object: serde_json::to_string(record)?,
        })
    }

    /// Decode the snapshot back into a domain
    pub fn domain(&self) -> crate::Result<Domain> {
        Ok(serde_json::from_str(&self.object)?)
    }

    /// Decode the snapshot back into a record
    pub fn record(&self) -> crate::Result<Record> {
        Ok(serde_json::from_str(&self.object)?)
    }

    /// Serialize to the payload published on the bus
    pub fn to_payload(&self) -> crate::Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}
