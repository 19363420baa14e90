// # Memory Store
//
// In-memory implementation of UserStore and DnsStore.
//
// ## Purpose
//
// Backs the contract tests and `UBERDNS_STORE=memory` development runs.
// Nothing survives a restart.
//
// ## Semantics
//
// Mirrors the relational store where callers can observe it:
// - Ids are assigned from 1 upwards per table and never reused
// - A record name is unique within its domain (`Error::Conflict` otherwise)
// - A domain name is unique (`Error::Conflict` otherwise)
// - Deleting a domain deletes its records

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::Error;
use crate::model::{ApiKey, Domain, NewDomain, NewRecord, Record, User};
use crate::traits::{DnsStore, UserStore};

#[derive(Debug, Default)]
struct Tables {
    users: HashMap<i64, User>,
    passwords: HashMap<i64, String>,
    api_keys: HashMap<String, ApiKey>,
    domains: BTreeMap<i64, Domain>,
    records: BTreeMap<i64, Record>,
    last_domain_id: i64,
    last_record_id: i64,
}

/// In-memory user, domain and record tables
///
/// # Example
///
/// ```rust,no_run
/// use uberdns_core::state::MemoryStore;
/// use uberdns_core::traits::DnsStore;
/// use uberdns_core::model::NewDomain;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = MemoryStore::new();
///
///     let domain = store
///         .insert_domain(NewDomain {
///             name: "example.com".to_string(),
///             created_on: chrono::Utc::now(),
///         })
///         .await?;
///     assert_eq!(domain.id, 1);
///
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<RwLock<Tables>>,
}

impl MemoryStore {
    /// Create a new empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Add (or replace) a user row
    pub async fn add_user(&self, user: User) {
        self.inner.write().await.users.insert(user.id, user);
    }

    /// Add (or replace) a user row with an encoded password hash
    pub async fn add_user_with_password(&self, user: User, password_hash: impl Into<String>) {
        let mut guard = self.inner.write().await;
        guard.passwords.insert(user.id, password_hash.into());
        guard.users.insert(user.id, user);
    }

    /// Change a user's role flags in place
    pub async fn set_roles(&self, user_id: i64, is_admin: bool, is_staff: bool) {
        if let Some(user) = self.inner.write().await.users.get_mut(&user_id) {
            user.is_admin = is_admin;
            user.is_staff = is_staff;
        }
    }

    /// Add an API key row with an arbitrary creation time
    pub async fn add_api_key(&self, key: ApiKey) {
        self.inner.write().await.api_keys.insert(key.key.clone(), key);
    }

    /// Number of stored records
    pub async fn record_count(&self) -> usize {
        self.inner.read().await.records.len()
    }

    /// Number of stored domains
    pub async fn domain_count(&self) -> usize {
        self.inner.read().await.domains.len()
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn find_by_id(&self, id: i64) -> Result<Option<User>, Error> {
        Ok(self.inner.read().await.users.get(&id).cloned())
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, Error> {
        let guard = self.inner.read().await;
        Ok(guard.users.values().find(|u| u.name == username).cloned())
    }

    async fn find_by_api_key(&self, key: &str) -> Result<Option<(User, ApiKey)>, Error> {
        let guard = self.inner.read().await;
        Ok(guard.api_keys.get(key).and_then(|api_key| {
            guard
                .users
                .get(&api_key.user_id)
                .map(|user| (user.clone(), api_key.clone()))
        }))
    }

    async fn password_hash(&self, user_id: i64) -> Result<Option<String>, Error> {
        Ok(self.inner.read().await.passwords.get(&user_id).cloned())
    }

    async fn api_key_for_user(&self, user_id: i64) -> Result<Option<ApiKey>, Error> {
        let guard = self.inner.read().await;
        Ok(guard
            .api_keys
            .values()
            .filter(|k| k.user_id == user_id)
            .max_by_key(|k| k.created_on)
            .cloned())
    }

    async fn insert_api_key(&self, key: &ApiKey) -> Result<(), Error> {
        let mut guard = self.inner.write().await;
        if guard.api_keys.contains_key(&key.key) {
            return Err(Error::conflict("API key already exists"));
        }
        guard.api_keys.insert(key.key.clone(), key.clone());
        Ok(())
    }

    async fn delete_api_key(&self, key: &str) -> Result<(), Error> {
        self.inner.write().await.api_keys.remove(key);
        Ok(())
    }
}

#[async_trait]
impl DnsStore for MemoryStore {
    async fn insert_domain(&self, domain: NewDomain) -> Result<Domain, Error> {
        let mut guard = self.inner.write().await;
        if guard.domains.values().any(|d| d.name == domain.name) {
            return Err(Error::conflict(format!("domain {} exists", domain.name)));
        }

        guard.last_domain_id += 1;
        let stored = Domain {
            id: guard.last_domain_id,
            name: domain.name,
            created_on: domain.created_on,
        };
        guard.domains.insert(stored.id, stored.clone());
        Ok(stored)
    }

    async fn domain_by_name(&self, name: &str) -> Result<Option<Domain>, Error> {
        let guard = self.inner.read().await;
        Ok(guard.domains.values().find(|d| d.name == name).cloned())
    }

    async fn list_domains(&self) -> Result<Vec<Domain>, Error> {
        Ok(self.inner.read().await.domains.values().cloned().collect())
    }

    async fn delete_domain(&self, id: i64) -> Result<(), Error> {
        let mut guard = self.inner.write().await;
        guard.domains.remove(&id);
        guard.records.retain(|_, r| r.domain_id != id);
        Ok(())
    }

    async fn insert_record(&self, record: NewRecord) -> Result<Record, Error> {
        let mut guard = self.inner.write().await;
        if !guard.domains.contains_key(&record.domain_id) {
            return Err(Error::not_found(format!("domain {}", record.domain_id)));
        }
        if guard
            .records
            .values()
            .any(|r| r.domain_id == record.domain_id && r.name == record.name)
        {
            return Err(Error::conflict(format!("record {} exists", record.name)));
        }

        guard.last_record_id += 1;
        let stored = record.with_id(guard.last_record_id);
        guard.records.insert(stored.id, stored.clone());
        Ok(stored)
    }

    async fn record_by_name(&self, domain_id: i64, name: &str) -> Result<Option<Record>, Error> {
        let guard = self.inner.read().await;
        Ok(guard
            .records
            .values()
            .find(|r| r.domain_id == domain_id && r.name == name)
            .cloned())
    }

    async fn update_record_ip(&self, id: i64, ip: &str) -> Result<(), Error> {
        let mut guard = self.inner.write().await;
        match guard.records.get_mut(&id) {
            Some(record) => {
                record.ip = ip.to_string();
                Ok(())
            }
            None => Err(Error::not_found(format!("record {}", id))),
        }
    }

    async fn delete_record(&self, id: i64) -> Result<(), Error> {
        self.inner.write().await.records.remove(&id);
        Ok(())
    }

    async fn list_records(&self) -> Result<Vec<Record>, Error> {
        Ok(self.inner.read().await.records.values().cloned().collect())
    }

    async fn records_for_owner(&self, owner_id: i64) -> Result<Vec<Record>, Error> {
        let guard = self.inner.read().await;
        Ok(guard
            .records
            .values()
            .filter(|r| r.owner_id == owner_id)
            .cloned()
            .collect())
    }

    async fn records_for_domain(&self, domain_id: i64) -> Result<Vec<Record>, Error> {
        let guard = self.inner.read().await;
        Ok(guard
            .records
            .values()
            .filter(|r| r.domain_id == domain_id)
            .cloned()
            .collect())
    }
}
