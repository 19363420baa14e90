// # DNS Store Trait
//
// Defines the narrow interface to the relational store that owns domain and
// record rows.
//
// ## Purpose
//
// Handlers read and write rows through this trait and nothing else. Each call
// is one short statement; there is no transaction spanning a request and no
// lock held across calls.
//
// ## Usage
//
// ```rust,ignore
// use uberdns_core::DnsStore;
//
// let domain = store.domain_by_name("example.com").await?;
// let record = store.record_by_name(domain.id, "www").await?;
// store.update_record_ip(record.id, "10.0.0.2").await?;
// ```

use async_trait::async_trait;

use crate::model::{Domain, NewDomain, NewRecord, Record};

/// Trait for domain/record store implementations
///
/// # Thread Safety
///
/// All methods must be safe to call concurrently from multiple request tasks.
#[async_trait]
pub trait DnsStore: Send + Sync {
    /// Insert a domain and return the stored row (with its id)
    async fn insert_domain(&self, domain: NewDomain) -> Result<Domain, crate::Error>;

    /// Look up a domain by name
    async fn domain_by_name(&self, name: &str) -> Result<Option<Domain>, crate::Error>;

    /// List every domain
    async fn list_domains(&self) -> Result<Vec<Domain>, crate::Error>;

    /// Delete a domain and every record inside it
    ///
    /// Both go together or neither does.
    async fn delete_domain(&self, id: i64) -> Result<(), crate::Error>;

    /// Insert a record and return the stored row (with its id)
    ///
    /// # Returns
    ///
    /// - `Ok(Record)`: The persisted row, id assigned by the store
    /// - `Err(Error::Conflict)`: The name is already taken in that domain
    /// - `Err(Error)`: Storage error
    async fn insert_record(&self, record: NewRecord) -> Result<Record, crate::Error>;

    /// Look up a record by name inside a domain
    async fn record_by_name(
        &self,
        domain_id: i64,
        name: &str,
    ) -> Result<Option<Record>, crate::Error>;

    /// Point a record at a new address
    async fn update_record_ip(&self, id: i64, ip: &str) -> Result<(), crate::Error>;

    /// Delete a record by id
    async fn delete_record(&self, id: i64) -> Result<(), crate::Error>;

    /// List every record
    async fn list_records(&self) -> Result<Vec<Record>, crate::Error>;

    /// List the records owned by one user
    async fn records_for_owner(&self, owner_id: i64) -> Result<Vec<Record>, crate::Error>;

    /// List the records inside one domain
    async fn records_for_domain(&self, domain_id: i64) -> Result<Vec<Record>, crate::Error>;
}
