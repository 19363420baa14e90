// # User Store Trait
//
// Defines the interface for identity lookups.
//
// ## Purpose
//
// The identity resolver re-reads the user on every request, so role changes
// and revoked keys take effect immediately. The store is the only source of
// role flags; session tokens never carry them.
//
// ## Implementations
//
// - `MemoryStore` (this crate): tests and development
// - `MySqlStore` (`uberdns-store-mysql`): the `auth_user` / `authtoken_token` tables

use async_trait::async_trait;

use crate::model::{ApiKey, User};

/// Trait for user/credential store implementations
///
/// # Thread Safety
///
/// All methods must be safe to call concurrently from multiple request tasks.
///
/// # Errors
///
/// "Not found" is `Ok(None)`, never an error. `Err` is reserved for the store
/// being unreachable or a query failing.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Look up a user by id
    async fn find_by_id(&self, id: i64) -> Result<Option<User>, crate::Error>;

    /// Look up a user by login name
    async fn find_by_username(&self, username: &str) -> Result<Option<User>, crate::Error>;

    /// Look up an API key together with the user it belongs to
    ///
    /// # Returns
    ///
    /// - `Ok(Some((user, key)))`: Key exists (it may still be past retention)
    /// - `Ok(None)`: No such key
    /// - `Err(Error)`: Storage error
    async fn find_by_api_key(&self, key: &str) -> Result<Option<(User, ApiKey)>, crate::Error>;

    /// Encoded password hash for a user (`pbkdf2_sha256$...`)
    async fn password_hash(&self, user_id: i64) -> Result<Option<String>, crate::Error>;

    /// The API key currently issued to a user, if any
    async fn api_key_for_user(&self, user_id: i64) -> Result<Option<ApiKey>, crate::Error>;

    /// Persist a newly issued API key
    async fn insert_api_key(&self, key: &ApiKey) -> Result<(), crate::Error>;

    /// Delete an API key
    ///
    /// # Returns
    ///
    /// - `Ok(())`: Deleted (or didn't exist)
    /// - `Err(Error)`: Storage error
    async fn delete_api_key(&self, key: &str) -> Result<(), crate::Error>;
}
