//! Management service
//!
//! The handler logic behind every API route, independent of the HTTP
//! framework. Each operation takes the request headers plus a typed body and
//! returns a `Result` the daemon renders with `Error::status_code()` and
//! `Error::public_message()`.
//!
//! ## Check order
//!
//! 1. Resolve the caller; anonymous is `Forbidden`
//! 2. Look up the target entity (`NotFound`)
//! 3. Ask the authorization gate (`Forbidden`)
//! 4. Mutate the store
//! 5. Enqueue exactly one control message (several for a global purge)
//!
//! A request rejected at steps 1-3 never reaches the queues.

use std::net::IpAddr;
use std::sync::Arc;

use chrono::{DateTime, SubsecRound, Utc};
use http::HeaderMap;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::auth::{Credential, IdentityResolver, TokenAuthority, TokenPair, authz, password};
use crate::config::ApiConfig;
use crate::error::{Error, Result};
use crate::model::{ApiKey, CacheAction, Domain, Fqdn, NewDomain, NewRecord, Record, User};
use crate::notify::ChangeNotifier;
use crate::traits::{DnsStore, UserStore};

/// Random bytes in a generated API key (hex-encoded to 40 characters)
const API_KEY_BYTES: usize = 20;

/// Body of `/login`
#[derive(Clone, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for LoginRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginRequest")
            .field("username", &self.username)
            .field("password", &"<REDACTED>")
            .finish()
    }
}

/// Body of `/token/refresh`
#[derive(Clone, Deserialize)]
pub struct RefreshRequest {
    pub refresh: String,
}

/// Body of the record create/update routes
#[derive(Debug, Clone, Deserialize)]
pub struct RecordRequest {
    /// Fully qualified record name, e.g. `www.example.com`
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "IPAddress", default)]
    pub ip_address: String,
}

/// Body of the routes addressing an entity by name only
#[derive(Debug, Clone, Deserialize)]
pub struct NameRequest {
    #[serde(rename = "Name")]
    pub name: String,
}

/// Body of `/cache/record/purge`
#[derive(Debug, Clone, Deserialize)]
pub struct FqdnRequest {
    #[serde(rename = "FQDN")]
    pub fqdn: String,
}

/// Tokens plus the `Set-Cookie` value carrying the access token
#[derive(Clone)]
pub struct LoginOutcome {
    pub tokens: TokenPair,
    pub set_cookie: String,
}

impl std::fmt::Debug for LoginOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginOutcome")
            .field("tokens", &self.tokens)
            .field("set_cookie", &"<REDACTED>")
            .finish()
    }
}

/// Response of `/apikey`
#[derive(Clone, Serialize)]
pub struct ApiKeyResponse {
    pub key: String,
    pub created: chrono::DateTime<Utc>,
}

/// Response of `/user/profile`
#[derive(Debug, Clone, Serialize)]
pub struct UserProfile {
    pub id: i64,
    pub name: String,
    pub records: Vec<Record>,
}

/// Handler logic for the management API
pub struct ManagementService {
    users: Arc<dyn UserStore>,
    dns: Arc<dyn DnsStore>,
    identity: IdentityResolver,
    notifier: ChangeNotifier,
    config: ApiConfig,
}

impl ManagementService {
    /// Wire the service from its collaborators
    pub fn new(
        users: Arc<dyn UserStore>,
        dns: Arc<dyn DnsStore>,
        notifier: ChangeNotifier,
        config: ApiConfig,
    ) -> Result<Self> {
        config.validate()?;

        let tokens = TokenAuthority::new(&config.auth)?;
        let identity = IdentityResolver::new(
            users.clone(),
            tokens,
            config.auth.api_key_retention_months,
            config.auth.cookie_name.clone(),
        );

        Ok(Self {
            users,
            dns,
            identity,
            notifier,
            config,
        })
    }

    pub fn identity(&self) -> &IdentityResolver {
        &self.identity
    }

    pub fn notifier(&self) -> &ChangeNotifier {
        &self.notifier
    }

    /// Landing route; only checks that the caller is known
    pub async fn index(&self, headers: &HeaderMap) -> Result<User> {
        self.authenticate(headers).await
    }

    /// Exchange a username and password for a token pair
    pub async fn login(&self, request: &LoginRequest) -> Result<LoginOutcome> {
        let Some(user) = self.users.find_by_username(&request.username).await? else {
            debug!("Login for unknown user {}", request.username);
            return Err(Error::unauthenticated("unknown user"));
        };

        let encoded = self
            .users
            .password_hash(user.id)
            .await?
            .ok_or_else(|| Error::unauthenticated("user has no password"))?;

        // PBKDF2 at production iteration counts takes far too long for a runtime worker
        let candidate = request.password.clone();
        let matches = tokio::task::spawn_blocking(move || password::verify(&candidate, &encoded))
            .await
            .map_err(|e| Error::store(format!("password check task failed: {}", e)))?;

        if !matches {
            debug!("Wrong password for user {}", user.id);
            return Err(Error::unauthenticated("wrong password"));
        }

        info!("User {} logged in", user.id);
        self.session_for(user.id)
    }

    /// Exchange a refresh token for a fresh pair
    pub async fn refresh(&self, request: &RefreshRequest) -> Result<LoginOutcome> {
        let user = self.identity.resolve_refresh_token(&request.refresh).await;
        if !user.is_authenticated() {
            return Err(Error::invalid_credential("refresh token rejected"));
        }

        debug!("Refreshed session for user {}", user.id);
        self.session_for(user.id)
    }

    /// Return the caller's API key, issuing one if missing or past retention
    pub async fn issue_api_key(&self, headers: &HeaderMap) -> Result<ApiKeyResponse> {
        let user = self.authenticate(headers).await?;
        let retention = self.config.auth.api_key_retention_months;

        if let Some(existing) = self.users.api_key_for_user(user.id).await? {
            if !existing.is_expired(retention, Utc::now()) {
                return Ok(ApiKeyResponse {
                    key: existing.key,
                    created: existing.created_on,
                });
            }
            info!("Replacing expired API key for user {}", user.id);
            self.users.delete_api_key(&existing.key).await?;
        }

        let key = ApiKey {
            key: generate_api_key(),
            created_on: stored_now(),
            user_id: user.id,
        };
        self.users.insert_api_key(&key).await?;
        info!("Issued API key for user {}", user.id);

        Ok(ApiKeyResponse {
            key: key.key,
            created: key.created_on,
        })
    }

    /// Revoke the presented API key and clear the session cookie
    ///
    /// Returns the `Set-Cookie` value that expires the cookie. Session tokens
    /// themselves are stateless and simply run out.
    pub async fn logout(&self, headers: &HeaderMap) -> Result<String> {
        let user = self.authenticate(headers).await?;

        for credential in Credential::extract_all(headers, self.identity.cookie_name()) {
            if let Credential::ApiKey(key) = credential {
                if self.identity.resolve_api_key(&key).await.id == user.id {
                    self.users.delete_api_key(&key).await?;
                    info!("Revoked API key for user {}", user.id);
                }
            }
        }

        Ok(format!(
            "{}=; Max-Age=0; Path=/; HttpOnly",
            self.config.auth.cookie_name
        ))
    }

    /// The caller plus the records they own
    pub async fn profile(&self, headers: &HeaderMap) -> Result<UserProfile> {
        let user = self.authenticate(headers).await?;
        let records = self.dns.records_for_owner(user.id).await?;

        Ok(UserProfile {
            id: user.id,
            name: user.name,
            records,
        })
    }

    /// Create a record owned by the caller
    pub async fn create_record(&self, headers: &HeaderMap, request: &RecordRequest) -> Result<Record> {
        let user = self.authenticate(headers).await?;
        let fqdn = Fqdn::parse(&request.name)?;
        let ip = parse_ip(&request.ip_address)?;
        let domain = self.find_domain(&fqdn.domain).await?;

        let record = self
            .dns
            .insert_record(NewRecord {
                name: fqdn.record.clone(),
                ip,
                ttl: self.config.records.ttl,
                created_on: stored_now(),
                domain_id: domain.id,
                owner_id: user.id,
            })
            .await?;

        info!("User {} created record {} (id {})", user.id, fqdn, record.id);
        self.notifier.notify_record(CacheAction::Create, &record).await?;
        Ok(record)
    }

    /// Point one of the caller's records at a new address
    pub async fn update_record(&self, headers: &HeaderMap, request: &RecordRequest) -> Result<Record> {
        let user = self.authenticate(headers).await?;
        let fqdn = Fqdn::parse(&request.name)?;
        let ip = parse_ip(&request.ip_address)?;
        let mut record = self.find_record(&fqdn).await?;
        self.authorize_record(&user, &record)?;

        self.dns.update_record_ip(record.id, &ip).await?;
        record.ip = ip;

        info!("User {} updated record {} to {}", user.id, fqdn, record.ip);
        self.notifier.notify_record(CacheAction::Update, &record).await?;
        Ok(record)
    }

    /// Delete one of the caller's records
    pub async fn delete_record(&self, headers: &HeaderMap, request: &NameRequest) -> Result<Record> {
        let user = self.authenticate(headers).await?;
        let fqdn = Fqdn::parse(&request.name)?;
        let record = self.find_record(&fqdn).await?;
        self.authorize_record(&user, &record)?;

        self.dns.delete_record(record.id).await?;

        info!("User {} deleted record {}", user.id, fqdn);
        self.notifier.notify_record(CacheAction::Purge, &record).await?;
        Ok(record)
    }

    /// Evict one of the caller's records from the resolver cache
    pub async fn purge_record(&self, headers: &HeaderMap, request: &FqdnRequest) -> Result<Record> {
        let user = self.authenticate(headers).await?;
        let fqdn = Fqdn::parse(&request.fqdn)?;
        let record = self.find_record(&fqdn).await?;
        self.authorize_record(&user, &record)?;

        info!("User {} purged record {} from cache", user.id, fqdn);
        self.notifier.notify_record(CacheAction::Purge, &record).await?;
        Ok(record)
    }

    /// Evict every stored record from the resolver cache
    ///
    /// Returns how many purge messages were enqueued.
    pub async fn purge_all(&self, headers: &HeaderMap) -> Result<usize> {
        let user = self.authenticate(headers).await?;
        if !authz::can_purge_globally(&user) {
            return Err(Error::forbidden(format!("user {} cannot purge globally", user.id)));
        }

        let records = self.dns.list_records().await?;
        for record in &records {
            self.notifier.notify_record(CacheAction::Purge, record).await?;
        }

        info!("User {} purged {} records from cache", user.id, records.len());
        Ok(records.len())
    }

    /// Records owned by the caller
    pub async fn list_records(&self, headers: &HeaderMap) -> Result<Vec<Record>> {
        let user = self.authenticate(headers).await?;
        self.dns.records_for_owner(user.id).await
    }

    /// Every record, for operators
    pub async fn list_all_records(&self, headers: &HeaderMap) -> Result<Vec<Record>> {
        let user = self.authenticate(headers).await?;
        if !authz::can_list_all(&user) {
            return Err(Error::forbidden(format!("user {} cannot list all records", user.id)));
        }
        self.dns.list_records().await
    }

    /// Create a domain
    pub async fn create_domain(&self, headers: &HeaderMap, request: &NameRequest) -> Result<Domain> {
        let user = self.authenticate(headers).await?;
        if !authz::can_mutate_domain(&user, None) {
            return Err(Error::forbidden(format!("user {} cannot create domains", user.id)));
        }

        let name = domain_name(&request.name)?;
        let domain = self
            .dns
            .insert_domain(NewDomain {
                name,
                created_on: stored_now(),
            })
            .await?;

        info!("User {} created domain {} (id {})", user.id, domain.name, domain.id);
        self.notifier.notify_domain(CacheAction::Create, &domain).await?;
        Ok(domain)
    }

    /// Delete a domain and, with it, its records
    pub async fn delete_domain(&self, headers: &HeaderMap, request: &NameRequest) -> Result<Domain> {
        let user = self.authenticate(headers).await?;
        if !authz::can_mutate_domain(&user, None) {
            return Err(Error::forbidden(format!("user {} cannot delete domains", user.id)));
        }

        let domain = self.find_domain(&domain_name(&request.name)?).await?;
        let records = self.dns.records_for_domain(domain.id).await?;
        self.dns.delete_domain(domain.id).await?;

        info!(
            "User {} deleted domain {} with {} records",
            user.id,
            domain.name,
            records.len()
        );
        for record in &records {
            self.notifier.notify_record(CacheAction::Purge, record).await?;
        }
        self.notifier.notify_domain(CacheAction::Purge, &domain).await?;
        Ok(domain)
    }

    /// Every domain, for operators
    pub async fn list_domains(&self, headers: &HeaderMap) -> Result<Vec<Domain>> {
        let user = self.authenticate(headers).await?;
        if !authz::can_list_all(&user) {
            return Err(Error::forbidden(format!("user {} cannot list domains", user.id)));
        }
        self.dns.list_domains().await
    }

    async fn authenticate(&self, headers: &HeaderMap) -> Result<User> {
        let user = self.identity.resolve_headers(headers).await;
        if !user.is_authenticated() {
            return Err(Error::forbidden("anonymous request"));
        }
        Ok(user)
    }

    fn authorize_record(&self, user: &User, record: &Record) -> Result<()> {
        if !authz::can_mutate_record(user, record) {
            warn!(
                "User {} denied access to record {} owned by {}",
                user.id, record.id, record.owner_id
            );
            return Err(Error::forbidden("not the record owner"));
        }
        Ok(())
    }

    async fn find_domain(&self, name: &str) -> Result<Domain> {
        self.dns
            .domain_by_name(name)
            .await?
            .ok_or_else(|| Error::not_found(format!("domain {}", name)))
    }

    async fn find_record(&self, fqdn: &Fqdn) -> Result<Record> {
        let domain = self.find_domain(&fqdn.domain).await?;
        self.dns
            .record_by_name(domain.id, &fqdn.record)
            .await?
            .ok_or_else(|| Error::not_found(format!("record {}", fqdn)))
    }

    fn session_for(&self, user_id: i64) -> Result<LoginOutcome> {
        let tokens = self.identity.tokens().issue_pair(user_id)?;
        let set_cookie = format!(
            "{}={}; Max-Age={}; Path=/; HttpOnly",
            self.config.auth.cookie_name, tokens.access, self.config.auth.cookie_max_age_secs
        );
        Ok(LoginOutcome { tokens, set_cookie })
    }
}

fn parse_ip(raw: &str) -> Result<String> {
    raw.trim()
        .parse::<IpAddr>()
        .map(|ip| ip.to_string())
        .map_err(|_| Error::invalid_input(format!("'{}' is not an IP address", raw)))
}

fn domain_name(raw: &str) -> Result<String> {
    let name = raw.trim().trim_end_matches('.');
    if name.is_empty() || name.contains(char::is_whitespace) {
        return Err(Error::invalid_input(format!("'{}' is not a domain name", raw)));
    }
    Ok(name.to_string())
}

/// Current time at the precision the relational store keeps
///
/// Snapshots returned to clients and published on the bus must match what a
/// later read returns, and `DATETIME(6)` columns stop at microseconds.
fn stored_now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

fn generate_api_key() -> String {
    let mut bytes = [0u8; API_KEY_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}
