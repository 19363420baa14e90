//! Identity resolution
//!
//! Every entry point here is total: a missing, malformed, expired or revoked
//! credential, and even a store failure, yields `User::anonymous()`. The
//! authorization gate then fails closed on it.

use std::sync::Arc;

use chrono::Utc;
use http::HeaderMap;
use tracing::{debug, warn};

use super::credential::Credential;
use super::token::{TokenAuthority, TokenType};
use crate::model::User;
use crate::traits::UserStore;

/// Turns credentials into users
#[derive(Clone)]
pub struct IdentityResolver {
    users: Arc<dyn UserStore>,
    tokens: TokenAuthority,
    retention_months: u32,
    cookie_name: String,
}

impl std::fmt::Debug for IdentityResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentityResolver")
            .field("tokens", &self.tokens)
            .field("retention_months", &self.retention_months)
            .field("cookie_name", &self.cookie_name)
            .finish_non_exhaustive()
    }
}

impl IdentityResolver {
    pub fn new(
        users: Arc<dyn UserStore>,
        tokens: TokenAuthority,
        retention_months: u32,
        cookie_name: impl Into<String>,
    ) -> Self {
        Self {
            users,
            tokens,
            retention_months,
            cookie_name: cookie_name.into(),
        }
    }

    /// Resolve whatever credentials the request carries
    ///
    /// Candidates are tried in precedence order and the first one that maps
    /// to a real user wins. A stale session cookie therefore does not lock out
    /// a client that also sends a valid API key.
    pub async fn resolve_headers(&self, headers: &HeaderMap) -> User {
        for credential in Credential::extract_all(headers, &self.cookie_name) {
            let user = self.resolve(&credential).await;
            if user.is_authenticated() {
                return user;
            }
        }
        User::anonymous()
    }

    /// Resolve a single credential
    pub async fn resolve(&self, credential: &Credential) -> User {
        match credential {
            Credential::ApiKey(key) => self.resolve_api_key(key).await,
            Credential::BearerToken(token) | Credential::CookieToken(token) => {
                self.resolve_token(token).await
            }
        }
    }

    /// Look up a persisted API key and its owner
    pub async fn resolve_api_key(&self, key: &str) -> User {
        let (user, api_key) = match self.users.find_by_api_key(key).await {
            Ok(Some(found)) => found,
            Ok(None) => {
                debug!("Unknown API key presented");
                return User::anonymous();
            }
            Err(e) => {
                warn!("API key lookup failed: {}", e);
                return User::anonymous();
            }
        };

        if api_key.is_expired(self.retention_months, Utc::now()) {
            debug!(
                "API key for user {} expired (issued {})",
                user.id, api_key.created_on
            );
            return User::anonymous();
        }

        user
    }

    /// Verify an access token and load its subject
    ///
    /// Refresh tokens are rejected here; they are only good for minting a new
    /// pair (see [`IdentityResolver::resolve_refresh_token`]).
    pub async fn resolve_token(&self, token: &str) -> User {
        self.resolve_token_of_type(token, TokenType::Access).await
    }

    /// Verify a refresh token and load its subject
    pub async fn resolve_refresh_token(&self, token: &str) -> User {
        self.resolve_token_of_type(token, TokenType::Refresh).await
    }

    async fn resolve_token_of_type(&self, token: &str, expected: TokenType) -> User {
        let claims = match self.tokens.verify_type(token, expected) {
            Ok(claims) => claims,
            Err(e) => {
                debug!("Rejected session token: {}", e);
                return User::anonymous();
            }
        };

        // Role flags are never carried in the token; always re-read them
        match self.users.find_by_id(claims.user_id).await {
            Ok(Some(user)) => user,
            Ok(None) => {
                debug!("Token subject {} no longer exists", claims.user_id);
                User::anonymous()
            }
            Err(e) => {
                warn!("User lookup for token subject failed: {}", e);
                User::anonymous()
            }
        }
    }

    pub fn tokens(&self) -> &TokenAuthority {
        &self.tokens
    }

    pub fn cookie_name(&self) -> &str {
        &self.cookie_name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AuthConfig;
    use crate::model::ApiKey;
    use crate::state::MemoryStore;
    use http::HeaderValue;

    const SECRET: &str = "0123456789abcdef0123456789abcdef";

    async fn fixture() -> (Arc<MemoryStore>, IdentityResolver) {
        let store = Arc::new(MemoryStore::new());
        store
            .add_user(User {
                id: 7,
                name: "alice".to_string(),
                is_admin: false,
                is_staff: false,
            })
            .await;
        store
            .add_api_key(ApiKey {
                key: "fresh-key".to_string(),
                created_on: Utc::now(),
                user_id: 7,
            })
            .await;
        store
            .add_api_key(ApiKey {
                key: "stale-key".to_string(),
                created_on: Utc::now() - chrono::Duration::days(62),
                user_id: 7,
            })
            .await;

        let tokens = TokenAuthority::new(&AuthConfig::new(SECRET)).unwrap();
        let resolver = IdentityResolver::new(store.clone(), tokens, 1, "token");
        (store, resolver)
    }

    #[tokio::test]
    async fn test_fresh_api_key_resolves() {
        let (_, resolver) = fixture().await;
        assert_eq!(resolver.resolve_api_key("fresh-key").await.id, 7);
    }

    #[tokio::test]
    async fn test_stale_or_unknown_api_key_is_anonymous() {
        let (_, resolver) = fixture().await;
        assert!(!resolver.resolve_api_key("stale-key").await.is_authenticated());
        assert!(!resolver.resolve_api_key("nope").await.is_authenticated());
    }

    #[tokio::test]
    async fn test_token_roles_come_from_store() {
        let (store, resolver) = fixture().await;
        let token = resolver.tokens().issue(7, TokenType::Access).unwrap();
        assert!(!resolver.resolve_token(&token).await.is_admin);

        store.set_roles(7, true, false).await;
        assert!(resolver.resolve_token(&token).await.is_admin);
    }

    #[tokio::test]
    async fn test_refresh_token_does_not_authenticate() {
        let (_, resolver) = fixture().await;
        let token = resolver.tokens().issue(7, TokenType::Refresh).unwrap();
        assert!(!resolver.resolve_token(&token).await.is_authenticated());
        assert_eq!(resolver.resolve_refresh_token(&token).await.id, 7);
    }

    #[tokio::test]
    async fn test_invalid_cookie_falls_through_to_api_key() {
        let (_, resolver) = fixture().await;
        let mut headers = HeaderMap::new();
        headers.insert("cookie", HeaderValue::from_static("token=garbage"));
        headers.insert("x-api-key", HeaderValue::from_static("fresh-key"));

        assert_eq!(resolver.resolve_headers(&headers).await.id, 7);
    }

    #[tokio::test]
    async fn test_no_headers_is_anonymous() {
        let (_, resolver) = fixture().await;
        assert_eq!(resolver.resolve_headers(&HeaderMap::new()).await, User::anonymous());
    }
}
