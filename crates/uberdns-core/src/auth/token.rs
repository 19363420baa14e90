//! Session tokens
//!
//! Short-lived HS256 JSON Web Tokens signed with the shared secret from
//! [`AuthConfig`]. Tokens are self-contained and never persisted; they carry
//! only the user id, never role flags.
//!
//! Claims: `{"token_type","user_id","jti","exp","iss"}`. Signature, algorithm
//! and issuer are checked by `jsonwebtoken`; expiry is checked here against an
//! explicit clock so tests can pin it.

use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::AuthConfig;

/// Access tokens authenticate requests; refresh tokens only mint new pairs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Access,
    Refresh,
}

/// Decoded claims of a verified token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub token_type: TokenType,
    pub user_id: i64,
    /// Unique token id (UUID v4)
    pub jti: String,
    /// Expiry, unix seconds
    pub exp: i64,
    pub iss: String,
}

/// Why a token was rejected
///
/// Every variant means "treat the caller as anonymous"; the distinction only
/// feeds the debug log.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenError {
    #[error("malformed token: {0}")]
    Malformed(String),

    #[error("signature mismatch")]
    BadSignature,

    #[error("token issued by someone else")]
    WrongIssuer,

    #[error("token expired")]
    Expired,

    #[error("expected {expected:?} token, got {found:?}")]
    WrongType {
        expected: TokenType,
        found: TokenType,
    },
}

impl From<TokenError> for crate::Error {
    fn from(err: TokenError) -> Self {
        crate::Error::invalid_credential(err.to_string())
    }
}

impl From<jsonwebtoken::errors::Error> for TokenError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        match err.kind() {
            ErrorKind::InvalidSignature => TokenError::BadSignature,
            ErrorKind::InvalidIssuer => TokenError::WrongIssuer,
            _ => TokenError::Malformed(err.to_string()),
        }
    }
}

/// Access + refresh token pair handed to a client after login
///
/// Serializes as `{"access":"<token>","refresh":"<token>"}`.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPair {
    pub access: String,
    pub refresh: String,
}

impl std::fmt::Debug for TokenPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenPair")
            .field("access", &"<REDACTED>")
            .field("refresh", &"<REDACTED>")
            .finish()
    }
}

impl TokenPair {
    pub fn to_json(&self) -> crate::Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Issues and verifies session tokens
///
/// Stateless apart from the keys and lifetimes; verification is a pure
/// function of the token, the secret, the issuer and the clock.
#[derive(Clone)]
pub struct TokenAuthority {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    issuer: String,
    access_ttl_secs: i64,
    refresh_ttl_secs: i64,
}

impl std::fmt::Debug for TokenAuthority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenAuthority")
            .field("secret", &"<REDACTED>")
            .field("issuer", &self.issuer)
            .field("access_ttl_secs", &self.access_ttl_secs)
            .field("refresh_ttl_secs", &self.refresh_ttl_secs)
            .finish()
    }
}

impl TokenAuthority {
    /// Create an authority from the auth configuration
    pub fn new(config: &AuthConfig) -> crate::Result<Self> {
        if config.signing_secret.is_empty() {
            return Err(crate::Error::config("Token signing secret cannot be empty"));
        }

        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.set_required_spec_claims(&["exp", "iss"]);
        validation.set_issuer(&[config.issuer.as_str()]);

        let secret = config.signing_secret.as_bytes();
        Ok(Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            validation,
            issuer: config.issuer.clone(),
            access_ttl_secs: secs(config.access_ttl_secs),
            refresh_ttl_secs: secs(config.refresh_ttl_secs),
        })
    }

    /// Issue a token of the given type for a user, expiring relative to now
    pub fn issue(&self, user_id: i64, token_type: TokenType) -> crate::Result<String> {
        self.issue_at(user_id, token_type, chrono::Utc::now().timestamp())
    }

    /// Issue a token as if the current time were `now` (unix seconds)
    pub fn issue_at(&self, user_id: i64, token_type: TokenType, now: i64) -> crate::Result<String> {
        let ttl = match token_type {
            TokenType::Access => self.access_ttl_secs,
            TokenType::Refresh => self.refresh_ttl_secs,
        };

        let claims = Claims {
            token_type,
            user_id,
            jti: uuid::Uuid::new_v4().to_string(),
            exp: now.saturating_add(ttl),
            iss: self.issuer.clone(),
        };

        self.sign(&claims)
    }

    /// Issue a fresh access + refresh pair
    pub fn issue_pair(&self, user_id: i64) -> crate::Result<TokenPair> {
        Ok(TokenPair {
            access: self.issue(user_id, TokenType::Access)?,
            refresh: self.issue(user_id, TokenType::Refresh)?,
        })
    }

    /// Sign arbitrary claims
    ///
    /// Exposed so tests can mint tokens with hand-picked expiry.
    pub fn sign(&self, claims: &Claims) -> crate::Result<String> {
        jsonwebtoken::encode(&Header::new(Algorithm::HS256), claims, &self.encoding_key)
            .map_err(|e| crate::Error::config(format!("cannot sign token: {}", e)))
    }

    /// Verify a token against the current time
    pub fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        self.verify_at(token, chrono::Utc::now().timestamp())
    }

    /// Verify a token as if the current time were `now` (unix seconds)
    ///
    /// The signature is checked before the claims are decoded, so an expired
    /// token signed with another secret reports `BadSignature`.
    pub fn verify_at(&self, token: &str, now: i64) -> Result<Claims, TokenError> {
        if token.split('.').count() != 3 {
            return Err(TokenError::Malformed("expected three segments".to_string()));
        }

        let claims =
            jsonwebtoken::decode::<Claims>(token, &self.decoding_key, &self.validation)?.claims;
        if claims.exp <= now {
            return Err(TokenError::Expired);
        }

        Ok(claims)
    }

    /// Verify and require a specific token type
    pub fn verify_type(&self, token: &str, expected: TokenType) -> Result<Claims, TokenError> {
        let claims = self.verify(token)?;
        if claims.token_type != expected {
            return Err(TokenError::WrongType {
                expected,
                found: claims.token_type,
            });
        }
        Ok(claims)
    }
}

fn secs(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::Engine;
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;

    const NOW: i64 = 1_700_000_000;

    fn authority(secret: &str) -> TokenAuthority {
        TokenAuthority::new(&AuthConfig::new(secret)).unwrap()
    }

    #[test]
    fn test_issue_and_verify() {
        let auth = authority("secret-one");
        let token = auth.issue_at(7, TokenType::Access, NOW).unwrap();

        let claims = auth.verify_at(&token, NOW + 10).unwrap();
        assert_eq!(claims.user_id, 7);
        assert_eq!(claims.token_type, TokenType::Access);
        assert_eq!(claims.exp, NOW + 300);
        assert_eq!(claims.iss, "uberdns");
        assert!(uuid::Uuid::parse_str(&claims.jti).is_ok());
    }

    #[test]
    fn test_refresh_lifetime() {
        let auth = authority("secret-one");
        let token = auth.issue_at(7, TokenType::Refresh, NOW).unwrap();
        assert_eq!(auth.verify_at(&token, NOW).unwrap().exp, NOW + 600);
    }

    #[test]
    fn test_expired_token_rejected() {
        let auth = authority("secret-one");
        let token = auth.issue_at(7, TokenType::Access, NOW).unwrap();

        assert_eq!(auth.verify_at(&token, NOW + 300), Err(TokenError::Expired));
        assert_eq!(auth.verify_at(&token, NOW + 10_000), Err(TokenError::Expired));
    }

    #[test]
    fn test_foreign_secret_rejected() {
        let ours = authority("secret-one");
        let theirs = authority("secret-two");

        let fresh = theirs.issue_at(7, TokenType::Access, NOW).unwrap();
        assert_eq!(ours.verify_at(&fresh, NOW), Err(TokenError::BadSignature));

        let stale = theirs.issue_at(7, TokenType::Access, NOW - 10_000).unwrap();
        assert_eq!(ours.verify_at(&stale, NOW), Err(TokenError::BadSignature));
    }

    #[test]
    fn test_foreign_issuer_rejected() {
        let ours = authority("secret-one");

        let mut config = AuthConfig::new("secret-one");
        config.issuer = "someone-else".to_string();
        let theirs = TokenAuthority::new(&config).unwrap();

        let token = theirs.issue_at(7, TokenType::Access, NOW).unwrap();
        assert_eq!(ours.verify_at(&token, NOW), Err(TokenError::WrongIssuer));
        assert!(theirs.verify_at(&token, NOW).is_ok());
    }

    #[test]
    fn test_other_algorithm_rejected() {
        let auth = authority("secret-one");
        let token = auth.issue_at(7, TokenType::Access, NOW).unwrap();

        let none_header = URL_SAFE_NO_PAD.encode(br#"{"alg":"none","typ":"JWT"}"#);
        let parts: Vec<&str> = token.split('.').collect();
        let forged = format!("{}.{}.{}", none_header, parts[1], parts[2]);

        assert!(matches!(auth.verify_at(&forged, NOW), Err(TokenError::Malformed(_))));
    }

    #[test]
    fn test_tampered_claims_rejected() {
        let auth = authority("secret-one");
        let token = auth.issue_at(7, TokenType::Access, NOW).unwrap();

        let forged_claims = URL_SAFE_NO_PAD.encode(
            serde_json::to_vec(&Claims {
                token_type: TokenType::Access,
                user_id: 1,
                jti: "x".to_string(),
                exp: NOW + 300,
                iss: "uberdns".to_string(),
            })
            .unwrap(),
        );
        let parts: Vec<&str> = token.split('.').collect();
        let forged = format!("{}.{}.{}", parts[0], forged_claims, parts[2]);

        assert_eq!(auth.verify_at(&forged, NOW), Err(TokenError::BadSignature));
    }

    #[test]
    fn test_garbage_is_malformed() {
        let auth = authority("secret-one");
        for garbage in ["", "abc", "a.b", "a.b.c.d", "!!.??.##"] {
            assert!(
                matches!(auth.verify_at(garbage, NOW), Err(TokenError::Malformed(_))),
                "{:?} should be malformed",
                garbage
            );
        }
    }

    #[test]
    fn test_pair_json_shape() {
        let auth = authority("secret-one");
        let pair = auth.issue_pair(3).unwrap();
        let json: serde_json::Value = serde_json::from_str(&pair.to_json().unwrap()).unwrap();

        assert!(json["access"].is_string());
        assert!(json["refresh"].is_string());
        assert_eq!(
            auth.verify_type(&pair.refresh, TokenType::Access),
            Err(TokenError::WrongType {
                expected: TokenType::Access,
                found: TokenType::Refresh,
            })
        );
    }
}
