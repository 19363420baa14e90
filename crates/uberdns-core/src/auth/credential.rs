//! Credential extraction
//!
//! Pulls raw credential material out of request headers. Nothing here
//! validates anything: a garbage token is still a `CookieToken`, and it is the
//! identity resolver's job to turn it into the anonymous user.

use http::HeaderMap;
use http::header::{AUTHORIZATION, COOKIE};

/// Header carrying a long-lived API key
pub const API_KEY_HEADER: &str = "x-api-key";

/// Raw credential presented with a request
#[derive(Clone, PartialEq, Eq)]
pub enum Credential {
    /// `X-Api-Key: <key>`
    ApiKey(String),
    /// `Authorization: Bearer <token>`
    BearerToken(String),
    /// `Cookie: token=<token>`
    CookieToken(String),
}

// Credentials are secrets; only the variant is printed
impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Credential::ApiKey(_) => "ApiKey(<REDACTED>)",
            Credential::BearerToken(_) => "BearerToken(<REDACTED>)",
            Credential::CookieToken(_) => "CookieToken(<REDACTED>)",
        })
    }
}

impl Credential {
    /// Every credential candidate in the request, highest precedence first
    ///
    /// Order: session cookie, bearer token, API key. Browser sessions win over
    /// a key that happens to be configured in the same client; machine clients
    /// that only send `X-Api-Key` still authenticate because the resolver falls
    /// through to the next candidate when a session token is invalid.
    pub fn extract_all(headers: &HeaderMap, cookie_name: &str) -> Vec<Credential> {
        let mut found = Vec::with_capacity(3);

        if let Some(token) = cookie_value(headers, cookie_name) {
            found.push(Credential::CookieToken(token));
        }
        if let Some(token) = bearer_token(headers) {
            found.push(Credential::BearerToken(token));
        }
        if let Some(key) = header_value(headers, API_KEY_HEADER) {
            found.push(Credential::ApiKey(key));
        }

        found
    }

    /// The highest-precedence credential, if any
    pub fn extract(headers: &HeaderMap, cookie_name: &str) -> Option<Credential> {
        Self::extract_all(headers, cookie_name).into_iter().next()
    }
}

fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?.trim();
    let (scheme, token) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then(|| token.to_string())
}

fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(k, _)| k.trim() == name)
        .map(|(_, v)| v.trim().trim_matches('"').to_string())
        .filter(|v| !v.is_empty())
}
