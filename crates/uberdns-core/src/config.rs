//! Configuration types for the UberDNS API core
//!
//! This module defines all configuration structures used throughout the crate.
//! The daemon fills them from environment variables; tests build them directly.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Credential and session token settings
    pub auth: AuthConfig,

    /// Change-notification pipeline settings
    #[serde(default)]
    pub notifier: NotifierConfig,

    /// Defaults applied to newly created records
    #[serde(default)]
    pub records: RecordDefaults,
}

impl ApiConfig {
    /// Create a configuration with the given signing secret and defaults elsewhere
    pub fn new(signing_secret: impl Into<String>) -> Self {
        Self {
            auth: AuthConfig::new(signing_secret),
            notifier: NotifierConfig::default(),
            records: RecordDefaults::default(),
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        self.auth.validate()?;
        self.notifier.validate()?;
        Ok(())
    }
}

/// Authentication configuration
#[derive(Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Shared secret for HS256 token signatures
    pub signing_secret: String,

    /// `iss` claim written into issued tokens
    #[serde(default = "default_issuer")]
    pub issuer: String,

    /// Access token lifetime (seconds)
    #[serde(default = "default_access_ttl_secs")]
    pub access_ttl_secs: u64,

    /// Refresh token lifetime (seconds)
    #[serde(default = "default_refresh_ttl_secs")]
    pub refresh_ttl_secs: u64,

    /// API keys older than this many calendar months resolve to anonymous
    #[serde(default = "default_api_key_retention_months")]
    pub api_key_retention_months: u32,

    /// Name of the cookie carrying the access token
    #[serde(default = "default_cookie_name")]
    pub cookie_name: String,

    /// Max-Age of the access token cookie (seconds)
    #[serde(default = "default_cookie_max_age_secs")]
    pub cookie_max_age_secs: u64,
}

// Keeps the signing secret out of logs
impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("signing_secret", &"<REDACTED>")
            .field("issuer", &self.issuer)
            .field("access_ttl_secs", &self.access_ttl_secs)
            .field("refresh_ttl_secs", &self.refresh_ttl_secs)
            .field("api_key_retention_months", &self.api_key_retention_months)
            .field("cookie_name", &self.cookie_name)
            .field("cookie_max_age_secs", &self.cookie_max_age_secs)
            .finish()
    }
}

impl AuthConfig {
    /// Create an auth configuration with default lifetimes
    pub fn new(signing_secret: impl Into<String>) -> Self {
        Self {
            signing_secret: signing_secret.into(),
            issuer: default_issuer(),
            access_ttl_secs: default_access_ttl_secs(),
            refresh_ttl_secs: default_refresh_ttl_secs(),
            api_key_retention_months: default_api_key_retention_months(),
            cookie_name: default_cookie_name(),
            cookie_max_age_secs: default_cookie_max_age_secs(),
        }
    }

    /// Validate the auth configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.signing_secret.is_empty() {
            return Err(crate::Error::config("Token signing secret cannot be empty"));
        }
        if self.access_ttl_secs == 0 || self.refresh_ttl_secs == 0 {
            return Err(crate::Error::config("Token lifetimes must be > 0"));
        }
        if self.api_key_retention_months == 0 {
            return Err(crate::Error::config("API key retention must be at least one month"));
        }
        if self.cookie_name.is_empty() {
            return Err(crate::Error::config("Token cookie name cannot be empty"));
        }
        Ok(())
    }
}

/// Change-notification pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifierConfig {
    /// Pub/sub channel shared by the domain and record publishers
    #[serde(default = "default_channel_name")]
    pub channel_name: String,

    /// Capacity of each per-kind queue
    ///
    /// When full, handlers wait for the publisher to catch up.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// Deadline for a single publish round-trip (milliseconds)
    #[serde(default = "default_publish_timeout_ms")]
    pub publish_timeout_ms: u64,

    /// Extra publish attempts before a message is dropped
    #[serde(default)]
    pub publish_max_retries: usize,

    /// Delay between publish attempts (milliseconds)
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,

    /// Interval between bus liveness probes (seconds)
    #[serde(default = "default_liveness_interval_secs")]
    pub liveness_interval_secs: u64,

    /// Capacity of the publisher event channel
    ///
    /// When full, new events are dropped (with a warning log).
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,
}

impl NotifierConfig {
    /// Validate the notifier configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.channel_name.is_empty() {
            return Err(crate::Error::config("Cache channel name cannot be empty"));
        }
        if self.queue_capacity == 0 {
            return Err(crate::Error::config("Notification queue capacity must be > 0"));
        }
        if self.publish_timeout_ms == 0 {
            return Err(crate::Error::config("Publish timeout must be > 0"));
        }
        if self.liveness_interval_secs == 0 {
            return Err(crate::Error::config("Liveness interval must be > 0"));
        }
        if self.event_channel_capacity == 0 {
            return Err(crate::Error::config("Event channel capacity must be > 0"));
        }
        Ok(())
    }

    pub fn publish_timeout(&self) -> Duration {
        Duration::from_millis(self.publish_timeout_ms)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn liveness_interval(&self) -> Duration {
        Duration::from_secs(self.liveness_interval_secs)
    }
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            channel_name: default_channel_name(),
            queue_capacity: default_queue_capacity(),
            publish_timeout_ms: default_publish_timeout_ms(),
            publish_max_retries: 0,
            retry_delay_ms: default_retry_delay_ms(),
            liveness_interval_secs: default_liveness_interval_secs(),
            event_channel_capacity: default_event_channel_capacity(),
        }
    }
}

/// Defaults applied to records created through the API
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordDefaults {
    /// TTL handed to the resolver cache (seconds)
    #[serde(default = "default_record_ttl")]
    pub ttl: i64,
}

impl Default for RecordDefaults {
    fn default() -> Self {
        Self {
            ttl: default_record_ttl(),
        }
    }
}

fn default_issuer() -> String {
    "uberdns".to_string()
}

fn default_access_ttl_secs() -> u64 {
    300
}

fn default_refresh_ttl_secs() -> u64 {
    600
}

fn default_api_key_retention_months() -> u32 {
    1
}

fn default_cookie_name() -> String {
    "token".to_string()
}

fn default_cookie_max_age_secs() -> u64 {
    300
}

fn default_channel_name() -> String {
    "uberdns-cache".to_string()
}

fn default_queue_capacity() -> usize {
    1024
}

fn default_publish_timeout_ms() -> u64 {
    2000
}

fn default_retry_delay_ms() -> u64 {
    100
}

fn default_liveness_interval_secs() -> u64 {
    1
}

fn default_event_channel_capacity() -> usize {
    256
}

fn default_record_ttl() -> i64 {
    30
}
