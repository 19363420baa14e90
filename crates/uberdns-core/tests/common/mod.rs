//! Test doubles and common utilities for the contract tests
//!
//! Buses here only record what reaches them; the store is the real
//! `MemoryStore`, seeded with a fixed cast of users.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use http::{HeaderMap, HeaderValue};
use tokio::sync::mpsc;

use uberdns_core::auth::password;
use uberdns_core::model::{ApiKey, NewDomain};
use uberdns_core::{
    ApiConfig, CacheControlMessage, DnsStore, EntityKind, Error, ManagementService, MemoryStore,
    NotificationPipeline, PipelineHandle, PubSubBus, PublisherEvent, User,
};

pub const SECRET: &str = "contract-test-secret-0123456789abcdef";
pub const ALICE_PASSWORD: &str = "correct horse battery staple";

pub const ALICE: i64 = 7;
pub const BOB: i64 = 8;
pub const ADMIN: i64 = 1;
pub const STAFF: i64 = 2;

/// A bus that records every payload it accepts
///
/// Can be told to fail its first N publishes, or to fail pings.
pub struct RecordingBus {
    published: Arc<Mutex<Vec<(String, String)>>>,
    publish_calls: Arc<AtomicUsize>,
    ping_calls: Arc<AtomicUsize>,
    failures_left: Arc<AtomicUsize>,
    ping_fails: Arc<AtomicBool>,
}

impl RecordingBus {
    pub fn new() -> Self {
        Self::failing_first(0)
    }

    pub fn failing_first(failures: usize) -> Self {
        Self {
            published: Arc::new(Mutex::new(Vec::new())),
            publish_calls: Arc::new(AtomicUsize::new(0)),
            ping_calls: Arc::new(AtomicUsize::new(0)),
            failures_left: Arc::new(AtomicUsize::new(failures)),
            ping_fails: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn publish_calls(&self) -> usize {
        self.publish_calls.load(Ordering::SeqCst)
    }

    pub fn ping_calls(&self) -> usize {
        self.ping_calls.load(Ordering::SeqCst)
    }

    pub fn set_ping_fails(&self, fails: bool) {
        self.ping_fails.store(fails, Ordering::SeqCst);
    }

    /// Channels every accepted payload was published on
    pub fn channels(&self) -> Vec<String> {
        self.published
            .lock()
            .unwrap()
            .iter()
            .map(|(channel, _)| channel.clone())
            .collect()
    }

    /// Accepted messages, decoded, in publish order
    pub fn messages(&self) -> Vec<CacheControlMessage> {
        self.published
            .lock()
            .unwrap()
            .iter()
            .map(|(_, payload)| serde_json::from_str(payload).expect("payload is a control message"))
            .collect()
    }

    /// Accepted messages of one kind, in publish order
    pub fn messages_of(&self, kind: EntityKind) -> Vec<CacheControlMessage> {
        self.messages().into_iter().filter(|m| m.kind == kind).collect()
    }
}

#[async_trait]
impl PubSubBus for RecordingBus {
    async fn publish(&self, channel: &str, payload: &str) -> Result<(), Error> {
        self.publish_calls.fetch_add(1, Ordering::SeqCst);

        let left = self.failures_left.load(Ordering::SeqCst);
        if left > 0 {
            self.failures_left.store(left - 1, Ordering::SeqCst);
            return Err(Error::bus("simulated broker failure"));
        }

        self.published
            .lock()
            .unwrap()
            .push((channel.to_string(), payload.to_string()));
        Ok(())
    }

    async fn ping(&self) -> Result<(), Error> {
        self.ping_calls.fetch_add(1, Ordering::SeqCst);
        if self.ping_fails.load(Ordering::SeqCst) {
            return Err(Error::bus("simulated broker down"));
        }
        Ok(())
    }

    fn bus_name(&self) -> &'static str {
        "recording"
    }
}

/// A bus whose first N publishes never complete
pub struct StallingBus {
    stalls_left: AtomicUsize,
    pub inner: RecordingBus,
}

impl StallingBus {
    pub fn stalling_first(stalls: usize) -> Self {
        Self {
            stalls_left: AtomicUsize::new(stalls),
            inner: RecordingBus::new(),
        }
    }
}

#[async_trait]
impl PubSubBus for StallingBus {
    async fn publish(&self, channel: &str, payload: &str) -> Result<(), Error> {
        let left = self.stalls_left.load(Ordering::SeqCst);
        if left > 0 {
            self.stalls_left.store(left - 1, Ordering::SeqCst);
            std::future::pending::<()>().await;
        }
        self.inner.publish(channel, payload).await
    }

    async fn ping(&self) -> Result<(), Error> {
        self.inner.ping().await
    }

    fn bus_name(&self) -> &'static str {
        "stalling"
    }
}

/// A bus that takes a while for every publish
pub struct SlowBus {
    delay: Duration,
    pub inner: RecordingBus,
}

impl SlowBus {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            inner: RecordingBus::new(),
        }
    }
}

#[async_trait]
impl PubSubBus for SlowBus {
    async fn publish(&self, channel: &str, payload: &str) -> Result<(), Error> {
        tokio::time::sleep(self.delay).await;
        self.inner.publish(channel, payload).await
    }

    async fn ping(&self) -> Result<(), Error> {
        self.inner.ping().await
    }

    fn bus_name(&self) -> &'static str {
        "slow"
    }
}

/// Configuration with short deadlines so failure paths finish quickly
pub fn test_config() -> ApiConfig {
    let mut config = ApiConfig::new(SECRET);
    config.notifier.publish_timeout_ms = 200;
    config.notifier.retry_delay_ms = 10;
    config.notifier.liveness_interval_secs = 1;
    config
}

fn user(id: i64, name: &str, is_admin: bool, is_staff: bool) -> User {
    User {
        id,
        name: name.to_string(),
        is_admin,
        is_staff,
    }
}

/// Store with alice (7), bob (8), an admin (1), a staff member (2) and the
/// `example.com` domain
///
/// API keys: `alice-key` and `bob-key` are fresh, `stale-key` (bob's) was
/// issued two months ago.
pub async fn seeded_store() -> Arc<MemoryStore> {
    let store = Arc::new(MemoryStore::new());

    let hash = password::hash(ALICE_PASSWORD, 1_000).expect("hashing succeeds");
    store
        .add_user_with_password(user(ALICE, "alice", false, false), hash)
        .await;
    store.add_user(user(BOB, "bob", false, false)).await;
    store.add_user(user(ADMIN, "admin", true, false)).await;
    store.add_user(user(STAFF, "staff", false, true)).await;

    for (key, user_id, age_days) in [
        ("alice-key", ALICE, 0),
        ("bob-key", BOB, 0),
        ("admin-key", ADMIN, 0),
        ("staff-key", STAFF, 0),
        ("stale-key", BOB, 62),
    ] {
        store
            .add_api_key(ApiKey {
                key: key.to_string(),
                created_on: Utc::now() - chrono::Duration::days(age_days),
                user_id,
            })
            .await;
    }

    store
        .insert_domain(NewDomain {
            name: "example.com".to_string(),
            created_on: Utc::now(),
        })
        .await
        .expect("domain insert succeeds");

    store
}

/// Everything a contract test needs, wired the way the daemon wires it
pub struct Harness<B> {
    pub service: ManagementService,
    pub store: Arc<MemoryStore>,
    pub bus: Arc<B>,
    pub handle: PipelineHandle,
    pub events: mpsc::Receiver<PublisherEvent>,
}

pub async fn harness<B: PubSubBus + 'static>(bus: B) -> Harness<B> {
    harness_with_config(bus, test_config()).await
}

pub async fn harness_with_config<B: PubSubBus + 'static>(bus: B, config: ApiConfig) -> Harness<B> {
    let store = seeded_store().await;
    let bus = Arc::new(bus);

    let (notifier, handle, events) =
        NotificationPipeline::start(bus.clone(), config.notifier.clone()).expect("pipeline starts");
    let service = ManagementService::new(store.clone(), store.clone(), notifier, config)
        .expect("service wiring succeeds");

    Harness {
        service,
        store,
        bus,
        handle,
        events,
    }
}

pub fn api_key_headers(key: &'static str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert("x-api-key", HeaderValue::from_static(key));
    headers
}

pub fn bearer_headers(token: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(
        "authorization",
        HeaderValue::from_str(&format!("Bearer {}", token)).expect("token is header-safe"),
    );
    headers
}

pub fn cookie_headers(token: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(
        "cookie",
        HeaderValue::from_str(&format!("token={}", token)).expect("token is header-safe"),
    );
    headers
}

/// Collect pipeline events until `done` says so, or five seconds pass
pub async fn collect_events(
    events: &mut mpsc::Receiver<PublisherEvent>,
    mut done: impl FnMut(&[PublisherEvent]) -> bool,
) -> Vec<PublisherEvent> {
    let mut seen = Vec::new();
    let _ = tokio::time::timeout(Duration::from_secs(5), async {
        while let Some(event) = events.recv().await {
            seen.push(event);
            if done(&seen) {
                break;
            }
        }
    })
    .await;
    seen
}

/// Wait until `n` messages of `kind` reached a terminal state
pub async fn wait_for_terminal(
    events: &mut mpsc::Receiver<PublisherEvent>,
    kind: EntityKind,
    n: usize,
) -> Vec<PublisherEvent> {
    collect_events(events, |seen| count_terminal(seen, kind) >= n).await
}

pub fn count_terminal(events: &[PublisherEvent], kind: EntityKind) -> usize {
    events
        .iter()
        .filter(|e| match e {
            PublisherEvent::Published { kind: k, .. } | PublisherEvent::PublishFailed { kind: k, .. } => {
                *k == kind
            }
            _ => false,
        })
        .count()
}

pub fn count_published(events: &[PublisherEvent], kind: EntityKind) -> usize {
    events
        .iter()
        .filter(|e| matches!(e, PublisherEvent::Published { kind: k, .. } if *k == kind))
        .count()
}
