// # uberdns-core
//
// Core library for the UberDNS management API.
//
// ## Architecture Overview
//
// This library provides the two subsystems every mutating API request goes
// through:
// - **Credential**: Pulls an API key, bearer token or `token` cookie out of a request
// - **TokenAuthority**: Issues and verifies signed session tokens
// - **IdentityResolver**: Turns any credential into a `User` (anonymous on failure)
// - **authz**: Ownership and role predicates guarding every mutation
// - **ChangeNotifier**: Per-entity-kind queues fed by request handlers
// - **InvalidationPublisher**: Workers draining the queues onto the pub/sub bus
// - **ManagementService**: The handler logic tying the above to the stores
//
// ## Design Principles
//
// 1. **Explicit wiring**: Stores, bus and queues are constructed once and passed in
// 2. **Total identity resolution**: Bad credentials degrade to the anonymous user
// 3. **Fail the request, not the process**: Store and bus errors become 5xx results
// 4. **Fire-and-forget delivery**: A failed publish is logged and dropped

pub mod auth;
pub mod config;
pub mod error;
pub mod model;
pub mod notify;
pub mod service;
pub mod state;
pub mod traits;

// Re-export core types for convenience
pub use auth::{Credential, IdentityResolver, TokenAuthority, TokenPair};
pub use config::{ApiConfig, AuthConfig, NotifierConfig};
pub use error::{Error, Result};
pub use model::{CacheAction, CacheControlMessage, Domain, EntityKind, Record, User};
pub use notify::{ChangeNotifier, NotificationPipeline, PipelineHandle, PublisherEvent};
pub use service::ManagementService;
pub use state::MemoryStore;
pub use traits::{DnsStore, PubSubBus, UserStore};
