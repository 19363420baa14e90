//! Core traits for the UberDNS API
//!
//! This module defines the boundaries to the collaborators this crate does not own.
//!
//! - [`UserStore`]: Users, password hashes and API keys
//! - [`DnsStore`]: Domain and record rows
//! - [`PubSubBus`]: The channel the resolver cache listens on

pub mod dns_store;
pub mod pubsub;
pub mod user_store;

pub use dns_store::DnsStore;
pub use pubsub::PubSubBus;
pub use user_store::UserStore;
