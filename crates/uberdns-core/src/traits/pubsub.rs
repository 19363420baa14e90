// # Pub/Sub Bus Trait
//
// Defines the interface for emitting cache control messages to the resolver.
//
// ## Implementations
//
// - Redis: `uberdns-bus-redis` crate
//
// ## Delivery
//
// Fire-and-forget. A successful `publish` means the broker accepted the
// payload, not that any resolver applied it.

use async_trait::async_trait;

/// Trait for pub/sub bus implementations
///
/// # Thread Safety
///
/// One instance is shared by both publisher workers and the liveness prober,
/// so `publish` and `ping` must be safe to call concurrently.
///
/// # Implementation Guidelines
///
/// - **Single shot**: No retries inside `publish`; the publisher owns retry policy
/// - **No timeouts required**: The publisher wraps each call in its own deadline
/// - **No background tasks**: Liveness probing is owned by the pipeline
#[async_trait]
pub trait PubSubBus: Send + Sync {
    /// Publish one payload on a channel
    ///
    /// # Parameters
    ///
    /// - `channel`: Channel name shared by every message kind
    /// - `payload`: Serialized `CacheControlMessage`
    async fn publish(&self, channel: &str, payload: &str) -> Result<(), crate::Error>;

    /// Round-trip a no-op command to check the broker is reachable
    async fn ping(&self) -> Result<(), crate::Error>;

    /// Human-readable bus name for logs
    fn bus_name(&self) -> &'static str;
}
