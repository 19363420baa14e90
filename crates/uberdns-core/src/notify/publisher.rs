//! Consumer side of the notification pipeline
//!
//! One [`InvalidationPublisher`] per entity kind drains its queue in FIFO
//! order onto the shared cache channel. A [`LivenessProber`] pings the bus on
//! a fixed interval, independent of message flow.
//!
//! ## Message lifecycle
//!
//! ```text
//! Enqueued ──► Serialized ──► Published       (terminal)
//!                         └─► PublishFailed   (terminal, dropped)
//! ```
//!
//! A failed or timed-out publish is retried up to `publish_max_retries`
//! times, then logged and dropped. Nothing a publish does can stop the worker.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio_stream::StreamExt;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, error, info, warn};

use super::PublisherEvent;
use crate::config::NotifierConfig;
use crate::error::Error;
use crate::model::{CacheControlMessage, EntityKind};
use crate::traits::PubSubBus;

/// Where a single control message ended up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageState {
    Enqueued,
    Serialized,
    Published,
    PublishFailed,
}

impl MessageState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, MessageState::Published | MessageState::PublishFailed)
    }
}

/// Worker draining one entity kind's queue onto the bus
pub struct InvalidationPublisher {
    kind: EntityKind,
    bus: Arc<dyn PubSubBus>,
    channel: String,
    publish_timeout: Duration,
    max_retries: usize,
    retry_delay: Duration,
    event_tx: mpsc::Sender<PublisherEvent>,
}

impl InvalidationPublisher {
    pub fn new(
        kind: EntityKind,
        bus: Arc<dyn PubSubBus>,
        config: &NotifierConfig,
        event_tx: mpsc::Sender<PublisherEvent>,
    ) -> Self {
        Self {
            kind,
            bus,
            channel: config.channel_name.clone(),
            publish_timeout: config.publish_timeout(),
            max_retries: config.publish_max_retries,
            retry_delay: config.retry_delay(),
            event_tx,
        }
    }

    /// Run until shutdown is signalled or every producer is gone
    ///
    /// On shutdown the queue is closed to new messages and whatever was
    /// already accepted is still published before the worker returns.
    pub async fn run(
        self,
        queue: mpsc::Receiver<CacheControlMessage>,
        mut shutdown_rx: watch::Receiver<bool>,
    ) {
        info!(
            "{} publisher started on channel {} via {}",
            self.kind,
            self.channel,
            self.bus.bus_name()
        );
        emit_event(&self.event_tx, PublisherEvent::Started { kind: self.kind });

        let mut stream = ReceiverStream::new(queue);
        let mut drained = 0;

        loop {
            tokio::select! {
                next = stream.next() => match next {
                    Some(message) => {
                        self.publish(message).await;
                    }
                    None => {
                        debug!("All {} producers dropped", self.kind);
                        break;
                    }
                },

                _ = shutdown_rx.changed() => {
                    info!("{} publisher draining before shutdown", self.kind);
                    stream.close();
                    while let Some(message) = stream.next().await {
                        self.publish(message).await;
                        drained += 1;
                    }
                    break;
                }
            }
        }

        info!("{} publisher stopped ({} drained)", self.kind, drained);
        emit_event(
            &self.event_tx,
            PublisherEvent::Stopped {
                kind: self.kind,
                drained,
            },
        );
    }

    /// Take one dequeued message to a terminal state
    pub async fn publish(&self, message: CacheControlMessage) -> MessageState {
        let action = message.action;

        let payload = match message.to_payload() {
            Ok(payload) => payload,
            Err(e) => {
                error!("Dropping unserializable {}/{} message: {}", action, self.kind, e);
                emit_event(
                    &self.event_tx,
                    PublisherEvent::PublishFailed {
                        kind: self.kind,
                        action,
                        error: e.to_string(),
                        attempts: 0,
                    },
                );
                return MessageState::PublishFailed;
            }
        };
        debug!("{}/{} {:?}", action, self.kind, MessageState::Serialized);

        let mut last_error = None;
        for attempt in 0..=self.max_retries {
            match self.publish_once(&payload).await {
                Ok(()) => {
                    debug!(
                        "Published {}/{} on {} (attempt {})",
                        action,
                        self.kind,
                        self.channel,
                        attempt + 1
                    );
                    emit_event(
                        &self.event_tx,
                        PublisherEvent::Published {
                            kind: self.kind,
                            action,
                            attempts: attempt + 1,
                        },
                    );
                    return MessageState::Published;
                }
                Err(e) => {
                    warn!(
                        "Publish attempt {} failed for {}/{}: {}",
                        attempt + 1,
                        action,
                        self.kind,
                        e
                    );
                    last_error = Some(e);

                    if attempt < self.max_retries {
                        tokio::time::sleep(self.retry_delay).await;
                    }
                }
            }
        }

        let error = last_error.unwrap_or_else(|| Error::bus("publish never attempted"));
        error!("Dropping {}/{} message: {}", action, self.kind, error);
        emit_event(
            &self.event_tx,
            PublisherEvent::PublishFailed {
                kind: self.kind,
                action,
                error: error.to_string(),
                attempts: self.max_retries + 1,
            },
        );
        MessageState::PublishFailed
    }

    async fn publish_once(&self, payload: &str) -> Result<(), Error> {
        match tokio::time::timeout(self.publish_timeout, self.bus.publish(&self.channel, payload))
            .await
        {
            Ok(result) => result,
            Err(_) => Err(Error::timeout(format!(
                "publish to {} exceeded {:?}",
                self.bus.bus_name(),
                self.publish_timeout
            ))),
        }
    }
}

/// Periodic bus health check
///
/// Purely observational: it never touches the queues. Only transitions are
/// logged at info/warn so a steady state stays quiet.
pub struct LivenessProber {
    bus: Arc<dyn PubSubBus>,
    interval: Duration,
    timeout: Duration,
    event_tx: mpsc::Sender<PublisherEvent>,
}

impl LivenessProber {
    pub fn new(
        bus: Arc<dyn PubSubBus>,
        config: &NotifierConfig,
        event_tx: mpsc::Sender<PublisherEvent>,
    ) -> Self {
        Self {
            bus,
            interval: config.liveness_interval(),
            timeout: config.publish_timeout(),
            event_tx,
        }
    }

    pub async fn run(self, mut shutdown_rx: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        let mut reachable: Option<bool> = None;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    reachable = Some(self.probe(reachable).await);
                }

                _ = shutdown_rx.changed() => {
                    debug!("Liveness prober stopped");
                    break;
                }
            }
        }
    }

    async fn probe(&self, was_reachable: Option<bool>) -> bool {
        let result = match tokio::time::timeout(self.timeout, self.bus.ping()).await {
            Ok(result) => result,
            Err(_) => Err(Error::timeout(format!("ping exceeded {:?}", self.timeout))),
        };

        match (result, was_reachable) {
            (Ok(()), Some(false)) => {
                info!("{} bus reachable again", self.bus.bus_name());
                emit_event(&self.event_tx, PublisherEvent::BusRecovered);
                true
            }
            (Ok(()), _) => {
                debug!("{} bus ping ok", self.bus.bus_name());
                true
            }
            (Err(e), Some(false)) => {
                debug!("{} bus still unreachable: {}", self.bus.bus_name(), e);
                false
            }
            (Err(e), _) => {
                warn!("{} bus unreachable: {}", self.bus.bus_name(), e);
                emit_event(
                    &self.event_tx,
                    PublisherEvent::BusUnreachable {
                        error: e.to_string(),
                    },
                );
                false
            }
        }
    }
}

/// Emit a pipeline event without ever blocking the worker
fn emit_event(event_tx: &mpsc::Sender<PublisherEvent>, event: PublisherEvent) {
    if event_tx.try_send(event).is_err() {
        // Full (nobody draining) or closed (receiver dropped); both are fine
        warn!("Pipeline event channel full, dropping event");
    }
}
