//! Change-notification pipeline
//!
//! Decouples a mutating request from telling the resolver cache about it.
//!
//! ## Architecture
//!
//! ```text
//!  handlers ──► ChangeNotifier ──┬─► domain queue ──► InvalidationPublisher ──┐
//!                                └─► record queue ──► InvalidationPublisher ──┼─► PubSubBus
//!                                                     LivenessProber ─────────┘
//! ```
//!
//! ## Lifecycle
//!
//! 1. [`NotificationPipeline::start`] creates the queues and spawns the workers
//! 2. Handlers enqueue through clones of the returned [`ChangeNotifier`]
//! 3. [`PipelineHandle::shutdown`] stops intake, drains what was accepted and
//!    waits for every worker
//!
//! Delivery is fire-and-forget. A message is "eventually published" at best;
//! nothing is persisted and the downstream resolver never acknowledges.

pub mod publisher;
pub mod queue;

use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::config::NotifierConfig;
use crate::error::Result;
use crate::model::{CacheAction, EntityKind};
use crate::traits::PubSubBus;

pub use publisher::{InvalidationPublisher, LivenessProber, MessageState};
pub use queue::ChangeNotifier;

/// Events emitted by the pipeline workers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublisherEvent {
    /// Worker for a kind is running
    Started { kind: EntityKind },

    /// A message reached the bus
    Published {
        kind: EntityKind,
        action: CacheAction,
        attempts: usize,
    },

    /// A message was dropped after its last attempt
    PublishFailed {
        kind: EntityKind,
        action: CacheAction,
        error: String,
        attempts: usize,
    },

    /// Liveness probe started failing
    BusUnreachable { error: String },

    /// Liveness probe succeeded after failing
    BusRecovered,

    /// Worker for a kind returned
    Stopped { kind: EntityKind, drained: usize },
}

/// Entry point for starting the pipeline
pub struct NotificationPipeline;

impl NotificationPipeline {
    /// Create both queues and spawn the publisher workers and liveness prober
    ///
    /// Must be called from inside a tokio runtime.
    ///
    /// # Returns
    ///
    /// A tuple of (notifier for handlers, handle for shutdown, event receiver)
    pub fn start(
        bus: Arc<dyn PubSubBus>,
        config: NotifierConfig,
    ) -> Result<(ChangeNotifier, PipelineHandle, mpsc::Receiver<PublisherEvent>)> {
        config.validate()?;

        let (event_tx, event_rx) = mpsc::channel(config.event_channel_capacity);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let (domain_tx, domain_rx) = mpsc::channel(config.queue_capacity);
        let (record_tx, record_rx) = mpsc::channel(config.queue_capacity);

        let mut tasks = Vec::with_capacity(3);
        for (kind, queue) in [
            (EntityKind::Domain, domain_rx),
            (EntityKind::Record, record_rx),
        ] {
            let worker = InvalidationPublisher::new(kind, bus.clone(), &config, event_tx.clone());
            tasks.push(tokio::spawn(worker.run(queue, shutdown_rx.clone())));
        }

        let prober = LivenessProber::new(bus.clone(), &config, event_tx);
        tasks.push(tokio::spawn(prober.run(shutdown_rx)));

        info!(
            "Notification pipeline started (channel: {}, bus: {})",
            config.channel_name,
            bus.bus_name()
        );

        Ok((
            ChangeNotifier::new(domain_tx, record_tx),
            PipelineHandle { shutdown_tx, tasks },
            event_rx,
        ))
    }
}

/// Owner of the pipeline's background tasks
pub struct PipelineHandle {
    shutdown_tx: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
}

impl PipelineHandle {
    /// Stop intake, publish everything already queued, and wait for all workers
    ///
    /// Notifiers still held by handlers get a `Bus` error from this point on.
    pub async fn shutdown(self) {
        info!("Shutting down notification pipeline");
        let _ = self.shutdown_tx.send(true);

        for task in self.tasks {
            if let Err(e) = task.await {
                warn!("Pipeline task ended abnormally: {}", e);
            }
        }

        info!("Notification pipeline stopped");
    }

    /// Number of background tasks still running
    pub fn running_tasks(&self) -> usize {
        self.tasks.iter().filter(|t| !t.is_finished()).count()
    }
}
