//! Producer side of the notification pipeline

use tokio::sync::mpsc;
use tracing::debug;

use crate::error::{Error, Result};
use crate::model::{CacheAction, CacheControlMessage, Domain, EntityKind, Record};

/// Handle request handlers use to announce a completed mutation
///
/// Cheap to clone; every clone feeds the same two queues. Messages for one
/// entity kind are published in the order they were enqueued.
#[derive(Debug, Clone)]
pub struct ChangeNotifier {
    domain_tx: mpsc::Sender<CacheControlMessage>,
    record_tx: mpsc::Sender<CacheControlMessage>,
}

impl ChangeNotifier {
    pub(crate) fn new(
        domain_tx: mpsc::Sender<CacheControlMessage>,
        record_tx: mpsc::Sender<CacheControlMessage>,
    ) -> Self {
        Self {
            domain_tx,
            record_tx,
        }
    }

    /// Enqueue a snapshot of a domain
    pub async fn notify_domain(&self, action: CacheAction, domain: &Domain) -> Result<()> {
        self.notify(CacheControlMessage::for_domain(action, domain)?).await
    }

    /// Enqueue a snapshot of a record
    pub async fn notify_record(&self, action: CacheAction, record: &Record) -> Result<()> {
        self.notify(CacheControlMessage::for_record(action, record)?).await
    }

    /// Enqueue a prepared message on the queue for its kind
    ///
    /// Returns as soon as the queue accepts the message. Waits only while the
    /// queue is full, which means the publisher has fallen behind.
    pub async fn notify(&self, message: CacheControlMessage) -> Result<()> {
        let kind = message.kind;
        let action = message.action;

        self.sender(kind)
            .send(message)
            .await
            .map_err(|_| Error::bus(format!("{} notification queue is closed", kind)))?;

        debug!("Enqueued {}/{} (pending: {})", action, kind, self.pending(kind));
        Ok(())
    }

    /// Messages waiting in the queue for one entity kind
    pub fn pending(&self, kind: EntityKind) -> usize {
        let tx = self.sender(kind);
        tx.max_capacity() - tx.capacity()
    }

    /// Whether the publisher for this kind has gone away
    pub fn is_closed(&self, kind: EntityKind) -> bool {
        self.sender(kind).is_closed()
    }

    fn sender(&self, kind: EntityKind) -> &mpsc::Sender<CacheControlMessage> {
        match kind {
            EntityKind::Domain => &self.domain_tx,
            EntityKind::Record => &self.record_tx,
        }
    }
}
