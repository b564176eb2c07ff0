//! Buffered audit forwarding

use remedy_hub_core::AuditRecord;
use remedy_hub_provider::AuditSink;
use std::sync::Arc;
use tokio::sync::mpsc;

const AUDIT_QUEUE_CAPACITY: usize = 256;

/// Fire-and-forget wrapper around an [`AuditSink`].
///
/// Records go onto a short bounded queue drained by a background
/// task, so a slow or unavailable sink never blocks the compliance
/// cycle. When the queue is full the record is dropped with a
/// warning.
pub struct BufferedAuditSink {
    tx: mpsc::Sender<AuditRecord>,
}

impl BufferedAuditSink {
    pub fn new(sink: Arc<dyn AuditSink>) -> Self {
        Self::with_capacity(sink, AUDIT_QUEUE_CAPACITY)
    }

    pub fn with_capacity(sink: Arc<dyn AuditSink>, capacity: usize) -> Self {
        let (tx, mut rx) = mpsc::channel::<AuditRecord>(capacity);
        tokio::spawn(async move {
            while let Some(record) = rx.recv().await {
                if let Err(err) = sink.record(record).await {
                    tracing::warn!("Audit sink rejected record: {}", err);
                }
            }
        });
        Self { tx }
    }

    pub fn push(&self, record: AuditRecord) {
        if self.tx.try_send(record).is_err() {
            tracing::warn!("Audit queue full, dropping record");
        }
    }
}
