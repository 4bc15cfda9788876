//! Two-phase request log writer
//!
//! Pending rows are written inline so abandoned requests stay visible;
//! updates go through a bounded queue drained by a background task.

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};
use uuid::Uuid;

use super::types::{LogEntry, LogUpdate, PendingLog};
use crate::config::LogQueueConfig;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LogError {
    #[error("Log sink error: {0}")]
    Sink(String),

    #[error("Log update queue is full")]
    QueueFull,

    #[error("Log update queue is closed")]
    QueueClosed,
}

/// Persistence backend for log rows
#[async_trait]
pub trait LogSink: Send + Sync {
    /// "log create": insert a pending row
    async fn create(&self, pending: &PendingLog) -> Result<(), LogError>;

    /// "log update": attach the outcome to an existing row
    async fn update(&self, update: LogUpdate) -> Result<(), LogError>;
}

/// Sink keeping rows in memory, in creation order
#[derive(Debug, Default)]
pub struct InMemoryLogSink {
    entries: RwLock<Vec<LogEntry>>,
    index: RwLock<HashMap<Uuid, usize>>,
}

impl InMemoryLogSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<LogEntry> {
        self.entries.read().clone()
    }

    pub fn get(&self, request_id: Uuid) -> Option<LogEntry> {
        let position = *self.index.read().get(&request_id)?;
        self.entries.read().get(position).cloned()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl LogSink for InMemoryLogSink {
    async fn create(&self, pending: &PendingLog) -> Result<(), LogError> {
        let mut entries = self.entries.write();
        self.index.write().insert(pending.request_id, entries.len());
        entries.push(LogEntry {
            pending: pending.clone(),
            update: None,
        });
        Ok(())
    }

    async fn update(&self, update: LogUpdate) -> Result<(), LogError> {
        let position = self
            .index
            .read()
            .get(&update.request_id)
            .copied()
            .ok_or_else(|| LogError::Sink(format!("no pending log {}", update.request_id)))?;
        if let Some(entry) = self.entries.write().get_mut(position) {
            entry.update = Some(update);
        }
        Ok(())
    }
}

/// Writes pending rows inline and queues updates for a background worker
pub struct LogWriter {
    sink: Arc<dyn LogSink>,
    sender: Mutex<Option<mpsc::Sender<LogUpdate>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
    dropped: AtomicU64,
}

impl std::fmt::Debug for LogWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogWriter")
            .field("dropped", &self.dropped.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl LogWriter {
    /// Spawns the update worker; must be called inside a tokio runtime
    pub fn new(sink: Arc<dyn LogSink>, config: &LogQueueConfig) -> Self {
        let (sender, mut receiver) = mpsc::channel::<LogUpdate>(config.buffer_size.max(1));

        let worker_sink = Arc::clone(&sink);
        let worker = tokio::spawn(async move {
            while let Some(update) = receiver.recv().await {
                let request_id = update.request_id;
                if let Err(e) = worker_sink.update(update).await {
                    error!(request_id = %request_id, error = %e, "failed to persist log update");
                }
            }
            debug!("log update worker stopped");
        });

        Self {
            sink,
            sender: Mutex::new(Some(sender)),
            worker: Mutex::new(Some(worker)),
            dropped: AtomicU64::new(0),
        }
    }

    pub fn sink(&self) -> &Arc<dyn LogSink> {
        &self.sink
    }

    /// Write the pending row; awaited before the request is dispatched
    pub async fn create_pending(&self, pending: &PendingLog) -> Result<(), LogError> {
        self.sink.create(pending).await
    }

    /// Queue the outcome without waiting for persistence
    pub fn finalize(&self, update: LogUpdate) -> Result<(), LogError> {
        let guard = self.sender.lock();
        let sender = guard.as_ref().ok_or(LogError::QueueClosed)?;
        match sender.try_send(update) {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Full(update)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                warn!(request_id = %update.request_id, "log update queue full, update dropped");
                Err(LogError::QueueFull)
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                error!("log update queue closed");
                Err(LogError::QueueClosed)
            }
        }
    }

    /// Updates dropped because the queue was full
    pub fn dropped_updates(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Close the queue and wait until queued updates are persisted
    pub async fn shutdown(&self) {
        drop(self.sender.lock().take());
        let worker = self.worker.lock().take();
        if let Some(worker) = worker {
            if let Err(e) = worker.await {
                error!(error = %e, "log update worker panicked");
            }
        }
    }
}
