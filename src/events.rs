//! Lifecycle events: one per job or result status transition.
//!
//! Controllers never log directly. They hand a `LifecycleEvent` to an
//! injected `EventSink`; the binary wires in `TracingSink`, tests usually
//! subscribe to a `BroadcastSink`.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::debug;
use uuid::Uuid;

use crate::model::{JobId, ResultId, Status};

/// A single status transition as observed after the store write.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LifecycleEvent {
    /// Instance id of the worker that made the transition.
    pub worker_id: Uuid,
    /// Component name of the worker, e.g. `AnalyticsWorker`.
    pub component: String,
    pub job_id: Option<JobId>,
    /// Set for result transitions, `None` for the job itself.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result_id: Option<ResultId>,
    /// Status read back after the write, or the written status when the
    /// read-back failed.
    pub status: Status,
    pub at: DateTime<Utc>,
}

impl LifecycleEvent {
    pub fn is_job_event(&self) -> bool {
        self.result_id.is_none()
    }
}

/// Receiver of lifecycle events. Implementations must not fail; events are
/// informational only.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: &LifecycleEvent);
}

/// Writes each event as a `debug!` record.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&self, event: &LifecycleEvent) {
        match event.result_id {
            Some(result_id) => debug!(
                worker_id = %event.worker_id,
                component = %event.component,
                job_id = ?event.job_id,
                result_id,
                status = %event.status,
                "Result is now {}",
                event.status
            ),
            None => debug!(
                worker_id = %event.worker_id,
                component = %event.component,
                job_id = ?event.job_id,
                status = %event.status,
                "Job is now {}",
                event.status
            ),
        }
    }
}

/// Publishes events on a tokio broadcast channel.
#[derive(Debug, Clone)]
pub struct BroadcastSink {
    tx: broadcast::Sender<LifecycleEvent>,
}

impl BroadcastSink {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LifecycleEvent> {
        self.tx.subscribe()
    }
}

impl EventSink for BroadcastSink {
    fn emit(&self, event: &LifecycleEvent) {
        // No subscribers is fine.
        let _ = self.tx.send(event.clone());
    }
}

/// Forwards every event to each inner sink in order.
#[derive(Default, Clone)]
pub struct MultiSink {
    sinks: Vec<Arc<dyn EventSink>>,
}

impl MultiSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sinks.push(sink);
        self
    }
}

impl EventSink for MultiSink {
    fn emit(&self, event: &LifecycleEvent) {
        for sink in &self.sinks {
            sink.emit(event);
        }
    }
}
