//! Diagnostics capture for the external log exporter
//!
//! Registration outcomes, resolution fallbacks and concealment actions are
//! logged through `tracing`. [`DiagnosticsLayer`] turns the engine's own
//! events into [`DiagnosticRecord`]s and pushes them into a bounded,
//! lock-free [`DiagnosticsBuffer`]; the exporter drains it from its own
//! thread.
//!
//! The hook path never blocks on diagnostics: a full buffer evicts its
//! oldest record.

use crate::config::now_millis;
use crossbeam::queue::ArrayQueue;
use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::Context;
use tracing_subscriber::Layer;

/// Target prefix of events captured as diagnostics
pub const DIAGNOSTICS_TARGET: &str = "idveil";

/// One structured log record
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiagnosticRecord {
    /// Event target, e.g. `idveil::interception`
    pub tag: String,
    pub level: String,
    pub message: String,
    pub timestamp_ms: u64,
}

/// Buffer statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferStats {
    pub total_pushed: u64,
    /// Records evicted to make room for newer ones
    pub total_evicted: u64,
    pub current_size: usize,
    pub capacity: usize,
}

/// Bounded lock-free queue of diagnostic records
#[derive(Debug)]
pub struct DiagnosticsBuffer {
    queue: ArrayQueue<DiagnosticRecord>,
    total_pushed: AtomicU64,
    total_evicted: AtomicU64,
}

impl DiagnosticsBuffer {
    /// # Panics
    ///
    /// Panics if capacity is 0. `EngineConfig::validate` rejects that.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "Diagnostics buffer capacity must be > 0");
        Self {
            queue: ArrayQueue::new(capacity),
            total_pushed: AtomicU64::new(0),
            total_evicted: AtomicU64::new(0),
        }
    }

    pub fn push(&self, record: DiagnosticRecord) {
        self.total_pushed.fetch_add(1, Ordering::Relaxed);
        if self.queue.force_push(record).is_some() {
            self.total_evicted.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Remove up to `max` records, oldest first
    pub fn drain(&self, max: usize) -> Vec<DiagnosticRecord> {
        let mut out = Vec::with_capacity(max.min(self.queue.len()));
        while out.len() < max {
            match self.queue.pop() {
                Some(record) => out.push(record),
                None => break,
            }
        }
        out
    }

    pub fn drain_all(&self) -> Vec<DiagnosticRecord> {
        self.drain(usize::MAX)
    }

    pub fn stats(&self) -> BufferStats {
        BufferStats {
            total_pushed: self.total_pushed.load(Ordering::Relaxed),
            total_evicted: self.total_evicted.load(Ordering::Relaxed),
            current_size: self.queue.len(),
            capacity: self.queue.capacity(),
        }
    }
}

/// `tracing` layer feeding engine events into a [`DiagnosticsBuffer`]
#[derive(Debug, Clone)]
pub struct DiagnosticsLayer {
    buffer: Arc<DiagnosticsBuffer>,
}

impl DiagnosticsLayer {
    pub fn new(buffer: Arc<DiagnosticsBuffer>) -> Self {
        Self { buffer }
    }
}

#[derive(Default)]
struct MessageVisitor {
    message: String,
    fields: Vec<String>,
}

impl Visit for MessageVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = value.to_string();
        } else {
            self.fields.push(format!("{}={}", field.name(), value));
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{:?}", value);
        } else {
            self.fields.push(format!("{}={:?}", field.name(), value));
        }
    }
}

impl<S: Subscriber> Layer<S> for DiagnosticsLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let meta = event.metadata();
        if !meta.target().starts_with(DIAGNOSTICS_TARGET) {
            return;
        }

        let mut visitor = MessageVisitor::default();
        event.record(&mut visitor);
        let message = if visitor.fields.is_empty() {
            visitor.message
        } else {
            format!("{} {}", visitor.message, visitor.fields.join(" "))
        };

        self.buffer.push(DiagnosticRecord {
            tag: meta.target().to_string(),
            level: meta.level().to_string(),
            message,
            timestamp_ms: now_millis(),
        });
    }
}
