//! Dispatch metrics
//!
//! Counters for frames flowing through a [`Dispatcher`](crate::protocol::dispatcher::Dispatcher):
//! how many arrived, how many bytes, and at which stage the rejected ones
//! failed.
//!
//! Uses atomic counters for thread-safe metrics collection.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::{debug, info};

/// Metrics collector shared by the workers using one dispatcher
#[derive(Debug)]
pub struct DispatchMetrics {
    /// Raw buffers handed to the dispatcher
    pub frames_received: AtomicU64,
    /// Total bytes of those buffers
    pub bytes_received: AtomicU64,
    /// Rejected before authentication (size or layout)
    pub frame_errors: AtomicU64,
    /// Rejected by the authenticator
    pub auth_failures: AtomicU64,
    /// Rejected by the content parser
    pub parse_errors: AtomicU64,
    /// Messages produced
    pub messages_dispatched: AtomicU64,
    start_time: Instant,
}

impl DispatchMetrics {
    pub fn new() -> Self {
        Self {
            frames_received: AtomicU64::new(0),
            bytes_received: AtomicU64::new(0),
            frame_errors: AtomicU64::new(0),
            auth_failures: AtomicU64::new(0),
            parse_errors: AtomicU64::new(0),
            messages_dispatched: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    /// Record a raw buffer arriving
    pub fn frame_received(&self, byte_count: u64) {
        self.frames_received.fetch_add(1, Ordering::Relaxed);
        self.bytes_received.fetch_add(byte_count, Ordering::Relaxed);
    }

    pub fn frame_error(&self) {
        self.frame_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn auth_failure(&self) {
        self.auth_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn parse_error(&self) {
        self.parse_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn message_dispatched(&self) {
        self.messages_dispatched.fetch_add(1, Ordering::Relaxed);
    }

    /// Get current metrics snapshot
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            frames_received: self.frames_received.load(Ordering::Relaxed),
            bytes_received: self.bytes_received.load(Ordering::Relaxed),
            frame_errors: self.frame_errors.load(Ordering::Relaxed),
            auth_failures: self.auth_failures.load(Ordering::Relaxed),
            parse_errors: self.parse_errors.load(Ordering::Relaxed),
            messages_dispatched: self.messages_dispatched.load(Ordering::Relaxed),
            uptime_seconds: self.start_time.elapsed().as_secs(),
        }
    }

    /// Log current metrics
    pub fn log_metrics(&self) {
        let snapshot = self.snapshot();
        info!(
            frames_received = snapshot.frames_received,
            bytes_received = snapshot.bytes_received,
            frame_errors = snapshot.frame_errors,
            auth_failures = snapshot.auth_failures,
            parse_errors = snapshot.parse_errors,
            messages_dispatched = snapshot.messages_dispatched,
            uptime_seconds = snapshot.uptime_seconds,
            "Dispatch metrics snapshot"
        );
    }
}

impl Default for DispatchMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of metrics at a point in time
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub frames_received: u64,
    pub bytes_received: u64,
    pub frame_errors: u64,
    pub auth_failures: u64,
    pub parse_errors: u64,
    pub messages_dispatched: u64,
    pub uptime_seconds: u64,
}

impl MetricsSnapshot {
    /// Frames rejected at any stage
    pub fn rejected(&self) -> u64 {
        self.frame_errors + self.auth_failures + self.parse_errors
    }
}

/// Timer for measuring operation duration
pub struct Timer {
    start: Instant,
    operation: &'static str,
}

impl Timer {
    /// Start timing an operation
    pub fn start(operation: &'static str) -> Self {
        Self {
            start: Instant::now(),
            operation,
        }
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        let duration = self.start.elapsed();
        debug!(
            operation = self.operation,
            duration_us = duration.as_micros() as u64,
            "Operation completed"
        );
    }
}
