//! # Observability
//!
//! Aggregate counters and a bounded recent-request history, both exposed as
//! plain data for an external metrics sink or display layer. The core never
//! renders anything; structured `tracing` events cover the logging side.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;

use crate::core::error::GatewayError;
use crate::core::types::PipelineResult;

/// Aggregate request counters, updated once per completed pipeline run
#[derive(Debug, Default)]
pub struct GatewayMetrics {
    total: AtomicU64,
    success: AtomicU64,
    throttled: AtomicU64,
    cache_hits: AtomicU64,
    auth_failures: AtomicU64,
    backend_errors: AtomicU64,
    timeouts: AtomicU64,
}

impl GatewayMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Classify a terminal result into the counters
    pub fn record(&self, result: &PipelineResult) {
        self.total.fetch_add(1, Ordering::Relaxed);
        match &result.error {
            None => {
                self.success.fetch_add(1, Ordering::Relaxed);
                if result.is_cache_hit() {
                    self.cache_hits.fetch_add(1, Ordering::Relaxed);
                }
            }
            Some(GatewayError::RateLimited { .. }) => {
                self.throttled.fetch_add(1, Ordering::Relaxed);
            }
            Some(GatewayError::MissingCredential)
            | Some(GatewayError::InvalidCredential { .. }) => {
                self.auth_failures.fetch_add(1, Ordering::Relaxed);
            }
            Some(GatewayError::Timeout { .. }) => {
                self.timeouts.fetch_add(1, Ordering::Relaxed);
            }
            Some(_) => {
                self.backend_errors.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    /// Point-in-time copy of the counters, the data handed to a metrics
    /// sink
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            total: self.total.load(Ordering::Relaxed),
            success: self.success.load(Ordering::Relaxed),
            throttled: self.throttled.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            auth_failures: self.auth_failures.load(Ordering::Relaxed),
            backend_errors: self.backend_errors.load(Ordering::Relaxed),
            timeouts: self.timeouts.load(Ordering::Relaxed),
        }
    }
}

/// Serializable snapshot of the aggregate counters
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub total: u64,
    pub success: u64,
    pub throttled: u64,
    pub cache_hits: u64,
    pub auth_failures: u64,
    pub backend_errors: u64,
    pub timeouts: u64,
}

/// Compact record of a completed request for the history buffer
#[derive(Debug, Clone, Serialize)]
pub struct CompletedRequest {
    pub id: String,
    pub method: String,
    pub path: String,
    pub source: String,
    pub status: u16,
    pub reason: String,
    pub cache_hit: bool,
    #[serde(with = "humantime_serde")]
    pub latency: Duration,
}

impl From<&PipelineResult> for CompletedRequest {
    fn from(result: &PipelineResult) -> Self {
        Self {
            id: result.request.id.clone(),
            method: result.request.method.to_string(),
            path: result.request.path.clone(),
            source: result.request.source.clone(),
            status: result.status.as_u16(),
            reason: result.reason.clone(),
            cache_hit: result.is_cache_hit(),
            latency: result.latency,
        }
    }
}

/// Bounded ring of recently completed requests, oldest evicted first
#[derive(Debug)]
pub struct RequestHistory {
    capacity: usize,
    entries: Mutex<VecDeque<CompletedRequest>>,
}

impl RequestHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    pub fn record(&self, result: &PipelineResult) {
        let mut entries = self.entries.lock();
        if entries.len() == self.capacity {
            entries.pop_front();
        }
        entries.push_back(CompletedRequest::from(result));
    }

    /// Completed requests in chronological order
    pub fn recent(&self) -> Vec<CompletedRequest> {
        self.entries.lock().iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}
