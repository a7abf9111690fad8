//! # Core Types Module
//!
//! Foundational data structures shared by every pipeline stage: the
//! incoming request, the audited stage events, the per-request state
//! machine, and the terminal result handed back to callers.
//!
//! Requests are immutable once created; a `PipelineResult` is created once
//! per request and never mutated after construction.

use std::fmt;
use std::time::{Duration, Instant};

use http::{Method, StatusCode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::error::GatewayError;

/// A request entering the gateway, before any stage has run
///
/// Immutable once created. The credential is carried as an opaque string;
/// interpreting it is the authenticator's job.
#[derive(Debug, Clone)]
pub struct IncomingRequest {
    /// Unique identifier for this request (for tracing and audit)
    pub id: String,

    /// HTTP method (GET, POST, etc.)
    pub method: Method,

    /// Request path, case-sensitive, no normalization
    pub path: String,

    /// Optional bearer credential
    pub credential: Option<String>,

    /// Label identifying the client that originated the request; also used
    /// as the rate limiting key
    pub source: String,

    /// Timestamp when the request was created; stage event offsets are
    /// measured from here
    pub received_at: Instant,
}

impl IncomingRequest {
    /// Create a new request with a generated UUID
    pub fn new(method: Method, path: &str, credential: Option<&str>, source: &str) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            method,
            path: path.to_string(),
            credential: credential.map(str::to_string),
            source: source.to_string(),
            received_at: Instant::now(),
        }
    }
}

/// Pipeline stages, in the order they run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Auth,
    Throttle,
    Cache,
    Backend,
    Response,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Auth => write!(f, "auth"),
            Stage::Throttle => write!(f, "throttle"),
            Stage::Cache => write!(f, "cache"),
            Stage::Backend => write!(f, "backend"),
            Stage::Response => write!(f, "response"),
        }
    }
}

/// Outcome of a single stage
///
/// `Skipped` covers both disabled stages and stages never reached because
/// an earlier stage failed; the event detail distinguishes the two.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StageOutcome {
    Success,
    Failure,
    Skipped,
}

/// One entry of the per-request audit trail
///
/// Events are recorded in strict chronological order; `offset` is measured
/// from the request's creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageEvent {
    pub stage: Stage,
    pub outcome: StageOutcome,
    /// Human-readable detail ("admitted 3/10", "hit", "disabled", ...)
    pub detail: String,
    #[serde(with = "humantime_serde")]
    pub offset: Duration,
}

/// Per-request state machine
///
/// `Unauthorized`, `RateLimited`, `BackendError` and `Completed` are
/// terminal. A timeout terminalizes as `BackendError` with the error kind
/// distinguishing it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RequestState {
    Received,
    Authenticating,
    Unauthorized,
    Throttling,
    RateLimited,
    CacheLookup,
    CacheHit,
    BackendInvoking,
    BackendError,
    Responding,
    Completed,
}

impl RequestState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Unauthorized | Self::RateLimited | Self::BackendError | Self::Completed
        )
    }
}

/// Whether a payload came fresh from the backend or out of the cache
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseSource {
    Backend,
    Cache,
}

/// Response payload produced by a backend integration (or replayed from
/// the cache, with `source` flipped to mark it)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendResponse {
    /// HTTP-style status code of the backend response
    pub status: u16,

    /// Canned response body for the integration
    pub body: serde_json::Value,

    /// Name of the integration profile that produced this response
    pub integration: String,

    /// Latency drawn from the profile's range for this invocation
    #[serde(with = "humantime_serde")]
    pub latency: Duration,

    /// Fresh backend response or cache replay
    pub source: ResponseSource,
}

/// Terminal result of processing one request
///
/// Contains the full ordered audit trail. Exactly one of two shapes holds:
/// either a single stage event carries `Failure` and `payload` is empty, or
/// no event failed and `payload` holds the success/cache-hit response.
#[derive(Debug, Clone)]
pub struct PipelineResult {
    /// The request this result belongs to
    pub request: IncomingRequest,

    /// Terminal HTTP status code
    pub status: StatusCode,

    /// Error kind on failure, "OK" on success
    pub reason: String,

    /// Terminal state of the request's state machine
    pub state: RequestState,

    /// Ordered stage-by-stage audit trail
    pub events: Vec<StageEvent>,

    /// Response payload, present only on success or cache hit
    pub payload: Option<BackendResponse>,

    /// Total wall-clock latency of the pipeline run
    pub latency: Duration,

    /// The failure that terminated the request, if any
    pub error: Option<GatewayError>,
}

impl PipelineResult {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    /// True if the payload was served from the cache
    pub fn is_cache_hit(&self) -> bool {
        matches!(
            self.payload.as_ref().map(|p| p.source),
            Some(ResponseSource::Cache)
        )
    }

    /// Outcome recorded for the given stage, if an event for it exists
    pub fn stage_outcome(&self, stage: Stage) -> Option<StageOutcome> {
        self.events
            .iter()
            .find(|e| e.stage == stage)
            .map(|e| e.outcome)
    }
}
