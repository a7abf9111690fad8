//! # Gateway Core
//!
//! The request-processing core of an API gateway: each request flows
//! through authentication, rate limiting, response caching, and a backend
//! integration, short-circuiting on the first failure and producing a
//! terminal result with a stage-by-stage audit trail.
//!
//! The pipeline is fully concurrent: many requests may be in flight at
//! once, and only the shared structures (rate windows, cache entries) are
//! synchronized. There is no HTTP server here; callers hand requests to
//! [`GatewayPipeline::process_request`] and receive a [`PipelineResult`]
//! carrying the status, payload, audit events, and latency.

/// Core functionality: error types, configuration, and shared data
/// structures
pub mod core;

/// Authentication stage with pluggable credential validation
pub mod auth;

/// Fixed-window rate limiting per client key
pub mod throttle;

/// TTL-based response caching keyed by method and path
pub mod caching;

/// Backend integration profiles and the invoker with latency and failure
/// injection
pub mod backend;

/// The stage orchestrator tying everything together
pub mod pipeline;

/// Aggregate counters and recent-request history, exposed as data
pub mod observability;

// Re-export the types callers need for the common path. The `self::`
// prefix keeps the local `core` module from colliding with the `core`
// crate in the extern prelude.
pub use self::backend::{BackendInvoker, IntegrationProfile, ProfileRegistry};
pub use self::core::config::{GatewayConfig, LatencyMode};
pub use self::core::error::{GatewayError, GatewayResult};
pub use self::core::types::{
    BackendResponse, IncomingRequest, PipelineResult, RequestState, ResponseSource, Stage,
    StageEvent, StageOutcome,
};
pub use self::observability::{CompletedRequest, MetricsSnapshot};
pub use self::pipeline::GatewayPipeline;
