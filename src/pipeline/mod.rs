//! # Gateway Pipeline
//!
//! Orchestrates the stages for each incoming request in fixed order:
//! authentication, rate limiting, cache lookup, backend invocation,
//! optional cache write-back. The first failing stage short-circuits the
//! run; a cache hit short-circuits successfully before the backend.
//!
//! Per-request state machine:
//! `Received -> Authenticating -> (Unauthorized | Throttling) ->
//! (RateLimited | CacheLookup) -> (CacheHit -> Responding |
//! BackendInvoking) -> (BackendError | Responding) -> Completed`.
//!
//! Every stage transition is audited as a `StageEvent` in chronological
//! order, including skips. There is no global lock: many requests can be in
//! flight concurrently, and only the rate windows and cache entries are
//! synchronized.

use std::sync::Arc;
use std::time::Instant;

use http::{Method, StatusCode};
use tracing::{debug, info, warn};

use crate::auth::{AuthOutcome, Authenticator, CredentialValidator};
use crate::backend::{BackendInvoker, IntegrationProfile, ProfileRegistry};
use crate::caching::{cache_key, CacheStats, ResponseCache};
use crate::core::config::GatewayConfig;
use crate::core::error::{GatewayError, GatewayResult};
use crate::core::types::{
    BackendResponse, IncomingRequest, PipelineResult, RequestState, Stage, StageEvent,
    StageOutcome,
};
use crate::observability::{CompletedRequest, GatewayMetrics, MetricsSnapshot, RequestHistory};
use crate::throttle::RateLimiter;

/// Ordered audit recorder for one pipeline run
struct AuditTrail {
    started: Instant,
    events: Vec<StageEvent>,
}

impl AuditTrail {
    fn new(started: Instant) -> Self {
        Self {
            started,
            events: Vec::with_capacity(5),
        }
    }

    fn record(&mut self, stage: Stage, outcome: StageOutcome, detail: impl Into<String>) {
        self.events.push(StageEvent {
            stage,
            outcome,
            detail: detail.into(),
            offset: self.started.elapsed(),
        });
    }

    /// Mark stages never reached because an earlier stage failed
    fn skip_remaining(&mut self, stages: &[Stage]) {
        for stage in stages {
            self.record(*stage, StageOutcome::Skipped, "not reached");
        }
    }
}

/// The gateway request pipeline
///
/// Constructed once from a validated configuration and shared across tasks;
/// `process` takes `&self` and is safe to call concurrently.
#[derive(Debug)]
pub struct GatewayPipeline {
    config: GatewayConfig,
    profile: IntegrationProfile,
    authenticator: Authenticator,
    limiter: RateLimiter,
    cache: ResponseCache,
    invoker: BackendInvoker,
    metrics: GatewayMetrics,
    history: RequestHistory,
}

impl GatewayPipeline {
    /// Build a pipeline against the built-in integration profiles
    pub fn new(config: GatewayConfig) -> GatewayResult<Self> {
        Self::with_registry(config, &ProfileRegistry::builtin())
    }

    /// Build a pipeline resolving its integration from the given registry
    ///
    /// Fails fast on invalid configuration or an unknown integration name;
    /// no request is processed past a bad config.
    pub fn with_registry(config: GatewayConfig, registry: &ProfileRegistry) -> GatewayResult<Self> {
        config.validate()?;
        let profile = registry.get(&config.integration).ok_or_else(|| {
            GatewayError::config(format!("unknown integration: {}", config.integration))
        })?;

        Ok(Self {
            profile,
            authenticator: Authenticator::new(config.min_credential_length),
            limiter: RateLimiter::new(config.rate_limit_capacity, config.rate_limit_window),
            cache: ResponseCache::new(config.cache_ttl),
            invoker: BackendInvoker::new(config.latency_mode),
            metrics: GatewayMetrics::new(),
            history: RequestHistory::new(config.history_capacity),
            config,
        })
    }

    /// Seed the backend RNG for deterministic latency and failure injection
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.invoker = BackendInvoker::with_seed(self.config.latency_mode, seed);
        self
    }

    /// Swap in a custom credential validation predicate
    pub fn with_validator(mut self, validator: Arc<dyn CredentialValidator>) -> Self {
        self.authenticator = Authenticator::with_validator(validator);
        self
    }

    /// Entry point mirroring the external interface: build a request and
    /// run it through the pipeline
    pub async fn process_request(
        &self,
        method: Method,
        path: &str,
        credential: Option<&str>,
        source: &str,
    ) -> PipelineResult {
        self.process(IncomingRequest::new(method, path, credential, source))
            .await
    }

    /// Run one request through all stages, producing a terminal result with
    /// a complete audit trail. Never fails outward; every outcome is a
    /// `PipelineResult`.
    pub async fn process(&self, request: IncomingRequest) -> PipelineResult {
        let mut trail = AuditTrail::new(request.received_at);
        debug!(
            id = %request.id,
            method = %request.method,
            path = %request.path,
            source = %request.source,
            "request received"
        );

        // Stage 1: authentication. The audit detail comes from the
        // outcome itself so the strings have one source of truth.
        match self
            .authenticator
            .check(request.credential.as_deref(), self.config.auth_enabled)
            .await
        {
            AuthOutcome::Denied(err) => {
                trail.record(Stage::Auth, StageOutcome::Failure, err.to_string());
                trail.skip_remaining(&[Stage::Throttle, Stage::Cache, Stage::Backend, Stage::Response]);
                return self.finalize(request, RequestState::Unauthorized, trail, None, Some(err));
            }
            outcome => {
                let stage_outcome = match outcome {
                    AuthOutcome::Bypassed => StageOutcome::Skipped,
                    _ => StageOutcome::Success,
                };
                trail.record(Stage::Auth, stage_outcome, outcome.detail());
            }
        }

        // Stage 2: rate limiting, keyed by the request's source label
        if !self.config.throttle_enabled {
            trail.record(Stage::Throttle, StageOutcome::Skipped, "disabled");
        } else if self.limiter.admit(&request.source, Instant::now()) {
            trail.record(Stage::Throttle, StageOutcome::Success, "admitted");
        } else {
            let err = GatewayError::RateLimited {
                limit: self.config.rate_limit_capacity,
                window: self.config.rate_limit_window,
            };
            trail.record(Stage::Throttle, StageOutcome::Failure, err.to_string());
            trail.skip_remaining(&[Stage::Cache, Stage::Backend, Stage::Response]);
            return self.finalize(request, RequestState::RateLimited, trail, None, Some(err));
        }

        // Stage 3: cache lookup. A hit short-circuits successfully and the
        // backend stage is audited as skipped.
        let key = cache_key(&request.method, &request.path);
        if !self.config.caching_enabled {
            trail.record(Stage::Cache, StageOutcome::Skipped, "disabled");
        } else if let Some(cached) = self.cache.get(&key, Instant::now()) {
            trail.record(Stage::Cache, StageOutcome::Success, "hit");
            trail.record(Stage::Backend, StageOutcome::Skipped, "cache hit");
            trail.record(Stage::Response, StageOutcome::Success, "cached response");
            return self.finalize(request, RequestState::Completed, trail, Some(cached), None);
        } else {
            trail.record(Stage::Cache, StageOutcome::Success, "miss");
        }

        // Stage 4: backend invocation under the per-request deadline. An
        // elapsed deadline cancels the in-flight call and surfaces Timeout,
        // distinct from the backend's own failures.
        let invocation = tokio::time::timeout(
            self.config.per_request_timeout,
            self.invoker.invoke(&self.profile),
        )
        .await;

        let response = match invocation {
            Err(_elapsed) => {
                let err = GatewayError::Timeout {
                    timeout: self.config.per_request_timeout,
                };
                trail.record(Stage::Backend, StageOutcome::Failure, err.to_string());
                trail.skip_remaining(&[Stage::Response]);
                return self.finalize(request, RequestState::BackendError, trail, None, Some(err));
            }
            Ok(Err(err)) => {
                trail.record(Stage::Backend, StageOutcome::Failure, err.to_string());
                trail.skip_remaining(&[Stage::Response]);
                return self.finalize(request, RequestState::BackendError, trail, None, Some(err));
            }
            Ok(Ok(response)) => response,
        };

        trail.record(
            Stage::Backend,
            StageOutcome::Success,
            format!(
                "{} responded in {:?}",
                self.profile.display_name, response.latency
            ),
        );

        // Stage 5: response, with cache write-back when caching is on
        if self.config.caching_enabled {
            self.cache.put(&key, &response, Instant::now());
            trail.record(Stage::Response, StageOutcome::Success, "response sent, cached");
        } else {
            trail.record(Stage::Response, StageOutcome::Success, "response sent");
        }

        self.finalize(request, RequestState::Completed, trail, Some(response), None)
    }

    fn finalize(
        &self,
        request: IncomingRequest,
        state: RequestState,
        trail: AuditTrail,
        payload: Option<BackendResponse>,
        error: Option<GatewayError>,
    ) -> PipelineResult {
        debug_assert!(state.is_terminal());
        let status = error
            .as_ref()
            .map(|e| e.status_code())
            .unwrap_or(StatusCode::OK);
        let reason = error
            .as_ref()
            .map(|e| e.kind().to_string())
            .unwrap_or_else(|| "OK".to_string());

        let result = PipelineResult {
            status,
            reason,
            state,
            events: trail.events,
            payload,
            latency: trail.started.elapsed(),
            error,
            request,
        };

        self.metrics.record(&result);
        self.history.record(&result);

        match &result.error {
            None => info!(
                id = %result.request.id,
                status = result.status.as_u16(),
                cache_hit = result.is_cache_hit(),
                latency = ?result.latency,
                "request completed"
            ),
            Some(err) => warn!(
                id = %result.request.id,
                status = result.status.as_u16(),
                reason = %result.reason,
                error = %err,
                "request failed"
            ),
        }

        result
    }

    /// Current aggregate counters, the data handed to a metrics sink
    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Recently completed requests, oldest first
    pub fn recent_requests(&self) -> Vec<CompletedRequest> {
        self.history.recent()
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// The resolved integration profile this pipeline dispatches to
    pub fn integration(&self) -> &IntegrationProfile {
        &self.profile
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::LatencyMode;

    fn open_config() -> GatewayConfig {
        GatewayConfig {
            auth_enabled: false,
            throttle_enabled: false,
            caching_enabled: false,
            integration: "reliable".to_string(),
            latency_mode: LatencyMode::Recorded,
            ..Default::default()
        }
    }

    fn reliable_registry() -> ProfileRegistry {
        let registry = ProfileRegistry::builtin();
        registry
            .register(IntegrationProfile {
                name: "reliable".to_string(),
                error_probability: 0.0,
                ..IntegrationProfile::mock()
            })
            .unwrap();
        registry
    }

    #[tokio::test]
    async fn test_events_are_chronological() {
        let pipeline =
            GatewayPipeline::with_registry(open_config(), &reliable_registry()).unwrap();
        let result = pipeline
            .process_request(Method::GET, "/foo", None, "web-app")
            .await;

        assert!(result.is_success());
        let offsets: Vec<_> = result.events.iter().map(|e| e.offset).collect();
        let mut sorted = offsets.clone();
        sorted.sort();
        assert_eq!(offsets, sorted);
    }

    #[tokio::test]
    async fn test_every_stage_is_audited_exactly_once() {
        let pipeline =
            GatewayPipeline::with_registry(open_config(), &reliable_registry()).unwrap();
        let result = pipeline
            .process_request(Method::GET, "/foo", None, "web-app")
            .await;

        let stages: Vec<_> = result.events.iter().map(|e| e.stage).collect();
        assert_eq!(
            stages,
            vec![
                Stage::Auth,
                Stage::Throttle,
                Stage::Cache,
                Stage::Backend,
                Stage::Response
            ]
        );
    }

    #[tokio::test]
    async fn test_at_most_one_failure_event() {
        let config = GatewayConfig {
            auth_enabled: true,
            ..open_config()
        };
        let pipeline = GatewayPipeline::with_registry(config, &reliable_registry()).unwrap();
        let result = pipeline
            .process_request(Method::GET, "/foo", None, "web-app")
            .await;

        let failures = result
            .events
            .iter()
            .filter(|e| e.outcome == StageOutcome::Failure)
            .count();
        assert_eq!(failures, 1);
        assert!(result.payload.is_none());
    }

    #[tokio::test]
    async fn test_auth_audit_detail_comes_from_outcome() {
        // Bypassed stage is audited with the outcome's own detail
        let pipeline =
            GatewayPipeline::with_registry(open_config(), &reliable_registry()).unwrap();
        let result = pipeline
            .process_request(Method::GET, "/foo", None, "web-app")
            .await;
        let auth = result.events.iter().find(|e| e.stage == Stage::Auth).unwrap();
        assert_eq!(auth.outcome, StageOutcome::Skipped);
        assert_eq!(auth.detail, AuthOutcome::Bypassed.detail());

        // Same for a granted credential
        let config = GatewayConfig {
            auth_enabled: true,
            ..open_config()
        };
        let pipeline = GatewayPipeline::with_registry(config, &reliable_registry()).unwrap();
        let result = pipeline
            .process_request(Method::GET, "/foo", Some("long-enough-token"), "web-app")
            .await;
        let auth = result.events.iter().find(|e| e.stage == Stage::Auth).unwrap();
        assert_eq!(auth.outcome, StageOutcome::Success);
        assert_eq!(auth.detail, AuthOutcome::Granted.detail());
    }

    #[tokio::test]
    async fn test_unknown_integration_rejected_at_construction() {
        let config = GatewayConfig {
            integration: "no-such-backend".to_string(),
            ..Default::default()
        };
        let err = GatewayPipeline::new(config).unwrap_err();
        assert_eq!(err.kind(), "Configuration");
    }

    #[tokio::test]
    async fn test_invalid_config_rejected_at_construction() {
        let config = GatewayConfig {
            rate_limit_capacity: 0,
            ..Default::default()
        };
        assert!(GatewayPipeline::new(config).is_err());
    }
}
