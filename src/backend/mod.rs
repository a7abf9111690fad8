//! # Backend Integration Stage
//!
//! Dispatches a validated request to one of several backend integration
//! profiles. A profile is pure data: a latency range, an error
//! probability, and a canned response template. Adding a backend is a
//! registry insert, not a new code path.
//!
//! Latency is drawn uniformly from the profile's range and failure is
//! injected at the profile's probability, both from a seedable RNG so test
//! runs are deterministic. In `Wall` mode the drawn latency is actually
//! slept, modelling network/compute time; in `Recorded` mode it is only
//! reported on the response.

use std::time::Duration;

use dashmap::DashMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, warn};

use crate::core::config::LatencyMode;
use crate::core::error::{GatewayError, GatewayResult};
use crate::core::types::{BackendResponse, ResponseSource};

/// Static description of a backend integration
///
/// Read-only at runtime; the invoker treats it as configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntegrationProfile {
    /// Registry key ("lambda", "http", "aws-service", "mock", ...)
    pub name: String,

    /// Human-readable name for logs and display layers
    pub display_name: String,

    /// Lower bound of the simulated latency range
    #[serde(with = "humantime_serde")]
    pub latency_min: Duration,

    /// Upper bound of the simulated latency range
    #[serde(with = "humantime_serde")]
    pub latency_max: Duration,

    /// Probability in [0, 1] that an invocation fails with `BackendError`
    pub error_probability: f64,

    /// Status code of the canned response
    pub response_status: u16,

    /// Canned response body returned on success
    pub response_body: serde_json::Value,
}

impl IntegrationProfile {
    fn validate(&self) -> GatewayResult<()> {
        if self.name.is_empty() {
            return Err(GatewayError::config("integration profile name is empty"));
        }
        if self.latency_min > self.latency_max {
            return Err(GatewayError::config(format!(
                "integration {}: latency_min exceeds latency_max",
                self.name
            )));
        }
        if !(0.0..=1.0).contains(&self.error_probability) {
            return Err(GatewayError::config(format!(
                "integration {}: error_probability must be within [0, 1]",
                self.name
            )));
        }
        Ok(())
    }

    pub fn lambda() -> Self {
        Self {
            name: "lambda".to_string(),
            display_name: "Lambda Function".to_string(),
            latency_min: Duration::from_millis(50),
            latency_max: Duration::from_millis(200),
            error_probability: 0.05,
            response_status: 200,
            response_body: json!({
                "message": "Lambda function executed successfully",
                "data": { "userId": 123, "name": "John Doe" }
            }),
        }
    }

    pub fn http() -> Self {
        Self {
            name: "http".to_string(),
            display_name: "HTTP Endpoint".to_string(),
            latency_min: Duration::from_millis(100),
            latency_max: Duration::from_millis(1000),
            error_probability: 0.10,
            response_status: 200,
            response_body: json!({
                "message": "HTTP endpoint response",
                "data": { "result": "success" }
            }),
        }
    }

    pub fn aws_service() -> Self {
        Self {
            name: "aws-service".to_string(),
            display_name: "AWS Service".to_string(),
            latency_min: Duration::from_millis(20),
            latency_max: Duration::from_millis(100),
            error_probability: 0.05,
            response_status: 200,
            response_body: json!({
                "message": "AWS service operation completed",
                "data": { "operation": "success" }
            }),
        }
    }

    pub fn mock() -> Self {
        Self {
            name: "mock".to_string(),
            display_name: "Mock Integration".to_string(),
            latency_min: Duration::from_millis(5),
            latency_max: Duration::from_millis(20),
            error_probability: 0.05,
            response_status: 200,
            response_body: json!({
                "message": "Mock response",
                "data": { "mock": true }
            }),
        }
    }
}

/// Runtime registry of integration profiles
///
/// Swapping or adding a backend is a registry operation, never a code
/// change.
pub struct ProfileRegistry {
    profiles: DashMap<String, IntegrationProfile>,
}

impl ProfileRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self {
            profiles: DashMap::new(),
        }
    }

    /// Registry pre-populated with the four built-in profiles
    pub fn builtin() -> Self {
        let registry = Self::new();
        for profile in [
            IntegrationProfile::lambda(),
            IntegrationProfile::http(),
            IntegrationProfile::aws_service(),
            IntegrationProfile::mock(),
        ] {
            // Built-ins are valid by construction
            registry.profiles.insert(profile.name.clone(), profile);
        }
        registry
    }

    /// Register or replace a profile, validating it first
    pub fn register(&self, profile: IntegrationProfile) -> GatewayResult<()> {
        profile.validate()?;
        debug!(name = %profile.name, "integration profile registered");
        self.profiles.insert(profile.name.clone(), profile);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<IntegrationProfile> {
        self.profiles.get(name).map(|p| p.clone())
    }

    pub fn names(&self) -> Vec<String> {
        self.profiles.iter().map(|p| p.key().clone()).collect()
    }
}

impl Default for ProfileRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

/// Invokes backend integrations with simulated latency and failure
/// injection
///
/// Invocations for different requests are independent and may run fully in
/// parallel; the RNG lock is held only for the two draws, never across an
/// await point.
#[derive(Debug)]
pub struct BackendInvoker {
    rng: Mutex<fastrand::Rng>,
    mode: LatencyMode,
}

impl BackendInvoker {
    pub fn new(mode: LatencyMode) -> Self {
        Self {
            rng: Mutex::new(fastrand::Rng::new()),
            mode,
        }
    }

    /// Invoker with a fixed RNG seed for deterministic latency and failure
    /// sequences
    pub fn with_seed(mode: LatencyMode, seed: u64) -> Self {
        Self {
            rng: Mutex::new(fastrand::Rng::with_seed(seed)),
            mode,
        }
    }

    /// Invoke the given integration profile
    ///
    /// Draws latency uniformly from `[latency_min, latency_max]`, applies
    /// it per the latency mode, then fails with `BackendError` at the
    /// profile's error probability.
    pub async fn invoke(&self, profile: &IntegrationProfile) -> GatewayResult<BackendResponse> {
        let (latency, failed) = {
            let mut rng = self.rng.lock();
            let span = profile.latency_max.saturating_sub(profile.latency_min);
            let latency = profile.latency_min + span.mul_f64(rng.f64());
            let failed = rng.f64() < profile.error_probability;
            (latency, failed)
        };

        if self.mode == LatencyMode::Wall {
            tokio::time::sleep(latency).await;
        }

        if failed {
            warn!(integration = %profile.name, ?latency, "backend invocation failed");
            return Err(GatewayError::backend(
                profile.name.clone(),
                "injected backend failure".to_string(),
            ));
        }

        debug!(integration = %profile.name, ?latency, "backend responded");
        Ok(BackendResponse {
            status: profile.response_status,
            body: profile.response_body.clone(),
            integration: profile.name.clone(),
            latency,
            source: ResponseSource::Backend,
        })
    }
}
