//! Demo driver for the gateway pipeline
//!
//! Fires a burst of requests through a pipeline built from an optional
//! YAML config file (first CLI argument) and prints the metrics snapshot
//! and request history. Useful for watching the stage flow in the logs:
//!
//! ```text
//! RUST_LOG=gateway_core=debug cargo run -- gateway.yaml
//! ```

use std::sync::Arc;

use anyhow::Context;
use futures::future::join_all;
use http::Method;
use tracing::info;
use tracing_subscriber::EnvFilter;

use gateway_core::{GatewayConfig, GatewayPipeline};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = match std::env::args().nth(1) {
        Some(path) => GatewayConfig::from_yaml_file(&path)
            .with_context(|| format!("loading config from {path}"))?,
        None => GatewayConfig::default(),
    };

    info!(integration = %config.integration, "starting gateway pipeline demo");
    let pipeline = Arc::new(GatewayPipeline::new(config)?);

    // A concurrent burst past the default capacity, so throttling is
    // visible, with repeated GETs to show the cache path.
    let requests = (0..15).map(|i| {
        let pipeline = pipeline.clone();
        async move {
            pipeline
                .process_request(
                    Method::GET,
                    "/users/123",
                    Some("demo-credential-token"),
                    if i % 2 == 0 { "web-app" } else { "mobile-app" },
                )
                .await
        }
    });

    for result in join_all(requests).await {
        info!(
            status = result.status.as_u16(),
            reason = %result.reason,
            cache_hit = result.is_cache_hit(),
            latency = ?result.latency,
            "request finished"
        );
    }

    let snapshot = pipeline.metrics();
    println!("metrics: {}", serde_json::to_string_pretty(&snapshot)?);
    println!(
        "history: {}",
        serde_json::to_string_pretty(&pipeline.recent_requests())?
    );

    Ok(())
}
