//! Prometheus metrics exposition
//!
//! Metrics recorded across the workspace:
//!
//! - `mcp_tool_calls_total` (counter): labels `tool`, `outcome`
//! - `mcp_tool_call_duration_seconds` (histogram): label `tool`
//! - `etsy_api_requests_total` (counter, etsy-client): labels `method`, `status`
//! - `etsy_token_refresh_total` (counter, etsy-auth): label `outcome`

use metrics_exporter_prometheus::{BuildError, Matcher, PrometheusBuilder, PrometheusHandle};

const TOOL_DURATION_METRIC: &str = "mcp_tool_call_duration_seconds";

/// Tool calls wrap one or two Etsy round trips, so buckets run from 50ms to 60s.
const TOOL_DURATION_BUCKETS: &[f64] = &[0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0];

fn builder() -> Result<PrometheusBuilder, BuildError> {
    PrometheusBuilder::new().set_buckets_for_metric(
        Matcher::Full(TOOL_DURATION_METRIC.to_string()),
        TOOL_DURATION_BUCKETS,
    )
}

/// Install the Prometheus recorder and return a handle for rendering `/metrics`.
pub fn install_recorder() -> Result<PrometheusHandle, BuildError> {
    builder()?.install_recorder()
}

/// Record one finished MCP tool call.
pub fn record_tool_call(tool: &'static str, success: bool, duration_secs: f64) {
    let outcome = if success { "success" } else { "error" };
    metrics::counter!("mcp_tool_calls_total", "tool" => tool, "outcome" => outcome).increment(1);
    metrics::histogram!(TOOL_DURATION_METRIC, "tool" => tool).record(duration_secs);
}
