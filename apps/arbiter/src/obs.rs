use clap::ValueEnum;
use metrics::Unit;
use std::net::SocketAddr;

pub const LOG_ENV: &str = "ARBITER_LOG";

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MetricKind {
    Counter,
    Millis,
    Value,
}

const METRICS: &[(&str, MetricKind, &str)] = &[
    ("arbiter.decision.calls_total", MetricKind::Counter, "decisions made, llm or fallback"),
    ("arbiter.decision.parse_path_total", MetricKind::Counter, "decisions by parse path"),
    ("arbiter.decision.latency_ms", MetricKind::Millis, "prompt to decision latency"),
    ("arbiter.generation.calls_total", MetricKind::Counter, "backend generations, by result"),
    ("arbiter.generation.call_ms", MetricKind::Millis, "backend generation latency"),
    ("arbiter.generation.updates_total", MetricKind::Counter, "shared parameter updates"),
    ("arbiter.policy.updates_total", MetricKind::Counter, "completed policy training steps"),
    ("arbiter.loop.iterations_total", MetricKind::Counter, "completed loop iterations"),
    ("arbiter.loop.execution_errors_total", MetricKind::Counter, "failed score calls"),
    ("arbiter.loop.iteration_ms", MetricKind::Millis, "wall time per iteration"),
    ("arbiter.loop.reward", MetricKind::Value, "scaled reward per iteration"),
    ("arbiter.infra.generation.requests_total", MetricKind::Counter, "remote backend requests"),
    ("arbiter.infra.generation.errors_total", MetricKind::Counter, "remote backend failures"),
    ("arbiter.infra.market.fills_total", MetricKind::Counter, "simulated fills, by side"),
    ("arbiter.infra.market.rejected_total", MetricKind::Counter, "actions the market rejected"),
    ("arbiter.infra.artifacts.write_ms", MetricKind::Millis, "run artifact write time"),
    ("arbiter.cli.run_ms", MetricKind::Millis, "wall time of a run command"),
];

/// `ARBITER_LOG` wins over `--log-level` unless it is unset or blank.
fn log_filter(log_level: &str, env_value: Option<String>) -> String {
    env_value
        .filter(|value| !value.trim().is_empty())
        .unwrap_or_else(|| log_level.to_string())
}

/// Logs go to stderr so `run --json` keeps stdout to a single summary line.
pub fn init_tracing(log_level: &str, log_format: LogFormat) -> Result<(), String> {
    let filter = log_filter(log_level, std::env::var(LOG_ENV).ok());
    let env_filter = tracing_subscriber::EnvFilter::try_new(&filter)
        .map_err(|err| format!("invalid log filter {filter:?}: {err}"))?;
    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr);

    let installed = match log_format {
        LogFormat::Json => builder.json().try_init(),
        LogFormat::Text => builder.try_init(),
    };
    installed.map_err(|err| format!("failed to install {log_format:?} log subscriber: {err}"))
}

fn describe_metrics() {
    for &(name, kind, description) in METRICS {
        match kind {
            MetricKind::Counter => {
                metrics::describe_counter!(name, description);
            }
            MetricKind::Millis => {
                metrics::describe_histogram!(name, Unit::Milliseconds, description);
            }
            MetricKind::Value => {
                metrics::describe_histogram!(name, description);
            }
        }
    }
}

#[cfg(feature = "prometheus")]
pub fn init_metrics(metrics_addr: Option<&str>) -> Result<Option<SocketAddr>, String> {
    use metrics_exporter_prometheus::PrometheusBuilder;

    let Some(raw) = metrics_addr else {
        return Ok(None);
    };
    let addr: SocketAddr = raw
        .parse()
        .map_err(|err| format!("invalid --metrics-addr (expected host:port): {err}"))?;

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|err| format!("failed to install prometheus exporter on {addr}: {err}"))?;
    describe_metrics();

    tracing::info!(metrics_addr = %addr, metrics = METRICS.len(), "prometheus exporter listening");
    Ok(Some(addr))
}

#[cfg(not(feature = "prometheus"))]
pub fn init_metrics(metrics_addr: Option<&str>) -> Result<Option<SocketAddr>, String> {
    if metrics_addr.is_some() {
        return Err("metrics exporter requires arbiter feature `prometheus`".to_string());
    }
    describe_metrics();
    Ok(None)
}
