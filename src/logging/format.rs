//! Log setup (tracing to stderr) and ndjson alert lines on a separate writer.

use serde::Serialize;
use std::io::Write;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Alert line written for every non-low risk result.
#[derive(Serialize)]
pub struct AlertLine<'a> {
    pub ts: String,
    pub source: &'a str,
    pub event_type: &'a str,
    pub event_id: &'a str,
    pub anomaly_score: f64,
    pub risk_level: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub src_ip: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dest_ip: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dest_port: Option<u64>,
}

pub struct StructuredLogger;

impl StructuredLogger {
    /// Install global subscriber writing to stderr, level from RUST_LOG or default.
    /// Safe to call more than once; later calls are no-ops.
    pub fn init(json: bool, default_level: &str) {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
        if json {
            let fmt = tracing_subscriber::fmt::layer()
                .json()
                .with_span_events(FmtSpan::NONE)
                .with_writer(std::io::stderr);
            let _ = tracing_subscriber::registry().with(filter).with(fmt).try_init();
        } else {
            let _ = tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
                .try_init();
        }
    }

    /// Emit a single JSON line without going through tracing
    pub fn emit_json(event: &impl Serialize, w: &mut impl Write) -> std::io::Result<()> {
        let line = serde_json::to_string(event).map_err(std::io::Error::other)?;
        writeln!(w, "{}", line)
    }
}
