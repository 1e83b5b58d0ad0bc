//! Connection records handed to the detector by the log-tailing side.
//! Field names follow Zeek's conn/dns/http/ssl logs; Zeek's dotted names are accepted as aliases.

mod lenient;
mod reader;

use chrono::{DateTime, FixedOffset, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

pub use reader::{read_in_background, RecordReader};

/// One pre-parsed connection, optionally enriched with protocol sub-records.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConnectionRecord {
    #[serde(default, deserialize_with = "lenient::opt_text")]
    pub uid: Option<String>,
    #[serde(default, alias = "ts", deserialize_with = "lenient::opt_time")]
    pub timestamp: Option<RecordTime>,
    #[serde(default, alias = "id.orig_h", deserialize_with = "lenient::opt_text")]
    pub src_ip: Option<String>,
    #[serde(default, alias = "id.resp_h", deserialize_with = "lenient::opt_text")]
    pub dest_ip: Option<String>,
    #[serde(default, alias = "proto", deserialize_with = "lenient::text")]
    pub protocol: String,
    #[serde(default, alias = "id.orig_p", deserialize_with = "lenient::uint")]
    pub src_port: u64,
    #[serde(default, alias = "id.resp_p", deserialize_with = "lenient::uint")]
    pub dest_port: u64,
    #[serde(default, deserialize_with = "lenient::float")]
    pub duration: f64,
    #[serde(default, deserialize_with = "lenient::uint")]
    pub orig_bytes: u64,
    #[serde(default, deserialize_with = "lenient::uint")]
    pub resp_bytes: u64,
    #[serde(default, deserialize_with = "lenient::uint")]
    pub orig_pkts: u64,
    #[serde(default, deserialize_with = "lenient::uint")]
    pub resp_pkts: u64,
    #[serde(default, deserialize_with = "lenient::text")]
    pub conn_state: String,
    #[serde(default, deserialize_with = "lenient::text")]
    pub service: String,
    #[serde(default, deserialize_with = "lenient::uint")]
    pub missed_bytes: u64,
    #[serde(default, deserialize_with = "lenient::text")]
    pub history: String,
    #[serde(default, deserialize_with = "lenient::flag")]
    pub local_orig: bool,
    #[serde(default, deserialize_with = "lenient::flag")]
    pub local_resp: bool,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient::object")]
    pub dns: Option<DnsRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient::object")]
    pub http: Option<HttpRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient::object")]
    pub tls: Option<TlsRecord>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DnsRecord {
    #[serde(default, deserialize_with = "lenient::text")]
    pub query: String,
    #[serde(default, deserialize_with = "lenient::flag")]
    pub rejected: bool,
    #[serde(default, deserialize_with = "lenient::texts")]
    pub answers: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HttpRecord {
    #[serde(default, deserialize_with = "lenient::text")]
    pub method: String,
    #[serde(default, deserialize_with = "lenient::text")]
    pub uri: String,
    #[serde(default, deserialize_with = "lenient::uint")]
    pub request_body_len: u64,
    #[serde(default, deserialize_with = "lenient::uint")]
    pub response_body_len: u64,
    #[serde(default, deserialize_with = "lenient::flag")]
    pub uri_suspicious: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TlsRecord {
    #[serde(default, deserialize_with = "lenient::flag")]
    pub established: bool,
    #[serde(default, deserialize_with = "lenient::flag")]
    pub self_signed: bool,
    #[serde(default, deserialize_with = "lenient::flag")]
    pub expired: bool,
    /// Absent means valid
    #[serde(default = "lenient::yes", deserialize_with = "lenient::flag")]
    pub cert_valid: bool,
    #[serde(default, deserialize_with = "lenient::text")]
    pub server_name: String,
}

impl Default for TlsRecord {
    fn default() -> Self {
        Self {
            established: false,
            self_signed: false,
            expired: false,
            cert_valid: true,
            server_name: String::new(),
        }
    }
}

/// Record timestamp as emitted upstream: epoch seconds or an ISO-8601 string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RecordTime {
    Epoch(f64),
    Text(String),
}

impl RecordTime {
    /// Wall-clock time in the record's own offset (UTC for epoch and naive times).
    pub fn to_datetime(&self) -> Option<DateTime<FixedOffset>> {
        let utc = FixedOffset::east_opt(0)?;
        match self {
            RecordTime::Epoch(secs) => {
                if !secs.is_finite() {
                    return None;
                }
                let whole = secs.floor();
                let nanos = ((secs - whole) * 1e9) as u32;
                let dt = Utc.timestamp_opt(whole as i64, nanos.min(999_999_999)).single()?;
                Some(dt.with_timezone(&utc))
            }
            RecordTime::Text(raw) => {
                let s = raw.trim();
                if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
                    return Some(dt);
                }
                ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"]
                    .iter()
                    .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
                    .map(|naive| utc.from_utc_datetime(&naive))
            }
        }
    }

    /// Seconds since the epoch, if the timestamp is usable.
    pub fn epoch_seconds(&self) -> Option<f64> {
        match self {
            RecordTime::Epoch(secs) if secs.is_finite() => Some(*secs),
            RecordTime::Epoch(_) => None,
            RecordTime::Text(_) => self
                .to_datetime()
                .map(|dt| dt.timestamp_micros() as f64 / 1e6),
        }
    }
}

impl ConnectionRecord {
    pub fn from_json(line: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(line)
    }

    /// Upstream identifier if present, otherwise empty.
    pub fn event_id(&self) -> &str {
        self.uid.as_deref().unwrap_or("")
    }

    /// Record time in epoch milliseconds, 0 when missing or unparsable.
    pub fn ts_millis(&self) -> i64 {
        self.timestamp
            .as_ref()
            .and_then(RecordTime::to_datetime)
            .map(|dt| dt.timestamp_millis())
            .unwrap_or(0)
    }
}
