//! Scalar encodings shared by the extractor. Unknown categorical values encode as 0.

use chrono::{DateTime, Datelike, FixedOffset, Timelike};

/// `ln(1+x)` lands around 14 for a megabyte; dividing by 20 keeps typical traffic below 1.
pub fn log_normalize(value: f64) -> f64 {
    value.max(0.0).ln_1p() / 20.0
}

pub fn normalize_port(port: u64) -> f64 {
    (port as f64 / 65535.0).min(1.0)
}

pub fn is_well_known_port(port: u64) -> f64 {
    flag(port < 1024)
}

pub fn flag(on: bool) -> f64 {
    if on {
        1.0
    } else {
        0.0
    }
}

/// Non-finite inputs encode as 0 so one bad field cannot poison the vector.
pub fn finite(value: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        0.0
    }
}

pub fn protocol_code(protocol: &str) -> f64 {
    match protocol.trim().to_ascii_lowercase().as_str() {
        "tcp" => 0.2,
        "udp" => 0.4,
        "icmp" => 0.6,
        "sctp" => 0.8,
        _ => 0.0,
    }
}

pub fn conn_state_code(state: &str) -> f64 {
    match state.trim() {
        "S0" => 0.1,
        "S1" => 0.2,
        "SF" => 0.3,
        "REJ" => 0.4,
        "S2" => 0.5,
        "S3" => 0.6,
        "RSTO" => 0.7,
        "RSTR" => 0.8,
        "RSTOS0" => 0.85,
        "RSTRH" => 0.9,
        "SH" => 0.92,
        "SHR" => 0.95,
        "OTH" => 1.0,
        _ => 0.0,
    }
}

pub fn http_method_code(method: &str) -> f64 {
    match method.trim().to_ascii_uppercase().as_str() {
        "GET" => 0.1,
        "POST" => 0.2,
        "HEAD" => 0.3,
        "PUT" => 0.4,
        "DELETE" => 0.5,
        "OPTIONS" => 0.6,
        "PATCH" => 0.7,
        "CONNECT" => 0.9,
        _ => 0.0,
    }
}

/// Shannon entropy in bits over the (case-folded) character distribution.
pub fn shannon_entropy(text: &str) -> f64 {
    if text.is_empty() {
        return 0.0;
    }
    let mut counts: std::collections::BTreeMap<char, usize> = std::collections::BTreeMap::new();
    let mut total = 0usize;
    for c in text.chars().flat_map(char::to_lowercase) {
        *counts.entry(c).or_insert(0) += 1;
        total += 1;
    }
    let total = total as f64;
    counts
        .values()
        .map(|&n| {
            let p = n as f64 / total;
            -p * p.log2()
        })
        .sum()
}

/// Entropy scaled so typical hostnames fall in [0, 1].
pub fn normalized_entropy(text: &str) -> f64 {
    shannon_entropy(text) / 4.0
}

/// Second-level domain label (`example` in `www.example.com`), empty for bare labels.
pub fn second_level_label(query: &str) -> &str {
    let labels: Vec<&str> = query.trim_end_matches('.').rsplit('.').collect();
    if labels.len() >= 2 {
        labels[1]
    } else {
        ""
    }
}

/// `[hour, minute, weekday, weekend, business_hours, night]`, zeros when the time is unknown.
pub fn time_features(time: Option<DateTime<FixedOffset>>) -> [f64; 6] {
    let Some(dt) = time else {
        return [0.0; 6];
    };
    let hour = dt.hour();
    let weekday = dt.weekday().num_days_from_monday();
    [
        hour as f64 / 23.0,
        dt.minute() as f64 / 59.0,
        weekday as f64 / 6.0,
        flag(weekday >= 5),
        flag((9..=17).contains(&hour)),
        flag(hour <= 6),
    ]
}
