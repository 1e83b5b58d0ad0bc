//! Feature extraction: connection record (+ optional stream statistics) → vector.
//! Total and pure: every field has a documented default and nothing is mutated.

use super::encoding::{
    conn_state_code, finite, flag, http_method_code, is_well_known_port, log_normalize,
    normalize_port, normalized_entropy, protocol_code, second_level_label, time_features,
};
use super::{feature_width, layout, FeatureVector, StreamFeatures, BASE_FEATURE_DIM};
use crate::config::FeaturesConfig;
use crate::records::{ConnectionRecord, DnsRecord, HttpRecord, RecordTime, TlsRecord};

const RATIO_CAP: f64 = 10.0;

#[derive(Debug, Clone)]
pub struct FeatureExtractor {
    config: FeaturesConfig,
}

impl FeatureExtractor {
    pub fn new(config: FeaturesConfig) -> Self {
        Self { config }
    }

    pub fn width(&self) -> usize {
        feature_width(self.config.stream_features)
    }

    pub fn stream_features(&self) -> bool {
        self.config.stream_features
    }

    /// Encode one record. `streams` is ignored unless stream features are enabled,
    /// and treated as all-zero when missing.
    pub fn extract(
        &self,
        record: &ConnectionRecord,
        streams: Option<&StreamFeatures>,
    ) -> FeatureVector {
        let mut values = Vec::with_capacity(self.width());

        connection_features(record, &mut values);
        traffic_features(record, &mut values);
        let time = record.timestamp.as_ref().and_then(RecordTime::to_datetime);
        values.extend_from_slice(&time_features(time));
        service_features(&record.service, &mut values);
        dns_features(record.dns.as_ref(), &mut values);
        http_features(record.http.as_ref(), &mut values);
        tls_features(record.tls.as_ref(), &mut values);
        ratio_features(record, &mut values);
        debug_assert_eq!(values.len(), BASE_FEATURE_DIM);

        if self.config.stream_features {
            let s = streams.copied().unwrap_or_default();
            values.extend(s.host.iter().chain(s.pair.iter()).map(|v| finite(*v)));
            debug_assert_eq!(values.len(), layout::STREAM.end);
        }

        FeatureVector::new(values)
    }
}

fn connection_features(r: &ConnectionRecord, out: &mut Vec<f64>) {
    let duration = finite(r.duration).max(0.0);
    out.extend_from_slice(&[
        normalize_port(r.src_port),
        normalize_port(r.dest_port),
        is_well_known_port(r.src_port),
        is_well_known_port(r.dest_port),
        protocol_code(&r.protocol),
        conn_state_code(&r.conn_state),
        duration,
        (duration / 3600.0).min(1.0),
        flag(r.local_orig),
        flag(r.local_resp),
    ]);
}

fn traffic_features(r: &ConnectionRecord, out: &mut Vec<f64>) {
    let orig_bytes = r.orig_bytes as f64;
    let resp_bytes = r.resp_bytes as f64;
    let orig_pkts = r.orig_pkts as f64;
    let resp_pkts = r.resp_pkts as f64;
    let total_bytes = orig_bytes + resp_bytes;
    let total_pkts = orig_pkts + resp_pkts;

    out.extend_from_slice(&[
        log_normalize(orig_bytes),
        log_normalize(resp_bytes),
        log_normalize(total_bytes),
        orig_bytes / (total_bytes + 1.0),
        resp_bytes / (total_bytes + 1.0),
        log_normalize(orig_pkts),
        log_normalize(resp_pkts),
        log_normalize(total_pkts),
        orig_bytes / (orig_pkts + 1.0),
        resp_bytes / (resp_pkts + 1.0),
        r.missed_bytes as f64 / (total_bytes + 1.0),
        r.history.chars().count() as f64,
    ]);
}

fn service_features(service: &str, out: &mut Vec<f64>) {
    let s = service.trim().to_ascii_lowercase();
    out.extend_from_slice(&[
        flag(s == "dns"),
        flag(s == "http"),
        flag(s == "ssl"),
        flag(s == "ssh"),
        flag(s == "smtp"),
        flag(s == "ftp"),
        flag(s == "smb" || s == "dce_rpc"),
        flag(s.is_empty()),
    ]);
}

fn dns_features(dns: Option<&DnsRecord>, out: &mut Vec<f64>) {
    let Some(dns) = dns else {
        out.extend_from_slice(&[0.0; 8]);
        return;
    };
    let query = dns.query.as_str();
    let len = query.chars().count() as f64;
    let first_label = if query.contains('.') {
        normalized_entropy(query.split('.').next().unwrap_or(""))
    } else {
        0.0
    };
    out.extend_from_slice(&[
        1.0,
        len / 255.0,
        query.matches('.').count() as f64 / 10.0,
        normalized_entropy(query),
        flag(dns.rejected),
        dns.answers.len() as f64 / 10.0,
        flag(len > 50.0),
        first_label,
    ]);
}

fn http_features(http: Option<&HttpRecord>, out: &mut Vec<f64>) {
    let Some(http) = http else {
        out.extend_from_slice(&[0.0; 6]);
        return;
    };
    out.extend_from_slice(&[
        1.0,
        http_method_code(&http.method),
        log_normalize(http.request_body_len as f64),
        log_normalize(http.response_body_len as f64),
        http.uri.chars().count() as f64 / 2000.0,
        flag(http.uri_suspicious),
    ]);
}

fn tls_features(tls: Option<&TlsRecord>, out: &mut Vec<f64>) {
    let Some(tls) = tls else {
        out.extend_from_slice(&[0.0; 6]);
        return;
    };
    out.extend_from_slice(&[
        1.0,
        flag(tls.established),
        flag(tls.self_signed),
        flag(tls.expired),
        flag(tls.cert_valid),
        tls.server_name.chars().count() as f64 / 255.0,
    ]);
}

fn ratio_features(r: &ConnectionRecord, out: &mut Vec<f64>) {
    let query = r.dns.as_ref().map(|d| d.query.as_str()).unwrap_or("");
    out.extend_from_slice(&[
        (r.orig_bytes as f64 / (r.resp_bytes as f64 + 1.0)).min(RATIO_CAP),
        (r.orig_pkts as f64 / (r.resp_pkts as f64 + 1.0)).min(RATIO_CAP),
        normalized_entropy(query),
        normalized_entropy(second_level_label(query)),
    ]);
}
