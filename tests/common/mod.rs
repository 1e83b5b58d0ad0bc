//! Shared fixtures: deterministic "normal" traffic and small training budgets.

#![allow(dead_code)]

use kitnet_detector::config::DetectorConfig;
use kitnet_detector::records::{ConnectionRecord, DnsRecord, HttpRecord, RecordTime, TlsRecord};
use std::path::Path;

pub const MAPPING_SAMPLES: usize = 50;
pub const TOTAL_SAMPLES: u64 = 300;

/// Config with a short training budget; nothing is written to disk unless a model
/// path is given.
pub fn small_config(model_path: Option<&Path>) -> DetectorConfig {
    let mut config = DetectorConfig::default();
    config.mapper.buffer_size = MAPPING_SAMPLES;
    config.training.total_samples = TOTAL_SAMPLES;
    config.autoencoder.min_history = 20;
    match model_path {
        Some(p) => {
            config.model_path = p.to_path_buf();
            config.data_dir = p.parent().map(Path::to_path_buf).unwrap_or_default();
        }
        None => config.persist_on_finalize = false,
    }
    config
}

/// Deterministic mix of web, TLS and DNS connections from a handful of hosts.
pub fn normal_record(i: usize) -> ConnectionRecord {
    let host = format!("10.0.0.{}", 10 + i % 5);
    let ts = 1_700_000_000.0 + i as f64 * 1.5;
    let jitter = (i % 7) as u64;
    let base = ConnectionRecord {
        uid: Some(format!("C{i:06}")),
        timestamp: Some(RecordTime::Epoch(ts)),
        src_ip: Some(host),
        src_port: 49_152 + (i as u64 * 37) % 16_000,
        conn_state: "SF".into(),
        history: "ShADadFf".into(),
        local_orig: true,
        ..Default::default()
    };
    match i % 3 {
        0 => ConnectionRecord {
            dest_ip: Some("93.184.216.34".into()),
            protocol: "tcp".into(),
            dest_port: 443,
            duration: 1.0 + jitter as f64 * 0.2,
            orig_bytes: 1_200 + jitter * 40,
            resp_bytes: 18_000 + jitter * 500,
            orig_pkts: 12 + jitter,
            resp_pkts: 20 + jitter,
            service: "ssl".into(),
            tls: Some(TlsRecord {
                established: true,
                server_name: "example.com".into(),
                ..Default::default()
            }),
            ..base
        },
        1 => ConnectionRecord {
            dest_ip: Some("10.0.0.2".into()),
            protocol: "udp".into(),
            dest_port: 53,
            duration: 0.01 + jitter as f64 * 0.002,
            orig_bytes: 40 + jitter,
            resp_bytes: 120 + jitter * 3,
            orig_pkts: 1,
            resp_pkts: 1,
            service: "dns".into(),
            history: "Dd".into(),
            dns: Some(DnsRecord {
                query: "www.example.com".into(),
                answers: vec!["93.184.216.34".into()],
                ..Default::default()
            }),
            ..base
        },
        _ => ConnectionRecord {
            dest_ip: Some("198.51.100.7".into()),
            protocol: "tcp".into(),
            dest_port: 80,
            duration: 0.3 + jitter as f64 * 0.05,
            orig_bytes: 400 + jitter * 10,
            resp_bytes: 5_000 + jitter * 200,
            orig_pkts: 5 + jitter,
            resp_pkts: 6 + jitter,
            service: "http".into(),
            http: Some(HttpRecord {
                method: "GET".into(),
                uri: "/index.html".into(),
                response_body_len: 4_800 + jitter * 200,
                ..Default::default()
            }),
            ..base
        },
    }
}

/// A connection unlike anything in [`normal_record`]: huge upload to an odd port.
pub fn exfil_record() -> ConnectionRecord {
    ConnectionRecord {
        uid: Some("Cexfil".into()),
        timestamp: Some(RecordTime::Epoch(1_700_000_000.0 + 3.0 * 3600.0)),
        src_ip: Some("10.0.0.99".into()),
        dest_ip: Some("203.0.113.66".into()),
        protocol: "tcp".into(),
        src_port: 50_001,
        dest_port: 31_337,
        duration: 7_200.0,
        orig_bytes: 4_000_000_000,
        resp_bytes: 10,
        orig_pkts: 2_500_000,
        resp_pkts: 3,
        conn_state: "RSTO".into(),
        service: String::new(),
        missed_bytes: 900_000,
        history: "ShADadadadadadadadadadadadadR".into(),
        ..Default::default()
    }
}

/// Feed `n` normal records, returning every score.
pub fn feed(detector: &mut kitnet_detector::Detector, range: std::ops::Range<usize>) -> Vec<f64> {
    range.map(|i| detector.process(&normal_record(i))).collect()
}
