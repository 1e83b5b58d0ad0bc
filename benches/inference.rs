//! Inference benchmark: trained detector scoring one connection.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use kitnet_detector::config::DetectorConfig;
use kitnet_detector::records::{ConnectionRecord, RecordTime};
use kitnet_detector::Detector;

fn record(i: usize) -> ConnectionRecord {
    ConnectionRecord {
        uid: Some(format!("C{i}")),
        timestamp: Some(RecordTime::Epoch(1_700_000_000.0 + i as f64)),
        src_ip: Some(format!("10.0.0.{}", i % 20)),
        dest_ip: Some("93.184.216.34".into()),
        protocol: "tcp".into(),
        src_port: 40_000 + (i as u64 % 20_000),
        dest_port: if i % 2 == 0 { 443 } else { 80 },
        duration: 0.5 + (i % 11) as f64 * 0.1,
        orig_bytes: 800 + (i as u64 % 13) * 50,
        resp_bytes: 9_000 + (i as u64 % 17) * 300,
        orig_pkts: 8,
        resp_pkts: 12,
        conn_state: "SF".into(),
        service: if i % 2 == 0 { "ssl" } else { "http" }.into(),
        ..Default::default()
    }
}

fn trained(stream_features: bool) -> Detector {
    let mut config = DetectorConfig::default();
    config.persist_on_finalize = false;
    config.mapper.buffer_size = 200;
    config.training.total_samples = 1_000;
    config.features.stream_features = stream_features;
    let mut detector = Detector::new(config).unwrap();
    for i in 0..1_000 {
        detector.process(&record(i));
    }
    detector
}

fn bench_score_base(c: &mut Criterion) {
    let mut detector = trained(false);
    let r = record(5_000);
    c.bench_function("detect_60d", |b| b.iter(|| detector.process(black_box(&r))));
}

fn bench_score_streams(c: &mut Criterion) {
    let mut detector = trained(true);
    let r = record(5_001);
    c.bench_function("detect_108d_streams", |b| {
        b.iter(|| detector.process(black_box(&r)))
    });
}

criterion_group!(benches, bench_score_base, bench_score_streams);
criterion_main!(benches);
