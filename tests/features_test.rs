//! Feature extraction: layout, totality, lenient record decoding.

mod common;

use common::normal_record;
use kitnet_detector::config::FeaturesConfig;
use kitnet_detector::features::{layout, FeatureExtractor, StreamTracker, BASE_FEATURE_DIM};
use kitnet_detector::records::{ConnectionRecord, RecordReader, RecordTime};
use proptest::prelude::*;

fn extractor(stream_features: bool) -> FeatureExtractor {
    FeatureExtractor::new(FeaturesConfig {
        stream_features,
        ..Default::default()
    })
}

fn ssl_record() -> ConnectionRecord {
    ConnectionRecord {
        src_ip: Some("192.168.1.20".into()),
        dest_ip: Some("151.101.1.69".into()),
        protocol: "tcp".into(),
        src_port: 51_234,
        dest_port: 443,
        duration: 2.3,
        orig_bytes: 1_500,
        resp_bytes: 20_000,
        orig_pkts: 14,
        resp_pkts: 22,
        conn_state: "SF".into(),
        service: "ssl".into(),
        ..Default::default()
    }
}

#[test]
fn ssl_connection_layout() {
    let v = extractor(false).extract(&ssl_record(), None);
    assert_eq!(v.dim(), BASE_FEATURE_DIM);
    assert_eq!(v.values[layout::SERVICE_SSL], 1.0);
    assert_eq!(v.values[layout::SERVICE_DNS], 0.0);
    assert_eq!(v.values[layout::SERVICE_HTTP], 0.0);
    assert_eq!(v.values[layout::SERVICE_UNKNOWN], 0.0);
    assert!(v.range(layout::DNS).iter().all(|x| *x == 0.0));
    assert!(v.range(layout::HTTP).iter().all(|x| *x == 0.0));
    assert!(v.range(layout::TLS).iter().all(|x| *x == 0.0));
    // duration and the well-known destination port
    assert_eq!(v.values[6], 2.3);
    assert_eq!(v.values[3], 1.0);
    // capped orig/resp byte ratio
    assert!((v.values[layout::RATIOS.start] - 1_500.0 / 20_001.0).abs() < 1e-12);
}

#[test]
fn width_follows_stream_setting() {
    assert_eq!(extractor(false).width(), 60);
    assert_eq!(extractor(true).width(), 108);
    let v = extractor(true).extract(&ssl_record(), None);
    assert_eq!(v.dim(), 108);
    assert!(v.range(layout::STREAM).iter().all(|x| *x == 0.0));
}

#[test]
fn extraction_is_pure() {
    let e = extractor(false);
    let r = normal_record(7);
    assert_eq!(e.extract(&r, None), e.extract(&r, None));
}

#[test]
fn empty_record_still_yields_a_vector() {
    let v = extractor(false).extract(&ConnectionRecord::default(), None);
    assert_eq!(v.dim(), 60);
    assert!(v.values.iter().all(|x| x.is_finite()));
    assert_eq!(v.values[layout::SERVICE_UNKNOWN], 1.0);
}

#[test]
fn dns_query_features() {
    let r = normal_record(1);
    let v = extractor(false).extract(&r, None);
    assert_eq!(v.values[layout::SERVICE_DNS], 1.0);
    let dns = v.range(layout::DNS);
    assert_eq!(dns[0], 1.0);
    assert!((dns[1] - 15.0 / 255.0).abs() < 1e-12);
    assert!((dns[2] - 0.2).abs() < 1e-12);
    assert!(dns[3] > 0.0);
}

#[test]
fn zeek_placeholders_decode_to_defaults() {
    let line = r#"{"ts":"-","uid":"CxyZ","id.orig_h":"10.1.1.1","id.orig_p":"-","id.resp_h":"10.1.1.2","id.resp_p":"443","proto":"tcp","duration":null,"orig_bytes":"-","resp_bytes":"512","conn_state":"S0","service":"-","local_orig":"T","dns":"-"}"#;
    let r = ConnectionRecord::from_json(line).unwrap();
    assert_eq!(r.timestamp, None);
    assert_eq!(r.src_ip.as_deref(), Some("10.1.1.1"));
    assert_eq!(r.src_port, 0);
    assert_eq!(r.dest_port, 443);
    assert_eq!(r.duration, 0.0);
    assert_eq!(r.orig_bytes, 0);
    assert_eq!(r.resp_bytes, 512);
    assert_eq!(r.service, "");
    assert!(r.local_orig);
    assert!(r.dns.is_none());
    assert_eq!(r.event_id(), "CxyZ");

    let v = extractor(false).extract(&r, None);
    assert_eq!(v.values[layout::SERVICE_UNKNOWN], 1.0);
}

#[test]
fn iso_timestamps_keep_their_offset() {
    let r = ConnectionRecord::from_json(r#"{"timestamp":"2024-03-09T23:30:00+02:00"}"#).unwrap();
    assert!(matches!(r.timestamp, Some(RecordTime::Text(_))));
    let time = extractor(false).extract(&r, None);
    let t = time.range(layout::TIME);
    assert_eq!(t[0], 1.0, "hour 23 in the record's own offset");
    assert_eq!(t[3], 1.0, "saturday");
}

#[test]
fn reader_skips_blank_lines_and_reports_bad_ones() {
    let input = "{\"uid\":\"a\"}\n\n{broken\n{\"uid\":\"b\"}\n";
    let mut reader = RecordReader::new(input.as_bytes());
    assert_eq!(reader.next().unwrap().unwrap().event_id(), "a");
    let err = reader.next().unwrap().unwrap_err();
    assert!(err.to_string().starts_with("line 3"), "{err}");
    assert_eq!(reader.next().unwrap().unwrap().event_id(), "b");
    assert!(reader.next().is_none());
    assert_eq!(reader.lines_read(), 4);
}

#[test]
fn stream_tracker_respects_capacity() {
    let mut tracker = StreamTracker::new(&FeaturesConfig {
        stream_features: true,
        max_stream_entries: 2,
        ..Default::default()
    });
    for i in 0..10 {
        let mut r = ssl_record();
        r.src_ip = Some(format!("10.9.0.{i}"));
        tracker.observe(&r);
        assert!(tracker.host_count() <= 2);
        assert!(tracker.pair_count() <= 2);
    }
    assert_eq!(tracker.evictions(), 16);
    assert!(tracker.host("10.9.0.9").is_some());
    assert!(tracker.host("10.9.0.0").is_none());
}

#[test]
fn stream_statistics_accumulate_per_host() {
    let mut tracker = StreamTracker::new(&FeaturesConfig::default());
    let mut r = ssl_record();
    r.timestamp = Some(RecordTime::Epoch(100.0));
    let first = tracker.observe(&r);
    r.timestamp = Some(RecordTime::Epoch(102.0));
    let second = tracker.observe(&r);
    // weight of the packet-size statistic grows, inter-arrival appears on the second sighting
    assert_eq!(first.host[0], 1.0);
    assert!(second.host[0] > 1.0);
    assert_eq!(first.host[6], 0.0);
    assert_eq!(second.host[6], 1.0);
    assert_eq!(second.host[7], 2.0);
}

fn arb_record() -> impl Strategy<Value = ConnectionRecord> {
    (
        any::<u64>(),
        any::<u64>(),
        any::<f64>(),
        any::<u64>(),
        any::<u64>(),
        ".{0,40}",
        prop::option::of(-1e12f64..1e12),
        ".{0,8}",
    )
        .prop_map(|(src_port, dest_port, duration, orig_bytes, resp_pkts, query, ts, state)| {
            ConnectionRecord {
                src_port,
                dest_port,
                duration,
                orig_bytes,
                resp_pkts,
                conn_state: state,
                timestamp: ts.map(RecordTime::Epoch),
                dns: Some(kitnet_detector::records::DnsRecord {
                    query,
                    ..Default::default()
                }),
                ..Default::default()
            }
        })
}

proptest! {
    #[test]
    fn extraction_is_total_and_finite(record in arb_record(), streams in any::<bool>()) {
        let v = extractor(streams).extract(&record, None);
        prop_assert_eq!(v.dim(), if streams { 108 } else { 60 });
        prop_assert!(v.values.iter().all(|x| x.is_finite()));
    }
}
