//! Detector entrypoint: reads ndjson connection records from a file (first argument)
//! or stdin, scores them, and writes an alert line to stdout for every non-low result.
//! The model is saved on EOF or Ctrl+C once training has finished.

use kitnet_detector::{
    config::DetectorConfig,
    detector::{Detector, Phase},
    error::RecordError,
    logging::{AlertLine, StructuredLogger},
    records::{read_in_background, ConnectionRecord},
    risk::{RiskEngine, RiskLevel},
};
use std::fs::File;
use std::io::{self, BufReader, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{Receiver, RecvTimeoutError};
use std::time::Duration;
use tracing::{info, warn};

const PROGRESS_EVERY: u64 = 1000;
const CHANNEL_DEPTH: usize = 1024;
const STOP_POLL: Duration = Duration::from_millis(200);

static STOP: AtomicBool = AtomicBool::new(false);

fn risk_label(level: RiskLevel) -> &'static str {
    match level {
        RiskLevel::Low => "low",
        RiskLevel::Medium => "medium",
        RiskLevel::High => "high",
    }
}

fn run(
    detector: &mut Detector,
    risk_engine: &RiskEngine,
    records: Receiver<Result<ConnectionRecord, RecordError>>,
    out: &mut impl Write,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let mut processed: u64 = 0;
    let mut last_phase = detector.phase();

    while !STOP.load(Ordering::Relaxed) {
        let record = match records.recv_timeout(STOP_POLL) {
            Ok(Ok(r)) => r,
            Ok(Err(e @ RecordError::Io(_))) => {
                warn!(error = %e, "input failed");
                break;
            }
            Ok(Err(e)) => {
                warn!(error = %e, "skipping record");
                continue;
            }
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        };

        let score = detector.process(&record);
        processed += 1;

        let phase = detector.phase();
        if phase != last_phase {
            info!(from = %last_phase, to = %phase, processed, "phase transition");
            last_phase = phase;
        }

        if phase == Phase::Detecting {
            let event_id = match record.event_id() {
                "" => uuid::Uuid::new_v4().to_string(),
                id => id.to_string(),
            };
            let result = risk_engine.assess(event_id, score, record.ts_millis());
            if result.level != RiskLevel::Low {
                let alert = AlertLine {
                    ts: chrono::Utc::now().to_rfc3339(),
                    source: "kitnet",
                    event_type: "anomaly",
                    event_id: &result.event_id,
                    anomaly_score: result.score,
                    risk_level: risk_label(result.level),
                    src_ip: record.src_ip.as_deref(),
                    dest_ip: record.dest_ip.as_deref(),
                    dest_port: Some(record.dest_port),
                };
                StructuredLogger::emit_json(&alert, out)?;
            }
        } else if processed % PROGRESS_EVERY == 0 {
            let stats = detector.stats();
            info!(
                phase = %stats.phase,
                progress = stats.training_progress,
                samples = stats.samples_seen,
                "training progress"
            );
        }
    }

    out.flush()?;
    let stats = detector.stats();
    info!(
        processed = stats.total_processed,
        anomalies = stats.anomalies_detected,
        phase = %stats.phase,
        stopped = STOP.load(Ordering::Relaxed),
        "input finished"
    );
    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let config_path = std::env::var("KITNET_CONFIG_PATH")
        .map(std::path::PathBuf::from)
        .unwrap_or_else(|_| std::path::PathBuf::from("config.json"));
    let config = DetectorConfig::load(&config_path);

    StructuredLogger::init(config.log.json, &config.log.level);

    info!(data_dir = ?config.data_dir, "kitnet detector starting");
    std::fs::create_dir_all(&config.data_dir)?;

    let risk_engine = RiskEngine::new(config.risk.clone());
    let model_path = config.model_path.clone();
    let mut detector = Detector::initialize(config)?;

    let _ = ctrlc::set_handler(|| {
        STOP.store(true, Ordering::Relaxed);
    });

    let stdout = io::stdout();
    let mut out = stdout.lock();
    // reading happens off this thread so a blocked read never delays Ctrl+C
    let records = match std::env::args().nth(1) {
        Some(path) => {
            info!(path = %path, "reading records from file");
            read_in_background(BufReader::new(File::open(&path)?), CHANNEL_DEPTH)?
        }
        None => {
            info!("reading records from stdin");
            read_in_background(BufReader::new(io::stdin()), CHANNEL_DEPTH)?
        }
    };
    run(&mut detector, &risk_engine, records, &mut out)?;

    if detector.phase() == Phase::Detecting {
        detector.save(&model_path)?;
        info!(path = %model_path.display(), "model saved");
    }
    info!("kitnet detector stopping");
    Ok(())
}
