//! Per-host and per-pair stream statistics, bounded by least-recently-updated eviction.

use super::damped::StreamStatistics;
use crate::config::FeaturesConfig;
use crate::records::ConnectionRecord;
use lru::LruCache;
use std::num::NonZeroUsize;
use tracing::debug;

/// Snapshot of the stream statistics relevant to one record, taken after the
/// record was folded in.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StreamFeatures {
    pub host: [f64; StreamStatistics::FEATURES],
    pub pair: [f64; StreamStatistics::FEATURES],
}

impl StreamFeatures {
    pub const WIDTH: usize = 2 * StreamStatistics::FEATURES;
}

impl Default for StreamFeatures {
    fn default() -> Self {
        Self {
            host: [0.0; StreamStatistics::FEATURES],
            pair: [0.0; StreamStatistics::FEATURES],
        }
    }
}

pub struct StreamTracker {
    decay: f64,
    hosts: LruCache<String, StreamStatistics>,
    pairs: LruCache<(String, String), StreamStatistics>,
    evictions: u64,
}

fn capacity_from(entries: usize) -> NonZeroUsize {
    NonZeroUsize::new(entries).unwrap_or(NonZeroUsize::MIN)
}

impl StreamTracker {
    pub fn new(config: &FeaturesConfig) -> Self {
        Self {
            decay: config.stream_decay,
            hosts: LruCache::new(capacity_from(config.max_stream_entries)),
            pairs: LruCache::new(capacity_from(config.max_stream_entries)),
            evictions: 0,
        }
    }

    /// Fold the record into its host and pair statistics and return their features.
    /// Records without a source address leave every statistic untouched.
    pub fn observe(&mut self, record: &ConnectionRecord) -> StreamFeatures {
        let mut out = StreamFeatures::default();
        let Some(src) = record.src_ip.as_deref() else {
            return out;
        };

        let ts = record.timestamp.as_ref().and_then(|t| t.epoch_seconds());
        let bytes = (record.orig_bytes as f64) + (record.resp_bytes as f64);
        let packets = (record.orig_pkts as f64) + (record.resp_pkts as f64);
        let decay = self.decay;

        let host = Self::touch(&mut self.hosts, src.to_string(), decay, &mut self.evictions);
        host.update(ts, bytes, packets);
        out.host = host.features();

        if let Some(dst) = record.dest_ip.as_deref() {
            let key = (src.to_string(), dst.to_string());
            let pair = Self::touch(&mut self.pairs, key, decay, &mut self.evictions);
            pair.update(ts, bytes, packets);
            out.pair = pair.features();
        }
        out
    }

    fn touch<'a, K>(
        cache: &'a mut LruCache<K, StreamStatistics>,
        key: K,
        decay: f64,
        evictions: &mut u64,
    ) -> &'a mut StreamStatistics
    where
        K: std::hash::Hash + Eq + std::fmt::Debug,
    {
        if !cache.contains(&key) && cache.len() == cache.cap().get() {
            if let Some((evicted, _)) = cache.pop_lru() {
                *evictions += 1;
                debug!(stream = ?evicted, "evicted least recently updated stream");
            }
        }
        cache.get_or_insert_mut(key, || StreamStatistics::new(decay))
    }

    pub fn host_count(&self) -> usize {
        self.hosts.len()
    }

    pub fn pair_count(&self) -> usize {
        self.pairs.len()
    }

    pub fn evictions(&self) -> u64 {
        self.evictions
    }

    pub fn host(&self, addr: &str) -> Option<&StreamStatistics> {
        self.hosts.peek(addr)
    }

    pub fn clear(&mut self) {
        self.hosts.clear();
        self.pairs.clear();
        self.evictions = 0;
    }
}
