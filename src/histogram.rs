//! Latency histograms. Bucket layout and storage are delegated to `hdrhistogram`; this module
//! only adds the concurrent-record wrapper and a terse per-line dump format.

use crate::config::HistogramScale;
use hdrhistogram::Histogram as HdrHistogram;
use std::sync::Mutex;

/// A concurrently-recordable latency histogram.
///
/// `record` is safe against concurrent `record` and concurrent `dump`; `dump` takes a brief lock
/// and is permitted to observe a point-in-time snapshot while inserts continue elsewhere.
pub struct Histogram {
    scale: HistogramScale,
    inner: Mutex<HdrHistogram<u64>>,
}

impl Histogram {
    pub fn new(scale: HistogramScale) -> Self {
        let inner = HdrHistogram::new_with_bounds(1, scale.max_trackable(), 3)
            .expect("fixed, valid hdrhistogram bounds");
        Self {
            scale,
            inner: Mutex::new(inner),
        }
    }

    /// Record one sample given as a nanosecond delta; converted to the histogram's own scale.
    pub fn record_ns(&self, delta_ns: u64) {
        let value = self.scale.ns_to_unit(delta_ns).max(1);
        let mut hist = self.inner.lock().expect("histogram mutex poisoned");
        // A value beyond max_trackable saturates into the top bucket rather than panicking.
        let _ = hist.saturating_record(value);
    }

    pub fn len(&self) -> u64 {
        self.inner.lock().expect("histogram mutex poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// One-line summary: count, mean, p50, p99, p99.9, max — all in the histogram's own unit.
    pub fn dump_line(&self) -> String {
        let hist = self.inner.lock().expect("histogram mutex poisoned");
        if hist.len() == 0 {
            return format!("    (no samples)");
        }
        format!(
            "    n={:<8} mean={:<8.1} p50={:<6} p99={:<6} p99.9={:<6} max={:<6} [{}]",
            hist.len(),
            hist.mean(),
            hist.value_at_quantile(0.50),
            hist.value_at_quantile(0.99),
            hist.value_at_quantile(0.999),
            hist.max(),
            self.scale.label(),
        )
    }
}
