//! The `Run` value: every shared mutable object the run's global state needs,
//! collected into one owner that threads receive as `Arc<Run>`.

use crate::config::Config;
use crate::histogram::Histogram;
use crate::io::probe::Device;
use crate::io::request::{new_queue, RequestReceiver, RequestSender};
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::time::Instant;

/// Queue depth ceiling past which the producer declares overload.
pub const MAX_READ_REQS_QUEUED: i64 = 100_000;

/// Startup stagger between each device's large-block loops, in microseconds.
pub const STAGGER_US: u64 = 1_000;

/// Additional stagger between a device's reader and its writer, in microseconds.
pub const RW_STAGGER_US: u64 = 500;

/// A paced loop more than this far behind schedule declares overload.
pub const OVERLOAD_LAG_US: i64 = 10_000_000;

/// Worker queue-pop timeout; bounds how long cooperative shutdown takes to notice.
pub const WORKER_POP_TIMEOUT: std::time::Duration = std::time::Duration::from_millis(100);

pub struct Run {
    pub config: Config,
    pub devices: Vec<Device>,
    pub queue_senders: Vec<RequestSender>,
    pub queue_receivers: Vec<RequestReceiver>,
    pub running: AtomicBool,
    pub queued: AtomicI64,
    pub start: Instant,
    pub large_block_read_hist: Histogram,
    pub large_block_write_hist: Histogram,
    pub raw_read_hist: Histogram,
    pub end_to_end_hist: Histogram,
}

impl Run {
    /// `start` is sampled by the caller, after any startup stagger sleep, so that
    /// `now_ns`/the report loop's deadline/"seconds elapsed" counter never include it.
    pub fn new(config: Config, devices: Vec<Device>, start: Instant) -> Self {
        let scale = config.histogram_scale;
        let mut queue_senders = Vec::with_capacity(config.num_queues);
        let mut queue_receivers = Vec::with_capacity(config.num_queues);
        for _ in 0..config.num_queues {
            let (tx, rx) = new_queue();
            queue_senders.push(tx);
            queue_receivers.push(rx);
        }

        Self {
            config,
            devices,
            queue_senders,
            queue_receivers,
            running: AtomicBool::new(false),
            queued: AtomicI64::new(0),
            start,
            large_block_read_hist: Histogram::new(scale),
            large_block_write_hist: Histogram::new(scale),
            raw_read_hist: Histogram::new(scale),
            end_to_end_hist: Histogram::new(scale),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    /// Idempotent: setting `running` false multiple times has the same effect as once.
    pub fn stop(&self, reason: &str) {
        if self.running.swap(false, Ordering::Relaxed) {
            tracing::warn!(reason, "run stopping");
        }
    }

    pub fn now_ns(&self) -> u64 {
        crate::clock::now_ns(self.start)
    }

    /// Largest `read_bytes` across all configured devices; workers size their reusable buffer
    /// to this so one worker can service a request against any device.
    pub fn max_read_bytes(&self) -> u64 {
        self.devices
            .iter()
            .map(|d| d.read_bytes)
            .max()
            .unwrap_or(4096)
    }
}
