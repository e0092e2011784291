//! Configuration layer: a clap-derived CLI merged over an optional TOML file, producing one
//! validated, immutable [`Config`] before the engine is ever constructed.

use crate::error::ConfigError;
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Bucket scale for every histogram in the run, chosen once at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum HistogramScale {
    Micros,
    Millis,
}

impl HistogramScale {
    /// Highest latency (in the chosen unit) hdrhistogram will track; values beyond this
    /// saturate into the top bucket rather than panicking.
    pub fn max_trackable(self) -> u64 {
        match self {
            HistogramScale::Micros => 60_000_000, // 60 seconds
            HistogramScale::Millis => 60_000,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            HistogramScale::Micros => "us",
            HistogramScale::Millis => "ms",
        }
    }

    pub fn ns_to_unit(self, ns: u64) -> u64 {
        match self {
            HistogramScale::Micros => ns / 1_000,
            HistogramScale::Millis => ns / 1_000_000,
        }
    }
}

/// Derive CLI. Every flag is optional so defaults can come from a config file; `Config::resolve`
/// layers CLI over file over built-ins.
#[derive(Parser, Debug, Default, Clone)]
#[command(name = "iocert")]
#[command(about = "Certify a block device for sustained real-time database I/O", long_about = None)]
pub struct Cli {
    /// Path to a TOML config file; CLI flags override its values.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Raw block device to drive; repeat to test several devices together.
    #[arg(short, long = "device")]
    pub devices: Vec<PathBuf>,

    /// Histogram bucket scale.
    #[arg(long, value_enum)]
    pub histogram_scale: Option<HistogramScale>,

    /// Run duration in seconds.
    #[arg(short = 'd', long)]
    pub duration_secs: Option<u64>,

    /// Seconds between reporting ticks.
    #[arg(long)]
    pub report_interval_secs: Option<u64>,

    /// Large-block size in bytes (a database flush-unit).
    #[arg(long)]
    pub large_block_bytes: Option<u64>,

    /// Target aggregate large-block ops/sec across all devices, split between a reader and a
    /// writer per device. Zero disables both large-block loops entirely.
    #[arg(long)]
    pub large_block_ops_per_sec: Option<u64>,

    /// Target aggregate small-read requests/sec across all devices.
    #[arg(long)]
    pub read_reqs_per_sec: Option<u64>,

    /// Application record size in bytes; rounded up to the device's minimum I/O size.
    #[arg(long)]
    pub record_size_bytes: Option<u64>,

    /// Number of fan-out queues the producer round-robins across.
    #[arg(long)]
    pub num_queues: Option<usize>,

    /// Worker threads draining each fan-out queue.
    #[arg(long)]
    pub threads_per_queue: Option<usize>,

    /// I/O scheduler to select for each device via sysfs (e.g. "none", "mq-deadline").
    #[arg(long)]
    pub scheduler_mode: Option<String>,

    /// Increase log verbosity (stackable: -v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

/// Mirror of [`Cli`]'s tunables for TOML deserialization; every field optional so a file may
/// specify only the knobs it cares about.
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct FileConfig {
    pub devices: Option<Vec<PathBuf>>,
    pub histogram_scale: Option<HistogramScale>,
    pub duration_secs: Option<u64>,
    pub report_interval_secs: Option<u64>,
    pub large_block_bytes: Option<u64>,
    pub large_block_ops_per_sec: Option<u64>,
    pub read_reqs_per_sec: Option<u64>,
    pub record_size_bytes: Option<u64>,
    pub num_queues: Option<usize>,
    pub threads_per_queue: Option<usize>,
    pub scheduler_mode: Option<String>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadFile {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&text).map_err(|source| ConfigError::ParseFile {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// The fully resolved, validated configuration the engine is built from.
#[derive(Debug, Clone)]
pub struct Config {
    pub devices: Vec<PathBuf>,
    pub histogram_scale: HistogramScale,
    pub duration: Duration,
    pub report_interval: Duration,
    pub large_block_bytes: u64,
    pub large_block_ops_per_sec: u64,
    pub read_reqs_per_sec: u64,
    pub record_size_bytes: u64,
    pub num_queues: usize,
    pub threads_per_queue: usize,
    pub scheduler_mode: Option<String>,
}

impl Config {
    pub fn resolve(cli: Cli) -> Result<Config, ConfigError> {
        let file = match &cli.config {
            Some(path) => FileConfig::load(path)?,
            None => FileConfig::default(),
        };

        let devices = if !cli.devices.is_empty() {
            cli.devices
        } else {
            file.devices.unwrap_or_default()
        };
        if devices.is_empty() {
            return Err(ConfigError::NoDevices);
        }

        let num_queues = cli.num_queues.or(file.num_queues).unwrap_or(4);
        if num_queues == 0 {
            return Err(ConfigError::ZeroQueues);
        }

        let threads_per_queue = cli
            .threads_per_queue
            .or(file.threads_per_queue)
            .unwrap_or(4);
        if threads_per_queue == 0 {
            return Err(ConfigError::ZeroThreadsPerQueue);
        }

        let record_size_bytes = cli
            .record_size_bytes
            .or(file.record_size_bytes)
            .unwrap_or(1536);
        if record_size_bytes == 0 {
            return Err(ConfigError::ZeroRecordSize);
        }

        let large_block_bytes = cli
            .large_block_bytes
            .or(file.large_block_bytes)
            .unwrap_or(1024 * 1024);
        if large_block_bytes == 0 {
            return Err(ConfigError::ZeroLargeBlockSize);
        }

        let scheduler_mode = cli.scheduler_mode.or(file.scheduler_mode);

        Ok(Config {
            devices,
            histogram_scale: cli
                .histogram_scale
                .or(file.histogram_scale)
                .unwrap_or(HistogramScale::Micros),
            duration: Duration::from_secs(cli.duration_secs.or(file.duration_secs).unwrap_or(60)),
            report_interval: Duration::from_secs(
                cli.report_interval_secs
                    .or(file.report_interval_secs)
                    .unwrap_or(1),
            ),
            large_block_bytes,
            large_block_ops_per_sec: cli
                .large_block_ops_per_sec
                .or(file.large_block_ops_per_sec)
                .unwrap_or(8),
            read_reqs_per_sec: cli
                .read_reqs_per_sec
                .or(file.read_reqs_per_sec)
                .unwrap_or(4_000),
            record_size_bytes,
            num_queues,
            threads_per_queue,
            scheduler_mode,
        })
    }
}
