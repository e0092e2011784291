//! Typed error taxonomy. Startup failures are distinguished by kind so `main` can log a
//! specific reason and exit non-zero before the run ever begins; I/O errors encountered during
//! the run never reach here (they are logged locally by the thread that hit them instead).

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("no devices configured; pass --device at least once or list `devices` in the config file")]
    NoDevices,

    #[error("num_queues must be at least 1")]
    ZeroQueues,

    #[error("threads_per_queue must be at least 1")]
    ZeroThreadsPerQueue,

    #[error("record_size must be at least 1 byte")]
    ZeroRecordSize,

    #[error("large_block_size must be at least 1 byte")]
    ZeroLargeBlockSize,

    #[error("failed to read config file {path}: {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    ParseFile {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid scheduler mode {0:?}")]
    InvalidSchedulerMode(String),
}

#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("device {name}: {source}")]
    Open {
        name: String,
        #[source]
        source: std::io::Error,
    },

    #[error("device {name}: could not determine capacity (BLKGETSIZE64 returned 0)")]
    ZeroCapacity { name: String },

    #[error("device {name}: no direct-I/O transfer size in [512, 4096] succeeded")]
    NoWorkingMinOpBytes { name: String },

    #[error("device {name}: capacity {capacity} is smaller than one large block ({large_block_size})")]
    ZeroLargeBlocks {
        name: String,
        capacity: u64,
        large_block_size: u64,
    },

    #[error("device {name}: no valid small-read offsets (read_bytes {read_bytes} exceeds capacity {capacity})")]
    ZeroReadOffsets {
        name: String,
        read_bytes: u64,
        capacity: u64,
    },
}

#[derive(Debug, Error)]
pub enum RunError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Probe(#[from] ProbeError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
