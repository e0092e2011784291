//! Device probing and the `Device` value it produces.

use crate::config::{Config, HistogramScale};
use crate::error::ProbeError;
use crate::histogram::Histogram;
use crate::io::device::{discover_min_op_bytes, BlockDevice, LoopbackFile, RawDevice};
use crate::io::fdpool::FdPool;
use std::io;
use std::path::{Path, PathBuf};

/// One configured device together with everything derived from probing it.
pub struct Device {
    pub name: String,
    pub index: usize,
    pub capacity: u64,
    pub num_large_blocks: u64,
    pub min_op_bytes: u64,
    pub read_bytes: u64,
    pub num_read_offsets: u64,
    pub fd_pool: FdPool,
    pub raw_read_hist: Histogram,
}

impl Device {
    /// Derive `read_bytes`/`num_read_offsets`/`num_large_blocks` from already-known capacity and
    /// `min_op_bytes`, and validate them. Shared by the real and loopback probe paths so both
    /// enforce the same rules.
    fn derive(
        name: String,
        index: usize,
        capacity: u64,
        min_op_bytes: u64,
        record_size_bytes: u64,
        large_block_bytes: u64,
        histogram_scale: HistogramScale,
        fd_pool: FdPool,
    ) -> Result<Device, ProbeError> {
        if capacity == 0 {
            return Err(ProbeError::ZeroCapacity { name });
        }
        if min_op_bytes == 0 {
            return Err(ProbeError::NoWorkingMinOpBytes { name });
        }

        let num_large_blocks = capacity / large_block_bytes;
        if num_large_blocks == 0 {
            return Err(ProbeError::ZeroLargeBlocks {
                name,
                capacity,
                large_block_size: large_block_bytes,
            });
        }

        let read_bytes = round_up(record_size_bytes, min_op_bytes);
        if read_bytes > capacity {
            return Err(ProbeError::ZeroReadOffsets {
                name,
                read_bytes,
                capacity,
            });
        }
        let num_read_offsets = (capacity - read_bytes) / min_op_bytes + 1;
        if num_read_offsets == 0 {
            return Err(ProbeError::ZeroReadOffsets {
                name,
                read_bytes,
                capacity,
            });
        }

        tracing::info!(
            device = %name,
            capacity,
            min_op_bytes,
            read_bytes,
            num_large_blocks,
            num_read_offsets,
            "probed device"
        );

        Ok(Device {
            name,
            index,
            capacity,
            num_large_blocks,
            min_op_bytes,
            read_bytes,
            num_read_offsets,
            fd_pool,
            raw_read_hist: Histogram::new(histogram_scale),
        })
    }

    /// Probe a real raw block device: open it, query capacity, discover `min_op_bytes`.
    pub fn probe(path: &Path, index: usize, config: &Config) -> Result<Device, ProbeError> {
        let name = display_name(path, index);
        let opener = BlockDevice::open(path).map_err(|source| ProbeError::Open {
            name: name.clone(),
            source,
        })?;

        let capacity = opener.capacity().map_err(|source| ProbeError::Open {
            name: name.clone(),
            source,
        })?;
        let min_op_bytes = discover_min_op_bytes(&opener).unwrap_or(0);

        let path = path.to_path_buf();
        let fd_pool = FdPool::new(move || {
            BlockDevice::open(&path).map(|d| Box::new(d) as Box<dyn RawDevice>)
        });

        Self::derive(
            name,
            index,
            capacity,
            min_op_bytes,
            config.record_size_bytes,
            config.large_block_bytes,
            config.histogram_scale,
            fd_pool,
        )
    }

    /// Probe a preallocated regular file standing in for a device in tests. A loopback file has
    /// no alignment requirement, so `min_op_bytes` is supplied directly rather than discovered.
    pub fn probe_loopback(
        path: &Path,
        index: usize,
        capacity: u64,
        min_op_bytes: u64,
        record_size_bytes: u64,
        large_block_bytes: u64,
        histogram_scale: HistogramScale,
    ) -> Result<Device, ProbeError> {
        let name = display_name(path, index);
        LoopbackFile::create(path, capacity).map_err(|source| ProbeError::Open {
            name: name.clone(),
            source,
        })?;

        let path = path.to_path_buf();
        let fd_pool = FdPool::new(move || {
            open_loopback(&path, capacity).map(|d| Box::new(d) as Box<dyn RawDevice>)
        });

        Self::derive(
            name,
            index,
            capacity,
            min_op_bytes,
            record_size_bytes,
            large_block_bytes,
            histogram_scale,
            fd_pool,
        )
    }
}

fn open_loopback(path: &PathBuf, capacity: u64) -> io::Result<LoopbackFile> {
    LoopbackFile::create(path, capacity)
}

fn display_name(path: &Path, index: usize) -> String {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(|s| s.to_string())
        .unwrap_or_else(|| format!("device{index}"))
}

fn round_up(value: u64, multiple: u64) -> u64 {
    if multiple == 0 {
        return value;
    }
    value.div_ceil(multiple) * multiple
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_size_rounds_up_to_min_op_bytes_multiple() {
        // record_size=1536 rounds up to read_bytes=2048 when min_op_bytes=1024.
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dev0");
        let capacity = 64 * 1024 * 1024;
        let min_op_bytes = 1024;
        let device = Device::probe_loopback(
            &path,
            0,
            capacity,
            min_op_bytes,
            1536,
            1024 * 1024,
            HistogramScale::Micros,
        )
        .unwrap();

        assert_eq!(device.num_large_blocks, 64);
        assert_eq!(device.read_bytes, 2048);
        assert_eq!(
            device.num_read_offsets,
            (capacity - device.read_bytes) / min_op_bytes + 1
        );
    }

    #[test]
    fn min_op_512_with_record_4096_needs_no_rounding() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dev0");
        let capacity = 1024 * 1024 * 1024u64; // 1 GiB, arbitrary
        let device = Device::probe_loopback(
            &path,
            0,
            capacity,
            512,
            4096,
            1024 * 1024,
            HistogramScale::Micros,
        )
        .unwrap();

        assert_eq!(device.read_bytes, 4096);
        assert_eq!(device.num_read_offsets, capacity / 512 - 7);
    }

    #[test]
    fn zero_capacity_fails_probe() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dev0");
        let err =
            Device::probe_loopback(&path, 0, 0, 512, 1536, 1024 * 1024, HistogramScale::Micros)
                .unwrap_err();
        assert!(matches!(err, ProbeError::ZeroCapacity { .. }));
    }

    #[test]
    fn read_bytes_exceeding_capacity_fails_probe() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dev0");
        let err =
            Device::probe_loopback(&path, 0, 1024, 512, 4096, 1024 * 1024, HistogramScale::Micros)
                .unwrap_err();
        assert!(matches!(err, ProbeError::ZeroReadOffsets { .. }));
    }
}
