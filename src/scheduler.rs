//! Best-effort I/O scheduler selection via sysfs: failures are logged, never fatal, since
//! the run is still meaningful on a device where the scheduler can't be changed (e.g. NVMe with
//! no scheduler file, or insufficient privilege).

use std::path::Path;

/// Write `mode` into `/sys/block/<basename>/queue/scheduler` for the device at `device_path`.
pub fn apply_scheduler_mode(device_path: &Path, mode: &str) {
    let Some(basename) = device_path.file_name().and_then(|n| n.to_str()) else {
        tracing::warn!(path = %device_path.display(), "cannot derive sysfs basename for scheduler mode");
        return;
    };

    let sysfs_path = format!("/sys/block/{basename}/queue/scheduler");
    match std::fs::write(&sysfs_path, mode) {
        Ok(()) => {
            tracing::info!(device = basename, mode, "set I/O scheduler");
        }
        Err(err) => {
            tracing::warn!(
                device = basename,
                mode,
                error = %err,
                "could not set I/O scheduler; continuing with the device's current mode"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn missing_sysfs_entry_does_not_panic() {
        apply_scheduler_mode(&PathBuf::from("/dev/does-not-exist-iocert-test"), "none");
    }
}
