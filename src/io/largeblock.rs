//! Large-block reader and writer loops: one pair per device, paced against a
//! target aggregate rate shared across all devices, bypassing the fan-out queue layer entirely.

use crate::clock::{elapsed_ns, lag_us, target_us};
use crate::io::buffer::AlignedBuf;
use crate::run::{Run, OVERLOAD_LAG_US, RW_STAGGER_US, STAGGER_US};
use rand::Rng;
use std::time::{Duration, Instant};

/// Pick a uniformly random valid large-block offset: a multiple of `large_block_size` in
/// `[0, capacity - large_block_size]`.
fn random_large_block_offset(num_large_blocks: u64, large_block_size: u64, rng: &mut impl Rng) -> u64 {
    rng.gen_range(0..num_large_blocks) * large_block_size
}

#[derive(Clone, Copy)]
enum Role {
    Read,
    Write,
}

impl Role {
    fn name(self) -> &'static str {
        match self {
            Role::Read => "large-block reader",
            Role::Write => "large-block writer",
        }
    }
}

fn run_loop(run: &Run, device_index: usize, role: Role) {
    let device = &run.devices[device_index];
    let large_block_size = run.config.large_block_bytes;
    let ops_per_sec = run.config.large_block_ops_per_sec;
    let num_devices = run.devices.len() as u64;

    let mut buf = AlignedBuf::new(large_block_size as usize);
    let mut rng = rand::thread_rng();

    // Back-shift the loop-local start so devices (and each device's reader/writer) don't all
    // fire in lock-step.
    let stagger_us = device_index as u64 * STAGGER_US
        + match role {
            Role::Read => 0,
            Role::Write => RW_STAGGER_US,
        };
    let loop_start = Instant::now() - Duration::from_micros(stagger_us);

    let mut count: u64 = 0;
    while run.is_running() {
        let offset = random_large_block_offset(device.num_large_blocks, large_block_size, &mut rng);

        let fd = match device.fd_pool.acquire() {
            Ok(fd) => fd,
            Err(err) => {
                tracing::error!(device = %device.name, error = %err, "{}: fd acquire failed", role.name());
                continue;
            }
        };

        if let Role::Write = role {
            buf.fill_random();
        }

        let before_ns = run.now_ns();
        let result = match role {
            Role::Read => fd.read_at(&mut buf, offset),
            Role::Write => fd.write_at(&buf, offset),
        };
        let after_ns = run.now_ns();

        match result {
            Ok(n) if n as u64 == large_block_size => {
                device.fd_pool.release(fd);
                let delta_ns = elapsed_ns(before_ns, after_ns);
                match role {
                    Role::Read => run.large_block_read_hist.record_ns(delta_ns),
                    Role::Write => run.large_block_write_hist.record_ns(delta_ns),
                }
            }
            Ok(n) => {
                device.fd_pool.release(fd);
                tracing::warn!(device = %device.name, offset, got = n, expected = large_block_size, "{}: short op", role.name());
            }
            Err(err) => {
                // Drop `fd` instead of releasing it: a corrupt descriptor must not re-enter
                // circulation.
                tracing::error!(device = %device.name, offset, error = %err, "{}: op failed", role.name());
            }
        }

        count += 1;
        let target = target_us(count, ops_per_sec, num_devices);
        let elapsed = loop_start.elapsed().as_micros() as u64;
        let lag = lag_us(target, elapsed);
        if lag > OVERLOAD_LAG_US {
            run.stop(&format!("{}: pacing lag exceeded 10s", role.name()));
            break;
        }
        if lag < 0 {
            std::thread::sleep(Duration::from_micros((-lag) as u64));
        }
    }
}

pub fn run_large_block_reader(run: &Run, device_index: usize) {
    run_loop(run, device_index, Role::Read);
}

pub fn run_large_block_writer(run: &Run, device_index: usize) {
    run_loop(run, device_index, Role::Write);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Cli, Config, HistogramScale};
    use crate::io::probe::Device;
    use std::path::PathBuf;
    use std::sync::atomic::Ordering;
    use std::thread;

    #[test]
    fn random_offset_is_block_aligned_and_in_bounds() {
        let mut rng = rand::thread_rng();
        let num_blocks = 64;
        let block_size = 1024 * 1024;
        for _ in 0..10_000 {
            let offset = random_large_block_offset(num_blocks, block_size, &mut rng);
            assert_eq!(offset % block_size, 0);
            assert!(offset <= (num_blocks - 1) * block_size);
        }
    }

    #[test]
    fn reader_and_writer_record_samples_and_stop_promptly() {
        let cli = Cli {
            devices: vec![PathBuf::from("/dev/loop0")],
            histogram_scale: Some(HistogramScale::Micros),
            large_block_bytes: Some(64 * 1024),
            large_block_ops_per_sec: Some(1_000_000),
            ..Default::default()
        };
        let config = Config::resolve(cli).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dev0");
        let device = Device::probe_loopback(
            &path,
            0,
            8 * 1024 * 1024,
            512,
            config.record_size_bytes,
            config.large_block_bytes,
            config.histogram_scale,
        )
        .unwrap();
        let run = Run::new(config, vec![device], Instant::now());
        run.running.store(true, Ordering::Relaxed);

        thread::scope(|s| {
            let run = &run;
            let hr = s.spawn(move || run_large_block_reader(run, 0));
            let hw = s.spawn(move || run_large_block_writer(run, 0));
            thread::sleep(Duration::from_millis(50));
            run.stop("test done");
            hr.join().unwrap();
            hw.join().unwrap();
        });

        assert!(run.large_block_read_hist.len() > 0);
        assert!(run.large_block_write_hist.len() > 0);
    }
}
