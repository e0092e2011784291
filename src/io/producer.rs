//! The small-read producer: a single paced thread that fabricates read requests and
//! round-robins them across the fan-out queues.

use crate::clock::{lag_us, target_us};
use crate::io::probe::Device;
use crate::io::request::ReadRequest;
use crate::run::{Run, MAX_READ_REQS_QUEUED, OVERLOAD_LAG_US};
use rand::Rng;
use std::sync::atomic::Ordering;
use std::thread;
use std::time::Duration;

/// Pick a uniformly random valid small-read offset on `device`: a multiple of `min_op_bytes` in
/// `[0, capacity - read_bytes]`.
fn random_offset(device: &Device, rng: &mut impl Rng) -> u64 {
    let slot = rng.gen_range(0..device.num_read_offsets);
    slot * device.min_op_bytes
}

pub fn run_producer(run: &Run) {
    if run.config.read_reqs_per_sec == 0 {
        return;
    }

    let mut rng = rand::thread_rng();
    let mut count: u64 = 0;

    while run.is_running() {
        let new_queued = run.queued.fetch_add(1, Ordering::Relaxed) + 1;
        if new_queued > MAX_READ_REQS_QUEUED {
            run.stop("producer: too many read reqs queued");
            break;
        }

        let queue_index = (count as usize) % run.queue_senders.len();
        let device_index = rng.gen_range(0..run.devices.len());
        let device = &run.devices[device_index];
        let offset = random_offset(device, &mut rng);

        let request = ReadRequest {
            device_index,
            offset,
            size: device.read_bytes,
            enqueued_ns: run.now_ns(),
        };

        // Unbounded channel: send only fails if every receiver was dropped, which only happens
        // after shutdown has already torn down the queues.
        let _ = run.queue_senders[queue_index].send(request);

        count += 1;

        let target = target_us(count, run.config.read_reqs_per_sec, 1);
        let elapsed = run.start.elapsed().as_micros() as u64;
        let lag = lag_us(target, elapsed);
        if lag > OVERLOAD_LAG_US {
            run.stop("producer: pacing lag exceeded 10s");
            break;
        }
        if lag < 0 {
            thread::sleep(Duration::from_micros((-lag) as u64));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Cli, Config, HistogramScale};
    use std::path::PathBuf;
    use std::time::Instant;

    fn test_run(num_devices: usize, num_queues: usize, reqs_per_sec: u64) -> Run {
        let cli = Cli {
            devices: (0..num_devices)
                .map(|i| PathBuf::from(format!("/dev/loop{i}")))
                .collect(),
            num_queues: Some(num_queues),
            read_reqs_per_sec: Some(reqs_per_sec),
            histogram_scale: Some(HistogramScale::Micros),
            ..Default::default()
        };
        let config = Config::resolve(cli).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let devices = (0..num_devices)
            .map(|i| {
                let path = dir.path().join(format!("dev{i}"));
                Device::probe_loopback(
                    &path,
                    i,
                    64 * 1024 * 1024,
                    512,
                    config.record_size_bytes,
                    config.large_block_bytes,
                    config.histogram_scale,
                )
                .unwrap()
            })
            .collect();

        Run::new(config, devices, Instant::now())
    }

    #[test]
    fn fan_out_is_strict_round_robin() {
        let run = test_run(1, 2, 1_000_000);
        run.running.store(true, Ordering::Relaxed);

        // Run the producer briefly on a background thread, then stop it.
        let handle = thread::scope(|s| {
            let run = &run;
            let h = s.spawn(move || run_producer(run));
            thread::sleep(Duration::from_millis(50));
            run.stop("test done");
            h.join().unwrap();
        });
        let _ = handle;

        let counts: Vec<usize> = run.queue_receivers.iter().map(|r| r.len()).collect();
        let total: usize = counts.iter().sum();
        assert!(total > 0, "producer should have enqueued some requests");
        let diff = counts[0].abs_diff(counts[1]);
        assert!(diff <= 1, "fan-out should be within 1 of even: {counts:?}");
    }

    #[test]
    fn overload_trip_stops_the_run() {
        let run = test_run(1, 1, 200_000);
        run.running.store(true, Ordering::Relaxed);
        run.queued
            .store(MAX_READ_REQS_QUEUED, Ordering::Relaxed);

        run_producer(&run);
        assert!(!run.is_running());
    }

    #[test]
    fn random_offsets_stay_in_bounds() {
        let run = test_run(1, 1, 0);
        let device = &run.devices[0];
        let mut rng = rand::thread_rng();
        for _ in 0..10_000 {
            let offset = random_offset(device, &mut rng);
            assert_eq!(offset % device.min_op_bytes, 0);
            assert!(offset <= device.capacity - device.read_bytes);
        }
    }
}
