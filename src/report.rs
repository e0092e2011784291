//! Fixed-cadence reporting loop: wakes on a schedule anchored to run start, prints queue
//! depth, and dumps every histogram.

use crate::run::Run;
use std::sync::atomic::Ordering;
use std::time::{Duration, Instant};

/// Upper bound on how long a sleep waits before re-checking `running`, so shutdown is never
/// blocked behind a long report interval.
const POLL_STEP: Duration = Duration::from_millis(100);

/// Sleeps in `POLL_STEP`-sized increments towards `target`, returning early if the run stops.
/// Used both for the reporting cadence and for the overall run-duration deadline, so neither
/// one blocks shutdown behind a long sleep.
fn sleep_until(run: &Run, target: Instant) {
    loop {
        let now = Instant::now();
        if target <= now || !run.is_running() {
            return;
        }
        std::thread::sleep((target - now).min(POLL_STEP));
    }
}

/// Runs until either the configured run duration elapses or another component sets `running`
/// to false, printing one report per `report_interval` tick along the way. A zero
/// interval means no reports are printed, but the run still waits out its duration here.
pub fn run_reports(run: &Run) {
    let deadline = run.start + run.config.duration;
    let interval = run.config.report_interval;

    let mut tick: u64 = 1;
    while run.is_running() {
        let next_report = if interval.is_zero() {
            deadline
        } else {
            (run.start + interval * tick as u32).min(deadline)
        };
        sleep_until(run, next_report);
        if !run.is_running() {
            break;
        }
        if Instant::now() >= deadline {
            run.stop("run duration elapsed");
            break;
        }
        if interval.is_zero() {
            continue;
        }

        let elapsed_secs = run.start.elapsed().as_secs();
        println!("After {elapsed_secs} sec:");
        println!("  queued: {}", run.queued.load(Ordering::Relaxed));

        println!("  LARGE BLOCK READS");
        println!("{}", run.large_block_read_hist.dump_line());
        println!("  LARGE BLOCK WRITES");
        println!("{}", run.large_block_write_hist.dump_line());
        println!("  RAW READS");
        println!("{}", run.raw_read_hist.dump_line());
        for device in &run.devices {
            println!("  RAW READS [{:<18}]", device.name);
            println!("{}", device.raw_read_hist.dump_line());
        }
        println!("  READS");
        println!("{}", run.end_to_end_hist.dump_line());

        tick += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Cli, Config, HistogramScale};
    use crate::io::probe::Device;
    use std::path::PathBuf;
    use std::thread;

    fn test_run() -> Run {
        let cli = Cli {
            devices: vec![PathBuf::from("/dev/loop0")],
            histogram_scale: Some(HistogramScale::Micros),
            report_interval_secs: Some(0),
            ..Default::default()
        };
        let config = Config::resolve(cli).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dev0");
        let device = Device::probe_loopback(
            &path,
            0,
            1024 * 1024,
            512,
            config.record_size_bytes,
            config.large_block_bytes,
            config.histogram_scale,
        )
        .unwrap();
        Run::new(config, vec![device], Instant::now())
    }

    #[test]
    fn zero_interval_waits_out_the_duration_without_printing() {
        let mut run = test_run();
        run.config.duration = Duration::from_millis(30);
        run.running.store(true, Ordering::Relaxed);
        let start = Instant::now();
        run_reports(&run);
        assert!(start.elapsed() >= Duration::from_millis(30));
        assert!(!run.is_running());
    }

    #[test]
    fn stopping_the_run_unblocks_the_report_loop() {
        let mut run = test_run();
        run.config.report_interval = Duration::from_secs(3600);
        run.config.duration = Duration::from_secs(3600);
        run.running.store(true, Ordering::Relaxed);

        thread::scope(|s| {
            let run = &run;
            let h = s.spawn(move || run_reports(run));
            thread::sleep(Duration::from_millis(20));
            run.stop("test done");
            h.join().unwrap();
        });
    }
}
