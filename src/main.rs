//! Entry point: resolve configuration, probe every device, then run the paced workload until
//! `--duration-secs` elapses or an overload condition stops it early.

mod clock;
mod config;
mod error;
mod histogram;
mod io;
mod report;
mod run;
mod scheduler;
mod signals;

use clap::Parser;
use config::{Cli, Config};
use error::RunError;
use io::largeblock::{run_large_block_reader, run_large_block_writer};
use io::probe::Device;
use io::producer::run_producer;
use io::worker::run_worker;
use run::{Run, STAGGER_US};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    signals::install();

    match run_certification(cli) {
        Ok(()) => Ok(()),
        Err(err) => {
            tracing::error!(error = %err, "iocert exited with an error");
            Err(err.into())
        }
    }
}

fn init_logging(verbose: u8) {
    let default_level = match verbose {
        0 => "iocert=info",
        1 => "iocert=debug",
        _ => "iocert=trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn run_certification(cli: Cli) -> Result<(), RunError> {
    let config = Config::resolve(cli)?;
    println!("iocert {}", env!("CARGO_PKG_VERSION"));

    apply_scheduler_modes(&config);
    let devices = probe_all_devices(&config)?;
    let num_devices = devices.len();

    // Let every device's open() settle before the clock starts, same as the fan-out loops'
    // per-device startup stagger.
    let startup_stagger = (num_devices as u64 + 1) * STAGGER_US;
    thread::sleep(Duration::from_micros(startup_stagger));
    let start = Instant::now();

    let run = Arc::new(Run::new(config, devices, start));
    run.running.store(true, Ordering::Relaxed);
    tracing::info!(devices = run.devices.len(), "run starting");

    thread::scope(|scope| {
        let mut large_block_handles = Vec::new();
        if run.config.large_block_ops_per_sec != 0 {
            // One pass spawning every writer, then a second pass spawning every reader, so a
            // device's reader and writer tend to land on different cores instead of both being
            // scheduled back to back.
            for index in 0..run.devices.len() {
                let run = Arc::clone(&run);
                large_block_handles.push(scope.spawn(move || run_large_block_writer(&run, index)));
            }
            for index in 0..run.devices.len() {
                let run = Arc::clone(&run);
                large_block_handles.push(scope.spawn(move || run_large_block_reader(&run, index)));
            }
        }

        let mut worker_handles = Vec::new();
        for receiver in &run.queue_receivers {
            for _ in 0..run.config.threads_per_queue {
                let run = Arc::clone(&run);
                worker_handles.push(scope.spawn(move || run_worker(&run, receiver)));
            }
        }

        let producer_handle = {
            let run = Arc::clone(&run);
            scope.spawn(move || run_producer(&run))
        };

        report::run_reports(&run);

        // The duration already elapsed without an overload tripping `running`; `stop` only logs
        // on the transition away from `true`, so this is a no-op when overload got there first.
        run.stop("run duration elapsed");

        producer_handle.join().expect("producer thread panicked");
        for handle in worker_handles {
            handle.join().expect("worker thread panicked");
        }
        for handle in large_block_handles {
            handle.join().expect("large-block thread panicked");
        }
    });

    for device in &run.devices {
        device.fd_pool.close_all();
    }

    tracing::info!("run complete");
    Ok(())
}

fn probe_all_devices(config: &Config) -> Result<Vec<Device>, RunError> {
    config
        .devices
        .iter()
        .enumerate()
        .map(|(index, path)| Device::probe(path, index, config).map_err(RunError::from))
        .collect()
}

fn apply_scheduler_modes(config: &Config) {
    let Some(mode) = &config.scheduler_mode else {
        return;
    };
    for path in &config.devices {
        scheduler::apply_scheduler_mode(path, mode);
    }
}
