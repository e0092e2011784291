//! Small-read workers: `threads_per_queue` threads per fan-out queue, each draining one
//! specific queue and performing the aligned read itself.

use crate::clock::elapsed_ns;
use crate::io::buffer::AlignedBuf;
use crate::io::request::RequestReceiver;
use crate::run::{Run, WORKER_POP_TIMEOUT};
use std::sync::atomic::Ordering;

pub fn run_worker(run: &Run, receiver: &RequestReceiver) {
    let mut buf = AlignedBuf::new(run.max_read_bytes() as usize);

    while run.is_running() {
        let request = match receiver.recv_timeout(WORKER_POP_TIMEOUT) {
            Ok(request) => request,
            Err(_) => continue, // timeout or disconnect: re-check `running` and loop
        };

        let device = &run.devices[request.device_index];
        let fd = match device.fd_pool.acquire() {
            Ok(fd) => fd,
            Err(err) => {
                tracing::error!(device = %device.name, error = %err, "failed to acquire fd");
                run.queued.fetch_sub(1, Ordering::Relaxed);
                continue;
            }
        };

        let slice = &mut buf[..request.size as usize];
        let before_ns = run.now_ns();
        let result = fd.read_at(slice, request.offset);
        let after_ns = run.now_ns();

        match result {
            Ok(n) if n as u64 == request.size => {
                device.fd_pool.release(fd);

                let raw_ns = elapsed_ns(before_ns, after_ns);
                run.raw_read_hist.record_ns(raw_ns);
                device.raw_read_hist.record_ns(raw_ns);

                let e2e_ns = elapsed_ns(request.enqueued_ns, after_ns);
                run.end_to_end_hist.record_ns(e2e_ns);
            }
            Ok(n) => {
                tracing::warn!(
                    device = %device.name,
                    offset = request.offset,
                    expected = request.size,
                    got = n,
                    "short read"
                );
                // Short reads still leave the fd usable; only hard errors close it.
                device.fd_pool.release(fd);
            }
            Err(err) => {
                tracing::error!(
                    device = %device.name,
                    offset = request.offset,
                    error = %err,
                    "read failed"
                );
                // Drop `fd` instead of releasing it: a corrupt descriptor must not re-enter
                // circulation.
            }
        }

        run.queued.fetch_sub(1, Ordering::Relaxed);
    }
}
