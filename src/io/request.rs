//! A scheduled small read and the fan-out queue type it travels through.

use crossbeam::channel::{Receiver, Sender};

/// One small read the producer has scheduled and a worker will perform exactly once.
pub struct ReadRequest {
    pub device_index: usize,
    pub offset: u64,
    pub size: u64,
    pub enqueued_ns: u64,
}

pub type RequestSender = Sender<ReadRequest>;
pub type RequestReceiver = Receiver<ReadRequest>;

/// One fan-out queue. Unbounded: the only backpressure in this design is the atomic
/// queued-request ceiling the producer checks itself — a bounded channel here would add a
/// second, undocumented throttle on top of it.
pub fn new_queue() -> (RequestSender, RequestReceiver) {
    crossbeam::channel::unbounded()
}
