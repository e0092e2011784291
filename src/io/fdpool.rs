//! Per-device pool of open file handles. `acquire` drains a cached handle if one is
//! waiting; otherwise it opens a fresh one. `release` returns a handle on success; on any I/O
//! error the caller drops the handle instead of returning it, so a corrupt descriptor never
//! re-enters circulation.

use crate::io::device::RawDevice;
use crossbeam::channel::{Receiver, Sender, TryRecvError};
use std::io;
use std::sync::Arc;

type Opener = dyn Fn() -> io::Result<Box<dyn RawDevice>> + Send + Sync;

pub struct FdPool {
    tx: Sender<Box<dyn RawDevice>>,
    rx: Receiver<Box<dyn RawDevice>>,
    open: Arc<Opener>,
}

impl FdPool {
    pub fn new<F>(open: F) -> Self
    where
        F: Fn() -> io::Result<Box<dyn RawDevice>> + Send + Sync + 'static,
    {
        let (tx, rx) = crossbeam::channel::unbounded();
        Self {
            tx,
            rx,
            open: Arc::new(open),
        }
    }

    /// Fetch a handle, opening a fresh one if none is cached.
    pub fn acquire(&self) -> io::Result<Box<dyn RawDevice>> {
        match self.rx.try_recv() {
            Ok(handle) => Ok(handle),
            Err(TryRecvError::Empty) => (self.open)(),
            Err(TryRecvError::Disconnected) => {
                unreachable!("FdPool outlives its own sender")
            }
        }
    }

    /// Return a handle that performed its operation successfully.
    pub fn release(&self, handle: Box<dyn RawDevice>) {
        // An unbounded channel send only fails if every receiver (including our own) is
        // dropped, which can't happen while `self` is alive.
        let _ = self.tx.send(handle);
    }

    /// Drain and drop every cached handle, closing their underlying file descriptors.
    pub fn close_all(&self) {
        while self.rx.try_recv().is_ok() {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::device::LoopbackFile;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn acquire_opens_fresh_handle_when_pool_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dev");
        let opens = Arc::new(AtomicUsize::new(0));
        let opens2 = Arc::clone(&opens);
        let path2 = path.clone();
        let pool = FdPool::new(move || {
            opens2.fetch_add(1, Ordering::Relaxed);
            Ok(Box::new(LoopbackFile::create(&path2, 1024 * 1024)?) as Box<dyn RawDevice>)
        });

        let handle = pool.acquire().unwrap();
        assert_eq!(opens.load(Ordering::Relaxed), 1);
        pool.release(handle);

        // Second acquire should reuse the cached handle, not open another.
        let _handle = pool.acquire().unwrap();
        assert_eq!(opens.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn close_all_drains_cached_handles() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dev");
        let path2 = path.clone();
        let pool = FdPool::new(move || {
            Ok(Box::new(LoopbackFile::create(&path2, 1024 * 1024)?) as Box<dyn RawDevice>)
        });
        let handle = pool.acquire().unwrap();
        pool.release(handle);
        pool.close_all();
        assert!(matches!(pool.rx.try_recv(), Err(TryRecvError::Empty)));
    }
}
