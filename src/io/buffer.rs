//! Page-aligned heap buffers standing in for the original's stack-allocated variable-length
//! array: Rust has no VLAs, so each long-lived thread allocates one
//! 4096-byte-aligned buffer at startup and reuses it for every operation it performs.

use std::alloc::{self, Layout};
use std::ops::{Deref, DerefMut};

const ALIGNMENT: usize = 4096;

/// A heap buffer aligned to 4096 bytes, the alignment direct I/O requires regardless of the
/// device's actual `min_op_bytes`.
pub struct AlignedBuf {
    ptr: *mut u8,
    len: usize,
    layout: Layout,
}

impl AlignedBuf {
    pub fn new(len: usize) -> Self {
        assert!(len > 0, "aligned buffer must have non-zero length");
        let layout = Layout::from_size_align(len, ALIGNMENT).expect("valid aligned layout");
        // SAFETY: layout has non-zero size.
        let ptr = unsafe { alloc::alloc_zeroed(layout) };
        if ptr.is_null() {
            alloc::handle_alloc_error(layout);
        }
        Self { ptr, len, layout }
    }

    /// Refill the buffer with random bytes, used before large-block writes to defeat any
    /// on-device compression or dedup.
    pub fn fill_random(&mut self) {
        use rand::RngCore;
        rand::thread_rng().fill_bytes(self.as_mut_slice());
    }

    pub fn as_slice(&self) -> &[u8] {
        // SAFETY: ptr is valid for len bytes for the lifetime of self.
        unsafe { std::slice::from_raw_parts(self.ptr, self.len) }
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        // SAFETY: ptr is valid for len bytes for the lifetime of self, uniquely borrowed here.
        unsafe { std::slice::from_raw_parts_mut(self.ptr, self.len) }
    }
}

impl Deref for AlignedBuf {
    type Target = [u8];
    fn deref(&self) -> &[u8] {
        self.as_slice()
    }
}

impl DerefMut for AlignedBuf {
    fn deref_mut(&mut self) -> &mut [u8] {
        self.as_mut_slice()
    }
}

impl Drop for AlignedBuf {
    fn drop(&mut self) {
        // SAFETY: ptr/layout were produced together by alloc_zeroed and never reallocated.
        unsafe { alloc::dealloc(self.ptr, self.layout) };
    }
}

// Buffers are moved between threads at construction time, never shared live.
unsafe impl Send for AlignedBuf {}
