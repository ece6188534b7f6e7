//! The OS memory source and the few other OS primitives the heap needs.

#[cfg(target_os = "linux")]
pub mod linux;
#[cfg(target_os = "linux")]
pub use linux as sys;

#[cfg(target_os = "macos")]
pub mod macos;
#[cfg(target_os = "macos")]
pub use macos as sys;

use crate::util::{self, align_up};
use core::ptr::{self, NonNull};

/// Supplier of fresh, page-aligned memory for a growing heap arena.
///
/// Every extent handed out by `extend` should start where the previous one
/// ended; the heap rejects an extent that does not.
pub trait MemorySource {
    /// Granularity of `extend`, in bytes. Queried once, when the arena is created.
    fn page_size(&self) -> usize;

    /// Commit `len` more bytes and return the start of the new extent.
    ///
    /// # Safety
    /// `len` must be a non-zero multiple of `page_size()`.
    unsafe fn extend(&mut self, len: usize) -> Option<NonNull<u8>>;
}

/// A contiguous range of address space reserved up front and committed
/// page by page, like a program break that nobody else can move.
pub struct ReservedRegion {
    base: *mut u8,
    reserved: usize,
    committed: usize,
}

// The region is only reachable through the heap lock.
unsafe impl Send for ReservedRegion {}

impl ReservedRegion {
    /// A region of `capacity` bytes (rounded up to whole pages). Nothing is
    /// mapped until the first call to `extend`.
    pub const fn with_capacity(capacity: usize) -> Self {
        ReservedRegion {
            base: ptr::null_mut(),
            reserved: capacity,
            committed: 0,
        }
    }

    /// A region sized from `TAGMALLOC_RESERVE_MB`, resolved on first use.
    pub const fn configured() -> Self {
        Self::with_capacity(0)
    }

    /// Bytes committed so far.
    pub fn committed(&self) -> usize {
        self.committed
    }

    /// Bytes of address space this region may grow into.
    pub fn capacity(&self) -> usize {
        if self.reserved == 0 {
            crate::config::reserve_bytes()
        } else {
            self.reserved
        }
    }

    unsafe fn reserve(&mut self) -> bool {
        let len = align_up(self.capacity(), util::page_size());
        let base = sys::reserve(len);
        if base.is_null() {
            crate::log_error!("cannot reserve {} bytes of address space", len);
            return false;
        }
        self.base = base;
        self.reserved = len;
        true
    }
}

impl MemorySource for ReservedRegion {
    fn page_size(&self) -> usize {
        util::page_size()
    }

    unsafe fn extend(&mut self, len: usize) -> Option<NonNull<u8>> {
        if self.base.is_null() && !self.reserve() {
            return None;
        }
        if len > self.reserved - self.committed {
            crate::log_warn!(
                "reservation exhausted ({} of {} bytes committed, {} requested)",
                self.committed,
                self.reserved,
                len
            );
            return None;
        }
        let start = self.base.add(self.committed);
        if !sys::commit(start, len) {
            return None;
        }
        self.committed += len;
        NonNull::new(start)
    }
}

impl Drop for ReservedRegion {
    fn drop(&mut self) {
        if !self.base.is_null() {
            unsafe { sys::unreserve(self.base, self.reserved) };
        }
    }
}

/// Set the calling thread's `errno`.
#[inline]
pub fn set_errno(value: libc::c_int) {
    unsafe { *sys::errno_location() = value };
}
