//! The boundary-tag heap: one arena, one address-ordered free list, one lock.

mod engine;
mod free_list;
mod tag;
mod walk;

use engine::HeapState;
pub use walk::HeapReport;

use crate::config;
use crate::error::{abort_with_message, AllocError};
use crate::platform::MemorySource;
use crate::sync::Mutex;
use crate::util::bit_length;
use crate::{log_error, log_trace};
use core::ptr::{self, NonNull};

/// A first-fit allocator over memory drawn from `S`.
///
/// Every operation takes the heap lock for its whole duration and drops it
/// before returning. `zeroed` and `resize` are built from `allocate` and
/// `release` and never hold the lock across those calls.
pub struct Heap<S> {
    state: Mutex<HeapState<S>>,
}

impl<S: MemorySource + Send> Heap<S> {
    pub const fn new(source: S) -> Self {
        Heap {
            state: Mutex::new(HeapState::new(source)),
        }
    }

    /// At least `size` uninitialized bytes, 16-byte aligned.
    pub fn allocate(&self, size: usize) -> Result<NonNull<u8>, AllocError> {
        let mut state = self.state.lock();
        let result = state.allocate(size);
        log_trace!("allocate({}) -> {:?}", size, result);
        verify(&state);
        result
    }

    /// At least `size` bytes whose address is a multiple of `align`.
    ///
    /// `align` must be a power of two; alignments of 16 or less are plain
    /// allocations.
    pub fn allocate_aligned(&self, size: usize, align: usize) -> Result<NonNull<u8>, AllocError> {
        let mut state = self.state.lock();
        let result = state.allocate_aligned(size, align);
        log_trace!("allocate_aligned({}, {}) -> {:?}", size, align, result);
        verify(&state);
        result
    }

    /// Return `ptr` to the free list, fusing it with free neighbours.
    /// Null is ignored.
    ///
    /// # Safety
    /// `ptr` must be null or a live pointer obtained from this heap.
    pub unsafe fn release(&self, ptr: *mut u8) {
        let Some(ptr) = NonNull::new(ptr) else {
            return;
        };
        let mut state = self.state.lock();
        state.release(ptr);
        log_trace!("release({:p})", ptr);
        verify(&state);
    }

    /// `count * size` bytes, all zero.
    ///
    /// Fails without touching the arena when the product could overflow:
    /// the operands' bit lengths may not add up to more than a word.
    pub fn zeroed(&self, count: usize, size: usize) -> Result<NonNull<u8>, AllocError> {
        if bit_length(count) + bit_length(size) > usize::BITS {
            return Err(AllocError::SizeOverflow);
        }
        let len = count * size;
        let ptr = self.allocate(len)?;
        unsafe { ptr::write_bytes(ptr.as_ptr(), 0, len) };
        Ok(ptr)
    }

    /// Grow or shrink the allocation at `ptr` to `size` bytes.
    ///
    /// - null `ptr`: same as `allocate(size)`.
    /// - `size == 0`: releases `ptr` and hands the same, now dangling,
    ///   pointer back. It must not be used again.
    /// - `size` fits the current chunk: `ptr` unchanged.
    /// - otherwise the first `min(usable, size)` bytes move to a new
    ///   allocation and `ptr` is released. On failure `ptr` stays valid.
    ///
    /// # Safety
    /// `ptr` must be null or a live pointer obtained from this heap.
    pub unsafe fn resize(&self, ptr: *mut u8, size: usize) -> Result<*mut u8, AllocError> {
        let Some(old) = NonNull::new(ptr) else {
            return self.allocate(size).map(NonNull::as_ptr);
        };
        if size == 0 {
            self.release(ptr);
            return Ok(ptr);
        }
        let usable = self.usable_size(ptr);
        if usable >= size {
            return Ok(ptr);
        }
        let new = self.allocate(size)?;
        ptr::copy_nonoverlapping(old.as_ptr(), new.as_ptr(), usable.min(size));
        self.release(ptr);
        Ok(new.as_ptr())
    }

    /// Bytes usable at `ptr`: its chunk size minus both boundary tags.
    /// Zero for null.
    ///
    /// # Safety
    /// `ptr` must be null or a live pointer obtained from this heap.
    pub unsafe fn usable_size(&self, ptr: *mut u8) -> usize {
        match NonNull::new(ptr) {
            Some(ptr) => self.state.lock().usable_size(ptr),
            None => 0,
        }
    }

    /// Walk the whole heap under the lock.
    pub fn check(&self) -> HeapReport {
        self.state.lock().walk()
    }

    /// Payload address of the lowest free chunk.
    pub fn free_list_head(&self) -> Option<NonNull<u8>> {
        self.state.lock().free_list_head()
    }

    /// Hold the heap lock across `fork()`.
    pub fn lock_for_fork(&self) {
        self.state.raw_lock();
    }

    /// # Safety
    /// Must pair with an earlier [`Heap::lock_for_fork`] on this thread.
    pub unsafe fn unlock_after_fork(&self) {
        self.state.raw_unlock();
    }
}

/// Abort if verification is on and the heap no longer checks out.
fn verify<S>(state: &HeapState<S>) {
    if !config::verify() {
        return;
    }
    let report = state.walk();
    if !report.is_ok() {
        log_error!("heap verification failed: {}", report);
        abort_with_message("tagmalloc: heap verification failed\n");
    }
}
