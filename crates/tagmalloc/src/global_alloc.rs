//! `#[global_allocator]` support for tagmalloc.
//!
//! Allows Rust programs to allocate from the process-wide heap:
//!
//! ```rust,ignore
//! use tagmalloc::TagMalloc;
//!
//! #[global_allocator]
//! static GLOBAL: TagMalloc = TagMalloc;
//! ```

use crate::init;
use crate::util::MIN_ALIGN;
use core::alloc::{GlobalAlloc, Layout};
use core::ptr;

/// A zero-sized unit struct that implements [`GlobalAlloc`] over the
/// process-wide boundary-tag heap.
pub struct TagMalloc;

unsafe impl GlobalAlloc for TagMalloc {
    #[inline]
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        let size = layout.size();
        let align = layout.align();

        // Zero-size types: a well-aligned dangling pointer.
        if size == 0 {
            return align as *mut u8;
        }

        let result = if align <= MIN_ALIGN {
            init::heap().allocate(size)
        } else {
            init::heap().allocate_aligned(size, align)
        };
        result.map_or(ptr::null_mut(), |p| p.as_ptr())
    }

    #[inline]
    unsafe fn alloc_zeroed(&self, layout: Layout) -> *mut u8 {
        let size = layout.size();
        let align = layout.align();

        if size == 0 {
            return align as *mut u8;
        }

        if align <= MIN_ALIGN {
            init::heap().zeroed(1, size).map_or(ptr::null_mut(), |p| p.as_ptr())
        } else {
            let p = self.alloc(layout);
            if !p.is_null() {
                ptr::write_bytes(p, 0, size);
            }
            p
        }
    }

    #[inline]
    unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
        if layout.size() == 0 {
            return;
        }
        init::heap().release(ptr);
    }

    #[inline]
    unsafe fn realloc(&self, ptr: *mut u8, layout: Layout, new_size: usize) -> *mut u8 {
        let old_size = layout.size();
        let align = layout.align();

        // Old allocation was zero-sized: this is effectively a fresh alloc.
        if old_size == 0 {
            return self.alloc(Layout::from_size_align_unchecked(new_size, align));
        }

        // GlobalAlloc guarantees new_size > 0, so resize never takes its
        // release-only path here.
        debug_assert!(new_size > 0, "GlobalAlloc::realloc called with new_size == 0");

        let heap = init::heap();
        if align <= MIN_ALIGN {
            return heap.resize(ptr, new_size).unwrap_or(ptr::null_mut());
        }

        // resize() only guarantees MIN_ALIGN for a moved block.
        if heap.usable_size(ptr) >= new_size {
            return ptr;
        }
        match heap.allocate_aligned(new_size, align) {
            Ok(new) => {
                ptr::copy_nonoverlapping(ptr, new.as_ptr(), old_size.min(new_size));
                heap.release(ptr);
                new.as_ptr()
            }
            Err(_) => ptr::null_mut(),
        }
    }
}
