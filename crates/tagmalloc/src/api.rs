//! The C allocator entry points over the process-wide heap.
//!
//! With the `c-abi` feature they are exported unmangled and replace the
//! host libc's allocator; without it they are ordinary Rust functions.

use crate::error::AllocError;
use crate::init;
use crate::platform::set_errno;
use core::ffi::c_void;
use core::ptr::{self, NonNull};

/// Null plus `errno` for a failed request.
#[inline]
fn to_c(result: Result<NonNull<u8>, AllocError>) -> *mut c_void {
    match result {
        Ok(p) => p.as_ptr() as *mut c_void,
        Err(err) => {
            set_errno(err.errno());
            ptr::null_mut()
        }
    }
}

// ============================================================================
// Standard C allocator API
// ============================================================================

#[cfg_attr(feature = "c-abi", no_mangle)]
pub unsafe extern "C" fn malloc(size: usize) -> *mut c_void {
    to_c(init::heap().allocate(size))
}

#[cfg_attr(feature = "c-abi", no_mangle)]
pub unsafe extern "C" fn free(ptr: *mut c_void) {
    if ptr.is_null() {
        return;
    }
    init::heap().release(ptr as *mut u8);
}

#[cfg_attr(feature = "c-abi", no_mangle)]
pub unsafe extern "C" fn calloc(nmemb: usize, size: usize) -> *mut c_void {
    to_c(init::heap().zeroed(nmemb, size))
}

/// `realloc(p, 0)` frees `p` and returns it; the result must not be used.
#[cfg_attr(feature = "c-abi", no_mangle)]
pub unsafe extern "C" fn realloc(ptr: *mut c_void, size: usize) -> *mut c_void {
    match init::heap().resize(ptr as *mut u8, size) {
        Ok(p) => p as *mut c_void,
        Err(err) => {
            set_errno(err.errno());
            ptr::null_mut()
        }
    }
}

// ============================================================================
// GNU extensions
// ============================================================================

#[cfg_attr(feature = "c-abi", no_mangle)]
pub unsafe extern "C" fn malloc_usable_size(ptr: *mut c_void) -> usize {
    if ptr.is_null() {
        return 0;
    }
    init::heap().usable_size(ptr as *mut u8)
}
