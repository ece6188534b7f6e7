//! Fork safety: hold the heap lock across `fork()`.
//!
//! Without this a thread could fork while another thread holds the lock;
//! the child would inherit a locked heap and no thread that could unlock it.

use crate::init::HEAP;
use crate::log_warn;

unsafe extern "C" fn atfork_prepare() {
    HEAP.lock_for_fork();
}

unsafe extern "C" fn atfork_parent() {
    HEAP.unlock_after_fork();
}

/// Only the forking thread exists in the child, and it took the lock in
/// `atfork_prepare`.
unsafe extern "C" fn atfork_child() {
    HEAP.unlock_after_fork();
}

/// Register the pthread_atfork handlers. Must be called once during init.
///
/// # Safety
/// Must be called from the initialization path.
pub unsafe fn register_atfork() {
    let rc = libc::pthread_atfork(
        Some(atfork_prepare),
        Some(atfork_parent),
        Some(atfork_child),
    );
    if rc != 0 {
        log_warn!("pthread_atfork failed ({}); fork() may deadlock", rc);
    }
}
