//! `TAGMALLOC_VERIFY` mode: every mutating operation is followed by a walk.
//!
//! Verification is process-global, so it lives in its own test binary.

use std::mem::size_of;
use std::ptr;
use tagmalloc::config;
use tagmalloc::{Heap, ReservedRegion};

fn page_size() -> usize {
    unsafe { libc::sysconf(libc::_SC_PAGESIZE) as usize }
}

fn private_heap(pages: usize) -> Heap<ReservedRegion> {
    Heap::new(ReservedRegion::with_capacity(pages * page_size()))
}

// ---------------------------------------------------------------------------
// A healthy heap passes every walk
// ---------------------------------------------------------------------------

#[test]
fn clean_operations_pass_verification() {
    config::set_verify(true);
    assert!(config::verify());

    let heap = private_heap(64);
    let mut live = Vec::new();
    for i in 0..200usize {
        let p = heap.allocate(8 + i * 7).unwrap();
        live.push(p.as_ptr());
        if i % 3 == 0 {
            unsafe { heap.release(live.swap_remove(i % live.len())) };
        }
    }
    unsafe {
        let grown = heap.resize(live[0], 5000).unwrap();
        live[0] = grown;
        let z = heap.zeroed(10, 10).unwrap();
        heap.release(z.as_ptr());
        let a = heap.allocate_aligned(100, 256).unwrap();
        heap.release(a.as_ptr());
        for p in live {
            heap.release(p);
        }
    }
    let report = heap.check();
    assert!(report.is_ok(), "{}", report);
    assert_eq!(report.chunks, 1);
}

// ---------------------------------------------------------------------------
// A damaged footer aborts the next operation
// ---------------------------------------------------------------------------

#[cfg(unix)]
#[test]
fn damaged_footer_aborts_under_verification() {
    unsafe {
        let pid = libc::fork();
        assert!(pid >= 0);
        if pid == 0 {
            config::set_verify(true);
            let heap = private_heap(16);
            let a = heap.allocate(40).unwrap().as_ptr();
            let usable = heap.usable_size(a);
            // Run the payload write into the footer tag.
            ptr::write_bytes(a, 0xEE, usable + size_of::<usize>());
            // The allocation itself succeeds; the walk after it must abort.
            let _ = heap.allocate(16);
            libc::_exit(0);
        }
        let mut status = 0;
        assert_eq!(libc::waitpid(pid, &mut status, 0), pid);
        assert!(libc::WIFSIGNALED(status), "child exited normally: {}", status);
        assert_eq!(libc::WTERMSIG(status), libc::SIGABRT);
    }
}
