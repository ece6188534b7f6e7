//! Contract tests for the four C entry points and `malloc_usable_size`.
//!
//! The `api` functions run against the process-wide heap, which every test
//! in this binary shares. Scenarios that depend on exact addresses use a
//! private `Heap` instead.

use std::collections::HashSet;
use std::ptr;
use tagmalloc::api::{calloc, free, malloc, malloc_usable_size, realloc};
use tagmalloc::{AllocError, Heap, ReservedRegion};

fn page_size() -> usize {
    unsafe { libc::sysconf(libc::_SC_PAGESIZE) as usize }
}

fn private_heap(pages: usize) -> Heap<ReservedRegion> {
    Heap::new(ReservedRegion::with_capacity(pages * page_size()))
}

fn errno() -> i32 {
    std::io::Error::last_os_error().raw_os_error().unwrap_or(0)
}

// ---------------------------------------------------------------------------
// malloc
// ---------------------------------------------------------------------------

#[test]
fn malloc_small_is_aligned_and_usable() {
    unsafe {
        let p = malloc(10) as *mut u8;
        assert!(!p.is_null());
        assert_eq!(p as usize % 16, 0);
        assert!(malloc_usable_size(p.cast()) >= 10);
        ptr::write_bytes(p, 0x11, 10);
        free(p.cast());
    }
}

#[test]
fn malloc_zero_returns_unique_pointers() {
    unsafe {
        let ptrs: Vec<_> = (0..64).map(|_| malloc(0)).collect();
        assert!(ptrs.iter().all(|p| !p.is_null()));
        let unique: HashSet<usize> = ptrs.iter().map(|p| *p as usize).collect();
        assert_eq!(unique.len(), ptrs.len());
        for p in ptrs {
            free(p);
        }
    }
}

#[test]
fn malloc_returns_16_byte_aligned_pointers() {
    unsafe {
        let mut ptrs = Vec::new();
        for size in [1usize, 7, 15, 16, 17, 31, 33, 100, 255, 1000, 5000] {
            let p = malloc(size);
            assert!(!p.is_null(), "malloc({}) failed", size);
            assert_eq!(p as usize % 16, 0, "malloc({}) misaligned: {:p}", size, p);
            ptrs.push(p);
        }
        for p in ptrs {
            free(p);
        }
    }
}

#[test]
fn live_allocations_do_not_overlap() {
    unsafe {
        let sizes = [24usize, 1, 300, 64, 4096, 17, 9000, 48];
        let blocks: Vec<(usize, usize)> = sizes
            .iter()
            .map(|&n| {
                let p = malloc(n) as *mut u8;
                assert!(!p.is_null());
                ptr::write_bytes(p, n as u8, n);
                (p as usize, n)
            })
            .collect();
        for (i, &(a, la)) in blocks.iter().enumerate() {
            for &(b, lb) in &blocks[i + 1..] {
                assert!(a + la <= b || b + lb <= a, "{:#x}+{} overlaps {:#x}+{}", a, la, b, lb);
            }
        }
        for &(p, n) in &blocks {
            let bytes = std::slice::from_raw_parts(p as *const u8, n);
            assert!(bytes.iter().all(|&b| b == n as u8));
            free(p as *mut _);
        }
    }
}

#[test]
fn various_allocation_sizes() {
    unsafe {
        let mut size = 1usize;
        while size <= 1 << 20 {
            let p = malloc(size) as *mut u8;
            assert!(!p.is_null(), "malloc({}) failed", size);
            *p = 0xA5;
            *p.add(size - 1) = 0x5A;
            assert_eq!(*p, 0xA5);
            assert_eq!(*p.add(size - 1), 0x5A);
            free(p.cast());
            size *= 2;
        }
    }
}

// ---------------------------------------------------------------------------
// free
// ---------------------------------------------------------------------------

#[test]
fn free_null_is_noop() {
    unsafe { free(ptr::null_mut()) };
}

#[test]
fn released_chunk_is_reused_without_growth() {
    let heap = private_heap(16);
    let first = heap.allocate(100).unwrap();
    let _second = heap.allocate(100).unwrap();
    unsafe { heap.release(first.as_ptr()) };
    assert_eq!(heap.free_list_head(), Some(first));

    let before = heap.check();
    let again = heap.allocate(100).unwrap();
    assert_eq!(again, first);
    let after = heap.check();
    assert_eq!(after.arena_bytes, before.arena_bytes);
    assert_eq!(after.expansions, before.expansions);
}

#[test]
fn neighbours_coalesce_on_release() {
    let heap = private_heap(16);
    let blocks: Vec<_> = (0..4).map(|_| heap.allocate(200).unwrap()).collect();
    unsafe {
        for p in &blocks {
            heap.release(p.as_ptr());
        }
    }
    let report = heap.check();
    assert!(report.is_ok(), "{}", report);
    assert_eq!(report.chunks, 1);
    assert_eq!(report.free_chunks, 1);
}

// ---------------------------------------------------------------------------
// calloc
// ---------------------------------------------------------------------------

#[test]
fn calloc_returns_zeroed_memory() {
    unsafe {
        // Dirty some memory first so recycled chunks are not zero by luck.
        let dirty = malloc(4096) as *mut u8;
        ptr::write_bytes(dirty, 0xFF, 4096);
        free(dirty.cast());

        let p = calloc(128, 32) as *const u8;
        assert!(!p.is_null());
        let bytes = std::slice::from_raw_parts(p, 128 * 32);
        assert!(bytes.iter().all(|&b| b == 0));
        free(p as *mut _);
    }
}

#[test]
fn calloc_overflow_returns_null() {
    unsafe {
        let p = calloc(usize::MAX, usize::MAX);
        assert!(p.is_null());
        assert_eq!(errno(), libc::ENOMEM);

        let p = calloc(usize::MAX / 2 + 1, 2);
        assert!(p.is_null());
    }
}

#[test]
fn calloc_overflow_does_not_touch_the_arena() {
    let heap = private_heap(16);
    assert_eq!(heap.zeroed(usize::MAX, usize::MAX), Err(AllocError::SizeOverflow));
    assert_eq!(heap.check().arena_bytes, 0);
}

// ---------------------------------------------------------------------------
// realloc
// ---------------------------------------------------------------------------

#[test]
fn realloc_null_acts_as_malloc() {
    unsafe {
        let p = realloc(ptr::null_mut(), 64) as *mut u8;
        assert!(!p.is_null());
        assert!(malloc_usable_size(p.cast()) >= 64);
        ptr::write_bytes(p, 0xAB, 64);
        free(p.cast());
    }
}

#[test]
fn realloc_to_zero_frees_and_returns_the_pointer() {
    let heap = private_heap(16);
    let p = heap.allocate(64).unwrap().as_ptr();
    let q = unsafe { heap.resize(p, 0) }.unwrap();
    assert_eq!(q, p);
    assert_eq!(heap.check().used_chunks, 0);
}

#[test]
fn realloc_grow_preserves_data() {
    unsafe {
        let p = malloc(64) as *mut u8;
        for i in 0..64 {
            *p.add(i) = i as u8;
        }
        let q = realloc(p.cast(), 10_000) as *mut u8;
        assert!(!q.is_null());
        for i in 0..64 {
            assert_eq!(*q.add(i), i as u8);
        }
        free(q.cast());
    }
}

#[test]
fn realloc_shrink_preserves_data() {
    unsafe {
        let p = malloc(256) as *mut u8;
        for i in 0..256 {
            *p.add(i) = (i % 251) as u8;
        }
        let q = realloc(p.cast(), 32) as *mut u8;
        assert_eq!(q, p, "shrinking stays in place");
        for i in 0..32 {
            assert_eq!(*q.add(i), (i % 251) as u8);
        }
        free(q.cast());
    }
}

#[test]
fn realloc_failure_leaves_old_block_intact() {
    let heap = private_heap(2);
    let p = heap.allocate(32).unwrap().as_ptr();
    unsafe {
        ptr::write_bytes(p, 0x42, 32);
        assert!(heap.resize(p, 4 * page_size()).is_err());
        let bytes = std::slice::from_raw_parts(p, 32);
        assert!(bytes.iter().all(|&b| b == 0x42));
        heap.release(p);
    }
    assert!(heap.check().is_ok());
}

// ---------------------------------------------------------------------------
// malloc_usable_size
// ---------------------------------------------------------------------------

#[test]
fn usable_size_at_least_requested() {
    unsafe {
        assert_eq!(malloc_usable_size(ptr::null_mut()), 0);
        for size in [1usize, 8, 24, 100, 1000, 65536] {
            let p = malloc(size);
            let usable = malloc_usable_size(p);
            assert!(usable >= size, "usable {} < requested {}", usable, size);
            // The whole usable region is writable.
            ptr::write_bytes(p as *mut u8, 0x77, usable);
            free(p);
        }
    }
}

// ---------------------------------------------------------------------------
// Out of memory
// ---------------------------------------------------------------------------

#[test]
fn exhausted_heap_reports_out_of_memory() {
    let heap = private_heap(4);
    assert_eq!(heap.allocate(8 * page_size()), Err(AllocError::Exhausted));
    assert!(heap.allocate(64).is_ok());
    assert!(heap.check().is_ok());
}

#[test]
fn huge_malloc_sets_enomem() {
    unsafe {
        let p = malloc(usize::MAX - 64);
        assert!(p.is_null());
        assert_eq!(errno(), libc::ENOMEM);
    }
}

// ---------------------------------------------------------------------------
// Single-thread churn
// ---------------------------------------------------------------------------

#[test]
fn rapid_malloc_free_single_thread() {
    unsafe {
        for i in 0..100_000usize {
            let size = 1 + (i * 37) % 2048;
            let p = malloc(size);
            assert!(!p.is_null());
            free(p);
        }
    }
}

// ---------------------------------------------------------------------------
// fork
// ---------------------------------------------------------------------------

#[cfg(unix)]
#[test]
fn child_can_allocate_after_fork() {
    unsafe {
        // Make sure the heap is initialized so the fork handlers are registered.
        free(malloc(16));
        let pid = libc::fork();
        assert!(pid >= 0);
        if pid == 0 {
            let p = malloc(128);
            let ok = !p.is_null();
            free(p);
            libc::_exit(if ok { 0 } else { 1 });
        }
        let mut status = 0;
        assert_eq!(libc::waitpid(pid, &mut status, 0), pid);
        assert!(libc::WIFEXITED(status));
        assert_eq!(libc::WEXITSTATUS(status), 0);
    }
}
