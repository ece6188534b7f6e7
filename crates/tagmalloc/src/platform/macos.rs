use core::ptr;
use core::sync::atomic::{AtomicI32, Ordering};

pub unsafe fn reserve(size: usize) -> *mut u8 {
    let result = libc::mmap(
        ptr::null_mut(),
        size,
        libc::PROT_NONE,
        libc::MAP_PRIVATE | libc::MAP_ANON,
        -1,
        0,
    );
    if result == libc::MAP_FAILED {
        ptr::null_mut()
    } else {
        result as *mut u8
    }
}

pub unsafe fn commit(ptr: *mut u8, size: usize) -> bool {
    libc::mprotect(
        ptr as *mut libc::c_void,
        size,
        libc::PROT_READ | libc::PROT_WRITE,
    ) == 0
}

pub unsafe fn unreserve(ptr: *mut u8, size: usize) {
    libc::munmap(ptr as *mut libc::c_void, size);
}

// No futex here: waiters yield until the word changes.
pub fn futex_wait(word: &AtomicI32, expected: i32) {
    while word.load(Ordering::Relaxed) == expected {
        unsafe { libc::sched_yield() };
    }
}

pub fn futex_wake_one(_word: &AtomicI32) {}

#[inline]
pub unsafe fn errno_location() -> *mut libc::c_int {
    libc::__error()
}
