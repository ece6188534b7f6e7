use core::ptr;
use core::sync::atomic::AtomicI32;

/// Reserve `size` bytes of inaccessible address space.
/// Returns null on failure.
///
/// # Safety
/// `size` must be page-aligned and non-zero.
pub unsafe fn reserve(size: usize) -> *mut u8 {
    let result = libc::mmap(
        ptr::null_mut(),
        size,
        libc::PROT_NONE,
        libc::MAP_PRIVATE | libc::MAP_ANONYMOUS | libc::MAP_NORESERVE,
        -1,
        0,
    );
    if result == libc::MAP_FAILED {
        ptr::null_mut()
    } else {
        result as *mut u8
    }
}

/// Make part of a reservation readable and writable.
///
/// # Safety
/// Region must lie inside a reservation and be page-aligned.
pub unsafe fn commit(ptr: *mut u8, size: usize) -> bool {
    libc::mprotect(
        ptr as *mut libc::c_void,
        size,
        libc::PROT_READ | libc::PROT_WRITE,
    ) == 0
}

/// Give a whole reservation back.
///
/// # Safety
/// `ptr` must have been returned by `reserve` with the same `size`.
pub unsafe fn unreserve(ptr: *mut u8, size: usize) {
    libc::munmap(ptr as *mut libc::c_void, size);
}

/// Sleep while `*word == expected`.
pub fn futex_wait(word: &AtomicI32, expected: i32) {
    unsafe {
        libc::syscall(
            libc::SYS_futex,
            word as *const AtomicI32,
            libc::FUTEX_WAIT | libc::FUTEX_PRIVATE_FLAG,
            expected,
            ptr::null::<libc::timespec>(),
        );
    }
}

/// Wake one thread sleeping on `word`.
pub fn futex_wake_one(word: &AtomicI32) {
    unsafe {
        libc::syscall(
            libc::SYS_futex,
            word as *const AtomicI32,
            libc::FUTEX_WAKE | libc::FUTEX_PRIVATE_FLAG,
            1i32,
        );
    }
}

#[inline]
pub unsafe fn errno_location() -> *mut libc::c_int {
    libc::__errno_location()
}
