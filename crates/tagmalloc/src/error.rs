use core::fmt;

/// Why an allocation could not be satisfied.
///
/// Every variant is an out-of-memory condition as far as C callers are
/// concerned: the C entry points turn all of them into a null return with
/// `errno` set to `ENOMEM`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AllocError {
    /// The request (or `count * size`) does not fit in a `usize` once
    /// rounded up to a chunk or page size.
    SizeOverflow,
    /// The memory source refused to extend the arena.
    Exhausted,
    /// The memory source returned an extent that does not continue the arena.
    NonContiguous,
}

impl AllocError {
    /// The `errno` value reported for this error.
    pub fn errno(self) -> libc::c_int {
        libc::ENOMEM
    }
}

impl fmt::Display for AllocError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AllocError::SizeOverflow => f.write_str("allocation size overflows usize"),
            AllocError::Exhausted => f.write_str("memory source exhausted"),
            AllocError::NonContiguous => {
                f.write_str("memory source returned a non-contiguous extent")
            }
        }
    }
}

/// Abort with a diagnostic message to stderr.
/// This is used when the verification walk finds a damaged heap.
#[cold]
#[inline(never)]
pub fn abort_with_message(msg: &str) -> ! {
    unsafe {
        // Write directly to stderr fd (2) -- no allocation needed
        libc::write(2, msg.as_ptr() as *const libc::c_void, msg.len());
        libc::abort();
    }
}
