use core::sync::atomic::{AtomicBool, AtomicU8, AtomicUsize, Ordering};

/// Address space reserved for the process-wide arena when nothing is configured.
#[cfg(target_pointer_width = "64")]
pub const DEFAULT_RESERVE_BYTES: usize = 4 << 30; // 4 GiB
#[cfg(not(target_pointer_width = "64"))]
pub const DEFAULT_RESERVE_BYTES: usize = 256 << 20; // 256 MiB

/// Default log level: errors only.
pub const DEFAULT_LOG_LEVEL: u8 = 1;

/// Cached config values (read once at init, never allocate).
static RESERVE_BYTES: AtomicUsize = AtomicUsize::new(DEFAULT_RESERVE_BYTES);
static LOG_LEVEL: AtomicU8 = AtomicU8::new(DEFAULT_LOG_LEVEL);
static VERIFY: AtomicBool = AtomicBool::new(false);

/// Read configuration from environment variables.
///
/// # Safety
/// Calls libc::getenv, which must not race with setenv.
pub unsafe fn read_config() {
    if let Some(bytes) = getenv_usize(b"TAGMALLOC_RESERVE_MB\0").and_then(reserve_from_mb) {
        RESERVE_BYTES.store(bytes, Ordering::Relaxed);
    }
    if let Some(level) = getenv_usize(b"TAGMALLOC_LOG\0") {
        LOG_LEVEL.store(level.min(u8::MAX as usize) as u8, Ordering::Relaxed);
    }
    VERIFY.store(getenv_present(b"TAGMALLOC_VERIFY\0"), Ordering::Relaxed);
}

pub fn reserve_bytes() -> usize {
    RESERVE_BYTES.load(Ordering::Relaxed)
}

pub fn log_level() -> u8 {
    LOG_LEVEL.load(Ordering::Relaxed)
}

/// Whether every mutating heap operation is followed by a consistency walk.
pub fn verify() -> bool {
    VERIFY.load(Ordering::Relaxed)
}

pub fn set_verify(enabled: bool) {
    VERIFY.store(enabled, Ordering::Relaxed);
}

/// Reservation size for a `TAGMALLOC_RESERVE_MB` value; zero and overflow are ignored.
fn reserve_from_mb(mb: usize) -> Option<usize> {
    mb.checked_mul(1 << 20).filter(|&bytes| bytes > 0)
}

unsafe fn getenv_present(key: &[u8]) -> bool {
    !libc::getenv(key.as_ptr() as *const libc::c_char).is_null()
}

/// Parse an environment variable as a usize.
///
/// # Safety
/// Calls libc::getenv.
unsafe fn getenv_usize(key: &[u8]) -> Option<usize> {
    let val = libc::getenv(key.as_ptr() as *const libc::c_char);
    if val.is_null() {
        return None;
    }
    parse_usize(core::ffi::CStr::from_ptr(val).to_bytes())
}

/// Decimal digits only; anything else (including an empty value) is rejected.
fn parse_usize(digits: &[u8]) -> Option<usize> {
    if digits.is_empty() {
        return None;
    }
    let mut result: usize = 0;
    for &byte in digits {
        if !byte.is_ascii_digit() {
            return None;
        }
        result = result.checked_mul(10)?.checked_add((byte - b'0') as usize)?;
    }
    Some(result)
}
