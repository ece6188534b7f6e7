/// Align `value` up to the next multiple of `align`.
/// `align` must be a power of two.
#[inline(always)]
pub const fn align_up(value: usize, align: usize) -> usize {
    debug_assert!(align.is_power_of_two());
    (value + align - 1) & !(align - 1)
}

/// Checked variant of [`align_up`] for sizes that come straight from callers.
#[inline(always)]
pub const fn checked_align_up(value: usize, align: usize) -> Option<usize> {
    match value.checked_add(align - 1) {
        Some(v) => Some(v & !(align - 1)),
        None => None,
    }
}

/// Round `value` up to a multiple of `granule`, which need not be a power of two.
#[inline]
pub const fn checked_round_up(value: usize, granule: usize) -> Option<usize> {
    if value == 0 {
        return Some(0);
    }
    let units = (value - 1) / granule + 1;
    units.checked_mul(granule)
}

/// Check if `value` is aligned to `align`.
#[inline(always)]
pub const fn is_aligned(value: usize, align: usize) -> bool {
    value & (align - 1) == 0
}

/// Number of significant bits in `value` (0 for 0).
#[inline(always)]
pub const fn bit_length(value: usize) -> u32 {
    usize::BITS - value.leading_zeros()
}

/// Minimum alignment for all allocations (matches max_align_t on 64-bit).
pub const MIN_ALIGN: usize = 16;

/// Runtime page size, read from sysconf(_SC_PAGESIZE). Zero until first queried.
static PAGE_SIZE_CACHED: core::sync::atomic::AtomicUsize =
    core::sync::atomic::AtomicUsize::new(0);

/// Initialize the page size from the OS.
///
/// # Safety
/// Calls `sysconf`; must not race with itself on platforms where that matters.
pub unsafe fn init_page_size() {
    let ps = libc::sysconf(libc::_SC_PAGESIZE);
    let ps = if ps > 0 { ps as usize } else { 4096 };
    PAGE_SIZE_CACHED.store(ps, core::sync::atomic::Ordering::Release);
}

/// Get the system page size, querying the OS on first use.
#[inline(always)]
pub fn page_size() -> usize {
    match PAGE_SIZE_CACHED.load(core::sync::atomic::Ordering::Acquire) {
        0 => {
            // sysconf is idempotent, so racing first callers store the same value.
            unsafe { init_page_size() };
            PAGE_SIZE_CACHED.load(core::sync::atomic::Ordering::Acquire)
        }
        ps => ps,
    }
}
