use crate::config;
use crate::fork;
use crate::heap::Heap;
use crate::platform::ReservedRegion;
use crate::util;
use core::sync::atomic::{AtomicU8, Ordering};

const UNINIT: u8 = 0;
const INITIALIZING: u8 = 1;
const READY: u8 = 2;

pub static INIT_STATE: AtomicU8 = AtomicU8::new(UNINIT);

/// The process-wide heap behind the C entry points and [`crate::TagMalloc`].
pub(crate) static HEAP: Heap<ReservedRegion> = Heap::new(ReservedRegion::configured());

/// Library constructor -- called before main().
#[used]
#[cfg_attr(target_os = "linux", link_section = ".init_array")]
#[cfg_attr(target_os = "macos", link_section = "__DATA,__mod_init_func")]
static CTOR: unsafe extern "C" fn() = {
    unsafe extern "C" fn init() {
        tagmalloc_init();
    }
    init
};

pub unsafe fn tagmalloc_init() {
    match INIT_STATE.compare_exchange(UNINIT, INITIALIZING, Ordering::AcqRel, Ordering::Acquire) {
        Ok(_) => {}
        Err(INITIALIZING) => {
            while INIT_STATE.load(Ordering::Acquire) == INITIALIZING {
                core::hint::spin_loop();
            }
            return;
        }
        Err(_) => return,
    }

    util::init_page_size();
    config::read_config();

    // pthread_atfork may call malloc, so the heap has to be usable first.
    INIT_STATE.store(READY, Ordering::Release);
    fork::register_atfork();
}

#[cold]
#[inline(never)]
pub unsafe fn ensure_initialized() {
    tagmalloc_init();
}

/// The process-wide heap, initialized on first use.
#[inline(always)]
pub fn heap() -> &'static Heap<ReservedRegion> {
    if INIT_STATE.load(Ordering::Acquire) != READY {
        unsafe { ensure_initialized() };
    }
    &HEAP
}
