#![no_main]

use libfuzzer_sys::fuzz_target;
use tagmalloc::{Heap, ReservedRegion};

/// Interprets a byte slice as a sequence of heap operations on a fresh heap.
///
/// Each operation is encoded as:
///   byte 0: opcode (0=allocate, 1=release, 2=resize, 3=zeroed)
///   byte 1-2: size (little-endian u16)
///   byte 3: slot index (which tracked pointer to operate on)
///
/// Up to 64 live pointers are tracked. The heap walk must stay clean.
const MAX_SLOTS: usize = 64;

fuzz_target!(|data: &[u8]| {
    let heap = Heap::new(ReservedRegion::with_capacity(64 << 20));
    let mut slots: [(*mut u8, usize, u8); MAX_SLOTS] = [(std::ptr::null_mut(), 0, 0); MAX_SLOTS];

    for (n, op) in data.chunks_exact(4).enumerate() {
        let size = u16::from_le_bytes([op[1], op[2]]) as usize;
        let slot = op[3] as usize % MAX_SLOTS;
        let fill = (n as u8) | 1;
        let (old, old_len, old_fill) = slots[slot];

        match op[0] & 0x03 {
            0 => unsafe {
                heap.release(old);
                let p = heap.allocate(size).expect("allocate").as_ptr();
                std::ptr::write_bytes(p, fill, size);
                slots[slot] = (p, size, fill);
            },
            1 => unsafe {
                heap.release(old);
                slots[slot] = (std::ptr::null_mut(), 0, 0);
            },
            2 => unsafe {
                let p = heap.resize(old, size).expect("resize");
                if size == 0 && !old.is_null() {
                    slots[slot] = (std::ptr::null_mut(), 0, 0);
                    continue;
                }
                let kept = std::slice::from_raw_parts(p, old_len.min(size));
                assert!(kept.iter().all(|&b| b == old_fill), "resize lost content");
                std::ptr::write_bytes(p, fill, size);
                slots[slot] = (p, size, fill);
            },
            _ => unsafe {
                heap.release(old);
                let count = (size >> 8).max(1);
                let elem = (size & 0xFF).max(1);
                let p = heap.zeroed(count, elem).expect("zeroed").as_ptr();
                let bytes = std::slice::from_raw_parts(p, count * elem);
                assert!(bytes.iter().all(|&b| b == 0), "zeroed memory not zero");
                std::ptr::write_bytes(p, fill, count * elem);
                slots[slot] = (p, count * elem, fill);
            },
        }

        let report = heap.check();
        assert!(report.is_ok(), "{}", report);
    }

    for &(p, _, _) in &slots {
        unsafe { heap.release(p) };
    }
    let report = heap.check();
    assert!(report.is_ok() && report.used_chunks == 0, "{}", report);
});
