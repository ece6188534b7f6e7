#![no_main]

use libfuzzer_sys::fuzz_target;
use tagmalloc::{Heap, ReservedRegion};

// Exercises size boundaries and over-aligned requests.
// Interprets input as (u32 size, u8 alignment shift) records. Every block
// is written to its full usable extent and kept live until the end, so a
// block that overlaps its neighbour or the tags shows up in the walk.

fuzz_target!(|data: &[u8]| {
    let heap = Heap::new(ReservedRegion::with_capacity(256 << 20));
    let mut live = Vec::new();

    for record in data.chunks_exact(5) {
        let raw = u32::from_le_bytes([record[0], record[1], record[2], record[3]]);
        let size = raw as usize % (1 << 20);
        let align = 1usize << (record[4] % 13);

        let p = match heap.allocate_aligned(size, align) {
            Ok(p) => p.as_ptr(),
            // Running out of the reservation is fine; anything else is not.
            Err(tagmalloc::AllocError::Exhausted) => continue,
            Err(e) => panic!("allocate_aligned({}, {}): {}", size, align, e),
        };
        assert_eq!(p as usize % align.max(16), 0, "misaligned {:p}", p);

        let usable = unsafe { heap.usable_size(p) };
        assert!(usable >= size);
        unsafe { std::ptr::write_bytes(p, 0xBB, usable) };
        live.push(p);
    }

    let report = heap.check();
    assert!(report.is_ok(), "{}", report);
    assert_eq!(report.used_chunks, live.len());

    for p in live {
        unsafe { heap.release(p) };
    }
    let report = heap.check();
    assert!(report.is_ok() && report.chunks <= 1, "{}", report);
});
