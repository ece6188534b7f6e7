//! Consistency walk over the whole arena.

use super::engine::HeapState;
use super::tag::{Chunk, ARENA_OVERHEAD, FIRST_CHUNK, MIN_CHUNK, TAG_SIZE};
use crate::util::MIN_ALIGN;
use core::fmt;

/// Result of walking every chunk and the free list.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct HeapReport {
    /// Address of the arena's first byte (0 before the arena exists).
    pub arena_start: usize,
    pub arena_bytes: usize,
    /// Times the arena was created or grown.
    pub expansions: usize,
    pub chunks: usize,
    pub used_chunks: usize,
    pub free_chunks: usize,
    pub used_bytes: usize,
    pub free_bytes: usize,
    /// Free chunks reached through the free list, in address order.
    pub listed_free: usize,
    pub tag_mismatches: usize,
    pub bad_fences: usize,
    /// A chunk whose size is malformed or runs past the trailing fence.
    pub overruns: usize,
    /// Free chunks directly followed by another free chunk.
    pub unfused_neighbors: usize,
    /// Free chunks missing from the list, list nodes that are not free
    /// chunks, broken back links, or an out-of-order list.
    pub list_errors: usize,
}

impl HeapReport {
    pub fn errors(&self) -> usize {
        self.tag_mismatches
            + self.bad_fences
            + self.overruns
            + self.unfused_neighbors
            + self.list_errors
    }

    /// True when the chunks partition the arena exactly and the free list
    /// is precisely the set of free chunks in address order.
    pub fn is_ok(&self) -> bool {
        let covered = if self.arena_bytes == 0 {
            self.chunks == 0
        } else {
            self.used_bytes + self.free_bytes + ARENA_OVERHEAD == self.arena_bytes
        };
        self.errors() == 0 && covered && self.listed_free == self.free_chunks
    }

    /// Whether `[addr, addr + len)` lies between the two fences.
    pub fn contains(&self, addr: usize, len: usize) -> bool {
        self.arena_bytes != 0
            && addr >= self.arena_start + FIRST_CHUNK
            && addr.saturating_add(len) <= self.arena_start + self.arena_bytes - TAG_SIZE
    }
}

impl fmt::Display for HeapReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "arena {:#x}+{}: {} chunks ({} used/{} B, {} free/{} B, {} listed); \
             errors: {} tag, {} fence, {} overrun, {} unfused, {} list",
            self.arena_start,
            self.arena_bytes,
            self.chunks,
            self.used_chunks,
            self.used_bytes,
            self.free_chunks,
            self.free_bytes,
            self.listed_free,
            self.tag_mismatches,
            self.bad_fences,
            self.overruns,
            self.unfused_neighbors,
            self.list_errors,
        )
    }
}

impl<S> HeapState<S> {
    /// Walk the arena chunk by chunk while following the free list in step.
    /// Both run in ascending address order, so each free chunk met in the
    /// arena must be the list's next node.
    pub fn walk(&self) -> HeapReport {
        let arena = &self.arena;
        let mut report = HeapReport {
            expansions: self.expansions,
            ..HeapReport::default()
        };
        if arena.is_empty() {
            if !self.free.is_empty() {
                report.list_errors += 1;
            }
            return report;
        }
        report.arena_start = arena.start_addr();
        report.arena_bytes = arena.len();

        let end = arena.end_fence();
        for fence in [FIRST_CHUNK - TAG_SIZE, end] {
            if !arena.header(Chunk::at(fence)).is_fence() {
                report.bad_fences += 1;
            }
        }

        let mut cursor = self.free.head();
        let mut last_listed: Option<Chunk> = None;
        let mut prev_free = false;
        let mut offset = FIRST_CHUNK;
        while offset < end {
            let chunk = Chunk::at(offset);
            let tag = arena.header(chunk);
            let size = tag.size();
            if size < MIN_CHUNK || size % MIN_ALIGN != 0 || size > end - offset {
                report.overruns += 1;
                break;
            }
            if arena.footer(chunk) != tag {
                report.tag_mismatches += 1;
            }
            report.chunks += 1;

            if tag.is_used() {
                report.used_chunks += 1;
                report.used_bytes += size;
                prev_free = false;
            } else {
                report.free_chunks += 1;
                report.free_bytes += size;
                if prev_free {
                    report.unfused_neighbors += 1;
                }
                prev_free = true;

                if cursor == Some(chunk) {
                    if arena.prev(chunk) != last_listed {
                        report.list_errors += 1;
                    }
                    report.listed_free += 1;
                    last_listed = Some(chunk);
                    cursor = arena.next(chunk);
                } else {
                    report.list_errors += 1;
                }
            }
            offset += size;
        }

        // Whatever is left on the list is not a free chunk of this arena.
        if cursor.is_some() {
            report.list_errors += 1;
        }
        report
    }
}
