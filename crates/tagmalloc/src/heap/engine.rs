use super::free_list::FreeList;
use super::tag::{
    chunk_size_for, ArenaView, Chunk, Tag, ARENA_OVERHEAD, FIRST_CHUNK, MIN_CHUNK, TAG_OVERHEAD,
    TAG_SIZE,
};
use crate::error::AllocError;
use crate::platform::MemorySource;
use crate::util::{align_up, checked_round_up, MIN_ALIGN};
use crate::{log_debug, log_error, log_warn};
use core::ptr::NonNull;

/// Everything the heap lock protects: the arena, its free list, and the
/// memory source the arena grows from.
pub struct HeapState<S> {
    source: S,
    pub(super) arena: ArenaView,
    pub(super) free: FreeList,
    /// Discovered when the arena is created.
    page_size: usize,
    pub(super) expansions: usize,
}

impl<S: MemorySource> HeapState<S> {
    pub const fn new(source: S) -> Self {
        HeapState {
            source,
            arena: ArenaView::empty(),
            free: FreeList::new(),
            page_size: 0,
            expansions: 0,
        }
    }

    pub fn allocate(&mut self, request: usize) -> Result<NonNull<u8>, AllocError> {
        let size = chunk_size_for(request).ok_or(AllocError::SizeOverflow)?;
        let chunk = self.find_or_expand(size)?;
        Ok(self.split(chunk, size))
    }

    /// Allocation whose payload is aligned to `align` (a power of two).
    ///
    /// A fit is searched for with room for the worst-case leading gap; the
    /// gap is then cut off as a free chunk of its own.
    pub fn allocate_aligned(
        &mut self,
        request: usize,
        align: usize,
    ) -> Result<NonNull<u8>, AllocError> {
        debug_assert!(align.is_power_of_two());
        if align <= MIN_ALIGN {
            return self.allocate(request);
        }
        let size = chunk_size_for(request).ok_or(AllocError::SizeOverflow)?;
        let search = size
            .checked_add(align)
            .and_then(|s| s.checked_add(MIN_CHUNK))
            .ok_or(AllocError::SizeOverflow)?;
        let chunk = self.find_or_expand(search)?;

        let start = self.arena.addr(chunk);
        let mut gap = align_up(start + TAG_SIZE, align) - TAG_SIZE - start;
        if gap != 0 && gap < MIN_CHUNK {
            gap += align;
        }
        if gap == 0 {
            return Ok(self.split(chunk, size));
        }

        // `chunk` keeps its list slot, shrunk to the gap; the rest follows it.
        let total = self.arena.header(chunk).size();
        let body = Chunk::at(chunk.offset() + gap);
        self.arena.retag(chunk, Tag::free(gap));
        self.arena.tag_free(body, total - gap);
        self.free.insert_after(&mut self.arena, chunk, body);
        Ok(self.split(body, size))
    }

    /// # Safety
    /// `ptr` must be a live payload pointer handed out by this heap.
    pub unsafe fn release(&mut self, ptr: NonNull<u8>) {
        let chunk = self.arena.chunk_of(ptr);
        let tag = self.arena.header(chunk);
        debug_assert!(tag.is_used(), "release of a chunk that is not in use");
        debug_assert_eq!(tag, self.arena.footer(chunk), "boundary tags disagree");
        self.arena.tag_free(chunk, tag.size());
        self.insert_free(chunk);
    }

    /// # Safety
    /// `ptr` must be a live payload pointer handed out by this heap.
    pub unsafe fn usable_size(&self, ptr: NonNull<u8>) -> usize {
        let chunk = self.arena.chunk_of(ptr);
        self.arena.header(chunk).size() - TAG_OVERHEAD
    }

    pub fn free_list_head(&self) -> Option<NonNull<u8>> {
        self.free.head().map(|c| self.arena.payload(c))
    }

    fn find_or_expand(&mut self, size: usize) -> Result<Chunk, AllocError> {
        match self.free.find_fit(&self.arena, size) {
            Some(chunk) => Ok(chunk),
            None => self.expand(size),
        }
    }

    /// Hand the front `size` bytes of free `chunk` to the caller. A tail big
    /// enough to be a chunk of its own stays free in `chunk`'s list slot;
    /// a smaller one is given away with the rest.
    fn split(&mut self, chunk: Chunk, size: usize) -> NonNull<u8> {
        let total = self.arena.header(chunk).size();
        debug_assert!(total >= size);
        let rest = total - size;
        if rest >= MIN_CHUNK {
            let tail = Chunk::at(chunk.offset() + size);
            self.arena.tag_free(tail, rest);
            self.free.replace(&mut self.arena, chunk, tail);
            self.arena.tag_used(chunk, size);
        } else {
            self.free.remove(&mut self.arena, chunk);
            self.arena.tag_used(chunk, total);
        }
        self.arena.payload(chunk)
    }

    /// Link a freshly freed chunk and fuse it with free neighbours.
    /// Returns the chunk that ends up on the list.
    fn insert_free(&mut self, chunk: Chunk) -> Chunk {
        self.free.insert_ordered(&mut self.arena, chunk);
        let chunk = self.fuse_left(chunk);
        self.fuse_right(chunk)
    }

    /// Absorb `chunk` into its left neighbour if that one is free.
    fn fuse_left(&mut self, chunk: Chunk) -> Chunk {
        let (left_tag, left) = self.arena.preceding(chunk);
        if left_tag.is_used() {
            return chunk;
        }
        let size = left_tag.size() + self.arena.header(chunk).size();
        self.free.remove(&mut self.arena, chunk);
        self.arena.retag(left, Tag::free(size));
        left
    }

    /// Absorb the right neighbour into `chunk` if that one is free.
    fn fuse_right(&mut self, chunk: Chunk) -> Chunk {
        let right = self.arena.following(chunk);
        let right_tag = self.arena.header(right);
        if right_tag.is_used() {
            return chunk;
        }
        let size = self.arena.header(chunk).size() + right_tag.size();
        self.free.remove(&mut self.arena, right);
        self.arena.retag(chunk, Tag::free(size));
        chunk
    }

    /// Grow the arena until a free chunk of at least `size` bytes exists at
    /// its end, and return that chunk.
    fn expand(&mut self, size: usize) -> Result<Chunk, AllocError> {
        if self.arena.is_empty() {
            return self.create_arena(size);
        }

        // A free chunk at the end fuses with the extension, so only the
        // shortfall has to come from the source.
        let end_fence = Chunk::at(self.arena.end_fence());
        let (last_tag, _) = self.arena.preceding(end_fence);
        let have = if last_tag.is_used() { 0 } else { last_tag.size() };
        let len =
            checked_round_up(size - have, self.page_size).ok_or(AllocError::SizeOverflow)?;

        let start = self.extend_source(len)?;
        if start.as_ptr() as usize != self.arena.end_addr() {
            log_error!(
                "memory source returned {:p}, expected {:#x}",
                start,
                self.arena.end_addr()
            );
            return Err(AllocError::NonContiguous);
        }

        // The old trailing fence becomes the new chunk's header.
        self.arena.grow(len);
        let end = self.arena.end_fence();
        self.arena.set_fence(end);
        self.arena.tag_free(end_fence, len);
        self.expansions += 1;
        log_debug!("arena grown by {} bytes to {} bytes", len, self.arena.len());
        Ok(self.insert_free(end_fence))
    }

    fn create_arena(&mut self, size: usize) -> Result<Chunk, AllocError> {
        self.page_size = self.source.page_size();
        debug_assert!(self.page_size.is_power_of_two() && self.page_size >= MIN_ALIGN);
        let len = size
            .checked_add(ARENA_OVERHEAD)
            .and_then(|n| checked_round_up(n, self.page_size))
            .ok_or(AllocError::SizeOverflow)?;

        let start = self.extend_source(len)?;
        self.arena = unsafe { ArenaView::new(start, len) };
        self.arena.set_fence(FIRST_CHUNK - TAG_SIZE);
        self.arena.set_fence(len - TAG_SIZE);

        let chunk = Chunk::at(FIRST_CHUNK);
        self.arena.tag_free(chunk, len - ARENA_OVERHEAD);
        self.free.insert_ordered(&mut self.arena, chunk);
        self.expansions += 1;
        log_debug!("arena created at {:p} with {} bytes", start, len);
        Ok(chunk)
    }

    fn extend_source(&mut self, len: usize) -> Result<NonNull<u8>, AllocError> {
        match unsafe { self.source.extend(len) } {
            Some(start) => Ok(start),
            None => {
                log_warn!("out of memory extending the arena by {} bytes", len);
                Err(AllocError::Exhausted)
            }
        }
    }
}
