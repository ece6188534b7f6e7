//! Boundary tags and the typed view of the arena they live in.
//!
//! Every chunk starts with a header word and ends with a footer word, both
//! holding the chunk's byte size with bit 0 doubling as the in-use flag. A
//! free chunk additionally keeps its free-list links in the two words after
//! the header. The links are arena offsets, not addresses.
//!
//! ```text
//!   offset 0        FIRST_CHUNK                                 len - WORD
//!   | fence(1) | hdr | prev | next | ...... | ftr | hdr | ... | fence(1) |
//!              ^-- chunk                          ^-- next chunk
//! ```

use crate::util::{checked_align_up, MIN_ALIGN};
use core::mem::size_of;
use core::ptr::NonNull;

pub const WORD: usize = size_of::<usize>();
/// Width of one boundary tag (header or footer).
pub const TAG_SIZE: usize = WORD;
/// Header plus footer.
pub const TAG_OVERHEAD: usize = 2 * TAG_SIZE;
/// What a free chunk needs in front of its footer: the header and two links.
pub const NODE_SIZE: usize = 3 * WORD;
/// Smallest chunk that can stand alone as a free chunk.
pub const MIN_CHUNK: usize = NODE_SIZE + TAG_SIZE;
/// Every chunk carries at least this much payload so it can be linked once freed.
pub const MIN_PAYLOAD: usize = NODE_SIZE - TAG_SIZE;
/// Offset of the first chunk header. Chosen so payloads fall on MIN_ALIGN.
pub const FIRST_CHUNK: usize = MIN_ALIGN - TAG_SIZE;
/// Arena bytes outside any chunk: leading pad and fence, trailing fence.
pub const ARENA_OVERHEAD: usize = FIRST_CHUNK + TAG_SIZE;

const USED_BIT: usize = 1;
const NIL: usize = usize::MAX;

const _: () = assert!(MIN_CHUNK % MIN_ALIGN == 0);
const _: () = assert!(ARENA_OVERHEAD % MIN_ALIGN == 0);

/// Chunk size (overhead included) for a request of `request` payload bytes.
pub const fn chunk_size_for(request: usize) -> Option<usize> {
    let payload = if request > MIN_PAYLOAD { request } else { MIN_PAYLOAD };
    match payload.checked_add(TAG_OVERHEAD) {
        Some(body) => checked_align_up(body, MIN_ALIGN),
        None => None,
    }
}

/// A tagged size: chunk bytes with bit 0 set while the chunk is in use.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Tag(usize);

impl Tag {
    /// The permanently-used, zero-sized record at either end of the arena.
    pub const FENCE: Tag = Tag(USED_BIT);

    #[inline]
    pub const fn free(size: usize) -> Tag {
        debug_assert!(size & USED_BIT == 0);
        Tag(size)
    }

    #[inline]
    pub const fn used(size: usize) -> Tag {
        Tag(size | USED_BIT)
    }

    #[inline]
    pub const fn size(self) -> usize {
        self.0 & !USED_BIT
    }

    #[inline]
    pub const fn is_used(self) -> bool {
        self.0 & USED_BIT != 0
    }

    #[inline]
    pub const fn is_fence(self) -> bool {
        self.0 == USED_BIT
    }
}

/// A chunk, named by the arena offset of its header.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct Chunk(usize);

impl Chunk {
    #[inline]
    pub const fn at(offset: usize) -> Chunk {
        Chunk(offset)
    }

    #[inline]
    pub const fn offset(self) -> usize {
        self.0
    }
}

/// Word-level access to the committed arena, addressed by offset.
///
/// Bounds and alignment are asserted in debug builds only.
#[derive(Clone, Copy)]
pub struct ArenaView {
    base: NonNull<u8>,
    len: usize,
}

// Only ever touched under the heap lock.
unsafe impl Send for ArenaView {}

impl ArenaView {
    /// The view of an arena that has not been created yet.
    pub const fn empty() -> Self {
        ArenaView {
            base: NonNull::dangling(),
            len: 0,
        }
    }

    /// # Safety
    /// `base..base + len` must be committed, writable, and owned by the heap.
    pub unsafe fn new(base: NonNull<u8>, len: usize) -> Self {
        debug_assert!(base.as_ptr() as usize % MIN_ALIGN == 0);
        ArenaView { base, len }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn start_addr(&self) -> usize {
        self.base.as_ptr() as usize
    }

    #[inline]
    pub fn end_addr(&self) -> usize {
        self.start_addr() + self.len
    }

    /// Extend the view over `extra` freshly committed bytes.
    pub fn grow(&mut self, extra: usize) {
        self.len += extra;
    }

    /// Offset of the trailing fence.
    #[inline]
    pub fn end_fence(&self) -> usize {
        self.len - TAG_SIZE
    }

    #[inline]
    pub fn word(&self, offset: usize) -> usize {
        debug_assert!(offset % WORD == 0 && offset + WORD <= self.len);
        unsafe { self.base.as_ptr().add(offset).cast::<usize>().read() }
    }

    #[inline]
    fn set_word(&mut self, offset: usize, value: usize) {
        debug_assert!(offset % WORD == 0 && offset + WORD <= self.len);
        unsafe { self.base.as_ptr().add(offset).cast::<usize>().write(value) }
    }

    pub fn set_fence(&mut self, offset: usize) {
        self.set_word(offset, Tag::FENCE.0);
    }

    #[inline]
    pub fn header(&self, chunk: Chunk) -> Tag {
        Tag(self.word(chunk.0))
    }

    #[inline]
    pub fn footer(&self, chunk: Chunk) -> Tag {
        Tag(self.word(chunk.0 + self.header(chunk).size() - TAG_SIZE))
    }

    /// Write `tag` to both ends of `chunk`, leaving its links alone.
    #[inline]
    pub fn retag(&mut self, chunk: Chunk, tag: Tag) {
        debug_assert!(tag.size() >= MIN_CHUNK);
        self.set_word(chunk.0, tag.0);
        self.set_word(chunk.0 + tag.size() - TAG_SIZE, tag.0);
    }

    /// Mark `chunk` free with the given size. The chunk is left unlinked.
    pub fn tag_free(&mut self, chunk: Chunk, size: usize) {
        self.retag(chunk, Tag::free(size));
        self.unlink(chunk);
    }

    /// Mark `chunk` in use with the given size. The chunk is left unlinked.
    pub fn tag_used(&mut self, chunk: Chunk, size: usize) {
        self.retag(chunk, Tag::used(size));
        self.unlink(chunk);
    }

    fn unlink(&mut self, chunk: Chunk) {
        self.set_prev(chunk, None);
        self.set_next(chunk, None);
    }

    /// The tag just below `chunk` (its left neighbour's footer, or the
    /// leading fence) and the chunk that footer belongs to. For a fence the
    /// returned chunk is meaningless; check the tag first.
    #[inline]
    pub fn preceding(&self, chunk: Chunk) -> (Tag, Chunk) {
        let tag = Tag(self.word(chunk.0 - TAG_SIZE));
        (tag, Chunk(chunk.0 - tag.size()))
    }

    /// The chunk (or trailing fence) directly after `chunk`.
    #[inline]
    pub fn following(&self, chunk: Chunk) -> Chunk {
        Chunk(chunk.0 + self.header(chunk).size())
    }

    #[inline]
    pub fn prev(&self, chunk: Chunk) -> Option<Chunk> {
        decode_link(self.word(chunk.0 + WORD))
    }

    #[inline]
    pub fn next(&self, chunk: Chunk) -> Option<Chunk> {
        decode_link(self.word(chunk.0 + 2 * WORD))
    }

    #[inline]
    pub fn set_prev(&mut self, chunk: Chunk, link: Option<Chunk>) {
        self.set_word(chunk.0 + WORD, encode_link(link));
    }

    #[inline]
    pub fn set_next(&mut self, chunk: Chunk, link: Option<Chunk>) {
        self.set_word(chunk.0 + 2 * WORD, encode_link(link));
    }

    /// Address of the chunk's header.
    #[inline]
    pub fn addr(&self, chunk: Chunk) -> usize {
        self.start_addr() + chunk.0
    }

    /// First payload byte of `chunk`.
    #[inline]
    pub fn payload(&self, chunk: Chunk) -> NonNull<u8> {
        unsafe { NonNull::new_unchecked(self.base.as_ptr().add(chunk.0 + TAG_SIZE)) }
    }

    /// The chunk whose payload starts at `ptr`.
    #[inline]
    pub fn chunk_of(&self, ptr: NonNull<u8>) -> Chunk {
        let addr = ptr.as_ptr() as usize;
        debug_assert!(
            addr >= self.start_addr() + FIRST_CHUNK + TAG_SIZE && addr < self.end_addr(),
            "pointer outside the arena"
        );
        Chunk(addr - TAG_SIZE - self.start_addr())
    }
}

#[inline]
fn encode_link(link: Option<Chunk>) -> usize {
    link.map_or(NIL, |c| c.0)
}

#[inline]
fn decode_link(raw: usize) -> Option<Chunk> {
    if raw == NIL {
        None
    } else {
        Some(Chunk(raw))
    }
}
