use super::tag::{ArenaView, Chunk};

/// Doubly linked list of free chunks, kept in ascending address order.
///
/// The links live inside the free chunks themselves (see [`ArenaView::prev`]);
/// the list only owns its head. All sizes share one list.
pub struct FreeList {
    head: Option<Chunk>,
}

impl FreeList {
    pub const fn new() -> Self {
        FreeList { head: None }
    }

    #[inline]
    pub fn head(&self) -> Option<Chunk> {
        self.head
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.head.is_none()
    }

    /// First chunk, in address order, whose size is at least `size`.
    pub fn find_fit(&self, arena: &ArenaView, size: usize) -> Option<Chunk> {
        self.iter(arena).find(|&c| arena.header(c).size() >= size)
    }

    /// Link `node` at its address-ordered position. Linear in list length.
    pub fn insert_ordered(&mut self, arena: &mut ArenaView, node: Chunk) {
        match self.head {
            Some(head) if head < node => {
                let mut front = head;
                while let Some(next) = arena.next(front) {
                    if next > node {
                        break;
                    }
                    front = next;
                }
                debug_assert!(front != node, "chunk already on the free list");
                self.insert_after(arena, front, node);
            }
            head => {
                debug_assert!(head != Some(node), "chunk already on the free list");
                arena.set_prev(node, None);
                arena.set_next(node, head);
                if let Some(old) = head {
                    arena.set_prev(old, Some(node));
                }
                self.head = Some(node);
            }
        }
    }

    /// Link `node` directly after `anchor`. The caller guarantees order.
    pub fn insert_after(&mut self, arena: &mut ArenaView, anchor: Chunk, node: Chunk) {
        let next = arena.next(anchor);
        debug_assert!(anchor < node && next.map_or(true, |n| node < n));
        arena.set_prev(node, Some(anchor));
        arena.set_next(node, next);
        arena.set_next(anchor, Some(node));
        if let Some(next) = next {
            arena.set_prev(next, Some(node));
        }
    }

    /// Unlink `node`. Constant time: its neighbours are read from its links.
    pub fn remove(&mut self, arena: &mut ArenaView, node: Chunk) {
        let prev = arena.prev(node);
        let next = arena.next(node);
        match prev {
            Some(prev) => arena.set_next(prev, next),
            None => {
                debug_assert!(self.head == Some(node));
                self.head = next;
            }
        }
        if let Some(next) = next {
            arena.set_prev(next, prev);
        }
    }

    /// Put `new` in the list slot `old` occupies. Used when `new` sits
    /// between `old`'s neighbours in address order (a split remainder).
    pub fn replace(&mut self, arena: &mut ArenaView, old: Chunk, new: Chunk) {
        let prev = arena.prev(old);
        let next = arena.next(old);
        arena.set_prev(new, prev);
        arena.set_next(new, next);
        match prev {
            Some(prev) => arena.set_next(prev, Some(new)),
            None => self.head = Some(new),
        }
        if let Some(next) = next {
            arena.set_prev(next, Some(new));
        }
    }

    pub fn iter<'a>(&self, arena: &'a ArenaView) -> Iter<'a> {
        Iter {
            arena,
            node: self.head,
        }
    }
}

pub struct Iter<'a> {
    arena: &'a ArenaView,
    node: Option<Chunk>,
}

impl Iterator for Iter<'_> {
    type Item = Chunk;

    fn next(&mut self) -> Option<Chunk> {
        let node = self.node?;
        self.node = self.arena.next(node);
        Some(node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::heap::tag::tests::Scratch;
    use crate::heap::tag::FIRST_CHUNK;

    /// Carve the scratch arena into `n` free 32-byte chunks (unlisted).
    fn chunks(s: &mut Scratch, n: usize) -> Vec<Chunk> {
        (0..n)
            .map(|i| {
                let c = Chunk::at(FIRST_CHUNK + i * 32);
                s.view.tag_free(c, 32);
                c
            })
            .collect()
    }

    fn collect(list: &FreeList, s: &Scratch) -> Vec<Chunk> {
        list.iter(&s.view).collect()
    }

    /// Walk the list backwards from its tail via prev links.
    fn collect_rev(list: &FreeList, s: &Scratch) -> Vec<Chunk> {
        let mut out = Vec::new();
        let mut node = list.iter(&s.view).last();
        while let Some(c) = node {
            out.push(c);
            node = s.view.prev(c);
        }
        out
    }

    #[test]
    fn ordered_insert_sorts_by_address() {
        let mut s = Scratch::new(512);
        let c = chunks(&mut s, 6);
        let mut list = FreeList::new();
        for &i in &[3usize, 0, 5, 1, 4, 2] {
            list.insert_ordered(&mut s.view, c[i]);
        }
        assert_eq!(collect(&list, &s), c);
        let mut rev = c.clone();
        rev.reverse();
        assert_eq!(collect_rev(&list, &s), rev);
        assert_eq!(list.head(), Some(c[0]));
    }

    #[test]
    fn remove_head_middle_and_tail() {
        let mut s = Scratch::new(512);
        let c = chunks(&mut s, 5);
        let mut list = FreeList::new();
        for &node in &c {
            list.insert_ordered(&mut s.view, node);
        }
        list.remove(&mut s.view, c[0]);
        list.remove(&mut s.view, c[2]);
        list.remove(&mut s.view, c[4]);
        assert_eq!(collect(&list, &s), vec![c[1], c[3]]);
        assert_eq!(collect_rev(&list, &s), vec![c[3], c[1]]);
        list.remove(&mut s.view, c[1]);
        list.remove(&mut s.view, c[3]);
        assert!(list.is_empty());
    }

    #[test]
    fn replace_keeps_position() {
        let mut s = Scratch::new(512);
        let c = chunks(&mut s, 5);
        let mut list = FreeList::new();
        list.insert_ordered(&mut s.view, c[0]);
        list.insert_ordered(&mut s.view, c[2]);
        list.insert_ordered(&mut s.view, c[4]);
        list.replace(&mut s.view, c[2], c[3]);
        assert_eq!(collect(&list, &s), vec![c[0], c[3], c[4]]);
        list.replace(&mut s.view, c[0], c[1]);
        assert_eq!(list.head(), Some(c[1]));
        assert_eq!(collect_rev(&list, &s), vec![c[4], c[3], c[1]]);
    }

    #[test]
    fn insert_after_links_both_ways() {
        let mut s = Scratch::new(512);
        let c = chunks(&mut s, 3);
        let mut list = FreeList::new();
        list.insert_ordered(&mut s.view, c[0]);
        list.insert_ordered(&mut s.view, c[2]);
        list.insert_after(&mut s.view, c[0], c[1]);
        assert_eq!(collect(&list, &s), c);
        assert_eq!(s.view.prev(c[2]), Some(c[1]));
    }

    #[test]
    fn find_fit_returns_first_large_enough() {
        let mut s = Scratch::new(512);
        let a = Chunk::at(FIRST_CHUNK);
        let b = Chunk::at(FIRST_CHUNK + 32);
        let c = Chunk::at(FIRST_CHUNK + 128);
        s.view.tag_free(a, 32);
        s.view.tag_free(b, 96);
        s.view.tag_free(c, 256);
        let mut list = FreeList::new();
        for node in [c, a, b] {
            list.insert_ordered(&mut s.view, node);
        }
        assert_eq!(list.find_fit(&s.view, 32), Some(a));
        assert_eq!(list.find_fit(&s.view, 64), Some(b));
        assert_eq!(list.find_fit(&s.view, 128), Some(c));
        assert_eq!(list.find_fit(&s.view, 512), None);
    }
}
