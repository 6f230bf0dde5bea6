//! Bucket-list gain structure: one doubly-linked chain of cells per
//! (side, CLIP gain) pair, threaded through an index arena instead of
//! pointers embedded in the cells.

use super::graph::Side;

#[derive(Clone, Copy, Debug, Default, PartialEq)]
struct Link {
    prev: Option<usize>,
    next: Option<usize>,
}

/// CLIP gains range over `[-2 * max_pin, 2 * max_pin]`; bucket 0 holds the
/// most negative value. The head of the highest non-empty bucket per side is
/// the O(1) move candidate.
pub struct BucketList {
    links: Vec<Link>,
    heads: [Vec<Option<usize>>; 2],
    max_bucket: [Option<usize>; 2],
    offset: i32,
}

impl BucketList {
    pub fn new(num_cells: usize, max_pin: usize) -> Self {
        let size = 4 * max_pin + 1;
        BucketList {
            links: vec![Link::default(); num_cells],
            heads: [vec![None; size], vec![None; size]],
            max_bucket: [None, None],
            offset: -2 * (max_pin as i32),
        }
    }

    fn bucket(&self, clip_gain: i32) -> usize {
        (clip_gain - self.offset) as usize
    }

    /// Empty both sides; done at the start of every pass.
    pub fn clear(&mut self) {
        self.links.fill(Link::default());
        for side in &mut self.heads {
            side.fill(None);
        }
        self.max_bucket = [None, None];
    }

    /// Prepend `cell` to the chain for `clip_gain` on `side`.
    pub fn insert(&mut self, cell: usize, side: Side, clip_gain: i32) {
        let bucket = self.bucket(clip_gain);
        let head = self.heads[side][bucket];
        self.links[cell] = Link {
            prev: None,
            next: head,
        };
        if let Some(h) = head {
            self.links[h].prev = Some(cell);
        }
        self.heads[side][bucket] = Some(cell);
        if self.max_bucket[side].map_or(true, |m| bucket >= m) {
            self.max_bucket[side] = Some(bucket);
        }
    }

    /// Unlink `cell` from the chain it currently sits in. `clip_gain` must be
    /// the gain it was inserted with.
    pub fn remove(&mut self, cell: usize, side: Side, clip_gain: i32) {
        let Link { prev, next } = self.links[cell];
        match prev {
            Some(p) => self.links[p].next = next,
            // Head of its chain: advance the head, and rescan for the highest
            // non-empty bucket if this chain held the candidate.
            None => {
                let bucket = self.bucket(clip_gain);
                self.heads[side][bucket] = next;
                if next.is_none() && self.max_bucket[side] == Some(bucket) {
                    self.max_bucket[side] =
                        self.heads[side][..=bucket].iter().rposition(|h| h.is_some());
                }
            }
        }
        if let Some(n) = next {
            self.links[n].prev = prev;
        }
        self.links[cell] = Link::default();
    }

    /// The move candidate for `side`: head of the highest non-empty bucket.
    pub fn candidate(&self, side: Side) -> Option<usize> {
        self.max_bucket[side].and_then(|b| self.heads[side][b])
    }

    /// CLIP gain of the candidate for `side`.
    pub fn max_clip_gain(&self, side: Side) -> Option<i32> {
        self.max_bucket[side].map(|b| b as i32 + self.offset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chain(blist: &BucketList, side: Side, clip_gain: i32) -> Vec<usize> {
        let mut cells = Vec::new();
        let mut cur = blist.heads[side][blist.bucket(clip_gain)];
        while let Some(c) = cur {
            cells.push(c);
            cur = blist.links[c].next;
        }
        cells
    }

    #[test]
    fn lifo_prepend() {
        let mut blist = BucketList::new(4, 2);
        blist.insert(0, 0, 0);
        blist.insert(1, 0, 0);
        blist.insert(2, 0, 0);
        assert_eq!(chain(&blist, 0, 0), vec![2, 1, 0]);
        assert_eq!(blist.candidate(0), Some(2));
        assert_eq!(blist.max_clip_gain(0), Some(0));
    }

    #[test]
    fn remove_middle_and_head() {
        let mut blist = BucketList::new(4, 2);
        for c in 0..4 {
            blist.insert(c, 1, 1);
        }
        blist.remove(2, 1, 1);
        assert_eq!(chain(&blist, 1, 1), vec![3, 1, 0]);
        blist.remove(3, 1, 1);
        assert_eq!(chain(&blist, 1, 1), vec![1, 0]);
        assert_eq!(blist.candidate(1), Some(1));
    }

    #[test]
    fn max_bucket_rescans_downward() {
        let mut blist = BucketList::new(3, 2);
        blist.insert(0, 0, -2);
        blist.insert(1, 0, 1);
        blist.insert(2, 0, 3);
        assert_eq!(blist.candidate(0), Some(2));
        blist.remove(2, 0, 3);
        assert_eq!(blist.candidate(0), Some(1));
        assert_eq!(blist.max_clip_gain(0), Some(1));
        blist.remove(1, 0, 1);
        assert_eq!(blist.candidate(0), Some(0));
        blist.remove(0, 0, -2);
        assert_eq!(blist.candidate(0), None);
    }

    #[test]
    fn sides_are_independent() {
        let mut blist = BucketList::new(2, 1);
        blist.insert(0, 0, 2);
        blist.insert(1, 1, -1);
        assert_eq!(blist.candidate(0), Some(0));
        assert_eq!(blist.candidate(1), Some(1));
        blist.remove(0, 0, 2);
        assert_eq!(blist.candidate(0), None);
        assert_eq!(blist.candidate(1), Some(1));
    }
}
