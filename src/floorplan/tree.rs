//! B*-tree over an index arena, with the contour packer and the perturbation
//! kit. Every perturbation records enough to be undone exactly.
//!
//! Tree invariants: `blocks[dummy].left` is the unique real root; a left
//! child sits flush to the right of its parent, a right child directly above
//! its parent at the same x. The contour is a doubly-linked skyline threaded
//! through `prev`/`next` from `dummy` (x = 0) to `tail` (x = +inf).

use rand::Rng;
use rand_chacha::ChaCha8Rng;

use super::blocks::Block;

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Perturb {
    Rotate,
    Move,
    Swap,
}

#[derive(Clone, Copy, Default)]
struct Record {
    left: Option<usize>,
    right: Option<usize>,
    parent: Option<usize>,
    was_left: bool,
}

pub struct BStarTree {
    pub blocks: Vec<Block>,
    dummy: usize,
    tail: usize,
    /// Extents of the packed floorplan, updated as blocks are placed.
    pub max_x: i32,
    pub max_y: i32,

    // Undo state for the most recent perturbation.
    mod_blks: [usize; 2],
    records: [Record; 2],
    swap_count: u32,
}

impl BStarTree {
    /// Build the initial solution: a breadth-first complete binary tree of
    /// the blocks in input order. The dummy root and the contour tail take
    /// the two reserved slots after the real blocks.
    pub fn new(mut blocks: Vec<Block>) -> Self {
        let n = blocks.len();
        let dummy = n;
        let tail = n + 1;
        blocks.push(Block::new("dummy_root", 0, 0));
        let mut tail_block = Block::new("tail", 0, 0);
        tail_block.xl = i32::MAX;
        blocks.push(tail_block);

        blocks[dummy].left = Some(0);
        blocks[0].parent = Some(dummy);
        let mut queue = std::collections::VecDeque::new();
        queue.push_back(0);
        let mut i = 1;
        while i < n {
            let cur = queue.pop_front().expect("complete tree fill");
            queue.push_back(i);
            blocks[cur].left = Some(i);
            blocks[i].parent = Some(cur);
            i += 1;
            if i < n {
                queue.push_back(i);
                blocks[cur].right = Some(i);
                blocks[i].parent = Some(cur);
                i += 1;
            }
        }

        BStarTree {
            blocks,
            dummy,
            tail,
            max_x: 0,
            max_y: 0,
            mod_blks: [0, 0],
            records: [Record::default(), Record::default()],
            swap_count: 0,
        }
    }

    pub fn num_blocks(&self) -> usize {
        self.blocks.len() - 2
    }

    pub fn dummy(&self) -> usize {
        self.dummy
    }

    pub fn tail(&self) -> usize {
        self.tail
    }

    /// The real blocks, without the two sentinel slots.
    pub fn real(&self) -> &[Block] {
        &self.blocks[..self.num_blocks()]
    }

    pub fn real_mut(&mut self) -> &mut [Block] {
        let n = self.num_blocks();
        &mut self.blocks[..n]
    }

    fn set_xl(&mut self, id: usize, x: i32) {
        self.blocks[id].xl = x;
        self.max_x = self.max_x.max(x + self.blocks[id].width());
    }

    fn set_yl(&mut self, id: usize, y: i32) {
        self.blocks[id].yl = y;
        self.max_y = self.max_y.max(y + self.blocks[id].height());
    }

    /// Splice `id` out of the contour and return its successor.
    fn unlink_forward(&mut self, id: usize) -> usize {
        let prev = self.blocks[id].prev.expect("contour link");
        let next = self.blocks[id].next.expect("contour link");
        self.blocks[prev].next = Some(next);
        self.blocks[next].prev = Some(prev);
        self.blocks[id].prev = None;
        self.blocks[id].next = None;
        next
    }

    /// Link `node` into the contour immediately before `at`.
    fn insert_before(&mut self, at: usize, node: usize) {
        let prev = self.blocks[at].prev.expect("contour link");
        self.blocks[node].prev = Some(prev);
        self.blocks[node].next = Some(at);
        self.blocks[prev].next = Some(node);
        self.blocks[at].prev = Some(node);
    }

    /// Compute coordinates for the current tree by packing every block
    /// against the contour in DFS preorder. The skyline stays threaded
    /// through the arena afterwards; the next call re-seeds it.
    pub fn pack(&mut self) {
        self.max_x = 0;
        self.max_y = 0;
        let root = self.blocks[self.dummy].left.expect("tree has a root");
        self.set_xl(root, 0);
        self.blocks[self.dummy].next = Some(self.tail);
        self.blocks[self.tail].prev = Some(self.dummy);

        let mut stack = vec![root];
        while let Some(par) = stack.pop() {
            if let Some(right) = self.blocks[par].right {
                let x = self.blocks[par].xl;
                self.set_xl(right, x);
                stack.push(right);
            }
            if let Some(left) = self.blocks[par].left {
                let x = self.blocks[par].xl + self.blocks[par].width();
                self.set_xl(left, x);
                stack.push(left);
            }

            // Pack `par` itself onto the skyline. A left child starts the
            // walk after its parent, a right child at the parent (which it
            // covers from above).
            let to_insert = par;
            let parent = self.blocks[to_insert].parent.expect("non-root block");
            let mut cur = if self.blocks[parent].left == Some(to_insert) {
                self.blocks[parent].next.expect("parent on contour")
            } else {
                parent
            };
            let right_edge = self.blocks[to_insert].xl + self.blocks[to_insert].width();
            let mut yl = 0;
            while right_edge >= self.blocks[cur].xl + self.blocks[cur].width() {
                yl = yl.max(self.blocks[cur].yl + self.blocks[cur].height());
                cur = self.unlink_forward(cur);
            }
            yl = yl.max(self.blocks[cur].yl + self.blocks[cur].height());
            self.set_yl(to_insert, yl);
            self.insert_before(cur, to_insert);
        }
    }

    /// Apply one of the three equiprobable moves. Returns which one, so the
    /// caller can hand it back to [`BStarTree::undo`] on rejection.
    pub fn perturb(&mut self, rng: &mut ChaCha8Rng) -> Perturb {
        let n = self.num_blocks();
        let kind = if n < 2 { 0 } else { rng.gen_range(0..3) };
        match kind {
            0 => {
                let id = rng.gen_range(0..n);
                self.blocks[id].rotate();
                self.mod_blks[0] = id;
                Perturb::Rotate
            }
            1 => {
                self.swap_count = 0;
                let id1 = rng.gen_range(0..n);
                let id2 = loop {
                    let id = rng.gen_range(0..n);
                    if id != id1 {
                        break id;
                    }
                };
                self.mod_blks = [id1, id2];
                self.move_block(id1, id2, rng);
                Perturb::Move
            }
            _ => {
                let id1 = rng.gen_range(0..n);
                let id2 = loop {
                    let id = rng.gen_range(0..n);
                    if id != id1 {
                        break id;
                    }
                };
                self.mod_blks = [id1, id2];
                self.swap_blocks(id1, id2);
                Perturb::Swap
            }
        }
    }

    /// Detach `to_move` and re-attach it as a random child of
    /// `place_parent`; a displaced subtree is re-hung under `to_move`.
    /// `mod_blks` must already name both blocks so the detach can record
    /// their links for the inverse move.
    fn move_block(&mut self, to_move: usize, place_parent: usize, rng: &mut ChaCha8Rng) {
        self.detach(to_move);

        if rng.gen::<bool>() {
            let ori_left = self.blocks[place_parent].left;
            self.blocks[place_parent].left = Some(to_move);
            self.blocks[to_move].parent = Some(place_parent);
            if let Some(ori) = ori_left {
                self.blocks[ori].parent = Some(to_move);
                if rng.gen::<bool>() {
                    self.blocks[to_move].left = Some(ori);
                } else {
                    self.blocks[to_move].right = Some(ori);
                }
            }
        } else {
            let ori_right = self.blocks[place_parent].right;
            self.blocks[place_parent].right = Some(to_move);
            self.blocks[to_move].parent = Some(place_parent);
            if let Some(ori) = ori_right {
                self.blocks[ori].parent = Some(to_move);
                if rng.gen::<bool>() {
                    self.blocks[to_move].left = Some(ori);
                } else {
                    self.blocks[to_move].right = Some(ori);
                }
            }
        }
    }

    /// Unlink `id` from the tree. A block with two children is first swapped
    /// downward with its left child until simple; the number of swaps is
    /// remembered so the inverse move is exact.
    fn detach(&mut self, id: usize) {
        match (self.blocks[id].left, self.blocks[id].right) {
            (None, None) => {
                self.record_move_blocks();
                if let Some(parent) = self.blocks[id].parent {
                    if self.blocks[parent].left == Some(id) {
                        self.blocks[parent].left = None;
                    } else {
                        self.blocks[parent].right = None;
                    }
                }
                self.blocks[id].parent = None;
            }
            (Some(_), Some(_)) => {
                loop {
                    let left = self.blocks[id].left.expect("two-child invariant");
                    self.swap_near(id, left);
                    self.swap_count += 1;
                    if self.blocks[id].left.is_none() || self.blocks[id].right.is_none() {
                        break;
                    }
                }
                self.detach(id);
            }
            (left, right) => {
                self.record_move_blocks();
                let parent = self.blocks[id].parent.expect("non-root block");
                let child = left.or(right).expect("one-child invariant");
                if self.blocks[parent].left == Some(id) {
                    self.blocks[parent].left = Some(child);
                } else {
                    self.blocks[parent].right = Some(child);
                }
                self.blocks[child].parent = Some(parent);
                self.blocks[id].parent = None;
                self.blocks[id].left = None;
                self.blocks[id].right = None;
            }
        }
    }

    /// Snapshot both touched blocks' links just before they change.
    fn record_move_blocks(&mut self) {
        for i in 0..2 {
            let block = self.mod_blks[i];
            let parent = self.blocks[block].parent.expect("recorded block has a parent");
            self.records[i] = Record {
                left: self.blocks[block].left,
                right: self.blocks[block].right,
                parent: Some(parent),
                was_left: self.blocks[parent].left == Some(block),
            };
        }
    }

    /// Exchange two blocks' positions in the tree. Parent-child pairs go
    /// through [`BStarTree::swap_near`]; siblings just swap their parent's
    /// child slots.
    pub fn swap_blocks(&mut self, block1: usize, block2: usize) {
        let parent1 = self.blocks[block1].parent;
        let parent2 = self.blocks[block2].parent;
        if parent2 == Some(block1) {
            self.swap_near(block1, block2);
        } else if parent1 == Some(block2) {
            self.swap_near(block2, block1);
        } else {
            let parent1 = parent1.expect("non-root block");
            let parent2 = parent2.expect("non-root block");
            if parent1 == parent2 {
                let p = &mut self.blocks[parent1];
                std::mem::swap(&mut p.left, &mut p.right);
            } else {
                if self.blocks[parent1].left == Some(block1) {
                    self.blocks[parent1].left = Some(block2);
                } else {
                    self.blocks[parent1].right = Some(block2);
                }
                if self.blocks[parent2].left == Some(block2) {
                    self.blocks[parent2].left = Some(block1);
                } else {
                    self.blocks[parent2].right = Some(block1);
                }
                self.blocks[block1].parent = Some(parent2);
                self.blocks[block2].parent = Some(parent1);
            }
            if let Some(l) = self.blocks[block1].left {
                self.blocks[l].parent = Some(block2);
            }
            if let Some(r) = self.blocks[block1].right {
                self.blocks[r].parent = Some(block2);
            }
            if let Some(l) = self.blocks[block2].left {
                self.blocks[l].parent = Some(block1);
            }
            if let Some(r) = self.blocks[block2].right {
                self.blocks[r].parent = Some(block1);
            }
            let (l1, r1) = (self.blocks[block1].left, self.blocks[block1].right);
            let (l2, r2) = (self.blocks[block2].left, self.blocks[block2].right);
            self.blocks[block1].left = l2;
            self.blocks[block1].right = r2;
            self.blocks[block2].left = l1;
            self.blocks[block2].right = r1;
        }
    }

    /// Swap a parent with one of its direct children, re-linking the
    /// grandparent, the sibling subtree, and the child's own children.
    fn swap_near(&mut self, parent: usize, child: usize) {
        let grand = self.blocks[parent].parent.expect("non-root block");
        let child_is_left = self.blocks[parent].left == Some(child);

        if self.blocks[grand].left == Some(parent) {
            self.blocks[grand].left = Some(child);
        } else {
            self.blocks[grand].right = Some(child);
        }
        self.blocks[child].parent = Some(grand);
        self.blocks[parent].parent = Some(child);

        if child_is_left {
            if let Some(r) = self.blocks[child].right {
                self.blocks[r].parent = Some(parent);
            }
            if let Some(r) = self.blocks[parent].right {
                self.blocks[r].parent = Some(child);
            }
            let pr = self.blocks[parent].right;
            self.blocks[parent].right = self.blocks[child].right;
            self.blocks[child].right = pr;

            if let Some(l) = self.blocks[child].left {
                self.blocks[l].parent = Some(parent);
            }
            self.blocks[parent].left = self.blocks[child].left;
            self.blocks[child].left = Some(parent);
        } else {
            if let Some(l) = self.blocks[child].left {
                self.blocks[l].parent = Some(parent);
            }
            if let Some(l) = self.blocks[parent].left {
                self.blocks[l].parent = Some(child);
            }
            let pl = self.blocks[parent].left;
            self.blocks[parent].left = self.blocks[child].left;
            self.blocks[child].left = pl;

            if let Some(r) = self.blocks[child].right {
                self.blocks[r].parent = Some(parent);
            }
            self.blocks[parent].right = self.blocks[child].right;
            self.blocks[child].right = Some(parent);
        }
    }

    /// Invert the most recent perturbation.
    pub fn undo(&mut self, kind: Perturb) {
        match kind {
            Perturb::Rotate => self.blocks[self.mod_blks[0]].rotate(),
            Perturb::Move => {
                for i in 0..2 {
                    let block = self.mod_blks[i];
                    let rec = self.records[i];
                    self.blocks[block].left = rec.left;
                    self.blocks[block].right = rec.right;
                    self.blocks[block].parent = rec.parent;
                    if let Some(l) = rec.left {
                        self.blocks[l].parent = Some(block);
                    }
                    if let Some(r) = rec.right {
                        self.blocks[r].parent = Some(block);
                    }
                    let parent = rec.parent.expect("recorded block has a parent");
                    if rec.was_left {
                        self.blocks[parent].left = Some(block);
                    } else {
                        self.blocks[parent].right = Some(block);
                    }
                    self.records[i] = Record::default();
                }
                // Undo the swap-downs of the detach by swapping back up.
                let to_move = self.mod_blks[0];
                while self.swap_count > 0 {
                    let parent = self.blocks[to_move].parent.expect("non-root block");
                    self.swap_near(parent, to_move);
                    self.swap_count -= 1;
                }
            }
            Perturb::Swap => self.swap_blocks(self.mod_blks[0], self.mod_blks[1]),
        }
    }

    /// Walk the contour from the dummy root to the tail, returning block ids.
    /// Only meaningful right after [`BStarTree::pack`].
    pub fn contour(&self) -> Vec<usize> {
        let mut ids = Vec::new();
        let mut cur = self.blocks[self.dummy].next;
        while let Some(id) = cur {
            if id == self.tail {
                break;
            }
            ids.push(id);
            cur = self.blocks[id].next;
        }
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn tree(dims: &[(i32, i32)]) -> BStarTree {
        let blocks = dims
            .iter()
            .enumerate()
            .map(|(i, &(w, h))| Block::new(&format!("b{i}"), w, h))
            .collect();
        BStarTree::new(blocks)
    }

    fn links(t: &BStarTree) -> Vec<(Option<usize>, Option<usize>, Option<usize>)> {
        t.blocks
            .iter()
            .map(|b| (b.parent, b.left, b.right))
            .collect()
    }

    /// Every non-root block has exactly one parent whose child slot points
    /// back at it, and the dummy's left child is the unique root.
    fn check_consistency(t: &BStarTree) {
        let n = t.num_blocks();
        let root = t.blocks[t.dummy()].left.unwrap();
        assert_eq!(t.blocks[root].parent, Some(t.dummy()));
        let mut seen = vec![false; n];
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            assert!(!seen[id], "block {id} reached twice");
            seen[id] = true;
            for child in [t.blocks[id].left, t.blocks[id].right].into_iter().flatten() {
                assert_eq!(t.blocks[child].parent, Some(id));
                stack.push(child);
            }
        }
        assert!(seen.iter().all(|&s| s), "tree dropped a block");
    }

    #[test]
    fn complete_tree_init() {
        let t = tree(&[(1, 1); 7]);
        assert_eq!(t.blocks[t.dummy()].left, Some(0));
        assert_eq!(t.blocks[0].left, Some(1));
        assert_eq!(t.blocks[0].right, Some(2));
        assert_eq!(t.blocks[1].left, Some(3));
        assert_eq!(t.blocks[1].right, Some(4));
        assert_eq!(t.blocks[2].left, Some(5));
        assert_eq!(t.blocks[2].right, Some(6));
        check_consistency(&t);
    }

    #[test]
    fn pack_left_chain_packs_in_a_row() {
        // 0 -> left 1 -> left 2: three blocks side by side.
        let mut t = tree(&[(2, 3), (4, 1), (1, 2)]);
        t.blocks[0].left = Some(1);
        t.blocks[0].right = None;
        t.blocks[1].parent = Some(0);
        t.blocks[1].left = Some(2);
        t.blocks[1].right = None;
        t.blocks[2].parent = Some(1);
        t.blocks[2].left = None;
        t.blocks[2].right = None;
        t.pack();
        assert_eq!((t.blocks[0].xl, t.blocks[0].yl), (0, 0));
        assert_eq!((t.blocks[1].xl, t.blocks[1].yl), (2, 0));
        assert_eq!((t.blocks[2].xl, t.blocks[2].yl), (6, 0));
        assert_eq!((t.max_x, t.max_y), (7, 3));
        assert_eq!(t.contour(), vec![0, 1, 2]);
    }

    #[test]
    fn pack_right_child_stacks_above() {
        let mut t = tree(&[(3, 2), (2, 1)]);
        // Complete-tree init makes 1 the left child; rewire as right child.
        t.blocks[0].left = None;
        t.blocks[0].right = Some(1);
        t.pack();
        assert_eq!((t.blocks[1].xl, t.blocks[1].yl), (0, 2));
        assert_eq!((t.max_x, t.max_y), (3, 3));
    }

    #[test]
    fn packing_stays_legal_under_random_perturbations() {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let mut t = tree(&[(2, 3), (4, 1), (1, 2), (3, 3), (2, 2), (5, 1), (1, 4), (2, 5)]);
        for _ in 0..200 {
            t.perturb(&mut rng);
            t.pack();
            check_consistency(&t);

            // The contour is a well-formed list visiting each block at most once.
            let contour = t.contour();
            let mut seen = std::collections::HashSet::new();
            for &id in &contour {
                assert!(id < t.num_blocks());
                assert!(seen.insert(id), "block {id} on the contour twice");
                let next = t.blocks[id].next.unwrap();
                assert_eq!(t.blocks[next].prev, Some(id));
            }

            // Extents cover every block, and no two blocks overlap.
            let n = t.num_blocks();
            for i in 0..n {
                let a = &t.blocks[i];
                assert!(a.xl >= 0 && a.yl >= 0);
                assert!(a.xl + a.width() <= t.max_x && a.yl + a.height() <= t.max_y);
                for b in &t.blocks[i + 1..n] {
                    let disjoint = a.xl + a.width() <= b.xl
                        || b.xl + b.width() <= a.xl
                        || a.yl + a.height() <= b.yl
                        || b.yl + b.height() <= a.yl;
                    assert!(disjoint, "blocks {} and {} overlap", a.name, b.name);
                }
            }
        }
    }

    #[test]
    fn contour_sorted_for_left_chain() {
        // A pure left chain keeps every block on the skyline, in x order.
        let mut t = tree(&[(2, 2), (3, 1), (1, 3), (2, 4)]);
        for i in 0..3 {
            t.blocks[i].left = Some(i + 1);
            t.blocks[i].right = None;
            t.blocks[i + 1].parent = Some(i);
            t.blocks[i + 1].left = None;
            t.blocks[i + 1].right = None;
        }
        t.pack();
        let contour = t.contour();
        assert_eq!(contour.len(), 4);
        for pair in contour.windows(2) {
            assert!(t.blocks[pair[0]].xl < t.blocks[pair[1]].xl);
        }
    }

    #[test]
    fn rotate_round_trip() {
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let mut t = tree(&[(2, 3), (4, 1), (1, 2), (3, 3)]);
        t.pack();
        let before: Vec<_> = t.real().iter().map(|b| (b.xl, b.yl, b.width(), b.height())).collect();
        t.blocks[1].rotate();
        t.blocks[1].rotate();
        t.pack();
        let after: Vec<_> = t.real().iter().map(|b| (b.xl, b.yl, b.width(), b.height())).collect();
        assert_eq!(before, after);
        // And via the perturbation path.
        for _ in 0..50 {
            let kind = t.perturb(&mut rng);
            t.undo(kind);
        }
        t.pack();
        let after: Vec<_> = t.real().iter().map(|b| (b.xl, b.yl, b.width(), b.height())).collect();
        assert_eq!(before, after);
    }

    #[test]
    fn perturb_undo_restores_links() {
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        let mut t = tree(&[(2, 3), (4, 1), (1, 2), (3, 3), (2, 2), (5, 1), (1, 4)]);
        for _ in 0..500 {
            let before = links(&t);
            let kind = t.perturb(&mut rng);
            check_consistency(&t);
            t.undo(kind);
            assert_eq!(links(&t), before, "undo({kind:?}) did not restore the tree");
        }
    }

    #[test]
    fn swap_twice_restores_links() {
        let mut t = tree(&[(1, 1); 6]);
        let before = links(&t);
        // Distant pair, sibling pair, and parent-child pair.
        for (a, b) in [(3, 5), (1, 2), (0, 1)] {
            t.swap_blocks(a, b);
            check_consistency(&t);
            t.swap_blocks(a, b);
            assert_eq!(links(&t), before);
        }
    }
}
