//! Blocks, fixed terminals, and nets of a floorplan instance, plus the
//! block-file / net-file parsers.

use anyhow::{bail, Context, Result};

use crate::prelude::*;

/// A movable rectangular block. Carries its B*-tree links (`parent`, `left`,
/// `right`), its contour links (`prev`, `next`), and two coordinate
/// snapshots: `last_*` for rejecting one annealing step, `best_*` for the
/// best feasible solution seen so far.
pub struct Block {
    pub name: String,
    w: i32,
    h: i32,
    pub xl: i32,
    pub yl: i32,
    pub rotated: bool,

    last_xl: i32,
    last_yl: i32,
    pub best_xl: i32,
    pub best_yl: i32,
    pub best_rotated: bool,

    pub parent: Option<usize>,
    pub left: Option<usize>,
    pub right: Option<usize>,
    pub prev: Option<usize>,
    pub next: Option<usize>,
}

impl Block {
    pub fn new(name: &str, w: i32, h: i32) -> Self {
        Block {
            name: name.to_string(),
            w,
            h,
            xl: 0,
            yl: 0,
            rotated: false,
            last_xl: 0,
            last_yl: 0,
            best_xl: 0,
            best_yl: 0,
            best_rotated: false,
            parent: None,
            left: None,
            right: None,
            prev: None,
            next: None,
        }
    }

    pub fn width(&self) -> i32 {
        if self.rotated {
            self.h
        } else {
            self.w
        }
    }

    pub fn height(&self) -> i32 {
        if self.rotated {
            self.w
        } else {
            self.h
        }
    }

    pub fn best_width(&self) -> i32 {
        if self.best_rotated {
            self.h
        } else {
            self.w
        }
    }

    pub fn best_height(&self) -> i32 {
        if self.best_rotated {
            self.w
        } else {
            self.h
        }
    }

    /// Centre of the block, from the current or the best snapshot.
    pub fn center(&self, best: bool) -> (f64, f64) {
        if best {
            (
                self.best_xl as f64 + self.best_width() as f64 / 2.0,
                self.best_yl as f64 + self.best_height() as f64 / 2.0,
            )
        } else {
            (
                self.xl as f64 + self.width() as f64 / 2.0,
                self.yl as f64 + self.height() as f64 / 2.0,
            )
        }
    }

    pub fn rotate(&mut self) {
        self.rotated = !self.rotated;
    }

    pub fn set_last(&mut self) {
        self.last_xl = self.xl;
        self.last_yl = self.yl;
    }

    pub fn back_to_last(&mut self) {
        self.xl = self.last_xl;
        self.yl = self.last_yl;
    }

    pub fn set_best(&mut self) {
        self.best_xl = self.xl;
        self.best_yl = self.yl;
        self.best_rotated = self.rotated;
    }
}

/// A pre-placed pin with a fixed centre.
pub struct Terminal {
    pub name: String,
    pub xc: f64,
    pub yc: f64,
}

/// What a net pin refers to: a movable block or a fixed terminal.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum TermRef {
    Block(usize),
    Term(usize),
}

pub struct Net {
    pub terms: Vec<TermRef>,
}

impl Net {
    /// Half-perimeter of the bounding box over pin centres.
    pub fn hpwl(&self, blocks: &[Block], terminals: &[Terminal], best: bool) -> f64 {
        let mut it = self.terms.iter().map(|&t| match t {
            TermRef::Block(id) => blocks[id].center(best),
            TermRef::Term(id) => (terminals[id].xc, terminals[id].yc),
        });
        let Some((first_x, first_y)) = it.next() else {
            return 0.0;
        };
        let (mut min_x, mut min_y) = (first_x, first_y);
        let (mut max_x, mut max_y) = (first_x, first_y);
        for (x, y) in it {
            min_x = min_x.min(x);
            max_x = max_x.max(x);
            min_y = min_y.min(y);
            max_y = max_y.max(y);
        }
        (max_x - min_x) + (max_y - min_y)
    }
}

pub struct FloorplanInput {
    pub outline_w: i32,
    pub outline_h: i32,
    pub blocks: Vec<Block>,
    pub terminals: Vec<Terminal>,
    pub nets: Vec<Net>,
}

/// Parse the block file (`Outline:`, `NumBlocks:`, `NumTerminals:`, block and
/// terminal records) and the net file (`NumNets:`, `NetDegree:` records).
pub fn parse_input(blk_input: &str, net_input: &str) -> Result<FloorplanInput> {
    let mut tokens = blk_input.split_whitespace();
    let mut next = |what: &str| tokens.next().with_context(|| format!("missing {what}"));

    next("Outline keyword")?;
    let outline_w: i32 = next("outline width")?.parse().context("invalid outline width")?;
    let outline_h: i32 = next("outline height")?.parse().context("invalid outline height")?;
    next("NumBlocks keyword")?;
    let num_blocks: usize = next("block count")?.parse().context("invalid block count")?;
    next("NumTerminals keyword")?;
    let num_terminals: usize = next("terminal count")?
        .parse()
        .context("invalid terminal count")?;
    if num_blocks == 0 {
        bail!("no blocks in input");
    }

    let mut blocks = Vec::with_capacity(num_blocks);
    let mut terminals = Vec::with_capacity(num_terminals);
    let mut name_to_ref: HashMap<String, TermRef> = HashMap::default();
    for id in 0..num_blocks {
        let name = next("block name")?;
        let w: i32 = next("block width")?.parse().context("invalid block width")?;
        let h: i32 = next("block height")?.parse().context("invalid block height")?;
        name_to_ref.insert(name.to_string(), TermRef::Block(id));
        blocks.push(Block::new(name, w, h));
    }
    for id in 0..num_terminals {
        let name = next("terminal name")?;
        next("terminal keyword")?;
        let x: i32 = next("terminal x")?.parse().context("invalid terminal x")?;
        let y: i32 = next("terminal y")?.parse().context("invalid terminal y")?;
        name_to_ref.insert(name.to_string(), TermRef::Term(id));
        terminals.push(Terminal {
            name: name.to_string(),
            xc: x as f64,
            yc: y as f64,
        });
    }

    let mut tokens = net_input.split_whitespace();
    let mut next = |what: &str| tokens.next().with_context(|| format!("missing {what}"));
    next("NumNets keyword")?;
    let num_nets: usize = next("net count")?.parse().context("invalid net count")?;
    let mut nets = Vec::with_capacity(num_nets);
    for _ in 0..num_nets {
        next("NetDegree keyword")?;
        let degree: usize = next("net degree")?.parse().context("invalid net degree")?;
        let mut terms = Vec::with_capacity(degree);
        for _ in 0..degree {
            let name = next("net pin name")?;
            let term = name_to_ref
                .get(name)
                .with_context(|| format!("unknown pin name {name}"))?;
            terms.push(*term);
        }
        nets.push(Net { terms });
    }

    Ok(FloorplanInput {
        outline_w,
        outline_h,
        blocks,
        terminals,
        nets,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    pub const BLK: &str = "Outline: 5 3\nNumBlocks: 2\nNumTerminals: 1\n\
                           b1 3 2\nb2 2 3\nt1 terminal 0 0\n";
    pub const NET: &str = "NumNets: 2\nNetDegree: 2\nb1 b2\nNetDegree: 2\nb1 t1\n";

    #[test]
    fn parse_block_and_net_files() {
        let input = parse_input(BLK, NET).unwrap();
        assert_eq!((input.outline_w, input.outline_h), (5, 3));
        assert_eq!(input.blocks.len(), 2);
        assert_eq!(input.terminals.len(), 1);
        assert_eq!(input.nets.len(), 2);
        assert_eq!(input.nets[0].terms, vec![TermRef::Block(0), TermRef::Block(1)]);
        assert_eq!(input.nets[1].terms, vec![TermRef::Block(0), TermRef::Term(0)]);
    }

    #[test]
    fn rejects_unknown_pin() {
        assert!(parse_input(BLK, "NumNets: 1\nNetDegree: 1\nnope\n").is_err());
    }

    #[test]
    fn rejects_empty_design() {
        let blk = "Outline: 5 3\nNumBlocks: 0\nNumTerminals: 0\n";
        assert!(parse_input(blk, "NumNets: 0\n").is_err());
    }

    #[test]
    fn hpwl_over_centers() {
        let input = parse_input(BLK, NET).unwrap();
        // Both blocks unpacked at the origin: centres (1.5, 1) and (1, 1.5).
        let hpwl = input.nets[0].hpwl(&input.blocks, &input.terminals, false);
        assert_eq!(hpwl, 1.0);
        // Block centre (1.5, 1) to the terminal at the origin.
        let hpwl = input.nets[1].hpwl(&input.blocks, &input.terminals, false);
        assert_eq!(hpwl, 2.5);
    }

    #[test]
    fn rotation_swaps_dims() {
        let mut b = Block::new("b", 3, 2);
        assert_eq!((b.width(), b.height()), (3, 2));
        b.rotate();
        assert_eq!((b.width(), b.height()), (2, 3));
        b.rotate();
        assert_eq!((b.width(), b.height()), (3, 2));
    }
}
