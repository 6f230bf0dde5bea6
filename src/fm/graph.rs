//! The hypergraph the partitioner runs on: cell and net arrays indexed by id,
//! plus the whitespace-tokenised input parser.

use anyhow::{bail, Context, Result};

use crate::prelude::*;

/// Partition side. `0` is A, `1` is B.
pub type Side = usize;

pub struct Cell {
    pub name: String,
    /// Side the cell currently sits on.
    pub part: Side,
    pub lock: bool,
    pub gain: i32,
    /// Gain snapshot at pass start; `gain - init_gain` is the CLIP gain.
    init_gain: i32,
    /// Nets the cell is a member of, in input order.
    pub nets: Vec<usize>,
}

impl Cell {
    fn new(name: &str) -> Self {
        Cell {
            name: name.to_string(),
            part: 0,
            lock: false,
            gain: 0,
            init_gain: 0,
            nets: Vec::new(),
        }
    }

    pub fn clip_gain(&self) -> i32 {
        self.gain - self.init_gain
    }

    /// Re-zero the CLIP gain at the start of a pass.
    pub fn snapshot_gain(&mut self) {
        self.init_gain = self.gain;
    }

    pub fn pin_num(&self) -> usize {
        self.nets.len()
    }
}

pub struct Net {
    pub name: String,
    pub cells: Vec<usize>,
    /// Number of member cells on each side. Sums to `cells.len()`.
    pub count: [i32; 2],
}

impl Net {
    fn new(name: &str) -> Self {
        Net {
            name: name.to_string(),
            cells: Vec::new(),
            count: [0, 0],
        }
    }

    /// A net is cut iff it has cells on both sides.
    pub fn is_cut(&self) -> bool {
        self.count[0] > 0 && self.count[1] > 0
    }

    /// Account for one member cell moving to side `to`.
    pub fn move_cell(&mut self, to: Side) {
        self.count[to] += 1;
        self.count[1 - to] -= 1;
    }
}

pub struct HyperGraph {
    pub balance: f64,
    pub cells: Vec<Cell>,
    /// Active (multi-pin) nets only.
    pub nets: Vec<Net>,
    /// Total net records seen, single-pin nets included.
    pub all_net_num: usize,
}

impl HyperGraph {
    /// Parse the `<balance_factor>` + `NET <name> <cell>+ ;` format.
    ///
    /// Single-pin nets are dropped on the spot (their one membership is
    /// retracted), but still count toward `all_net_num`. A cell name repeated
    /// immediately after itself within one record is ignored.
    pub fn parse(input: &str) -> Result<HyperGraph> {
        let mut tokens = input.split_whitespace();
        let balance: f64 = tokens
            .next()
            .context("missing balance factor")?
            .parse()
            .context("invalid balance factor")?;

        let mut cells: Vec<Cell> = Vec::new();
        let mut nets: Vec<Net> = Vec::new();
        let mut all_net_num = 0;
        let mut name_to_id: HashMap<String, usize> = HashMap::default();

        while let Some(token) = tokens.next() {
            if token != "NET" {
                continue;
            }
            let net_name = tokens.next().context("truncated NET record")?;
            let net_id = nets.len();
            let mut net = Net::new(net_name);
            let mut last_name = String::new();
            loop {
                let cell_name = tokens
                    .next()
                    .with_context(|| format!("net {net_name} not terminated by ';'"))?;
                if cell_name == ";" {
                    break;
                }
                let cell_id = match name_to_id.get(cell_name) {
                    None => {
                        let id = cells.len();
                        cells.push(Cell::new(cell_name));
                        name_to_id.insert(cell_name.to_string(), id);
                        id
                    }
                    Some(&id) => {
                        if last_name == cell_name {
                            continue;
                        }
                        id
                    }
                };
                cells[cell_id].nets.push(net_id);
                net.cells.push(cell_id);
                last_name.clear();
                last_name.push_str(cell_name);
            }
            if net.cells.len() == 1 {
                cells[net.cells[0]].nets.pop();
            } else {
                nets.push(net);
            }
            all_net_num += 1;
        }

        if cells.is_empty() {
            bail!("no cells in input");
        }

        Ok(HyperGraph {
            balance,
            cells,
            nets,
            all_net_num,
        })
    }

    pub fn num_cells(&self) -> usize {
        self.cells.len()
    }

    /// Active nets, i.e. excluding dropped single-pin nets.
    pub fn num_nets(&self) -> usize {
        self.nets.len()
    }

    pub fn max_pin_num(&self) -> usize {
        self.cells.iter().map(|c| c.pin_num()).max().unwrap_or(0)
    }

    /// Number of currently cut nets, recomputed from scratch.
    pub fn count_cut(&self) -> i32 {
        self.nets.iter().filter(|n| n.is_cut()).count() as i32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CHAIN: &str = "0.5\nNET N1 a b ;\nNET N2 b c ;\nNET N3 c d ;\n";

    #[test]
    fn parse_chain() {
        let g = HyperGraph::parse(CHAIN).unwrap();
        assert_eq!(g.balance, 0.5);
        assert_eq!(g.num_cells(), 4);
        assert_eq!(g.num_nets(), 3);
        assert_eq!(g.all_net_num, 3);
        assert_eq!(g.cells[1].nets, vec![0, 1]);
        assert_eq!(g.nets[1].cells, vec![1, 2]);
    }

    #[test]
    fn single_pin_net_dropped() {
        let g = HyperGraph::parse("0.3\nNET N1 a b ;\nNET N2 a ;\n").unwrap();
        assert_eq!(g.num_nets(), 1);
        assert_eq!(g.all_net_num, 2);
        // The membership of the dropped net is retracted.
        assert_eq!(g.cells[0].nets, vec![0]);
    }

    #[test]
    fn consecutive_duplicate_ignored() {
        let g = HyperGraph::parse("0.5\nNET N1 a b b c ;\n").unwrap();
        assert_eq!(g.nets[0].cells, vec![0, 1, 2]);
        assert_eq!(g.cells[1].nets, vec![0]);
    }

    #[test]
    fn truncated_input_rejected() {
        assert!(HyperGraph::parse("").is_err());
        assert!(HyperGraph::parse("0.5\nNET N1 a b").is_err());
        assert!(HyperGraph::parse("0.5\n").is_err());
    }
}
