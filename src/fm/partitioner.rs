//! Two-way Fiduccia-Mattheyses partitioning with the CLIP gain reset.

use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::io::Write;

use anyhow::{bail, Result};
use itertools::Itertools;
use serde::Serialize;
use tracing::debug;

use super::bucket::BucketList;
use super::graph::{HyperGraph, Side};

/// Fraction of the balance slack used when seeding the initial split, so the
/// first pass starts with room to move in both directions.
const INIT_FACTOR: f64 = 0.9;

pub struct Partitioner {
    graph: HyperGraph,
    cut_size: i32,
    part_size: [i32; 2],
    blist: BucketList,

    // Pass state.
    acc_gain: i32,
    max_acc_gain: i32,
    move_num: usize,
    best_move_num: usize,
    move_stack: Vec<usize>,
}

#[derive(Serialize)]
pub struct PartitionSummary {
    pub cut_size: i32,
    pub num_cells: usize,
    pub num_nets: usize,
    pub part_size_a: i32,
    pub part_size_b: i32,
}

impl Partitioner {
    pub fn new(mut graph: HyperGraph) -> Result<Self> {
        if !(0.0 < graph.balance && graph.balance < 1.0) {
            bail!("balance factor {} outside (0, 1)", graph.balance);
        }
        let num_cells = graph.num_cells();
        let max_pin = graph.max_pin_num();

        // Initial split: the first cells (input order) go to side B, the rest
        // to side A, slightly inside the balance bound.
        let limit =
            ((1.0 - INIT_FACTOR * graph.balance) * num_cells as f64 / 2.0).ceil() as usize;
        let mut part_size = [0i32; 2];
        for cell_id in 0..num_cells {
            let part: Side = usize::from(cell_id < limit);
            graph.cells[cell_id].part = part;
            part_size[part] += 1;
            for net_idx in 0..graph.cells[cell_id].nets.len() {
                let net_id = graph.cells[cell_id].nets[net_idx];
                graph.nets[net_id].count[part] += 1;
            }
        }
        let cut_size = graph.count_cut();

        Ok(Partitioner {
            blist: BucketList::new(num_cells, max_pin),
            graph,
            cut_size,
            part_size,
            acc_gain: 0,
            max_acc_gain: 0,
            move_num: 0,
            best_move_num: 0,
            move_stack: Vec::with_capacity(num_cells),
        })
    }

    pub fn cut_size(&self) -> i32 {
        self.cut_size
    }

    pub fn part_size(&self, side: Side) -> i32 {
        self.part_size[side]
    }

    pub fn graph(&self) -> &HyperGraph {
        &self.graph
    }

    /// Run FM passes until one yields no positive prefix gain.
    pub fn partition(&mut self) {
        let num_cells = self.graph.num_cells() as f64;
        let lower_bound = ((1.0 - self.graph.balance) * num_cells / 2.0).ceil() as i32;
        let mut pass = 0;
        loop {
            self.init_pass();
            let mut last_from: Side = 0;
            loop {
                // Candidate per side: the max-CLIP cell, if that side may
                // legally shrink.
                let cand0 = (self.part_size[0] > lower_bound)
                    .then(|| self.blist.candidate(0))
                    .flatten();
                let cand1 = (self.part_size[1] > lower_bound)
                    .then(|| self.blist.candidate(1))
                    .flatten();
                let move_cell_id = match (cand0, cand1) {
                    (None, None) => break,
                    (None, Some(c)) => c,
                    (Some(c), None) => c,
                    (Some(c0), Some(c1)) => {
                        let g0 = self.graph.cells[c0].clip_gain();
                        let g1 = self.graph.cells[c1].clip_gain();
                        if g0 > g1 {
                            c0
                        } else if g1 > g0 {
                            c1
                        } else if last_from == 0 {
                            // Tie: keep pulling from the previous move's side.
                            c0
                        } else {
                            c1
                        }
                    }
                };

                let from = self.graph.cells[move_cell_id].part;
                self.move_cell(move_cell_id);
                self.update_gain(move_cell_id, from, 1 - from);
                last_from = from;
            }

            pass += 1;
            debug!(
                pass,
                max_acc_gain = self.max_acc_gain,
                moves = self.move_num,
                best_prefix = self.best_move_num,
                "fm pass"
            );
            if self.max_acc_gain <= 0 {
                // A pass with no improving prefix ends the search; undo it
                // entirely so the reported cut matches the partition.
                self.rollback(0);
                break;
            }
            self.cut_size -= self.max_acc_gain;
            self.rollback(self.best_move_num);
        }
    }

    /// Undo the moves after the first `keep` entries of the move stack.
    fn rollback(&mut self, keep: usize) {
        for idx in keep..self.move_stack.len() {
            let cell_id = self.move_stack[idx];
            let cell = &mut self.graph.cells[cell_id];
            cell.part = 1 - cell.part;
            let part = cell.part;
            self.part_size[part] += 1;
            self.part_size[1 - part] -= 1;
            for net_idx in 0..self.graph.cells[cell_id].nets.len() {
                let net_id = self.graph.cells[cell_id].nets[net_idx];
                self.graph.nets[net_id].move_cell(part);
            }
        }
    }

    /// Reset the pass state: unlock everything, recompute gains, snapshot
    /// them for CLIP, and seed every chain at bucket 0. Draining a min-heap
    /// keyed on `(gain, id)` leaves the largest-gain cell at each chain head.
    fn init_pass(&mut self) {
        self.acc_gain = 0;
        self.max_acc_gain = i32::MIN;
        self.move_num = 0;
        self.best_move_num = 0;
        self.move_stack.clear();
        self.blist.clear();

        let mut min_heap = BinaryHeap::with_capacity(self.graph.num_cells());
        for cell_id in 0..self.graph.num_cells() {
            let part = self.graph.cells[cell_id].part;
            let mut gain = 0;
            for &net_id in &self.graph.cells[cell_id].nets {
                let net = &self.graph.nets[net_id];
                if net.count[part] == 1 {
                    gain += 1;
                } else if net.count[1 - part] == 0 {
                    gain -= 1;
                }
            }
            let cell = &mut self.graph.cells[cell_id];
            cell.lock = false;
            cell.gain = gain;
            cell.snapshot_gain();
            min_heap.push(Reverse((gain, cell_id)));
        }
        while let Some(Reverse((_, cell_id))) = min_heap.pop() {
            let part = self.graph.cells[cell_id].part;
            self.blist.insert(cell_id, part, 0);
        }
    }

    /// Commit the move of `cell_id`: unlink, flip, lock, and track the best
    /// accumulated-gain prefix.
    fn move_cell(&mut self, cell_id: usize) {
        let cell = &self.graph.cells[cell_id];
        let part = cell.part;
        let clip_gain = cell.clip_gain();
        let gain = cell.gain;
        self.part_size[part] -= 1;
        self.part_size[1 - part] += 1;
        self.blist.remove(cell_id, part, clip_gain);

        let cell = &mut self.graph.cells[cell_id];
        cell.part = 1 - part;
        cell.lock = true;

        self.acc_gain += gain;
        self.move_num += 1;
        self.move_stack.push(cell_id);
        if self.acc_gain > self.max_acc_gain {
            self.max_acc_gain = self.acc_gain;
            self.best_move_num = self.move_num;
        }
    }

    /// Relocate `cell_id` to the chain for its post-update CLIP gain, then
    /// apply the gain change.
    fn shift_gain(&mut self, cell_id: usize, delta: i32) {
        let cell = &self.graph.cells[cell_id];
        let (part, clip_gain) = (cell.part, cell.clip_gain());
        self.blist.remove(cell_id, part, clip_gain);
        self.blist.insert(cell_id, part, clip_gain + delta);
        self.graph.cells[cell_id].gain += delta;
    }

    /// Classical FM delta-gain updates on the unlocked neighbours of a moved
    /// cell, split into the phases before and after the net's side counts
    /// change.
    fn update_gain(&mut self, move_cell_id: usize, from: Side, to: Side) {
        for net_idx in 0..self.graph.cells[move_cell_id].nets.len() {
            let net_id = self.graph.cells[move_cell_id].nets[net_idx];

            let to_count = self.graph.nets[net_id].count[to];
            if to_count == 0 {
                for cell_idx in 0..self.graph.nets[net_id].cells.len() {
                    let cell_id = self.graph.nets[net_id].cells[cell_idx];
                    if !self.graph.cells[cell_id].lock {
                        self.shift_gain(cell_id, 1);
                    }
                }
            } else if to_count == 1 {
                for cell_idx in 0..self.graph.nets[net_id].cells.len() {
                    let cell_id = self.graph.nets[net_id].cells[cell_idx];
                    let cell = &self.graph.cells[cell_id];
                    if !cell.lock && cell.part == to {
                        self.shift_gain(cell_id, -1);
                    }
                }
            }

            self.graph.nets[net_id].move_cell(to);

            let from_count = self.graph.nets[net_id].count[from];
            if from_count == 0 {
                for cell_idx in 0..self.graph.nets[net_id].cells.len() {
                    let cell_id = self.graph.nets[net_id].cells[cell_idx];
                    if !self.graph.cells[cell_id].lock {
                        self.shift_gain(cell_id, -1);
                    }
                }
            } else if from_count == 1 {
                for cell_idx in 0..self.graph.nets[net_id].cells.len() {
                    let cell_id = self.graph.nets[net_id].cells[cell_idx];
                    let cell = &self.graph.cells[cell_id];
                    if !cell.lock && cell.part == from {
                        self.shift_gain(cell_id, 1);
                    }
                }
            }
        }
    }

    pub fn summary(&self) -> PartitionSummary {
        PartitionSummary {
            cut_size: self.cut_size,
            num_cells: self.graph.num_cells(),
            num_nets: self.graph.all_net_num,
            part_size_a: self.part_size[0],
            part_size_b: self.part_size[1],
        }
    }

    pub fn print_summary(&self) {
        println!();
        println!("==================== Summary ====================");
        println!(" Cutsize: {}", self.cut_size);
        println!(" Total cell number: {}", self.graph.num_cells());
        println!(" Total net number:  {}", self.graph.all_net_num);
        println!(" Cell Number of partition A: {}", self.part_size[0]);
        println!(" Cell Number of partition B: {}", self.part_size[1]);
        println!("=================================================");
        println!();
    }

    /// Dump the active nets with their member cells. Single-pin nets were
    /// dropped at parse time and do not show up here.
    pub fn report_net(&self) {
        println!("Number of nets: {}", self.graph.num_nets());
        for net in &self.graph.nets {
            let cells = net
                .cells
                .iter()
                .map(|&c| format!("{:>8}", self.graph.cells[c].name))
                .join(" ");
            println!("{:>8}: {cells}", net.name);
        }
    }

    pub fn report_cell(&self) {
        println!("Number of cells: {}", self.graph.num_cells());
        for cell in &self.graph.cells {
            let nets = cell
                .nets
                .iter()
                .map(|&n| format!("{:>8}", self.graph.nets[n].name))
                .join(" ");
            println!("{:>8}: {nets}", cell.name);
        }
    }

    pub fn write_result(&self, out: &mut impl Write) -> std::io::Result<()> {
        writeln!(out, "Cutsize = {}", self.cut_size)?;
        for side in 0..2 {
            writeln!(out, "G{} {}", side + 1, self.part_size[side])?;
            let names = self
                .graph
                .cells
                .iter()
                .filter(|c| c.part == side)
                .map(|c| c.name.as_str())
                .join(" ");
            writeln!(out, "{names} ;")?;
        }
        Ok(())
    }
}
