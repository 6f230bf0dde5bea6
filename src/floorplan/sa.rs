//! Fixed-outline floorplanning by simulated annealing over the B*-tree.

use std::collections::VecDeque;
use std::io::Write;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::Serialize;
use tracing::debug;

use super::blocks::{FloorplanInput, Net, Terminal};
use super::config::SaConfig;
use super::tree::BStarTree;

/// Hard cap on annealing sweeps. Cooling or stagnation stops the search long
/// before this on any reasonable instance; the cap bounds the exhaustive
/// re-heating when no feasible solution exists at all.
const MAX_SWEEPS: usize = 100_000;

#[derive(Clone, Copy, Debug)]
pub struct Cost {
    /// The α-weighted area/wirelength cost of the solution itself.
    pub real: f64,
    /// `real` blended with the outline penalty by the adaptive weight.
    pub total: f64,
}

#[derive(Serialize)]
pub struct FloorplanSummary {
    pub cost: f64,
    pub wirelength: f64,
    pub area: i64,
    pub box_x: i32,
    pub box_y: i32,
}

pub struct Floorplanner {
    alpha: f64,
    cfg: SaConfig,
    outline_w: i32,
    outline_h: i32,
    outline_ratio: f64,

    tree: BStarTree,
    nets: Vec<Net>,
    terminals: Vec<Terminal>,
    rng: ChaCha8Rng,

    // Derived schedule constants.
    perturb_num: usize,
    temp_k: usize,
    temp_c: i32,

    // Warm-up normalisation.
    area_norm: f64,
    wire_norm: f64,
    ratio_diff_norm: f64,
    warmup_sols: Vec<(i32, i32, f64)>,
    delta_begin_avg: f64,

    // Schedule state.
    num_sa_iter: usize,
    delta_avg: f64,
    init_temp: f64,

    // Feasibility sliding window for the adaptive outline weight.
    num_feasible: usize,
    num_recent: usize,

    // Best feasible solution.
    found: bool,
    best_cost: f64,
    best_box: (i32, i32),
}

impl Floorplanner {
    pub fn new(input: FloorplanInput, alpha: f64, cfg: SaConfig) -> Self {
        let num_blocks = input.blocks.len();
        Floorplanner {
            alpha,
            outline_w: input.outline_w,
            outline_h: input.outline_h,
            outline_ratio: input.outline_h as f64 / input.outline_w as f64,
            tree: BStarTree::new(input.blocks),
            nets: input.nets,
            terminals: input.terminals,
            rng: ChaCha8Rng::seed_from_u64(cfg.seed),
            perturb_num: cfg.perturb_factor * num_blocks,
            temp_k: (num_blocks / cfg.temp_k).max(2),
            temp_c: (cfg.temp_c - num_blocks as i32).max(10),
            cfg,
            area_norm: 0.0,
            wire_norm: 0.0,
            ratio_diff_norm: 0.0,
            warmup_sols: Vec::new(),
            delta_begin_avg: 0.0,
            num_sa_iter: 0,
            delta_avg: 0.0,
            init_temp: 0.0,
            num_feasible: 0,
            num_recent: 0,
            found: false,
            best_cost: f64::MAX,
            best_box: (0, 0),
        }
    }

    pub fn tree(&self) -> &BStarTree {
        &self.tree
    }

    pub fn found_feasible(&self) -> bool {
        self.found
    }

    pub fn best_box(&self) -> (i32, i32) {
        self.best_box
    }

    fn total_hpwl(&self, best: bool) -> f64 {
        self.nets
            .iter()
            .map(|net| net.hpwl(self.tree.real(), &self.terminals, best))
            .sum()
    }

    /// Cost of the current packing, or of a recorded warm-up solution.
    fn cal_cost(&self, warmup_sol: Option<usize>) -> Cost {
        let (box_x, box_y, wirelength) = match warmup_sol {
            None => (self.tree.max_x, self.tree.max_y, self.total_hpwl(false)),
            Some(i) => self.warmup_sols[i],
        };
        let real = self.alpha * (box_x as f64 * box_y as f64) / self.area_norm
            + (1.0 - self.alpha) * wirelength / self.wire_norm;
        let adapt_alpha = if self.num_recent > 0 {
            self.cfg.alpha_base
                + (1.0 - self.cfg.alpha_base) * self.num_feasible as f64 / self.num_recent as f64
        } else {
            self.cfg.alpha_base
        };
        let outline =
            ((box_y as f64 / box_x as f64 - self.outline_ratio) / self.ratio_diff_norm).powi(2);
        Cost {
            real,
            total: adapt_alpha * real + (1.0 - adapt_alpha) * outline,
        }
    }

    /// One warm-up perturbation per block from the initial complete tree.
    /// Establishes the area / wirelength / aspect normalisers and the mean
    /// uphill delta that seeds the temperature schedule.
    fn warmup(&mut self) -> Cost {
        let n = self.tree.num_blocks();
        self.warmup_sols.resize(n, (0, 0, 0.0));
        for i in 0..n {
            self.tree.perturb(&mut self.rng);
            self.tree.pack();
            let wirelength = self.total_hpwl(false);
            self.warmup_sols[i] = (self.tree.max_x, self.tree.max_y, wirelength);
            let i = i as f64;
            let area = self.tree.max_x as f64 * self.tree.max_y as f64;
            let ratio_diff =
                (self.tree.max_y as f64 / self.tree.max_x as f64 - self.outline_ratio).abs();
            self.area_norm = (area + self.area_norm * i) / (i + 1.0);
            self.wire_norm = (wirelength + self.wire_norm * i) / (i + 1.0);
            self.ratio_diff_norm = (ratio_diff + self.ratio_diff_norm * i) / (i + 1.0);
        }

        self.delta_begin_avg = 0.0;
        let mut uphill_count = 0;
        let mut cost = self.cal_cost(Some(0));
        for i in 1..n {
            let new_cost = self.cal_cost(Some(i));
            let delta = new_cost.total - cost.total;
            if delta > 0.0 {
                self.delta_begin_avg = (self.delta_begin_avg * uphill_count as f64 + delta)
                    / (uphill_count + 1) as f64;
                uphill_count += 1;
            }
            cost = new_cost;
        }
        cost
    }

    /// Two-regime cooling: the initial temperature targets the configured
    /// acceptance probability on warm-up uphill deltas; iterations below
    /// `temp_k` cool fast by the extra `temp_c` divisor, later ones slowly.
    fn temperature(&mut self) -> f64 {
        if self.num_sa_iter == 0 {
            self.init_temp = -self.delta_begin_avg / self.cfg.init_prob.ln();
            self.init_temp
        } else if self.num_sa_iter <= self.temp_k - 1 {
            self.init_temp * self.delta_avg / (self.temp_c as f64 * self.num_sa_iter as f64)
        } else {
            self.init_temp * self.delta_avg / self.num_sa_iter as f64
        }
    }

    pub fn floorplan(&mut self) {
        self.num_sa_iter = 0;
        self.num_recent = 0;
        self.num_feasible = 0;
        self.found = false;
        self.best_cost = f64::MAX;
        self.best_box = (0, 0);

        let mut cost = self.warmup();
        let mut temp = self.temperature();
        let mut feas_queue: VecDeque<bool> = VecDeque::new();
        let mut sweeps = 0;
        loop {
            let mut iter = 0;
            let mut uphill = 0;
            let mut reject = 0;
            self.delta_avg = 0.0;
            while iter < self.perturb_num && uphill < self.perturb_num / 2 {
                for blk in self.tree.real_mut() {
                    blk.set_last();
                }
                let last_box = (self.tree.max_x, self.tree.max_y);

                let kind = self.tree.perturb(&mut self.rng);
                self.tree.pack();
                let new_cost = self.cal_cost(None);

                // Feed the feasibility window driving the adaptive weight.
                let feas =
                    self.tree.max_x <= self.outline_w && self.tree.max_y <= self.outline_h;
                feas_queue.push_back(feas);
                if feas {
                    self.num_feasible += 1;
                }
                if self.num_recent == self.cfg.adaptive_num {
                    if feas_queue.pop_front() == Some(true) {
                        self.num_feasible -= 1;
                    }
                } else {
                    self.num_recent += 1;
                }

                let delta = new_cost.total - cost.total;
                if delta <= 0.0 || self.rng.gen::<f64>() <= (-delta / temp).exp() {
                    if delta > 0.0 {
                        uphill += 1;
                    }
                    cost = new_cost;
                    if feas && cost.real < self.best_cost {
                        self.found = true;
                        self.best_cost = cost.real;
                        for blk in self.tree.real_mut() {
                            blk.set_best();
                        }
                        self.best_box = (self.tree.max_x, self.tree.max_y);
                    }
                } else {
                    self.tree.undo(kind);
                    for blk in self.tree.real_mut() {
                        blk.back_to_last();
                    }
                    self.tree.max_x = last_box.0;
                    self.tree.max_y = last_box.1;
                    reject += 1;
                }

                self.delta_avg = (self.delta_avg * iter as f64 + delta) / (iter + 1) as f64;
                iter += 1;
            }

            debug!(
                sweep = self.num_sa_iter,
                temp,
                cost = cost.total,
                uphill,
                reject,
                best = self.best_cost,
                "sa sweep"
            );

            // Cooled out or fully stuck: stop if a feasible solution exists,
            // otherwise re-heat and keep searching.
            sweeps += 1;
            if temp < 1e-10 || reject >= self.perturb_num {
                if self.found {
                    break;
                }
                self.num_sa_iter = 0;
                temp = self.temperature();
            } else {
                self.num_sa_iter += 1;
                temp = self.temperature();
            }
            if sweeps >= MAX_SWEEPS {
                // Exhausted every schedule without a feasible solution:
                // report the current packing as the best effort.
                if !self.found {
                    for blk in self.tree.real_mut() {
                        blk.set_best();
                    }
                    self.best_box = (self.tree.max_x, self.tree.max_y);
                    self.best_cost = cost.real;
                }
                break;
            }
        }
    }

    pub fn summary(&self) -> FloorplanSummary {
        let (box_x, box_y) = self.best_box;
        let area = box_x as i64 * box_y as i64;
        let wirelength = self.total_hpwl(true);
        FloorplanSummary {
            cost: self.alpha * area as f64 + (1.0 - self.alpha) * wirelength,
            wirelength,
            area,
            box_x,
            box_y,
        }
    }

    /// Emit the best snapshot: cost, HPWL, area, bounding box, runtime, then
    /// one placement line per block.
    pub fn write_output(&self, out: &mut impl Write, run_time: f64) -> std::io::Result<()> {
        let summary = self.summary();
        writeln!(out, "{:.6}", summary.cost)?;
        writeln!(out, "{:.1}", summary.wirelength)?;
        writeln!(out, "{}", summary.area)?;
        writeln!(out, "{} {}", summary.box_x, summary.box_y)?;
        writeln!(out, "{:.6}", run_time)?;
        for blk in self.tree.real() {
            writeln!(
                out,
                "{} {} {} {} {}",
                blk.name,
                blk.best_xl,
                blk.best_yl,
                blk.best_xl + blk.best_width(),
                blk.best_yl + blk.best_height()
            )?;
        }
        Ok(())
    }
}
