//! Conjugate-gradient descent with the NTUPlace3 Hestenes-Stiefel-like β
//! and a constant step size measured in bin pitches.

use rayon::prelude::*;

use super::objective::{ObjectiveFn, ObjectiveFunction};
use super::placement::Placement;
use super::point::Point2;

pub struct ConjugateGradient {
    grad_prev: Vec<Point2>,
    dir_prev: Vec<Point2>,
    /// Step size α_s.
    alpha_s: f64,
}

/// Clamp a free module's lower-left corner into the chip.
fn clamp(position: &mut Point2, placement: &Placement, i: usize) {
    let module = placement.module(i);
    let left = placement.boundary_left();
    let right = placement.boundary_right() - module.width();
    let bottom = placement.boundary_bottom();
    let top = placement.boundary_top() - module.height();
    if position.x < left {
        position.x = left;
    } else if position.x > right {
        position.x = right;
    }
    if position.y < bottom {
        position.y = bottom;
    } else if position.y > top {
        position.y = top;
    }
}

impl ConjugateGradient {
    pub fn new(num_modules: usize, step_size: f64) -> Self {
        ConjugateGradient {
            grad_prev: vec![Point2::ZERO; num_modules],
            dir_prev: vec![Point2::ZERO; num_modules],
            alpha_s: step_size,
        }
    }

    /// First move: pick λ, then plain steepest descent.
    pub fn initialize(
        &mut self,
        obj: &mut ObjectiveFunction,
        placement: &Placement,
        positions: &mut [Point2],
    ) {
        obj.init_lambda(placement, positions);
        let bin_step = Point2::new(
            self.alpha_s * obj.bin_width(),
            self.alpha_s * obj.bin_height(),
        );
        let grad = obj.grad();
        let mut dir = vec![Point2::ZERO; positions.len()];
        positions
            .par_iter_mut()
            .zip(dir.par_iter_mut())
            .enumerate()
            .for_each(|(i, (position, d))| {
                if placement.module(i).is_fixed() {
                    return;
                }
                *d = -grad[i];
                let dir_norm = d.norm();
                if dir_norm > 0.0 {
                    *position += bin_step * *d / dir_norm;
                }
                clamp(position, placement, i);
            });
        self.grad_prev.copy_from_slice(grad);
        self.dir_prev = dir;
    }

    /// One conjugate-gradient step. The β reduction runs over fixed block
    /// ranges with a serial ordered merge, so it is bit-identical for any
    /// worker count.
    pub fn step(
        &mut self,
        obj: &mut ObjectiveFunction,
        placement: &Placement,
        positions: &mut [Point2],
    ) {
        let num_modules = positions.len();
        obj.forward(placement, positions);
        obj.backward(placement, positions);
        let grad = obj.grad();

        let workers = rayon::current_num_threads();
        let block = num_modules.div_ceil(workers);
        let grad_prev = &self.grad_prev;
        let partials: Vec<(f64, f64)> = (0..workers)
            .into_par_iter()
            .map(|w| {
                let start = w * block;
                let end = num_modules.min(start + block);
                let mut numer = 0.0;
                let mut denom = 0.0;
                for i in start..end {
                    if !placement.module(i).is_fixed() {
                        numer += grad[i].dot(grad[i] - grad_prev[i]);
                        denom += grad[i].abs_sum();
                    }
                }
                (numer, denom)
            })
            .collect();
        let mut numer = 0.0;
        let mut denom = 0.0;
        for (n, d) in partials {
            numer += n;
            denom += d;
        }
        let beta = if denom != 0.0 {
            numer / (denom * denom)
        } else {
            0.0
        };

        let dir_prev = &self.dir_prev;
        let mut dir = vec![Point2::ZERO; num_modules];
        dir.par_iter_mut().enumerate().for_each(|(i, d)| {
            if !placement.module(i).is_fixed() {
                *d = -grad[i] + beta * dir_prev[i];
            }
        });

        let bin_step = Point2::new(
            self.alpha_s * obj.bin_width(),
            self.alpha_s * obj.bin_height(),
        );
        positions
            .par_iter_mut()
            .zip(dir.par_iter())
            .enumerate()
            .for_each(|(i, (position, d))| {
                if placement.module(i).is_fixed() {
                    return;
                }
                let dir_norm = d.norm();
                if dir_norm > 0.0 {
                    *position += bin_step * *d / dir_norm;
                }
                clamp(position, placement, i);
            });

        self.grad_prev.copy_from_slice(grad);
        self.dir_prev = dir;
    }
}
