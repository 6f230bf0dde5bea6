//! Bin-density penalty with the NTUPlace3 bell-shaped smoothing.
//!
//! Each free module spreads its area over the bins inside a ±2-bin padded
//! window around its footprint; the per-module coefficient renormalises the
//! smoothed mass to the exact module area.

use rayon::prelude::*;

use super::config::PlacerConfig;
use super::objective::ObjectiveFn;
use super::placement::Placement;
use super::point::Point2;

/// Smoothed x- or y-overlap between a module and a bin at centre distance
/// `center_dist`.
fn overlap(center_dist: f64, bin_size: f64, module_size: f64) -> f64 {
    let dist = center_dist.abs();
    if dist >= 0.5 * module_size + 2.0 * bin_size {
        0.0
    } else if dist <= 0.5 * module_size + bin_size {
        let alpha = 4.0 / ((module_size + 2.0 * bin_size) * (module_size + 4.0 * bin_size));
        1.0 - alpha * dist * dist
    } else {
        let beta = 2.0 / (bin_size * (module_size + 4.0 * bin_size));
        beta * (dist - 0.5 * module_size - 2.0 * bin_size).powi(2)
    }
}

/// Derivative of [`overlap`] with respect to `center_dist`.
fn overlap_grad(center_dist: f64, bin_size: f64, module_size: f64) -> f64 {
    let dist = center_dist.abs();
    if dist >= 0.5 * module_size + 2.0 * bin_size {
        0.0
    } else if dist <= 0.5 * module_size + bin_size {
        let alpha = 4.0 / ((module_size + 2.0 * bin_size) * (module_size + 4.0 * bin_size));
        -2.0 * alpha * center_dist
    } else {
        let beta = 2.0 / (bin_size * (module_size + 4.0 * bin_size));
        if center_dist > 0.0 {
            2.0 * beta * (center_dist - 0.5 * module_size - 2.0 * bin_size)
        } else {
            2.0 * beta * (center_dist + 0.5 * module_size + 2.0 * bin_size)
        }
    }
}

pub struct Density {
    num_bins_side: usize,
    bin_width: f64,
    bin_height: f64,
    /// Target density per bin.
    object_area: f64,
    /// Row-major `[x * num_bins_side + y]` smoothed mass per bin.
    map: Vec<f64>,
    /// Per-module normalisation `area / Σ ov`.
    coeff: Vec<f64>,
    overflow_ratio: f64,
    value: f64,
    grad: Vec<Point2>,
}

impl Density {
    pub fn new(placement: &Placement, config: &PlacerConfig) -> Self {
        let num_modules = placement.num_modules();
        let num_bins_side =
            ((config.num_bin_side_ratio * (num_modules as f64).sqrt()) as usize).max(1);
        let bin_width = placement.chip_width() / num_bins_side as f64;
        let bin_height = placement.chip_height() / num_bins_side as f64;
        let bin_area = bin_width * bin_height;

        let avail_area: f64 = (0..num_modules)
            .map(|i| placement.module(i))
            .filter(|m| !m.is_fixed())
            .map(|m| m.area())
            .sum();
        let object_area = (avail_area / placement.chip_area()).max(config.object_density * bin_area);

        Density {
            num_bins_side,
            bin_width,
            bin_height,
            object_area,
            map: vec![0.0; num_bins_side * num_bins_side],
            coeff: vec![0.0; num_modules],
            overflow_ratio: 1.0,
            value: 0.0,
            grad: vec![Point2::ZERO; num_modules],
        }
    }

    pub fn num_bins_side(&self) -> usize {
        self.num_bins_side
    }

    pub fn bin_width(&self) -> f64 {
        self.bin_width
    }

    pub fn bin_height(&self) -> f64 {
        self.bin_height
    }

    pub fn overflow_ratio(&self) -> f64 {
        self.overflow_ratio
    }

    /// Total smoothed mass currently on the grid.
    pub fn total_mass(&self) -> f64 {
        self.map.iter().sum()
    }

    /// Bin window of a module: its footprint padded by 2 bins each way,
    /// clamped to the grid. Modules on the chip boundary contribute to the
    /// last bin.
    fn window(&self, placement: &Placement, input: &[Point2], i: usize) -> (usize, usize, usize, usize) {
        let module = placement.module(i);
        let left = placement.boundary_left();
        let bottom = placement.boundary_bottom();
        let mut left_bin = ((input[i].x - left) / self.bin_width) as usize;
        let mut bottom_bin = ((input[i].y - bottom) / self.bin_height) as usize;
        let right_bin = ((input[i].x + module.width() - left) / self.bin_width) as usize + 2;
        let top_bin = ((input[i].y + module.height() - bottom) / self.bin_height) as usize + 2;
        if left_bin >= 2 {
            left_bin -= 2;
        }
        if bottom_bin >= 2 {
            bottom_bin -= 2;
        }
        (
            left_bin,
            bottom_bin,
            right_bin.min(self.num_bins_side - 1),
            top_bin.min(self.num_bins_side - 1),
        )
    }
}

impl ObjectiveFn for Density {
    fn forward(&mut self, placement: &Placement, input: &[Point2]) -> f64 {
        let num_modules = placement.num_modules();
        let num_bins = self.num_bins_side;
        let workers = rayon::current_num_threads();
        let chunk = num_modules.div_ceil(workers);

        // Each worker owns a fixed module range and a private copy of the
        // density map; the copies merge serially in worker order below, so
        // the result is identical for any worker count.
        let this = &*self;
        let worker_maps: Vec<(Vec<f64>, Vec<(usize, f64)>)> = (0..workers)
            .into_par_iter()
            .map(|w| {
                let start = w * chunk;
                let end = num_modules.min(start + chunk);
                let mut local_map = vec![0.0; num_bins * num_bins];
                let mut local_coeff = Vec::new();
                for i in start..end {
                    let module = placement.module(i);
                    if module.is_fixed() {
                        continue;
                    }
                    let (left_bin, bottom_bin, right_bin, top_bin) =
                        this.window(placement, input, i);
                    let bins_x = (right_bin + 1).saturating_sub(left_bin);
                    let bins_y = (top_bin + 1).saturating_sub(bottom_bin);
                    let center_x =
                        input[i].x + module.width() * 0.5 - placement.boundary_left();
                    let center_y =
                        input[i].y + module.height() * 0.5 - placement.boundary_bottom();

                    let mut temp = vec![0.0; bins_x * bins_y];
                    let mut mass = 0.0;
                    for dx in 0..bins_x {
                        let bin_center_x = this.bin_width * ((left_bin + dx) as f64 + 0.5);
                        let ov_x = overlap(center_x - bin_center_x, this.bin_width, module.width());
                        for dy in 0..bins_y {
                            let bin_center_y = this.bin_height * ((bottom_bin + dy) as f64 + 0.5);
                            let ov_y =
                                overlap(center_y - bin_center_y, this.bin_height, module.height());
                            let val = ov_x * ov_y;
                            temp[dx * bins_y + dy] = val;
                            mass += val;
                        }
                    }
                    let coeff = if mass > 0.0 { module.area() / mass } else { 0.0 };
                    local_coeff.push((i, coeff));
                    for dx in 0..bins_x {
                        for dy in 0..bins_y {
                            local_map[(left_bin + dx) * num_bins + bottom_bin + dy] +=
                                coeff * temp[dx * bins_y + dy];
                        }
                    }
                }
                (local_map, local_coeff)
            })
            .collect();

        self.map.fill(0.0);
        self.coeff.fill(0.0);
        for (local_map, local_coeff) in worker_maps {
            for (dst, src) in self.map.iter_mut().zip(local_map) {
                *dst += src;
            }
            for (i, coeff) in local_coeff {
                self.coeff[i] = coeff;
            }
        }

        let mut value = 0.0;
        let mut overflow_area = 0.0;
        for &density in &self.map {
            let diff = density - self.object_area;
            if diff > 0.0 {
                overflow_area += diff;
            }
            value += diff * diff;
        }
        self.value = value;
        self.overflow_ratio = overflow_area / placement.chip_area();
        self.value
    }

    fn backward(&mut self, placement: &Placement, input: &[Point2]) -> &[Point2] {
        let this = &*self;
        let grads: Vec<Point2> = (0..placement.num_modules())
            .into_par_iter()
            .map(|i| {
                let module = placement.module(i);
                if module.is_fixed() {
                    return Point2::ZERO;
                }
                let (left_bin, bottom_bin, right_bin, top_bin) = this.window(placement, input, i);
                let center_x = input[i].x + module.width() * 0.5 - placement.boundary_left();
                let center_y = input[i].y + module.height() * 0.5 - placement.boundary_bottom();
                let coeff = this.coeff[i];

                let mut local_grad = Point2::ZERO;
                for x in left_bin..=right_bin {
                    let dist_x = center_x - this.bin_width * (x as f64 + 0.5);
                    let ov_x = overlap(dist_x, this.bin_width, module.width());
                    let d_ov_x = overlap_grad(dist_x, this.bin_width, module.width());
                    for y in bottom_bin..=top_bin {
                        let dist_y = center_y - this.bin_height * (y as f64 + 0.5);
                        let ov_y = overlap(dist_y, this.bin_height, module.height());
                        let d_ov_y = overlap_grad(dist_y, this.bin_height, module.height());
                        let diff = this.map[x * this.num_bins_side + y] - this.object_area;
                        local_grad.x += 2.0 * diff * coeff * d_ov_x * ov_y;
                        local_grad.y += 2.0 * diff * coeff * ov_x * d_ov_y;
                    }
                }
                local_grad
            })
            .collect();
        self.grad = grads;
        &self.grad
    }

    fn value(&self) -> f64 {
        self.value
    }

    fn grad(&self) -> &[Point2] {
        &self.grad
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bell_is_continuous_and_compact() {
        let (bin, module) = (4.0, 10.0);
        // Dead zone outside mod/2 + 2*bin.
        assert_eq!(overlap(13.0, bin, module), 0.0);
        assert_eq!(overlap(-14.0, bin, module), 0.0);
        // Peak of 1 at the centre.
        assert_eq!(overlap(0.0, bin, module), 1.0);
        // Continuity at both region boundaries.
        let inner = 0.5 * module + bin;
        let outer = 0.5 * module + 2.0 * bin;
        assert!((overlap(inner - 1e-9, bin, module) - overlap(inner + 1e-9, bin, module)).abs() < 1e-6);
        assert!(overlap(outer - 1e-9, bin, module).abs() < 1e-6);
    }

    #[test]
    fn bell_gradient_matches_finite_difference() {
        let (bin, module) = (3.0, 7.0);
        let eps = 1e-6;
        for dist in [-12.0, -9.5, -4.0, -0.5, 0.0, 2.5, 6.0, 9.1, 12.5] {
            let fd = (overlap(dist + eps, bin, module) - overlap(dist - eps, bin, module))
                / (2.0 * eps);
            let grad = overlap_grad(dist, bin, module);
            assert!(
                (fd - grad).abs() < 1e-4,
                "d overlap({dist}) = {grad}, finite difference {fd}"
            );
        }
    }
}
