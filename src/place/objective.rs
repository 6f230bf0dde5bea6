//! The differentiable-objective seam shared by the wirelength and density
//! terms, and the λ-weighted combination the optimiser actually descends.

use rayon::prelude::*;

use super::config::PlacerConfig;
use super::density::Density;
use super::placement::Placement;
use super::point::Point2;
use super::wirelength::Wirelength;

/// A scalar function of the module positions with an analytical gradient.
/// `forward` must run before `backward`; both cache their results.
pub trait ObjectiveFn {
    fn forward(&mut self, placement: &Placement, input: &[Point2]) -> f64;
    fn backward(&mut self, placement: &Placement, input: &[Point2]) -> &[Point2];
    fn value(&self) -> f64;
    fn grad(&self) -> &[Point2];
}

/// `F(p) = WL(p) + λ · Density(p)`.
pub struct ObjectiveFunction {
    wirelength: Wirelength,
    density: Density,
    lambda: f64,
    value: f64,
    grad: Vec<Point2>,
}

impl ObjectiveFunction {
    pub fn new(placement: &Placement, config: &PlacerConfig) -> Self {
        ObjectiveFunction {
            wirelength: Wirelength::new(placement),
            density: Density::new(placement, config),
            lambda: 0.0,
            value: 0.0,
            grad: vec![Point2::ZERO; placement.num_modules()],
        }
    }

    /// Evaluate both terms at the starting positions and pick λ so their
    /// gradient magnitudes match.
    pub fn init_lambda(&mut self, placement: &Placement, input: &[Point2]) {
        let wirelength_cost = self.wirelength.forward(placement, input);
        let density_cost = self.density.forward(placement, input);
        self.wirelength.backward(placement, input);
        self.density.backward(placement, input);

        let wirelength_grad_sum: f64 = self.wirelength.grad().iter().map(|g| g.norm()).sum();
        let density_grad_sum: f64 = self.density.grad().iter().map(|g| g.norm()).sum();
        self.lambda = if density_grad_sum != 0.0 {
            wirelength_grad_sum / density_grad_sum
        } else {
            0.0
        };

        let lambda = self.lambda;
        let wirelength_grad = self.wirelength.grad();
        let density_grad = self.density.grad();
        self.grad
            .par_iter_mut()
            .enumerate()
            .for_each(|(i, g)| *g = wirelength_grad[i] + lambda * density_grad[i]);
        self.value = wirelength_cost + lambda * density_cost;
    }

    pub fn lambda(&self) -> f64 {
        self.lambda
    }

    pub fn scale_lambda(&mut self, times: f64) {
        self.lambda *= times;
    }

    pub fn scale_gamma(&mut self, times: f64) {
        self.wirelength.scale_gamma(times);
    }

    pub fn overflow_ratio(&self) -> f64 {
        self.density.overflow_ratio()
    }

    pub fn bin_width(&self) -> f64 {
        self.density.bin_width()
    }

    pub fn bin_height(&self) -> f64 {
        self.density.bin_height()
    }

    pub fn wirelength_cost(&self) -> f64 {
        self.wirelength.value()
    }

    pub fn density_cost(&self) -> f64 {
        self.density.value()
    }
}

impl ObjectiveFn for ObjectiveFunction {
    fn forward(&mut self, placement: &Placement, input: &[Point2]) -> f64 {
        self.value = self.wirelength.forward(placement, input)
            + self.lambda * self.density.forward(placement, input);
        self.value
    }

    fn backward(&mut self, placement: &Placement, input: &[Point2]) -> &[Point2] {
        self.wirelength.backward(placement, input);
        self.density.backward(placement, input);
        let lambda = self.lambda;
        let wirelength_grad = self.wirelength.grad();
        let density_grad = self.density.grad();
        self.grad
            .par_iter_mut()
            .enumerate()
            .for_each(|(i, g)| *g = wirelength_grad[i] + lambda * density_grad[i]);
        &self.grad
    }

    fn value(&self) -> f64 {
        self.value
    }

    fn grad(&self) -> &[Point2] {
        &self.grad
    }
}
