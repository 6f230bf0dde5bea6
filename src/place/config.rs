//! Per-case global-placement hyperparameters.

#[derive(Clone, Copy, Debug)]
pub struct PlacerConfig {
    /// Overflow ratio at which the spread is good enough to stop.
    pub overflow_accept_ratio: f64,
    /// Minimum relative cost drop per step before λ is grown.
    pub cost_improvement_ratio: f64,
    /// Overflow ratio below which γ is rescaled, once.
    pub adjust_gamma_overflow: f64,
    pub mul_lambda: f64,
    pub mul_gamma: f64,
    /// Patience in non-improving steps once overflow is acceptable.
    pub early_stop_steps: u32,
    pub max_steps: u32,
    /// Step size α_s of the optimiser, in bin pitches.
    pub step_size: f64,
    /// Bins per side = `ratio * sqrt(num modules)`.
    pub num_bin_side_ratio: f64,
    /// Floor of the target density, as a fraction of the bin area.
    pub object_density: f64,
}

impl PlacerConfig {
    pub fn for_case(case_id: u32) -> Self {
        let (step_size, num_bin_side_ratio, object_density) = match case_id {
            1 => (0.15, 0.5, 0.9),
            5 => (0.07, 0.21, 0.8),
            _ => (0.1, 0.25, 0.9),
        };
        let overflow_accept_ratio = 0.05;
        PlacerConfig {
            overflow_accept_ratio,
            cost_improvement_ratio: 0.0012,
            adjust_gamma_overflow: 5.0 * overflow_accept_ratio,
            mul_lambda: 1.3,
            mul_gamma: 0.3,
            early_stop_steps: 10,
            max_steps: 600,
            step_size,
            num_bin_side_ratio,
            object_density,
        }
    }
}

impl Default for PlacerConfig {
    fn default() -> Self {
        PlacerConfig::for_case(0)
    }
}
