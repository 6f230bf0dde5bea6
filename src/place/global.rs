//! The outer global-placement loop: spread until the overflow ratio is
//! acceptable, growing λ whenever the cost stalls and relaxing γ once the
//! spread is mostly done.

use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::{debug, info};

use super::config::PlacerConfig;
use super::objective::{ObjectiveFn, ObjectiveFunction};
use super::optimizer::ConjugateGradient;
use super::placement::Placement;
use super::point::Point2;

pub struct GlobalPlacer<'a> {
    placement: &'a mut Placement,
    config: PlacerConfig,
}

impl<'a> GlobalPlacer<'a> {
    pub fn new(placement: &'a mut Placement, config: PlacerConfig) -> Self {
        GlobalPlacer { placement, config }
    }

    /// Spread the free modules and write the final positions back into the
    /// placement. Fixed modules are never touched.
    pub fn place(&mut self) {
        let num_modules = self.placement.num_modules();
        if num_modules == 0 {
            return;
        }
        let config = self.config;
        let placement = &*self.placement;

        // Fixed modules start (and stay) where they are; free modules start
        // stacked on the chip centre.
        let center = Point2::new(
            (placement.boundary_left() + placement.boundary_right()) * 0.5,
            (placement.boundary_bottom() + placement.boundary_top()) * 0.5,
        );
        let mut positions: Vec<Point2> = (0..num_modules)
            .map(|i| {
                let module = placement.module(i);
                if module.is_fixed() {
                    Point2::new(module.x(), module.y())
                } else {
                    center
                }
            })
            .collect();

        let mut obj = ObjectiveFunction::new(placement, &config);
        let mut optimizer = ConjugateGradient::new(num_modules, config.step_size);
        optimizer.initialize(&mut obj, placement, &mut positions);

        optimizer.step(&mut obj, placement, &mut positions);
        let mut best_overflow = obj.overflow_ratio();
        let mut last_cost = obj.value();
        let mut steps = 1u32;
        let mut halt_spread_steps = 0u32;
        let mut adjust_gamma = false;

        loop {
            optimizer.step(&mut obj, placement, &mut positions);
            let overflow = obj.overflow_ratio();

            // Grow λ whenever a step stops paying for itself; resetting the
            // reference cost makes the next improvement always count.
            if (last_cost - obj.value()) / last_cost > config.cost_improvement_ratio {
                last_cost = obj.value();
            } else {
                obj.scale_lambda(config.mul_lambda);
                last_cost = f64::MAX;
            }

            debug!(
                step = steps,
                overflow,
                cost = obj.value(),
                lambda = obj.lambda(),
                "cg step"
            );

            if overflow < best_overflow {
                if overflow < config.overflow_accept_ratio {
                    break;
                }
                best_overflow = overflow;
                halt_spread_steps = 0;
                if !adjust_gamma && overflow < config.adjust_gamma_overflow {
                    obj.scale_gamma(config.mul_gamma);
                    adjust_gamma = true;
                }
            } else {
                halt_spread_steps += 1;
                if overflow < config.overflow_accept_ratio
                    && halt_spread_steps > config.early_stop_steps
                {
                    break;
                }
            }
            steps += 1;
            if steps > config.max_steps {
                break;
            }
        }

        let mut fixed_count = 0;
        for i in 0..num_modules {
            if self.placement.module(i).is_fixed() {
                fixed_count += 1;
            } else {
                let position = positions[i];
                self.placement.module_mut(i).set_position(position.x, position.y);
            }
        }
        info!(
            steps,
            overflow = best_overflow.min(obj.overflow_ratio()),
            hpwl = self.placement.hpwl(),
            "{fixed_count} / {num_modules} modules are fixed"
        );
    }

    /// Emit the placement as a gnuplot script: chip boundary, then one box
    /// per module.
    pub fn write_plot(&self, path: &Path) -> Result<()> {
        let placement = &*self.placement;
        let mut out = std::fs::File::create(path)
            .with_context(|| format!("cannot open the plot file {path:?}"))?;
        writeln!(&mut out, "set title \"wirelength = {}\"", placement.hpwl())?;
        writeln!(&mut out, "set size ratio 1")?;
        writeln!(&mut out, "set nokey")?;
        writeln!(&mut out, "plot[:][:] '-' w l lt 3 lw 2, '-' w l lt 1")?;
        writeln!(&mut out, "# bounding box")?;
        plot_box(
            &mut out,
            placement.boundary_left(),
            placement.boundary_bottom(),
            placement.boundary_right(),
            placement.boundary_top(),
        )?;
        writeln!(&mut out, "EOF")?;
        writeln!(&mut out, "# modules")?;
        writeln!(&mut out, "0.00, 0.00")?;
        writeln!(&mut out)?;
        for i in 0..placement.num_modules() {
            let module = placement.module(i);
            plot_box(
                &mut out,
                module.x(),
                module.y(),
                module.x() + module.width(),
                module.y() + module.height(),
            )?;
        }
        writeln!(&mut out, "EOF")?;
        writeln!(&mut out, "pause -1 'Press any key to close.'")?;
        Ok(())
    }
}

fn plot_box(out: &mut impl Write, x1: f64, y1: f64, x2: f64, y2: f64) -> std::io::Result<()> {
    writeln!(out, "{x1}, {y1}")?;
    writeln!(out, "{x2}, {y1}")?;
    writeln!(out, "{x2}, {y2}")?;
    writeln!(out, "{x1}, {y2}")?;
    writeln!(out, "{x1}, {y1}")?;
    writeln!(out)
}
