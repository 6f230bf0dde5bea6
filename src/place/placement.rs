//! The module / net / pin store the placer runs on. Host drivers build it
//! (typically from a Bookshelf reader) and hand it to [`crate::GlobalPlacer`];
//! the placer only ever rewrites free-module positions.

pub struct Module {
    name: String,
    width: f64,
    height: f64,
    /// Lower-left corner.
    x: f64,
    y: f64,
    fixed: bool,
    pins: Vec<usize>,
}

impl Module {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn width(&self) -> f64 {
        self.width
    }

    pub fn height(&self) -> f64 {
        self.height
    }

    pub fn area(&self) -> f64 {
        self.width * self.height
    }

    pub fn x(&self) -> f64 {
        self.x
    }

    pub fn y(&self) -> f64 {
        self.y
    }

    pub fn is_fixed(&self) -> bool {
        self.fixed
    }

    pub fn pins(&self) -> &[usize] {
        &self.pins
    }

    pub fn set_position(&mut self, x: f64, y: f64) {
        self.x = x;
        self.y = y;
    }
}

pub struct Pin {
    module: usize,
    net: usize,
    /// Offset from the module centre.
    x_offset: f64,
    y_offset: f64,
}

impl Pin {
    pub fn module(&self) -> usize {
        self.module
    }

    pub fn net(&self) -> usize {
        self.net
    }

    pub fn x_offset(&self) -> f64 {
        self.x_offset
    }

    pub fn y_offset(&self) -> f64 {
        self.y_offset
    }
}

pub struct Net {
    pins: Vec<usize>,
}

impl Net {
    pub fn pins(&self) -> &[usize] {
        &self.pins
    }
}

pub struct Placement {
    modules: Vec<Module>,
    nets: Vec<Net>,
    pins: Vec<Pin>,
    boundary_left: f64,
    boundary_bottom: f64,
    boundary_right: f64,
    boundary_top: f64,
}

impl Placement {
    pub fn new(left: f64, bottom: f64, right: f64, top: f64) -> Self {
        Placement {
            modules: Vec::new(),
            nets: Vec::new(),
            pins: Vec::new(),
            boundary_left: left,
            boundary_bottom: bottom,
            boundary_right: right,
            boundary_top: top,
        }
    }

    pub fn add_module(
        &mut self,
        name: &str,
        width: f64,
        height: f64,
        x: f64,
        y: f64,
        fixed: bool,
    ) -> usize {
        self.modules.push(Module {
            name: name.to_string(),
            width,
            height,
            x,
            y,
            fixed,
            pins: Vec::new(),
        });
        self.modules.len() - 1
    }

    /// Add a net given `(module, x_offset, y_offset)` pin descriptions;
    /// offsets are relative to the module centre.
    pub fn add_net(&mut self, net_pins: &[(usize, f64, f64)]) -> usize {
        let net_id = self.nets.len();
        let mut pins = Vec::with_capacity(net_pins.len());
        for &(module, x_offset, y_offset) in net_pins {
            let pin_id = self.pins.len();
            self.pins.push(Pin {
                module,
                net: net_id,
                x_offset,
                y_offset,
            });
            self.modules[module].pins.push(pin_id);
            pins.push(pin_id);
        }
        self.nets.push(Net { pins });
        net_id
    }

    pub fn num_modules(&self) -> usize {
        self.modules.len()
    }

    pub fn num_nets(&self) -> usize {
        self.nets.len()
    }

    pub fn num_pins(&self) -> usize {
        self.pins.len()
    }

    pub fn module(&self, id: usize) -> &Module {
        &self.modules[id]
    }

    pub fn module_mut(&mut self, id: usize) -> &mut Module {
        &mut self.modules[id]
    }

    pub fn net(&self, id: usize) -> &Net {
        &self.nets[id]
    }

    pub fn pin(&self, id: usize) -> &Pin {
        &self.pins[id]
    }

    pub fn boundary_left(&self) -> f64 {
        self.boundary_left
    }

    pub fn boundary_bottom(&self) -> f64 {
        self.boundary_bottom
    }

    pub fn boundary_right(&self) -> f64 {
        self.boundary_right
    }

    pub fn boundary_top(&self) -> f64 {
        self.boundary_top
    }

    pub fn chip_width(&self) -> f64 {
        self.boundary_right - self.boundary_left
    }

    pub fn chip_height(&self) -> f64 {
        self.boundary_top - self.boundary_bottom
    }

    pub fn chip_area(&self) -> f64 {
        self.chip_width() * self.chip_height()
    }

    /// Half-perimeter wirelength over pin positions at the stored module
    /// coordinates.
    pub fn hpwl(&self) -> f64 {
        let mut total = 0.0;
        for net in &self.nets {
            let mut pins = net.pins.iter().map(|&p| {
                let pin = &self.pins[p];
                let module = &self.modules[pin.module];
                (
                    module.x + module.width * 0.5 + pin.x_offset,
                    module.y + module.height * 0.5 + pin.y_offset,
                )
            });
            let Some((mut min_x, mut min_y)) = pins.next() else {
                continue;
            };
            let (mut max_x, mut max_y) = (min_x, min_y);
            for (x, y) in pins {
                min_x = min_x.min(x);
                max_x = max_x.max(x);
                min_y = min_y.min(y);
                max_y = max_y.max(y);
            }
            total += (max_x - min_x) + (max_y - min_y);
        }
        total
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_wires_pins_both_ways() {
        let mut pl = Placement::new(0.0, 0.0, 10.0, 10.0);
        let a = pl.add_module("a", 2.0, 2.0, 0.0, 0.0, true);
        let b = pl.add_module("b", 2.0, 2.0, 4.0, 4.0, false);
        let net = pl.add_net(&[(a, 0.0, 0.0), (b, 0.5, -0.5)]);
        assert_eq!(pl.net(net).pins().len(), 2);
        assert_eq!(pl.module(a).pins(), &[0]);
        assert_eq!(pl.module(b).pins(), &[1]);
        assert_eq!(pl.pin(1).net(), net);
        // Pin positions: (1, 1) and (5.5, 4.5).
        assert_eq!(pl.hpwl(), 4.5 + 3.5);
    }
}
