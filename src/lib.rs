pub mod floorplan;
pub mod fm;
pub mod place;

#[cfg(test)]
mod tests;

pub mod prelude {
    pub use rustc_hash::FxHashMap as HashMap;
    pub use rustc_hash::FxHashSet as HashSet;
    pub use std::cmp::{max, min};
}

pub use floorplan::sa::Floorplanner;
pub use fm::partitioner::Partitioner;
pub use place::global::GlobalPlacer;
