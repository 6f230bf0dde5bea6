pub mod blocks;
pub mod config;
pub mod sa;
pub mod tree;

pub use blocks::{parse_input, Block, FloorplanInput, Net, TermRef, Terminal};
pub use config::SaConfig;
pub use sa::Floorplanner;
pub use tree::{BStarTree, Perturb};
