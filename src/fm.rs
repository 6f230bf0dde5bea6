pub mod bucket;
pub mod graph;
pub mod partitioner;

pub use bucket::BucketList;
pub use graph::{Cell, HyperGraph, Net};
pub use partitioner::Partitioner;
