//! Utility functions and types

pub mod data_loader;
pub mod fs;
mod parallel;

pub use data_loader::DataLoader;
pub use parallel::{parallel_map, ParallelConfig};
