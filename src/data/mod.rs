// mod.rs - Data module: parameter files and overrides

pub mod loaders;

// Re-export main functions for convenience
pub use loaders::{apply_assignments, load_parameters, parse_assignment};
