pub mod config;
pub mod errors;
pub mod grid;
pub mod matrix;

pub use config::*;
pub use errors::*;
pub use grid::*;
pub use matrix::*;
