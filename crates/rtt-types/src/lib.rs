pub mod config;
pub mod domain;
pub mod errors;
pub mod solver;

pub use config::*;
pub use domain::*;
pub use errors::*;
pub use solver::*;
