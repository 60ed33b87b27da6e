pub mod cli;
pub mod config;
pub mod model;
pub mod resolver;

mod api;
mod flock;

pub use api::{Capdeps, CapdepsBuilder, LockMode};
