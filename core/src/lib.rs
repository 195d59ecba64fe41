pub mod compare;
pub mod config;
pub mod error;
pub mod judge;
pub mod testing;

pub use crate::config::Config;
