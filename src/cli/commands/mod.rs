//! CLI command implementations

pub mod cache;
pub mod config;

pub use cache::execute as cache;
pub use config::execute as config;
