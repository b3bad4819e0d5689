pub mod config;
pub mod core;
pub mod error;
pub mod market;
pub mod pricing;
pub mod scenario;
