pub mod config;
pub mod error;
pub mod recipients;
pub mod types;
