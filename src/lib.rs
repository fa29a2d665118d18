pub mod api;
pub mod config;
pub mod error;
pub mod features;
pub mod rdi;
pub mod redis;
pub mod store;
pub mod telemetry;
pub mod validation;
