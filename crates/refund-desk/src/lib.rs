pub mod config;
pub mod error;
pub mod refunds;
pub mod telemetry;
