pub mod metrics;
pub mod signature;
