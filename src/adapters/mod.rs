//! Remote service adapters

pub mod tap_api;

pub use tap_api::{PointsSummary, TapApiExecutor};
