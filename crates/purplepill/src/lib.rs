//! Exports per-GPU and per-pod GPU memory metrics sampled from `nvidia-smi`.

pub mod api;
pub mod app;
pub mod collector;
pub mod config;
pub mod identity;
pub mod inventory;
pub mod logging;
pub mod metrics;

mod lifecycle;

pub use lifecycle::StartOutcome;
pub use lifecycle::STOP_TIMEOUT;
