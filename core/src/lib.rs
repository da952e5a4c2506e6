//! # UFG Core
//!
//! Basic utilities shared by the UFG crates: allocation reuse and profiling
//! instrumentation.

pub mod pool;
pub mod profiling;

/// Core library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Log the core library version.
pub fn init() {
    log::info!("UFG Core v{} initialized", VERSION);
}
