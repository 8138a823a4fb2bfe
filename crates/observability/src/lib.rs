//! Tracing and logging setup shared by processes embedding the command side.

pub mod tracing;

pub use crate::tracing::ObservabilityConfig;

/// Initialize process-wide tracing with the default configuration.
///
/// This is safe to call multiple times; subsequent calls become no-ops.
pub fn init() {
    tracing::init(&ObservabilityConfig::default());
}
