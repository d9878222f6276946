//! Provider decorators for Rivet.
//!
//! Concrete model clients implement `rivet_core::Provider` outside this
//! workspace. The decorators here wrap any of them.

pub mod usage;

pub use usage::{InMemoryUsageTracker, UsageRecord, UsageTracker, UsageTrackingProvider};
