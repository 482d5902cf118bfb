//! Shared test utilities for the winopt workspace.
//!
//! Standard fixtures so the crate test suites do not each build their own
//! simulated machines. Dev-dependency only, never published.
//!
//! # Modules
//!
//! - [`host`]: pre-populated [`MemoryHost`](winopt_core::MemoryHost) fixtures and tier tables
//! - [`workspace`]: [`TestWorkspace`](workspace::TestWorkspace) with config, profiles and host state on disk

pub mod host;
pub mod workspace;

pub use host::{TELEMETRY_SERVICE, builtin_light_host, telemetry_host, telemetry_tiers};
pub use workspace::TestWorkspace;
