//! Shared domain types for labenv.
//!
//! Everything in this crate is plain data: base image identities and their
//! families, bundle definitions, host architecture and platform modes,
//! pinned runtime versions, and the partially-filled profile selection that
//! flows through the resolution pipeline. No I/O happens here.

pub mod arch;
pub mod bundle;
pub mod family;
pub mod profile;
pub mod version;

// Re-exports
pub use arch::*;
pub use bundle::*;
pub use family::*;
pub use profile::ProfileSelection;
pub use version::*;

/// Base image used when neither the caller nor the config names one.
pub const DEFAULT_BASE_IMAGE: &str = "rocker/r-ver";
