//! Data models for the GMR backend.
//!
//! Field names are camelCase on the wire to match the frontend.

mod edit;
mod rollback;
mod system;

pub use edit::*;
pub use rollback::*;
pub use system::*;
