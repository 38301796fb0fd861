//! Command implementations.

pub mod pipeline;
pub mod status;
pub mod version;
