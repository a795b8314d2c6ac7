//! Core data model for fmturl

pub mod cache;
pub mod filter;
pub mod manifest;
pub mod variant;

pub use cache::*;
pub use filter::*;
pub use manifest::*;
pub use variant::*;
