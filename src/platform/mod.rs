//! Decipher engine contract and adapters

pub mod engine;
pub mod script;

pub use engine::*;
pub use script::*;
