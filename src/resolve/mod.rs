//! Stream URL resolution

pub mod resolver;
pub mod retry;

pub use resolver::*;
pub use retry::*;
