//! Utility functions for fmturl

pub mod mime;
pub mod units;
pub mod url;

pub use mime::*;
pub use units::*;
pub use self::url::*;
