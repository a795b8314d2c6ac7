//! Transport-agnostic request handlers

pub mod fmt_url;

pub use fmt_url::*;
