//! Presentation adapter: sessions, tables and rows

pub mod session;
pub mod table;

pub use session::*;
pub use table::*;
