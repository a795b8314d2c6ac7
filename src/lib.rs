//! # fmturl - stream URL resolution for YouTube player responses
//!
//! Turns the stream variants of a player response into playable URLs.
//!
//! ## Features
//!
//! - Signature cipher and `n` token decoding through a pluggable engine
//! - Per-session resolution cache with change notification
//! - Fixed-interval retry while the engine is still loading
//! - Codec/container filters and table rendering
//! - Embedded JavaScript engine for user-supplied decipher scripts
//!
//! ## Example
//!
//! ```rust,no_run
//! use fmturl::core::{Manifest, SessionCache};
//! use fmturl::platform::{ScriptEngine, ScriptSource};
//! use fmturl::resolve::{ResolveStatus, Resolver};
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let engine = ScriptEngine::load(&ScriptSource::parse("decipher.js")).await?;
//!     let resolver = Resolver::new(Arc::new(engine));
//!
//!     let manifest = Manifest::from_json(&std::fs::read_to_string("player.json")?)?;
//!     let cache = SessionCache::new();
//!     for (_, variants) in manifest.groups() {
//!         for variant in variants {
//!             let status = resolver.resolve(
//!                 variant,
//!                 &cache.snapshot(),
//!                 cache.updater(),
//!                 &CancellationToken::new(),
//!             );
//!             if let ResolveStatus::Pending(handle) = status {
//!                 println!("{}", handle.join().await?);
//!             }
//!         }
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod cli;
pub mod core;
pub mod error;
pub mod platform;
pub mod present;
pub mod resolve;
pub mod utils;

// Re-export main types
pub use crate::core::{Manifest, ResolutionCache, SessionCache, StreamSource, StreamVariant};
pub use error::{EngineError, ResolveError};
pub use platform::{DecipherEngine, DeferredEngine, ScriptEngine};
pub use resolve::{ResolveStatus, Resolver, RetryPolicy};

/// Result type alias for fmturl operations
pub type Result<T> = std::result::Result<T, ResolveError>;
