//! Stream URL resolver
//!
//! Turns a [`StreamVariant`] into a playable URL. Lookup is cheap and
//! synchronous, so callers may invoke [`Resolver::resolve`] on every render;
//! decoding only starts on a cache miss and runs as a background task that
//! writes its result through the caller's upsert callback.

use crate::core::cache::{ResolutionCache, Upsert};
use crate::core::variant::{StreamSource, StreamVariant};
use crate::error::{EngineError, ResolveError};
use crate::platform::engine::DecipherEngine;
use crate::resolve::retry::RetryPolicy;
use crate::utils::url::{normalize_query, query_param, replace_query_param};
use futures::FutureExt;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

/// Name of the rotating token query parameter
pub const TOKEN_PARAM: &str = "n";

/// Outcome of a single `resolve` call
#[derive(Debug)]
pub enum ResolveStatus {
    /// Cache hit
    Resolved(String),
    /// Resolution running in the background
    Pending(ResolveHandle),
    /// The variant can never produce a URL; nothing was scheduled
    Unresolvable(ResolveError),
}

impl ResolveStatus {
    pub fn is_pending(&self) -> bool {
        matches!(self, ResolveStatus::Pending(_))
    }

    /// Resolved URL, if this was a cache hit
    pub fn url(&self) -> Option<&str> {
        match self {
            ResolveStatus::Resolved(url) => Some(url),
            _ => None,
        }
    }
}

/// Handle to a background resolution
#[derive(Debug)]
pub struct ResolveHandle {
    task: JoinHandle<Result<String, ResolveError>>,
    cancel: CancellationToken,
}

impl ResolveHandle {
    /// Stop retrying; an attempt already past its last suspension point may still write
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Take the outcome if the task has already finished
    pub fn try_outcome(&mut self) -> Option<Result<String, ResolveError>> {
        if !self.task.is_finished() {
            return None;
        }
        (&mut self.task).now_or_never().map(join_outcome)
    }

    /// Wait for the background task
    pub async fn join(self) -> Result<String, ResolveError> {
        join_outcome(self.task.await)
    }
}

fn join_outcome(
    joined: Result<Result<String, ResolveError>, tokio::task::JoinError>,
) -> Result<String, ResolveError> {
    match joined {
        Ok(outcome) => outcome,
        Err(e) if e.is_cancelled() => Err(ResolveError::Cancelled),
        Err(e) => Err(ResolveError::Engine(EngineError::Internal(e.to_string()))),
    }
}

/// Resolves stream variants against an injected decipher engine
#[derive(Clone)]
pub struct Resolver {
    engine: Arc<dyn DecipherEngine>,
    retry: RetryPolicy,
}

impl Resolver {
    /// Create a resolver with the default retry policy (1s, unbounded)
    pub fn new(engine: Arc<dyn DecipherEngine>) -> Self {
        Self {
            engine,
            retry: RetryPolicy::default(),
        }
    }

    /// Set retry policy
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Set retry interval
    pub fn with_retry_interval(mut self, interval: Duration) -> Self {
        self.retry.interval = interval;
        self
    }

    /// Cap retries; zero means unbounded
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.retry.max_attempts = (max_attempts > 0).then_some(max_attempts);
        self
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    /// Look up `variant` in `cache`, starting background resolution on a miss.
    ///
    /// Returns immediately. On success the background task calls
    /// `upsert(identity, url)`. Retryable engine failures are retried per the
    /// retry policy until `cancel` fires; permanent failures end the task.
    /// Must be called from within a tokio runtime.
    pub fn resolve(
        &self,
        variant: &StreamVariant,
        cache: &ResolutionCache,
        upsert: Upsert,
        cancel: &CancellationToken,
    ) -> ResolveStatus {
        let identity = variant.identity();
        if identity.is_empty() {
            debug!("itag {} has neither url nor signatureCipher", variant.itag);
            return ResolveStatus::Unresolvable(ResolveError::Unresolvable);
        }

        if let Some(url) = cache.lookup(identity) {
            debug!("Cache hit for itag {}", variant.itag);
            return ResolveStatus::Resolved(url.to_string());
        }

        let source = match variant.source() {
            Ok(source) => source,
            Err(e) => {
                warn!("itag {} cannot be resolved: {}", variant.itag, e);
                return ResolveStatus::Unresolvable(e);
            }
        };

        debug!(
            "Cache miss for itag {} ({}), resolving",
            variant.itag,
            if variant.needs_deciphering() { "ciphered" } else { "direct" }
        );
        let identity = identity.to_string();
        let itag = variant.itag;
        let engine = self.engine.clone();
        let retry = self.retry.clone();
        let cancel = cancel.child_token();
        let task_cancel = cancel.clone();

        let task = tokio::spawn(async move {
            let engine_ref: &dyn DecipherEngine = engine.as_ref();
            let source_ref = &source;
            let outcome = retry
                .run(&task_cancel, move |attempt| {
                    debug!("Resolving itag {} (attempt {})", itag, attempt);
                    resolve_source(engine_ref, source_ref)
                })
                .await;

            match outcome {
                Ok(url) => {
                    info!("Resolved itag {}", itag);
                    upsert(identity, url.clone());
                    Ok(url)
                }
                Err(ResolveError::Cancelled) => {
                    debug!("Resolution of itag {} cancelled", itag);
                    Err(ResolveError::Cancelled)
                }
                Err(e) => {
                    warn!("Resolution of itag {} failed: {}", itag, e);
                    Err(e)
                }
            }
        });

        ResolveStatus::Pending(ResolveHandle { task, cancel })
    }

}

impl std::fmt::Debug for Resolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resolver").field("retry", &self.retry).finish()
    }
}

/// Build the final URL: decipher the signature if needed, then decode `n` in place
pub async fn resolve_source(
    engine: &dyn DecipherEngine,
    source: &StreamSource,
) -> Result<String, ResolveError> {
    let base = match source {
        StreamSource::Direct(url) => url.clone(),
        StreamSource::Ciphered(fields) => {
            let signature = engine.decode_signature(&fields.s).await?;
            format!("{}&{}={}", fields.url, fields.sp, signature)
        }
    };

    let mut parsed = Url::parse(&base)?;
    match query_param(&parsed, TOKEN_PARAM) {
        Some(token) => {
            let decoded = engine.decode_token(&token).await?;
            replace_query_param(&mut parsed, TOKEN_PARAM, &decoded);
        }
        None => {
            debug!("No {} parameter to decode", TOKEN_PARAM);
            normalize_query(&mut parsed);
        }
    }
    Ok(parsed.into())
}
