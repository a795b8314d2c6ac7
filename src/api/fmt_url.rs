//! fmt-URL delegation handler
//!
//! Server-side counterpart of the resolver: takes one manifest entry plus the
//! URL of the script the decipher engine is built from, and answers with the
//! resolved URL as plain text. Transport-agnostic; callers map the returned
//! status and body onto their HTTP stack.

use crate::core::variant::StreamVariant;
use crate::error::{EngineError, ResolveError};
use crate::platform::engine::DecipherEngine;
use crate::platform::script::{ScriptEngine, ScriptSource};
use crate::resolve::resolve_source;
use moka::future::Cache;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Request body: `{ "fmt": {...}, "basejsURL": "..." }`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FmtUrlRequest {
    #[serde(default)]
    pub fmt: Option<serde_json::Value>,
    #[serde(default, rename = "basejsURL")]
    pub basejs_url: Option<String>,
}

/// Rejections and failures of the delegation handler
#[derive(Debug, Error)]
pub enum DelegateError {
    #[error("fmt needed")]
    MissingFmt,

    #[error("fmt needs [\"url\"] or [\"signatureCipher\"]")]
    MissingSource,

    #[error("basejs needed")]
    MissingBaseJs,

    #[error("invalid request body: {0}")]
    BadRequest(String),

    #[error("{0}")]
    Resolve(#[from] ResolveError),
}

impl DelegateError {
    /// HTTP status for this error
    pub fn status(&self) -> StatusCode {
        match self {
            DelegateError::MissingFmt
            | DelegateError::MissingSource
            | DelegateError::MissingBaseJs
            | DelegateError::BadRequest(_) => StatusCode::BAD_REQUEST,
            DelegateError::Resolve(ResolveError::MalformedCipher(_))
            | DelegateError::Resolve(ResolveError::InvalidUrl(_))
            | DelegateError::Resolve(ResolveError::Unresolvable) => StatusCode::BAD_REQUEST,
            DelegateError::Resolve(ResolveError::Engine(EngineError::InvalidInput(_))) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            DelegateError::Resolve(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

fn is_blank(value: Option<&serde_json::Value>) -> bool {
    match value {
        None | Some(serde_json::Value::Null) => true,
        Some(serde_json::Value::String(s)) => s.is_empty(),
        Some(_) => false,
    }
}

impl FmtUrlRequest {
    /// Check the request in the order the route does: fmt, its source, then basejsURL
    pub fn validate(&self) -> Result<(StreamVariant, &str), DelegateError> {
        let fmt = match &self.fmt {
            None | Some(serde_json::Value::Null) => return Err(DelegateError::MissingFmt),
            Some(fmt) => fmt,
        };
        if is_blank(fmt.get("url")) && is_blank(fmt.get("signatureCipher")) {
            return Err(DelegateError::MissingSource);
        }
        let basejs_url = self
            .basejs_url
            .as_deref()
            .filter(|u| !u.is_empty())
            .ok_or(DelegateError::MissingBaseJs)?;

        let variant: StreamVariant = serde_json::from_value(fmt.clone())
            .map_err(|e| DelegateError::BadRequest(e.to_string()))?;
        Ok((variant, basejs_url))
    }
}

/// Supplies a decipher engine for a given base-script URL
#[async_trait::async_trait]
pub trait EngineProvider: Send + Sync {
    async fn engine_for(&self, basejs_url: &str) -> Result<Arc<dyn DecipherEngine>, EngineError>;
}

/// Provider that loads one [`ScriptEngine`] per script URL and keeps it warm
pub struct ScriptEngineProvider {
    client: Client,
    engines: Cache<String, Arc<ScriptEngine>>,
}

impl ScriptEngineProvider {
    pub fn new() -> Self {
        Self::with_client(Client::new())
    }

    pub fn with_client(client: Client) -> Self {
        Self {
            client,
            engines: Cache::builder()
                .max_capacity(16)
                .time_to_live(Duration::from_secs(600))
                .build(),
        }
    }
}

impl Default for ScriptEngineProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl EngineProvider for ScriptEngineProvider {
    async fn engine_for(&self, basejs_url: &str) -> Result<Arc<dyn DecipherEngine>, EngineError> {
        let source = ScriptSource::parse(basejs_url);
        let client = self.client.clone();
        let engine = self
            .engines
            .try_get_with(basejs_url.to_string(), async move {
                info!("Loading decipher script for {:?}", source);
                ScriptEngine::load_with_client(&source, &client)
                    .await
                    .map(Arc::new)
            })
            .await
            .map_err(|e| EngineError::Internal(e.to_string()))?;
        Ok(engine)
    }
}

/// The delegation handler
pub struct FmtUrlHandler<P> {
    provider: P,
}

impl<P: EngineProvider> FmtUrlHandler<P> {
    pub fn new(provider: P) -> Self {
        Self { provider }
    }

    /// Handle a raw JSON body, returning status and plain-text body
    pub async fn handle(&self, body: &str) -> (StatusCode, String) {
        match self.try_handle(body).await {
            Ok(url) => (StatusCode::OK, url),
            Err(e) => {
                warn!("fmt-URL request rejected: {}", e);
                (e.status(), e.to_string())
            }
        }
    }

    /// Handle a raw JSON body
    pub async fn try_handle(&self, body: &str) -> Result<String, DelegateError> {
        let request: FmtUrlRequest =
            serde_json::from_str(body).map_err(|e| DelegateError::BadRequest(e.to_string()))?;
        self.handle_request(&request).await
    }

    /// Handle a parsed request
    pub async fn handle_request(&self, request: &FmtUrlRequest) -> Result<String, DelegateError> {
        let (variant, basejs_url) = request.validate()?;
        debug!("Resolving itag {} with script {}", variant.itag, basejs_url);

        let engine = self
            .provider
            .engine_for(basejs_url)
            .await
            .map_err(ResolveError::from)?;
        let source = variant.source()?;
        Ok(resolve_source(engine.as_ref(), &source).await?)
    }
}
