//! Script-backed decipher engine
//!
//! Hosts a user-supplied JavaScript file in an embedded V8 runtime. The script
//! must define two global functions:
//!
//! - `deSC(s)`: decode a signature cipher's `s` field
//! - `getNToken(n)`: decode the rotating `n` query parameter
//!
//! `JsRuntime` is not `Send`, so it lives on a dedicated thread and is driven
//! through a request channel.

use crate::error::{EngineError, ScriptError};
use crate::platform::engine::DecipherEngine;
use deno_core::{FastString, JsRuntime, RuntimeOptions};
use moka::future::Cache;
use reqwest::Client;
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

/// Name of the signature function the script must export
pub const SIGNATURE_FUNCTION: &str = "deSC";
/// Name of the n-token function the script must export
pub const TOKEN_FUNCTION: &str = "getNToken";

/// Where to load the decipher script from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptSource {
    /// Local file
    File(PathBuf),
    /// http(s) URL
    Url(String),
}

impl ScriptSource {
    /// Treat http(s) references as URLs and anything else as a path
    pub fn parse(reference: &str) -> Self {
        let reference = reference.trim();
        if reference.starts_with("http://") || reference.starts_with("https://") {
            ScriptSource::Url(reference.to_string())
        } else {
            ScriptSource::File(PathBuf::from(reference))
        }
    }

    /// Read the script text
    pub async fn load(&self, client: &Client) -> Result<String, ScriptError> {
        match self {
            ScriptSource::File(path) => {
                debug!("Reading decipher script from {}", path.display());
                Ok(tokio::fs::read_to_string(path).await?)
            }
            ScriptSource::Url(url) => {
                debug!("Fetching decipher script from {}", url);
                let response = client.get(url).send().await?.error_for_status()?;
                Ok(response.text().await?)
            }
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Call {
    Signature,
    Token,
}

impl Call {
    fn function(&self) -> &'static str {
        match self {
            Call::Signature => SIGNATURE_FUNCTION,
            Call::Token => TOKEN_FUNCTION,
        }
    }

    fn cache_key(&self, input: &str) -> String {
        match self {
            Call::Signature => format!("s:{}", input),
            Call::Token => format!("n:{}", input),
        }
    }
}

struct Request {
    call: Call,
    input: String,
    reply: oneshot::Sender<Result<String, EngineError>>,
}

/// Decipher engine running a JavaScript script
#[derive(Debug)]
pub struct ScriptEngine {
    requests: mpsc::Sender<Request>,
    memo: Cache<String, String>,
}

impl ScriptEngine {
    /// Load the script from `source` and start the runtime
    pub async fn load(source: &ScriptSource) -> Result<Self, ScriptError> {
        Self::load_with_client(source, &Client::new()).await
    }

    /// Load the script using a caller-provided HTTP client
    pub async fn load_with_client(
        source: &ScriptSource,
        client: &Client,
    ) -> Result<Self, ScriptError> {
        let code = source.load(client).await?;
        Self::from_code(code).await
    }

    /// Start the runtime on the given script text
    pub async fn from_code(code: String) -> Result<Self, ScriptError> {
        let (tx, rx) = mpsc::channel(64);
        let (ready_tx, ready_rx) = oneshot::channel();

        std::thread::Builder::new()
            .name("decipher-js".to_string())
            .spawn(move || run_runtime(code, rx, ready_tx))?;

        ready_rx
            .await
            .map_err(|_| ScriptError::Evaluation("script runtime exited during startup".to_string()))??;
        info!("Decipher script loaded");

        Ok(Self {
            requests: tx,
            memo: Cache::builder()
                .max_capacity(4096)
                .time_to_live(Duration::from_secs(3600))
                .build(),
        })
    }

    async fn call(&self, call: Call, input: &str) -> Result<String, EngineError> {
        let key = call.cache_key(input);
        if let Some(hit) = self.memo.get(&key).await {
            debug!("{} cache hit", call.function());
            return Ok(hit);
        }

        let (reply, response) = oneshot::channel();
        self.requests
            .send(Request {
                call,
                input: input.to_string(),
                reply,
            })
            .await
            .map_err(|_| EngineError::Internal("script runtime stopped".to_string()))?;

        let output = response
            .await
            .map_err(|_| EngineError::Internal("script runtime dropped the request".to_string()))??;
        self.memo.insert(key, output.clone()).await;
        Ok(output)
    }
}

#[async_trait::async_trait]
impl DecipherEngine for ScriptEngine {
    async fn decode_signature(&self, cipher_text: &str) -> Result<String, EngineError> {
        self.call(Call::Signature, cipher_text).await
    }

    async fn decode_token(&self, token: &str) -> Result<String, EngineError> {
        self.call(Call::Token, token).await
    }
}

fn run_runtime(
    code: String,
    mut requests: mpsc::Receiver<Request>,
    ready: oneshot::Sender<Result<(), ScriptError>>,
) {
    let rt = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            let _ = ready.send(Err(ScriptError::Io(e)));
            return;
        }
    };
    let _guard = rt.enter();

    let mut runtime = JsRuntime::new(RuntimeOptions::default());
    if let Err(e) = prepare(&mut runtime, code) {
        warn!("Decipher script rejected: {}", e);
        let _ = ready.send(Err(e));
        return;
    }
    if ready.send(Ok(())).is_err() {
        return;
    }

    while let Some(request) = rt.block_on(requests.recv()) {
        let result = invoke(&mut runtime, request.call.function(), &request.input);
        let _ = request.reply.send(result);
    }
    debug!("Decipher script runtime shutting down");
}

fn prepare(runtime: &mut JsRuntime, code: String) -> Result<(), ScriptError> {
    runtime
        .execute_script("<decipher>", FastString::from(code))
        .map_err(|e| ScriptError::Evaluation(format!("{:?}", e)))?;

    for name in [SIGNATURE_FUNCTION, TOKEN_FUNCTION] {
        let check = format!("String(typeof globalThis.{} === 'function')", name);
        let defined = eval_to_string(runtime, check)
            .map_err(|e| ScriptError::Evaluation(format!("{:?}", e)))?;
        if defined != "true" {
            return Err(ScriptError::MissingFunction(name));
        }
    }
    Ok(())
}

fn invoke(runtime: &mut JsRuntime, function: &str, input: &str) -> Result<String, EngineError> {
    let literal =
        serde_json::to_string(input).map_err(|e| EngineError::InvalidInput(e.to_string()))?;
    let call = format!(
        "(() => {{ const out = {f}({arg}); \
         if (typeof out !== 'string') throw new TypeError('{f} returned ' + typeof out); \
         return out; }})()",
        f = function,
        arg = literal
    );
    eval_to_string(runtime, call).map_err(|e| {
        debug!("{} threw: {:?}", function, e);
        EngineError::InvalidInput(format!("{} failed: {}", function, e))
    })
}

fn eval_to_string(runtime: &mut JsRuntime, code: String) -> Result<String, deno_core::error::AnyError> {
    let result = runtime.execute_script("<call>", FastString::from(code))?;
    let scope = &mut runtime.handle_scope();
    let local_value = result.open(scope);
    Ok(local_value.to_rust_string_lossy(scope))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCRIPT: &str = r#"
        var calls = 0;
        function deSC(s) { calls++; return s.split("").reverse().join(""); }
        function getNToken(n) {
            if (n === "bad") throw new Error("unexpected token");
            return n + "-ok";
        }
    "#;

    #[test]
    fn test_script_source_parse() {
        assert_eq!(
            ScriptSource::parse("https://x.test/base.js"),
            ScriptSource::Url("https://x.test/base.js".to_string())
        );
        assert_eq!(
            ScriptSource::parse(" ./decipher.js "),
            ScriptSource::File(PathBuf::from("./decipher.js"))
        );
    }

    #[tokio::test]
    async fn test_inline_script_decodes() {
        let engine = ScriptEngine::from_code(SCRIPT.to_string()).await.unwrap();
        assert_eq!(engine.decode_signature("abc").await.unwrap(), "cba");
        assert_eq!(engine.decode_token("TOK").await.unwrap(), "TOK-ok");
    }

    #[tokio::test]
    async fn test_script_exception_is_invalid_input() {
        let engine = ScriptEngine::from_code(SCRIPT.to_string()).await.unwrap();
        let err = engine.decode_token("bad").await.unwrap_err();
        assert!(matches!(err, EngineError::InvalidInput(_)));
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn test_inputs_are_escaped() {
        let engine = ScriptEngine::from_code(SCRIPT.to_string()).await.unwrap();
        assert_eq!(
            engine.decode_signature("a\"b'c\\").await.unwrap(),
            "\\c'b\"a"
        );
    }

    #[tokio::test]
    async fn test_missing_function_rejected() {
        let result = ScriptEngine::from_code("function deSC(s) { return s; }".to_string()).await;
        assert!(matches!(
            result,
            Err(ScriptError::MissingFunction(TOKEN_FUNCTION))
        ));
    }

    #[tokio::test]
    async fn test_syntax_error_rejected() {
        let result = ScriptEngine::from_code("function (".to_string()).await;
        assert!(matches!(result, Err(ScriptError::Evaluation(_))));
    }
}
