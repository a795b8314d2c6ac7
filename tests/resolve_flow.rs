//! End-to-end resolution through the public API

use fmturl::core::{FilterState, SessionCache, StreamVariant};
use fmturl::error::{EngineError, ResolveError};
use fmturl::platform::DecipherEngine;
use fmturl::resolve::{ResolveStatus, Resolver};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_test::{assert_err, assert_ok};
use tokio_util::sync::CancellationToken;

/// Engine that appends "DEC", counts calls and fails on a programmed schedule
#[derive(Default)]
struct MockEngine {
    signature_calls: AtomicUsize,
    token_calls: AtomicUsize,
    failures: Mutex<VecDeque<EngineError>>,
}

impl MockEngine {
    fn failing_with(failures: impl IntoIterator<Item = EngineError>) -> Self {
        Self {
            failures: Mutex::new(failures.into_iter().collect()),
            ..Default::default()
        }
    }

    fn next_failure(&self) -> Option<EngineError> {
        self.failures.lock().unwrap().pop_front()
    }

    fn calls(&self) -> usize {
        self.signature_calls.load(Ordering::SeqCst) + self.token_calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl DecipherEngine for MockEngine {
    async fn decode_signature(&self, cipher_text: &str) -> Result<String, EngineError> {
        self.signature_calls.fetch_add(1, Ordering::SeqCst);
        match self.next_failure() {
            Some(e) => Err(e),
            None => Ok(format!("{}DEC", cipher_text)),
        }
    }

    async fn decode_token(&self, token: &str) -> Result<String, EngineError> {
        self.token_calls.fetch_add(1, Ordering::SeqCst);
        match self.next_failure() {
            Some(e) => Err(e),
            None => Ok(format!("{}DEC", token)),
        }
    }
}

const CIPHER: &str = "s=SIG&sp=sig&url=https%3A%2F%2Fx.test%2Fv%3Fn%3DTOK";

fn resolve_now(resolver: &Resolver, variant: &StreamVariant, cache: &SessionCache) -> ResolveStatus {
    resolver.resolve(variant, &cache.snapshot(), cache.updater(), &CancellationToken::new())
}

async fn resolve_to_completion(
    resolver: &Resolver,
    variant: &StreamVariant,
    cache: &SessionCache,
) -> Result<String, ResolveError> {
    match resolve_now(resolver, variant, cache) {
        ResolveStatus::Resolved(url) => Ok(url),
        ResolveStatus::Pending(handle) => handle.join().await,
        ResolveStatus::Unresolvable(e) => Err(e),
    }
}

#[tokio::test]
async fn test_ciphered_variant_resolves_to_expected_url() {
    let engine = Arc::new(MockEngine::default());
    let resolver = Resolver::new(engine.clone());
    let cache = SessionCache::new();
    let variant = StreamVariant::ciphered(137, CIPHER, "video/mp4; codecs=\"avc1\"");

    let url = assert_ok!(resolve_to_completion(&resolver, &variant, &cache).await);

    assert_eq!(url, "https://x.test/v?n=TOKDEC&sig=SIGDEC");
    assert_eq!(cache.lookup(CIPHER).as_deref(), Some(url.as_str()));
    assert_eq!(engine.signature_calls.load(Ordering::SeqCst), 1);
    assert_eq!(engine.token_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_direct_variant_only_decodes_token() {
    let engine = Arc::new(MockEngine::default());
    let resolver = Resolver::new(engine.clone());
    let cache = SessionCache::new();
    let variant = StreamVariant::direct(18, "https://x.test/a?n=TOK", "video/mp4");

    let url = assert_ok!(resolve_to_completion(&resolver, &variant, &cache).await);

    assert_eq!(url, "https://x.test/a?n=TOKDEC");
    assert_eq!(engine.signature_calls.load(Ordering::SeqCst), 0);
    assert_eq!(engine.token_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_cached_variant_makes_no_engine_calls() {
    let engine = Arc::new(MockEngine::default());
    let resolver = Resolver::new(engine.clone());
    let cache = SessionCache::new();
    let variant = StreamVariant::ciphered(137, CIPHER, "video/mp4");

    assert_ok!(resolve_to_completion(&resolver, &variant, &cache).await);
    let calls = engine.calls();

    for _ in 0..10 {
        assert!(matches!(
            resolve_now(&resolver, &variant, &cache),
            ResolveStatus::Resolved(_)
        ));
    }
    assert_eq!(engine.calls(), calls);
}

#[tokio::test]
async fn test_resolving_twice_yields_same_url() {
    let resolver = Resolver::new(Arc::new(MockEngine::default()));
    let variant = StreamVariant::ciphered(137, CIPHER, "video/mp4");

    let cache = SessionCache::new();
    let first = assert_ok!(resolve_to_completion(&resolver, &variant, &cache).await);
    let second = assert_ok!(resolve_to_completion(&resolver, &variant, &cache).await);
    assert_eq!(first, second);

    let fresh = SessionCache::new();
    let third = assert_ok!(resolve_to_completion(&resolver, &variant, &fresh).await);
    assert_eq!(first, third);
}

#[tokio::test(start_paused = true)]
async fn test_retry_fills_cache_only_after_interval() {
    let engine = Arc::new(MockEngine::failing_with([EngineError::NotReady(
        "loading".to_string(),
    )]));
    let resolver = Resolver::new(engine.clone());
    let cache = SessionCache::new();
    let variant = StreamVariant::direct(18, "https://x.test/a?n=TOK", "video/mp4");

    let status = resolve_now(&resolver, &variant, &cache);
    assert!(status.is_pending());

    tokio::time::sleep(Duration::from_millis(900)).await;
    assert!(cache.snapshot().is_empty());
    assert_eq!(engine.token_calls.load(Ordering::SeqCst), 1);

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(
        cache.lookup(variant.identity()).as_deref(),
        Some("https://x.test/a?n=TOKDEC")
    );
    assert_eq!(engine.token_calls.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn test_cancelled_retry_never_writes() {
    let engine = Arc::new(MockEngine::failing_with(
        (0..5).map(|_| EngineError::NotReady("loading".to_string())),
    ));
    let resolver = Resolver::new(engine.clone());
    let cache = SessionCache::new();
    let variant = StreamVariant::direct(18, "https://x.test/a?n=TOK", "video/mp4");
    let cancel = CancellationToken::new();

    let ResolveStatus::Pending(handle) =
        resolver.resolve(&variant, &cache.snapshot(), cache.updater(), &cancel)
    else {
        panic!("expected pending");
    };

    tokio::time::sleep(Duration::from_millis(1500)).await;
    cancel.cancel();

    assert_eq!(assert_err!(handle.join().await), ResolveError::Cancelled);
    assert!(cache.snapshot().is_empty());
    assert_eq!(engine.token_calls.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn test_attempt_cap_reports_exhaustion() {
    let engine = Arc::new(MockEngine::failing_with(
        (0..10).map(|_| EngineError::Internal("crashed".to_string())),
    ));
    let resolver = Resolver::new(engine.clone()).with_max_attempts(3);
    let cache = SessionCache::new();
    let variant = StreamVariant::direct(18, "https://x.test/a?n=TOK", "video/mp4");

    let err = assert_err!(resolve_to_completion(&resolver, &variant, &cache).await);

    assert_eq!(err, ResolveError::AttemptsExhausted(3));
    assert_eq!(engine.token_calls.load(Ordering::SeqCst), 3);
    assert!(cache.snapshot().is_empty());
}

#[tokio::test]
async fn test_engine_rejection_is_not_retried() {
    let engine = Arc::new(MockEngine::failing_with([EngineError::InvalidInput(
        "garbage".to_string(),
    )]));
    let resolver = Resolver::new(engine.clone());
    let cache = SessionCache::new();
    let variant = StreamVariant::direct(18, "https://x.test/a?n=TOK", "video/mp4");

    let err = assert_err!(resolve_to_completion(&resolver, &variant, &cache).await);

    assert!(err.is_permanent());
    assert_eq!(engine.calls(), 1);
    assert!(cache.snapshot().is_empty());
}

#[tokio::test]
async fn test_unresolvable_variant_is_reported_distinctly() {
    let engine = Arc::new(MockEngine::default());
    let resolver = Resolver::new(engine.clone());
    let cache = SessionCache::new();
    let variant = StreamVariant {
        itag: 140,
        mime_type: "audio/mp4; codecs=\"mp4a.40.2\"".to_string(),
        ..Default::default()
    };

    for _ in 0..3 {
        assert!(matches!(
            resolve_now(&resolver, &variant, &cache),
            ResolveStatus::Unresolvable(ResolveError::Unresolvable)
        ));
    }
    assert_eq!(engine.calls(), 0);
    assert!(cache.snapshot().is_empty());
}

#[tokio::test]
async fn test_concurrent_resolutions_keep_every_entry() {
    let resolver = Resolver::new(Arc::new(MockEngine::default()));
    let cache = SessionCache::new();
    let variants: Vec<StreamVariant> = (0..32)
        .map(|i| StreamVariant::direct(i, &format!("https://x.test/{}?n=T{}", i, i), "video/mp4"))
        .collect();

    let handles: Vec<_> = variants
        .iter()
        .filter_map(|v| match resolve_now(&resolver, v, &cache) {
            ResolveStatus::Pending(handle) => Some(handle.join()),
            _ => None,
        })
        .collect();
    for outcome in futures::future::join_all(handles).await {
        assert_ok!(outcome);
    }

    let snapshot = cache.snapshot();
    assert_eq!(snapshot.len(), 32);
    for (i, variant) in variants.iter().enumerate() {
        assert_eq!(
            snapshot.lookup(variant.identity()),
            Some(format!("https://x.test/{}?n=T{}DEC", i, i).as_str())
        );
    }
}

#[test]
fn test_filter_toggle_restores_full_list() {
    let variants = vec![
        StreamVariant::direct(18, "https://x.test/18", "video/mp4; codecs=\"avc1.42001E, mp4a.40.2\""),
        StreamVariant::direct(248, "https://x.test/248", "video/webm; codecs=\"vp9\""),
        StreamVariant::direct(251, "https://x.test/251", "audio/webm; codecs=\"opus\""),
    ];
    let mut filter = FilterState::new();

    assert_eq!(filter.toggle(1), Some(1));
    let itags: Vec<u32> = filter.apply(&variants).iter().map(|v| v.itag).collect();
    assert_eq!(itags, vec![248, 251]);

    assert_eq!(filter.toggle(1), None);
    assert_eq!(filter.apply(&variants).len(), 3);
}
