//! Stream tables: one row per variant, rendered against the session cache

use crate::core::cache::SessionCache;
use crate::core::filter::FilterState;
use crate::core::manifest::StreamGroup;
use crate::core::variant::StreamVariant;
use crate::error::ResolveError;
use crate::resolve::{ResolveHandle, ResolveStatus, Resolver};
use crate::utils::mime::split_kind;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// What a row shows in its link column
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "value", rename_all = "lowercase")]
pub enum LinkState {
    /// Loading placeholder
    Pending,
    /// Playable URL
    Resolved(String),
    /// The row gave up; carries the reason
    Failed(String),
}

impl LinkState {
    /// Check whether the row has reached a final state
    pub fn is_settled(&self) -> bool {
        !matches!(self, LinkState::Pending)
    }
}

/// Rendered row
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RowView {
    pub itag: u32,
    /// "video" or "audio"
    pub mime_kind: String,
    /// Rest of the MIME type after the kind
    pub mime_rest: String,
    pub quality: String,
    pub bitrate: String,
    pub size: String,
    pub link: LinkState,
}

/// One variant's row; cancels its background resolution when dropped
pub struct Row {
    variant: StreamVariant,
    cancel: CancellationToken,
    in_flight: Option<ResolveHandle>,
    failure: Option<ResolveError>,
}

impl Row {
    pub fn new(variant: StreamVariant) -> Self {
        Self {
            variant,
            cancel: CancellationToken::new(),
            in_flight: None,
            failure: None,
        }
    }

    pub fn variant(&self) -> &StreamVariant {
        &self.variant
    }

    /// Token governing this row's retries
    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Current link state. Triggers resolution on a cache miss unless an
    /// attempt from an earlier render is still running.
    pub fn link(&mut self, resolver: &Resolver, cache: &SessionCache) -> LinkState {
        if let Some(failure) = &self.failure {
            return LinkState::Failed(failure.to_string());
        }

        let snapshot = cache.snapshot();
        if self.cancel.is_cancelled() {
            return match snapshot.lookup(self.variant.identity()) {
                Some(url) => LinkState::Resolved(url.to_string()),
                None => LinkState::Pending,
            };
        }
        if let Some(handle) = &mut self.in_flight {
            match handle.try_outcome() {
                None => {
                    return match snapshot.lookup(self.variant.identity()) {
                        Some(url) => LinkState::Resolved(url.to_string()),
                        None => LinkState::Pending,
                    };
                }
                Some(Err(e)) if !matches!(e, ResolveError::Cancelled) => {
                    debug!("Row for itag {} failed: {}", self.variant.itag, e);
                    self.in_flight = None;
                    self.failure = Some(e.clone());
                    return LinkState::Failed(e.to_string());
                }
                Some(_) => self.in_flight = None,
            }
        }

        match resolver.resolve(&self.variant, &snapshot, cache.updater(), &self.cancel) {
            ResolveStatus::Resolved(url) => LinkState::Resolved(url),
            ResolveStatus::Pending(handle) => {
                self.in_flight = Some(handle);
                LinkState::Pending
            }
            ResolveStatus::Unresolvable(e) => {
                let reason = e.to_string();
                self.failure = Some(e);
                LinkState::Failed(reason)
            }
        }
    }

    /// Render the full row
    pub fn render(&mut self, resolver: &Resolver, cache: &SessionCache) -> RowView {
        let link = self.link(resolver, cache);
        let variant = &self.variant;
        let (kind, rest) = split_kind(&variant.mime_type);
        RowView {
            itag: variant.itag,
            mime_kind: kind.to_string(),
            mime_rest: rest.to_string(),
            quality: variant.quality_string(),
            bitrate: variant.bitrate_string(),
            size: variant.size_string(),
            link,
        }
    }

    /// Stop any background retries for this row
    pub fn unmount(&mut self) {
        self.cancel.cancel();
        if let Some(handle) = self.in_flight.take() {
            handle.cancel();
        }
    }
}

impl Drop for Row {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Rendered table
#[derive(Debug, Clone, Serialize)]
pub struct TableView {
    pub group: StreamGroup,
    pub title: &'static str,
    pub filter: Option<&'static str>,
    pub rows: Vec<RowView>,
}

impl TableView {
    /// Check whether every visible row is resolved or failed
    pub fn is_settled(&self) -> bool {
        self.rows.iter().all(|r| r.link.is_settled())
    }
}

/// Table of one stream group with its filter bar
pub struct StreamsTable {
    group: StreamGroup,
    rows: Vec<Row>,
    filter: FilterState,
}

impl StreamsTable {
    pub fn new(group: StreamGroup, variants: &[StreamVariant]) -> Self {
        Self {
            group,
            rows: variants.iter().cloned().map(Row::new).collect(),
            filter: FilterState::new(),
        }
    }

    /// Toggle the filter at `index`
    pub fn toggle_filter(&mut self, index: usize) -> Option<usize> {
        self.filter.toggle(index)
    }

    /// Render the visible rows; hidden rows are not asked to resolve
    pub fn render(&mut self, resolver: &Resolver, cache: &SessionCache) -> TableView {
        let filter = self.filter;
        let rows = self
            .rows
            .iter_mut()
            .filter(|row| filter.accepts(row.variant()))
            .map(|row| row.render(resolver, cache))
            .collect();
        TableView {
            group: self.group,
            title: self.group.title(),
            filter: filter.active_filter().map(|f| f.label),
            rows,
        }
    }

    /// Stop background work for every row
    pub fn unmount(&mut self) {
        self.rows.iter_mut().for_each(Row::unmount);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EngineError;
    use crate::platform::DecipherEngine;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[derive(Default)]
    struct Suffix {
        calls: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl DecipherEngine for Suffix {
        async fn decode_signature(&self, cipher_text: &str) -> Result<String, EngineError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(format!("{}DEC", cipher_text))
        }

        async fn decode_token(&self, token: &str) -> Result<String, EngineError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if token == "BAD" {
                return Err(EngineError::InvalidInput("BAD".to_string()));
            }
            Ok(format!("{}DEC", token))
        }
    }

    fn variants() -> Vec<StreamVariant> {
        let mut video = StreamVariant::direct(22, "https://x.test/22?n=A", "video/mp4; codecs=\"avc1\"");
        video.height = Some(720);
        video.fps = Some(30);
        video.average_bitrate = Some(1_200_000);
        video.content_length = Some("5000000".to_string());
        vec![
            video,
            StreamVariant::direct(251, "https://x.test/251?n=B", "audio/webm; codecs=\"opus\""),
        ]
    }

    #[tokio::test]
    async fn test_row_pending_then_resolved() {
        let engine = Arc::new(Suffix::default());
        let resolver = Resolver::new(engine.clone());
        let cache = SessionCache::new();
        let mut row = Row::new(variants().remove(0));

        let view = row.render(&resolver, &cache);
        assert_eq!(view.link, LinkState::Pending);
        assert_eq!(view.mime_kind, "video");
        assert_eq!(view.mime_rest, "/mp4; codecs=\"avc1\"");
        assert_eq!(view.quality, "720p30fps");
        assert_eq!(view.bitrate, "1.200 Mbps");
        assert_eq!(view.size, "5.00 MB");

        row.in_flight.take().unwrap().join().await.unwrap();

        let view = row.render(&resolver, &cache);
        assert_eq!(view.link, LinkState::Resolved("https://x.test/22?n=ADEC".to_string()));

        row.render(&resolver, &cache);
        assert_eq!(engine.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_row_does_not_restart_in_flight_attempt() {
        let engine = Arc::new(Suffix::default());
        let resolver = Resolver::new(engine.clone());
        let cache = SessionCache::new();
        let mut row = Row::new(variants().remove(0));

        row.render(&resolver, &cache);
        row.render(&resolver, &cache);
        row.in_flight.take().unwrap().join().await.unwrap();

        assert_eq!(engine.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_row_unresolvable_fails_fast() {
        let resolver = Resolver::new(Arc::new(Suffix::default()));
        let cache = SessionCache::new();
        let mut row = Row::new(StreamVariant::default());

        assert!(matches!(row.link(&resolver, &cache), LinkState::Failed(_)));
        assert!(matches!(row.link(&resolver, &cache), LinkState::Failed(_)));
        assert!(cache.snapshot().is_empty());
    }

    #[tokio::test]
    async fn test_row_records_engine_rejection() {
        let resolver = Resolver::new(Arc::new(Suffix::default()));
        let cache = SessionCache::new();
        let mut row = Row::new(StreamVariant::direct(18, "https://x.test/18?n=BAD", "video/mp4"));

        assert_eq!(row.link(&resolver, &cache), LinkState::Pending);
        while !row.in_flight.as_ref().unwrap().is_finished() {
            tokio::task::yield_now().await;
        }
        assert!(matches!(row.link(&resolver, &cache), LinkState::Failed(_)));
        assert!(row.in_flight.is_none());
    }

    #[tokio::test]
    async fn test_unmounted_row_starts_no_new_work() {
        let engine = Arc::new(Suffix::default());
        let resolver = Resolver::new(engine.clone());
        let cache = SessionCache::new();
        let mut row = Row::new(variants().remove(0));

        row.unmount();
        for _ in 0..3 {
            assert_eq!(row.link(&resolver, &cache), LinkState::Pending);
        }
        assert!(row.in_flight.is_none());
        tokio::task::yield_now().await;
        assert_eq!(engine.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_unmount_cancels_in_flight_attempt() {
        let resolver = Resolver::new(Arc::new(Suffix::default()));
        let cache = SessionCache::new();
        let mut row = Row::new(variants().remove(0));

        assert_eq!(row.link(&resolver, &cache), LinkState::Pending);
        let token = row.cancel_token().clone();
        row.unmount();

        assert!(token.is_cancelled());
        assert!(row.in_flight.is_none());
    }

    #[tokio::test]
    async fn test_row_drop_cancels_token() {
        let row = Row::new(variants().remove(0));
        let token = row.cancel_token().clone();
        drop(row);
        assert!(token.is_cancelled());
    }

    #[tokio::test]
    async fn test_table_filter_limits_rendered_rows() {
        let engine = Arc::new(Suffix::default());
        let resolver = Resolver::new(engine.clone());
        let cache = SessionCache::new();
        let mut table = StreamsTable::new(StreamGroup::Adaptive, &variants());

        table.toggle_filter(8);
        let view = table.render(&resolver, &cache);
        assert_eq!(view.filter, Some("Opus"));
        assert_eq!(view.rows.len(), 1);
        assert_eq!(view.rows[0].itag, 251);
        assert_eq!(view.rows[0].quality, "(audio)");

        table.toggle_filter(8);
        let view = table.render(&resolver, &cache);
        assert_eq!(view.filter, None);
        assert_eq!(view.rows.len(), 2);
        assert!(!view.is_settled());

        table.unmount();
    }
}
