//! One presentation session per fetched manifest

use crate::core::cache::SessionCache;
use crate::core::filter::find_filter;
use crate::core::manifest::{Manifest, VideoDetails};
use crate::present::table::{StreamsTable, TableView};
use crate::resolve::Resolver;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info};

/// Interval at which a waiting session re-renders even without cache changes,
/// so rows whose attempts failed are picked up
const SETTLE_POLL: Duration = Duration::from_millis(100);

/// Tables and cache for a single manifest.
///
/// Each session gets a fresh [`SessionCache`]; replacing a session drops its
/// rows, which cancels their retries, and stale writes land in the old cache.
pub struct Session {
    details: Option<VideoDetails>,
    has_streams: bool,
    cache: SessionCache,
    tables: Vec<StreamsTable>,
}

impl Session {
    /// Build a session for `manifest`
    pub fn new(manifest: &Manifest) -> Self {
        let tables: Vec<StreamsTable> = manifest
            .groups()
            .into_iter()
            .map(|(group, variants)| StreamsTable::new(group, variants))
            .collect();
        info!(
            "New session with {} tables, {} variants",
            tables.len(),
            manifest.variant_count()
        );
        Self {
            details: manifest.video_details.clone(),
            has_streams: manifest.has_streams(),
            cache: SessionCache::new(),
            tables,
        }
    }

    pub fn details(&self) -> Option<&VideoDetails> {
        self.details.as_ref()
    }

    /// False when the manifest had no stream data at all
    pub fn has_streams(&self) -> bool {
        self.has_streams
    }

    pub fn cache(&self) -> &SessionCache {
        &self.cache
    }

    /// Toggle the filter named `label` on every table
    pub fn toggle_filter(&mut self, label: &str) -> Option<usize> {
        let index = find_filter(label)?;
        for table in &mut self.tables {
            table.toggle_filter(index);
        }
        Some(index)
    }

    /// Render every table once
    pub fn render(&mut self, resolver: &Resolver) -> Vec<TableView> {
        let cache = &self.cache;
        self.tables
            .iter_mut()
            .map(|table| table.render(resolver, cache))
            .collect()
    }

    /// Re-render on every cache change until all visible rows have settled or
    /// `timeout` elapses; returns the last render
    pub async fn wait_until_settled(
        &mut self,
        resolver: &Resolver,
        timeout: Duration,
        mut on_render: impl FnMut(&[TableView]),
    ) -> Vec<TableView> {
        let deadline = Instant::now() + timeout;
        let mut changes = self.cache.subscribe();

        loop {
            let views = self.render(resolver);
            on_render(&views);
            if views.iter().all(TableView::is_settled) {
                debug!("All rows settled");
                return views;
            }

            tokio::select! {
                _ = changes.changed() => {}
                _ = tokio::time::sleep(SETTLE_POLL) => {}
                _ = tokio::time::sleep_until(deadline) => {
                    debug!("Timed out waiting for rows to settle");
                    return self.render(resolver);
                }
            }
        }
    }

    /// Stop every row's background work
    pub fn unmount(&mut self) {
        self.tables.iter_mut().for_each(StreamsTable::unmount);
    }
}
