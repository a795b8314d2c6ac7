//! Codec and container filters for stream tables

use crate::core::variant::StreamVariant;

/// A single filter rule: a label and the substring it looks for in the MIME type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamFilter {
    /// Label shown to the user
    pub label: &'static str,
    /// Substring matched against the MIME type
    pub matcher: &'static str,
}

impl StreamFilter {
    /// Check whether a variant belongs to this family
    pub fn matches(&self, variant: &StreamVariant) -> bool {
        variant.mime_type.contains(self.matcher)
    }
}

/// Entry of the filter bar
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterEntry {
    Rule(StreamFilter),
    /// Visual group break; never selectable
    Separator,
}

const fn rule(label: &'static str, matcher: &'static str) -> FilterEntry {
    FilterEntry::Rule(StreamFilter { label, matcher })
}

/// Filter bar in display order: containers, video codecs, audio codecs
pub const FILTERS: &[FilterEntry] = &[
    rule("MP4", "mp4"),
    rule("WebM", "webm"),
    FilterEntry::Separator,
    rule("H.264", "avc1"),
    rule("VP9", "vp9"),
    rule("AV1", "av01"),
    FilterEntry::Separator,
    rule("AAC", "mp4a"),
    rule("Opus", "opus"),
];

/// Get the rule at `index`, skipping separators
pub fn filter_at(index: usize) -> Option<&'static StreamFilter> {
    match FILTERS.get(index) {
        Some(FilterEntry::Rule(filter)) => Some(filter),
        _ => None,
    }
}

/// Find a rule's index by label (case-insensitive) or by matcher
pub fn find_filter(name: &str) -> Option<usize> {
    let name = name.trim();
    FILTERS.iter().position(|entry| match entry {
        FilterEntry::Rule(f) => f.label.eq_ignore_ascii_case(name) || f.matcher == name,
        FilterEntry::Separator => false,
    })
}

/// At most one active filter, with toggle semantics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FilterState {
    active: Option<usize>,
}

impl FilterState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Select `index`, or clear it if it is already active.
    /// Separators and out-of-range indexes leave the state unchanged.
    pub fn toggle(&mut self, index: usize) -> Option<usize> {
        if filter_at(index).is_some() {
            self.active = if self.active == Some(index) {
                None
            } else {
                Some(index)
            };
        }
        self.active
    }

    /// Index of the active filter
    pub fn active(&self) -> Option<usize> {
        self.active
    }

    /// The active rule
    pub fn active_filter(&self) -> Option<&'static StreamFilter> {
        self.active.and_then(filter_at)
    }

    /// Check a single variant against the active filter
    pub fn accepts(&self, variant: &StreamVariant) -> bool {
        self.active_filter().map_or(true, |f| f.matches(variant))
    }

    /// Variants passing the active filter, in their original order
    pub fn apply<'a>(&self, variants: &'a [StreamVariant]) -> Vec<&'a StreamVariant> {
        variants.iter().filter(|v| self.accepts(v)).collect()
    }
}
