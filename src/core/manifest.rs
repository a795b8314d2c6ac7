//! Player response manifest as returned by the metadata fetch

use crate::core::variant::StreamVariant;
use serde::{Deserialize, Serialize};

/// Player response subset the resolver cares about
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    /// Basic video metadata
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_details: Option<VideoDetails>,
    /// Stream lists; absent when the video has no playable streams
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub streaming_data: Option<StreamingData>,
}

/// Video metadata shown above the stream tables
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoDetails {
    #[serde(default)]
    pub video_id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub author: String,
    /// Duration in seconds, carried as a string by the platform
    #[serde(default)]
    pub length_seconds: Option<String>,
}

/// Stream lists grouped by kind
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamingData {
    /// Combined audio+video streams
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub formats: Option<Vec<StreamVariant>>,
    /// Split audio-only and video-only streams
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub adaptive_formats: Option<Vec<StreamVariant>>,
}

/// Named stream group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamGroup {
    /// Video and audio in one stream
    Combined,
    /// Video and audio in separate streams
    Adaptive,
}

impl StreamGroup {
    pub fn title(&self) -> &'static str {
        match self {
            StreamGroup::Combined => "Combined (video and audio in one stream)",
            StreamGroup::Adaptive => "Adaptive (video and audio split)",
        }
    }
}

impl Manifest {
    /// Parse a player response JSON document
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Check if the manifest carries any stream data
    pub fn has_streams(&self) -> bool {
        self.streaming_data.is_some()
    }

    /// Present stream groups in display order
    pub fn groups(&self) -> Vec<(StreamGroup, &[StreamVariant])> {
        let Some(data) = &self.streaming_data else {
            return Vec::new();
        };
        let mut groups = Vec::with_capacity(2);
        if let Some(formats) = &data.formats {
            groups.push((StreamGroup::Combined, formats.as_slice()));
        }
        if let Some(adaptive) = &data.adaptive_formats {
            groups.push((StreamGroup::Adaptive, adaptive.as_slice()));
        }
        groups
    }

    /// Total number of variants across all groups
    pub fn variant_count(&self) -> usize {
        self.groups().iter().map(|(_, v)| v.len()).sum()
    }
}
