//! URL utilities for video references and stream query strings

use crate::error::ResolveError;
use regex::Regex;
use url::Url;

const VIDEO_ID_PATTERN: &str = r"[0-9a-zA-Z_-]{11}";

/// Extract an 11-character video ID from a pasted link or raw ID
pub fn extract_video_id(input: &str) -> Result<String, ResolveError> {
    let input = input.trim();
    let video_id_regex = Regex::new(VIDEO_ID_PATTERN)
        .map_err(|e| ResolveError::InvalidUrl(format!("video ID pattern: {}", e)))?;

    if let Ok(parsed) = Url::parse(input) {
        let candidate = match parsed.host_str() {
            Some("youtu.be") => Some(parsed.path().trim_start_matches('/').to_string()),
            Some(host) if host.ends_with("youtube.com") => {
                if parsed.path().starts_with("/watch") {
                    parsed
                        .query_pairs()
                        .find(|(key, _)| key == "v")
                        .map(|(_, value)| value.to_string())
                } else {
                    parsed
                        .path()
                        .strip_prefix("/shorts/")
                        .or_else(|| parsed.path().strip_prefix("/embed/"))
                        .map(str::to_string)
                }
            }
            _ => None,
        };
        if let Some(id) = candidate.and_then(|c| first_video_id(&video_id_regex, &c)) {
            return Ok(id);
        }
    }

    first_video_id(&video_id_regex, input)
        .ok_or_else(|| ResolveError::InvalidUrl(format!("No video ID in {:?}", input)))
}

fn first_video_id(video_id_regex: &Regex, text: &str) -> Option<String> {
    video_id_regex.find(text).map(|m| m.as_str().to_string())
}

/// Get the first value of a query parameter
pub fn query_param(url: &Url, key: &str) -> Option<String> {
    url.query_pairs()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.into_owned())
}

/// Replace a query parameter in place, keeping the order of the others
pub fn replace_query_param(url: &mut Url, key: &str, value: &str) {
    // Collect pairs first (immutable borrow), then rebuild (mutable borrow)
    let pairs: Vec<(String, String)> = url
        .query_pairs()
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    let mut replaced = false;
    let rebuilt: Vec<(String, String)> = pairs
        .into_iter()
        .map(|(k, v)| {
            if k == key && !replaced {
                replaced = true;
                (k, value.to_string())
            } else {
                (k, v)
            }
        })
        .collect();

    let mut qp = url.query_pairs_mut();
    qp.clear()
        .extend_pairs(rebuilt.iter().map(|(k, v)| (k.as_str(), v.as_str())));
    if !replaced {
        qp.append_pair(key, value);
    }
}

/// Re-encode the query string through the form serializer without changing any pair
pub fn normalize_query(url: &mut Url) {
    if url.query().is_none() {
        return;
    }
    let pairs: Vec<(String, String)> = url
        .query_pairs()
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    url.query_pairs_mut()
        .clear()
        .extend_pairs(pairs.iter().map(|(k, v)| (k.as_str(), v.as_str())));
}
