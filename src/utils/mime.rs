//! MIME type utilities for stream variants

/// Split `video/mp4; codecs=".."` into its kind and the remainder (`/mp4; ...`)
pub fn split_kind(mime_type: &str) -> (&str, &str) {
    match mime_type.find('/') {
        Some(idx) => mime_type.split_at(idx),
        None => ("", mime_type),
    }
}
