//! Stream variant structures

use crate::error::ResolveError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One encoded rendition from the manifest
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamVariant {
    /// Format identifier (itag)
    #[serde(default)]
    pub itag: u32,
    /// Direct URL, when the platform hands one out
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Obfuscated parameter set standing in for `url`
    #[serde(default, alias = "cipher", skip_serializing_if = "Option::is_none")]
    pub signature_cipher: Option<String>,
    /// MIME type including codecs, e.g. `video/mp4; codecs="avc1.4d401f"`
    #[serde(default)]
    pub mime_type: String,
    /// Video height
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    /// Frame rate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fps: Option<u32>,
    /// Peak bitrate in bits per second
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bitrate: Option<u64>,
    /// Average bitrate in bits per second
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub average_bitrate: Option<u64>,
    /// Size in bytes; the manifest carries it as a decimal string
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_length: Option<String>,
    /// Dynamic range compressed audio track
    #[serde(default)]
    pub is_drc: bool,
    /// Quality label (e.g., "720p")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quality_label: Option<String>,
}

/// Where a variant's base URL comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamSource {
    /// URL usable as is, apart from the n-token
    Direct(String),
    /// URL that still needs its signature deciphered
    Ciphered(CipherFields),
}

/// Fields of a decoded `signatureCipher` payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CipherFields {
    /// Obfuscated signature
    pub s: String,
    /// Query parameter receiving the deciphered signature
    pub sp: String,
    /// Base URL without the signature parameter
    pub url: String,
}

impl CipherFields {
    /// Parse a urlencoded `s=..&sp=..&url=..` payload
    pub fn parse(payload: &str) -> Result<Self, ResolveError> {
        let mut params: HashMap<String, String> = url::form_urlencoded::parse(payload.as_bytes())
            .into_owned()
            .collect();

        let mut take = |key: &'static str| {
            params
                .remove(key)
                .filter(|v| !v.is_empty())
                .ok_or(ResolveError::MalformedCipher(key))
        };

        Ok(Self {
            s: take("s")?,
            sp: take("sp")?,
            url: take("url")?,
        })
    }
}

impl StreamVariant {
    /// Create a variant with a direct URL
    pub fn direct(itag: u32, url: impl Into<String>, mime_type: impl Into<String>) -> Self {
        Self {
            itag,
            url: Some(url.into()),
            mime_type: mime_type.into(),
            ..Default::default()
        }
    }

    /// Create a variant carrying a signature cipher
    pub fn ciphered(itag: u32, cipher: impl Into<String>, mime_type: impl Into<String>) -> Self {
        Self {
            itag,
            signature_cipher: Some(cipher.into()),
            mime_type: mime_type.into(),
            ..Default::default()
        }
    }

    /// Cache key: the raw url, else the raw cipher payload, else empty
    pub fn identity(&self) -> &str {
        self.url
            .as_deref()
            .filter(|u| !u.is_empty())
            .or(self.signature_cipher.as_deref())
            .unwrap_or("")
    }

    /// Classify the variant; the cipher wins when both fields are set
    pub fn source(&self) -> Result<StreamSource, ResolveError> {
        if let Some(cipher) = self.signature_cipher.as_deref().filter(|c| !c.is_empty()) {
            return CipherFields::parse(cipher).map(StreamSource::Ciphered);
        }
        match self.url.as_deref().filter(|u| !u.is_empty()) {
            Some(url) => Ok(StreamSource::Direct(url.to_string())),
            None => Err(ResolveError::Unresolvable),
        }
    }

    /// Check if the signature needs deciphering
    pub fn needs_deciphering(&self) -> bool {
        self.signature_cipher.as_deref().is_some_and(|c| !c.is_empty())
    }

    /// Content length in bytes, if present and numeric
    pub fn size(&self) -> Option<u64> {
        self.content_length.as_deref()?.parse().ok()
    }

    /// Human-readable quality, e.g. "720p30fps", "DRC" or "(audio)"
    pub fn quality_string(&self) -> String {
        let mut out = String::new();
        if let Some(height) = self.height.filter(|h| *h > 0) {
            out.push_str(&format!("{}p", height));
        }
        match self.fps.filter(|f| *f > 0) {
            Some(fps) => out.push_str(&format!("{}fps", fps)),
            None if self.is_drc => out.push_str("DRC"),
            None => out.push_str("(audio)"),
        }
        out
    }

    /// Human-readable bitrate based on the average bitrate
    pub fn bitrate_string(&self) -> String {
        let bps = self.average_bitrate.or(self.bitrate).unwrap_or(0);
        crate::utils::units::format_bitrate(bps)
    }

    /// Human-readable size
    pub fn size_string(&self) -> String {
        match self.size() {
            Some(size) => crate::utils::units::format_size(size),
            None => "-".to_string(),
        }
    }
}
