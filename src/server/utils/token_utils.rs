use std::collections::BTreeMap;

use base64::{
    Engine as _,
    engine::general_purpose::{URL_SAFE, URL_SAFE_NO_PAD},
};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// route namespace every proxied resource lives under
pub const PROXY_NAMESPACE: &str = "hls";

/// players that sniff the extension get this appended to top level playlist tokens
pub const PLAYLIST_SUFFIX: &str = ".m3u8";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("Invalid proxy token: {0}")]
    Invalid(String),
    #[error("Invalid payload: missing URL")]
    MissingUrl,
    #[error("Invalid header in proxy token: {0}")]
    InvalidHeader(String),
}

/// everything the relay needs to fetch something for a client
///
/// the token is the whole state, there's no session behind it. on the wire it's url safe base64
/// of `{"u": url, "h": {header: value}}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxyToken {
    #[serde(rename = "u")]
    pub url: String,
    #[serde(rename = "h", default)]
    pub headers: BTreeMap<String, String>,
}

impl ProxyToken {
    pub fn new(url: impl Into<String>, headers: BTreeMap<String, String>) -> Self {
        Self {
            url: url.into(),
            headers,
        }
    }

    pub fn encode(&self) -> String {
        let json = serde_json::to_vec(self).expect("token payload is plain strings");
        URL_SAFE_NO_PAD.encode(json)
    }

    pub fn decode(token: &str) -> Result<Self, TokenError> {
        let token = token.strip_suffix(PLAYLIST_SUFFIX).unwrap_or(token);

        let mut padded = token.to_string();
        while !padded.len().is_multiple_of(4) {
            padded.push('=');
        }

        let bytes = URL_SAFE
            .decode(&padded)
            .map_err(|e| TokenError::Invalid(format!("bad base64: {}", e)))?;
        let json = String::from_utf8(bytes)
            .map_err(|e| TokenError::Invalid(format!("bad utf-8: {}", e)))?;

        serde_json::from_str(&json).map_err(|e| TokenError::Invalid(format!("bad payload: {}", e)))
    }

    /// `/hls/{token}`, what rewritten playlist lines point at
    pub fn proxy_path(&self) -> String {
        format!("/{}/{}", PROXY_NAMESPACE, self.encode())
    }

    /// same as [`Self::proxy_path`] with the playlist suffix, handed out for top level manifests
    pub fn playlist_path(&self) -> String {
        format!("{}{}", self.proxy_path(), PLAYLIST_SUFFIX)
    }

    /// the url the relay should actually fetch, rejecting empty ones
    pub fn target(&self) -> Result<&str, TokenError> {
        let url = self.url.trim();
        if url.is_empty() {
            return Err(TokenError::MissingUrl);
        }
        Ok(url)
    }

    pub fn header_map(&self) -> Result<HeaderMap, TokenError> {
        let mut map = HeaderMap::with_capacity(self.headers.len());
        for (name, value) in &self.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|_| TokenError::InvalidHeader(name.clone()))?;
            let value = HeaderValue::from_str(value)
                .map_err(|_| TokenError::InvalidHeader(name.to_string()))?;
            map.insert(name, value);
        }
        Ok(map)
    }
}
