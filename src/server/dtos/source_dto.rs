use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use validator::Validate;

/// query for /sources
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct SourceRequest {
    /// embed page or manifest url
    #[validate(url)]
    pub url: String,
    /// referer the upstream wants, defaults to the url's origin
    #[validate(url)]
    pub referer: Option<String>,
    pub label: Option<String>,
}

/// shape players already know how to consume, tracks/audio/intro/outro are kept for
/// compatibility even though nothing fills them yet
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Source {
    pub sources: Vec<SourceFile>,
    pub tracks: Vec<Track>,
    pub audio: Vec<AudioTrack>,
    pub intro: TimeRange,
    pub outro: TimeRange,
    pub headers: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceFile {
    pub url: String,
    pub quality: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    pub url: String,
    pub lang: String,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioTrack {
    pub url: String,
    pub name: String,
    pub language: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: u64,
    pub end: u64,
}

#[derive(Debug, Serialize)]
pub struct SourcesResponse {
    pub success: bool,
    pub url: String,
    pub data: Source,
}
