use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use tracing::debug;

use super::playlist_utils::{attributes, to_absolute_url};

static MANIFEST_URL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\.m3u8(\?|$)").expect("manifest regex should compile"));

static PROGRESSIVE_URL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\.mp4(\?|$)").expect("progressive regex should compile"));

const STREAM_INF: &str = "#EXT-X-STREAM-INF:";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub fn area(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }

    fn parse(value: &str) -> Option<Self> {
        let (width, height) = value.split_once(['x', 'X'])?;
        Some(Self {
            width: width.trim().parse().ok()?,
            height: height.trim().parse().ok()?,
        })
    }
}

/// one rendition out of a multivariant playlist
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Variant {
    pub url: String,
    pub bandwidth: Option<u64>,
    pub resolution: Option<Resolution>,
}

impl Variant {
    pub fn bare(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            bandwidth: None,
            resolution: None,
        }
    }

    fn area(&self) -> u64 {
        self.resolution.map(|r| r.area()).unwrap_or(0)
    }
}

pub struct VariantUtil;

impl VariantUtil {
    /// `.m3u8` at the end of the path, query string allowed
    pub fn is_manifest_url(url: &str) -> bool {
        MANIFEST_URL.is_match(url)
    }

    pub fn is_progressive_url(url: &str) -> bool {
        PROGRESSIVE_URL.is_match(url)
    }

    pub fn is_stream_inf(line: &str) -> bool {
        line.get(..STREAM_INF.len())
            .is_some_and(|head| head.eq_ignore_ascii_case(STREAM_INF))
    }

    /// renditions of a multivariant playlist, urls resolved against the playlist url
    ///
    /// a playlist without stream info lines falls back to treating every `.m3u8` line as a bare
    /// variant, some hosts serve those
    pub fn parse_variants(text: &str, playlist_url: &str) -> Vec<Variant> {
        let lines: Vec<&str> = text.lines().collect();
        let mut variants = Vec::new();

        for (index, line) in lines.iter().enumerate() {
            if !Self::is_stream_inf(line) {
                continue;
            }

            let Some(uri) = Self::next_uri_line(&lines[index + 1..]) else {
                debug!("stream info without a uri line, skipping: {}", line);
                continue;
            };

            let mut variant = Variant::bare(to_absolute_url(uri, playlist_url));
            for attribute in attributes(line) {
                if attribute.name.eq_ignore_ascii_case("BANDWIDTH") {
                    variant.bandwidth = attribute.value.parse().ok();
                } else if attribute.name.eq_ignore_ascii_case("RESOLUTION") {
                    variant.resolution = Resolution::parse(attribute.value);
                }
            }
            variants.push(variant);
        }

        if variants.is_empty() {
            variants = lines
                .iter()
                .map(|line| line.trim())
                .filter(|line| !line.is_empty() && !line.starts_with('#'))
                .filter(|line| Self::is_manifest_url(line))
                .map(|line| Variant::bare(to_absolute_url(line, playlist_url)))
                .collect();
        }

        debug!("parsed {} variants from {}", variants.len(), playlist_url);
        variants
    }

    // next non blank, non directive line. running into another stream info first means this one
    // never got its uri
    fn next_uri_line<'a>(rest: &[&'a str]) -> Option<&'a str> {
        for line in rest {
            let trimmed = line.trim();
            if Self::is_stream_inf(trimmed) {
                return None;
            }
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            return Some(trimmed);
        }
        None
    }

    /// biggest picture wins, then highest bandwidth, then whoever came first
    pub fn pick_best(variants: &[Variant]) -> Option<&Variant> {
        let mut iter = variants.iter();
        let mut best = iter.next()?;

        for variant in iter {
            let (area, best_area) = (variant.area(), best.area());
            if area > best_area
                || (area == best_area
                    && variant.bandwidth.unwrap_or(0) > best.bandwidth.unwrap_or(0))
            {
                best = variant;
            }
        }

        Some(best)
    }
}
