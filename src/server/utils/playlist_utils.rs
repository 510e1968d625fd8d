use std::collections::BTreeMap;
use std::ops::Range;

use tracing::{debug, warn};

use super::token_utils::ProxyToken;

/// one `NAME=value` pair out of an HLS attribute list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute<'a> {
    pub name: &'a str,
    pub value: &'a str,
    /// byte range of the value inside the line, quotes excluded
    pub span: Range<usize>,
    pub quoted: bool,
}

/// parses the attribute list after the first `:` of a directive line
///
/// quoted values can carry commas (CODECS="avc1,mp4a") so this walks the line instead of
/// splitting it. a pair without `=` is skipped up to the next comma
pub fn attributes(line: &str) -> Vec<Attribute<'_>> {
    let Some(colon) = line.find(':') else {
        return Vec::new();
    };

    let bytes = line.as_bytes();
    let mut attributes = Vec::new();
    let mut pos = colon + 1;

    while pos < bytes.len() {
        while pos < bytes.len() && (bytes[pos] == b',' || bytes[pos].is_ascii_whitespace()) {
            pos += 1;
        }
        if pos >= bytes.len() {
            break;
        }

        let name_start = pos;
        while pos < bytes.len() && bytes[pos] != b'=' && bytes[pos] != b',' {
            pos += 1;
        }
        if pos >= bytes.len() || bytes[pos] == b',' {
            continue;
        }
        let name = line[name_start..pos].trim();
        pos += 1;

        if bytes.get(pos) == Some(&b'"') {
            let value_start = pos + 1;
            let value_end = line[value_start..]
                .find('"')
                .map(|offset| value_start + offset)
                .unwrap_or(bytes.len());
            attributes.push(Attribute {
                name,
                value: &line[value_start..value_end],
                span: value_start..value_end,
                quoted: true,
            });
            pos = value_end + 1;
        } else {
            let value_start = pos;
            while pos < bytes.len() && bytes[pos] != b',' {
                pos += 1;
            }
            attributes.push(Attribute {
                name,
                value: line[value_start..pos].trim_end(),
                span: value_start..pos,
                quoted: false,
            });
        }
    }

    attributes
}

/// first attribute with the given name, names compare case-insensitively
pub fn attribute<'a>(line: &'a str, name: &str) -> Option<Attribute<'a>> {
    attributes(line)
        .into_iter()
        .find(|attribute| attribute.name.eq_ignore_ascii_case(name))
}

/// resolves a playlist reference against the playlist's own url
///
/// absolute urls pass through, protocol relative ones get https, everything else is joined.
/// a reference that can't be joined is handed back unchanged
pub fn to_absolute_url(reference: &str, base: &str) -> String {
    if reference.is_empty() {
        return String::new();
    }

    let lowered = reference.get(..8).unwrap_or(reference).to_ascii_lowercase();
    if lowered.starts_with("http://") || lowered.starts_with("https://") {
        return reference.to_string();
    }
    if reference.starts_with("//") {
        return format!("https:{}", reference);
    }

    match url::Url::parse(base).and_then(|base| base.join(reference)) {
        Ok(resolved) => resolved.to_string(),
        Err(e) => {
            warn!("Failed to resolve: {} against {} - {}", reference, base, e);
            reference.to_string()
        }
    }
}

pub struct PlaylistUtil;

impl PlaylistUtil {
    /// points every uri in a playlist back at the relay
    ///
    /// directive lines only get their `URI="..."` value swapped, segment and sub playlist lines
    /// get replaced whole. line count, order and terminators come out exactly as they went in
    pub fn rewrite(text: &str, base_url: &str, headers: &BTreeMap<String, String>) -> String {
        let mut output = String::with_capacity(text.len() * 2);
        let mut rewritten = 0usize;

        for raw in text.split_inclusive('\n') {
            let (line, terminator) = split_terminator(raw);

            if line.starts_with('#') {
                match attribute(line, "URI").filter(|uri| uri.quoted && !uri.value.is_empty()) {
                    Some(uri) => {
                        let path = Self::proxied(uri.value, base_url, headers);
                        output.push_str(&line[..uri.span.start]);
                        output.push_str(&path);
                        output.push_str(&line[uri.span.end..]);
                        rewritten += 1;
                    }
                    None => output.push_str(line),
                }
            } else if !line.trim().is_empty() {
                output.push_str(&Self::proxied(line.trim(), base_url, headers));
                rewritten += 1;
            } else {
                output.push_str(line);
            }

            output.push_str(terminator);
        }

        debug!("rewrote {} references against {}", rewritten, base_url);
        output
    }

    fn proxied(reference: &str, base_url: &str, headers: &BTreeMap<String, String>) -> String {
        ProxyToken::new(to_absolute_url(reference, base_url), headers.clone()).proxy_path()
    }
}

fn split_terminator(raw: &str) -> (&str, &str) {
    if let Some(line) = raw.strip_suffix("\r\n") {
        (line, "\r\n")
    } else if let Some(line) = raw.strip_suffix('\n') {
        (line, "\n")
    } else {
        (raw, "")
    }
}
