// the relay itself. every request carries its own token so there's nothing to look up, we decode
// it, fetch upstream with its headers and either rewrite a playlist or stream bytes straight back
use std::collections::BTreeMap;

use axum::{
    Extension, Router,
    body::Body,
    http::{HeaderMap, HeaderValue, StatusCode, Uri, header},
    response::{IntoResponse, Response},
    routing::get,
};
use tracing::debug;

use crate::server::{
    error::{AppResult, Error},
    services::{RelayServices, upstream_services::UpstreamResponse},
    utils::{
        playlist_utils::PlaylistUtil,
        token_utils::{PROXY_NAMESPACE, ProxyToken},
        variant_utils::VariantUtil,
    },
};

const PLAYLIST_CONTENT_TYPE: &str = "application/vnd.apple.mpegurl";
const PLAYLIST_CACHE_CONTROL: &str = "public, max-age=30";
const MEDIA_CACHE_CONTROL: &str = "public, max-age=600";
const EXPOSED_HEADERS: &str = "Content-Length, Content-Range, Content-Type";

// headers we pass through from upstream on media responses, everything else is dropped
const FORWARDED_HEADERS: [header::HeaderName; 4] = [
    header::CONTENT_LENGTH,
    header::CONTENT_RANGE,
    header::CONTENT_TYPE,
    header::ACCEPT_RANGES,
];

pub struct HlsController;

impl HlsController {
    pub fn app() -> Router {
        // the bare prefixes are routed too so a missing token gets a proper 400
        Router::new()
            .route("/hls", get(Self::proxy_get).options(Self::proxy_options))
            .route("/hls/", get(Self::proxy_get).options(Self::proxy_options))
            .route(
                "/hls/{*token}",
                get(Self::proxy_get).options(Self::proxy_options),
            )
    }

    async fn proxy_get(
        Extension(services): Extension<RelayServices>,
        uri: Uri,
        headers: HeaderMap,
    ) -> AppResult<Response> {
        let token = Self::token_from_path(uri.path())?;
        let target = token.target()?;

        let mut upstream_headers = token.header_map()?;
        // range goes through verbatim, players seek mp4s with it
        if let Some(range) = headers.get(header::RANGE) {
            upstream_headers.insert(header::RANGE, range.clone());
        }

        debug!("Proxying: {}", target);
        let upstream = services.upstream.fetch(target, &upstream_headers).await?;

        let content_type = upstream
            .headers
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_ascii_lowercase();

        if Self::is_playlist(&content_type, target) {
            Self::playlist_response(upstream, &token.headers).await
        } else {
            let range_requested = headers.contains_key(header::RANGE);
            Ok(Self::media_response(
                upstream,
                &content_type,
                target,
                range_requested,
            ))
        }
    }

    async fn proxy_options() -> impl IntoResponse {
        (
            StatusCode::OK,
            [
                (header::ACCESS_CONTROL_ALLOW_ORIGIN, "*"),
                (header::ACCESS_CONTROL_ALLOW_METHODS, "GET, HEAD, OPTIONS"),
                (header::ACCESS_CONTROL_ALLOW_HEADERS, "Range, Content-Type"),
                (header::ACCESS_CONTROL_MAX_AGE, "86400"),
            ],
        )
    }

    /// `/hls/{token}` -> decoded token, the `.m3u8` suffix is allowed
    pub fn token_from_path(path: &str) -> AppResult<ProxyToken> {
        let mut segments = path.split('/').skip(1);

        if segments.next() != Some(PROXY_NAMESPACE) {
            return Err(Error::BadRequest("Invalid HLS proxy path".to_string()));
        }

        let raw = segments
            .next()
            .filter(|segment| !segment.is_empty())
            .ok_or_else(|| Error::BadRequest("Missing base64 payload".to_string()))?;

        Ok(ProxyToken::decode(raw)?)
    }

    pub fn is_playlist(content_type: &str, target: &str) -> bool {
        content_type.contains("mpegurl")
            || content_type.contains("m3u8")
            || VariantUtil::is_manifest_url(target)
    }

    fn cors_headers() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::ACCESS_CONTROL_ALLOW_ORIGIN,
            HeaderValue::from_static("*"),
        );
        headers.insert(
            header::ACCESS_CONTROL_EXPOSE_HEADERS,
            HeaderValue::from_static(EXPOSED_HEADERS),
        );
        headers
    }

    async fn playlist_response(
        upstream: UpstreamResponse,
        token_headers: &BTreeMap<String, String>,
    ) -> AppResult<Response> {
        // an error page behind a .m3u8 url is not a playlist, don't rewrite it into one
        if !upstream.status.is_success() {
            return Err(Error::InternalServerErrorWithContext(format!(
                "Upstream playlist returned {}",
                upstream.status
            )));
        }

        // relative uris resolve against where we ended up, not where we started
        let base_url = upstream.url.clone();

        let text = upstream.text().await?;
        let body = PlaylistUtil::rewrite(&text, &base_url, token_headers);
        debug!(
            "Processed M3U8 from {}, response length: {} bytes",
            base_url,
            body.len()
        );

        let mut response_headers = Self::cors_headers();
        response_headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static(PLAYLIST_CONTENT_TYPE),
        );
        response_headers.insert(
            header::CACHE_CONTROL,
            HeaderValue::from_static(PLAYLIST_CACHE_CONTROL),
        );

        Ok((StatusCode::OK, response_headers, body).into_response())
    }

    fn media_response(
        upstream: UpstreamResponse,
        content_type: &str,
        target: &str,
        range_requested: bool,
    ) -> Response {
        let is_mp4 = content_type.contains("video/mp4") || VariantUtil::is_progressive_url(target);

        let mut response_headers = Self::cors_headers();
        response_headers.insert(
            header::CACHE_CONTROL,
            HeaderValue::from_static(MEDIA_CACHE_CONTROL),
        );

        for name in FORWARDED_HEADERS {
            if let Some(value) = upstream.headers.get(&name) {
                response_headers.insert(name, value.clone());
            }
        }

        let mut status = upstream.status;
        if is_mp4 {
            response_headers
                .entry(header::CONTENT_TYPE)
                .or_insert(HeaderValue::from_static("video/mp4"));
            response_headers
                .entry(header::ACCEPT_RANGES)
                .or_insert(HeaderValue::from_static("bytes"));

            // some origins answer a range with the right Content-Range but a 200, safari and
            // friends refuse to seek unless they see a 206
            if status == StatusCode::OK
                && range_requested
                && response_headers.contains_key(header::CONTENT_RANGE)
            {
                debug!("Upstream answered a range request with 200, sending 206");
                status = StatusCode::PARTIAL_CONTENT;
            }
        }

        (status, response_headers, Body::from_stream(upstream.body)).into_response()
    }
}
