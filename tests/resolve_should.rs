use std::sync::Arc;

use axum::http::{HeaderMap, HeaderValue, StatusCode, header};

use streamrelay::server::{
    dtos::source_dto::SourceRequest,
    error::Error,
    services::{
        resolve_services::{ResolveService, ResolveServiceTrait},
        upstream_services::{MockUpstreamServiceTrait, UpstreamResponse},
    },
    utils::token_utils::ProxyToken,
};

const USER_AGENT: &str = "test-agent";

const MASTER: &str = "#EXTM3U\n\
    #EXT-X-STREAM-INF:BANDWIDTH=800000,RESOLUTION=640x360\n\
    360p.m3u8\n\
    #EXT-X-STREAM-INF:BANDWIDTH=5000000,RESOLUTION=1920x1080\n\
    1080p.m3u8\n";

fn request(url: &str) -> SourceRequest {
    SourceRequest {
        url: url.to_string(),
        referer: None,
        label: None,
    }
}

fn html() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("text/html"));
    headers
}

fn resolver(upstream: MockUpstreamServiceTrait) -> ResolveService {
    ResolveService::new(Arc::new(upstream), USER_AGENT.to_string())
}

fn decode_source(path: &str) -> ProxyToken {
    ProxyToken::decode(path.strip_prefix("/hls/").unwrap()).unwrap()
}

#[tokio::test]
async fn test_manifest_url_resolves_to_best_variant() {
    let mut upstream = MockUpstreamServiceTrait::new();
    upstream
        .expect_fetch()
        .withf(|url, headers| {
            url == "https://cdn.example/live/master.m3u8"
                && headers.get(header::REFERER).map(|v| v.as_bytes())
                    == Some(b"https://cdn.example/".as_slice())
                && headers.get(header::USER_AGENT).map(|v| v.as_bytes())
                    == Some(USER_AGENT.as_bytes())
        })
        .times(1)
        .returning(|url, _| {
            Ok(UpstreamResponse::from_bytes(
                StatusCode::OK,
                url,
                HeaderMap::new(),
                MASTER,
            ))
        });

    let source = resolver(upstream)
        .resolve(request("https://cdn.example/live/master.m3u8"))
        .await
        .unwrap();

    assert_eq!(source.sources.len(), 1);
    assert_eq!(source.sources[0].quality, "auto");
    assert!(source.sources[0].url.ends_with(".m3u8"));

    let token = decode_source(&source.sources[0].url);
    assert_eq!(token.url, "https://cdn.example/live/1080p.m3u8");
    assert_eq!(token.headers["Referer"], "https://cdn.example/");
    assert_eq!(token.headers["User-Agent"], USER_AGENT);
    assert_eq!(source.headers, token.headers);
}

#[tokio::test]
async fn test_packed_embed_page_resolves_to_manifest() {
    let packed = "<html><script>eval(function(p,a,c,k,e,d){return p}('0({1:\"/2/3.m3u8\"})',36,4,'setup|file|hls|index'.split('|'),0,{}))</script></html>";

    let mut upstream = MockUpstreamServiceTrait::new();
    upstream
        .expect_fetch()
        .withf(|url, _| url == "https://embed.example/e/abc")
        .times(1)
        .returning(move |url, _| {
            Ok(UpstreamResponse::from_bytes(StatusCode::OK, url, html(), packed))
        });
    upstream
        .expect_fetch()
        .withf(|url, headers| {
            url == "https://embed.example/hls/index.m3u8"
                && headers.get(header::REFERER).map(|v| v.as_bytes())
                    == Some(b"https://site.example/".as_slice())
        })
        .times(1)
        .returning(|url, _| {
            Ok(UpstreamResponse::from_bytes(
                StatusCode::OK,
                url,
                HeaderMap::new(),
                "#EXTM3U\n#EXTINF:4.0,\nseg0.ts\n",
            ))
        });

    let mut req = request("https://embed.example/e/abc");
    req.referer = Some("https://site.example/".to_string());
    req.label = Some(" 1080p ".to_string());

    let source = resolver(upstream).resolve(req).await.unwrap();

    assert_eq!(source.sources[0].quality, "1080p");
    let token = decode_source(&source.sources[0].url);
    // a media playlist has no variants to pick from
    assert_eq!(token.url, "https://embed.example/hls/index.m3u8");
    assert_eq!(token.headers["Referer"], "https://site.example/");
}

#[tokio::test]
async fn test_unreachable_manifest_keeps_its_url() {
    let mut upstream = MockUpstreamServiceTrait::new();
    upstream.expect_fetch().times(1).returning(|url, _| {
        Ok(UpstreamResponse::from_bytes(
            StatusCode::FORBIDDEN,
            url,
            HeaderMap::new(),
            "",
        ))
    });

    let source = resolver(upstream)
        .resolve(request("https://cdn.example/master.m3u8?sig=1"))
        .await
        .unwrap();

    assert_eq!(
        decode_source(&source.sources[0].url).url,
        "https://cdn.example/master.m3u8?sig=1"
    );
}

#[tokio::test]
async fn test_page_without_manifest_is_not_found() {
    let mut upstream = MockUpstreamServiceTrait::new();
    upstream.expect_fetch().times(1).returning(|url, _| {
        Ok(UpstreamResponse::from_bytes(
            StatusCode::OK,
            url,
            html(),
            "<html><video src='movie.webm'></video></html>",
        ))
    });

    let result = resolver(upstream)
        .resolve(request("https://embed.example/e/none"))
        .await;

    assert!(matches!(result, Err(Error::NotFound(_))));
}

#[tokio::test]
async fn test_failed_embed_page_is_server_error() {
    let mut upstream = MockUpstreamServiceTrait::new();
    upstream.expect_fetch().times(1).returning(|url, _| {
        Ok(UpstreamResponse::from_bytes(
            StatusCode::BAD_GATEWAY,
            url,
            html(),
            "",
        ))
    });

    let result = resolver(upstream)
        .resolve(request("https://embed.example/e/down"))
        .await;

    assert_eq!(
        result.unwrap_err().status(),
        StatusCode::INTERNAL_SERVER_ERROR
    );
}

#[test]
fn test_find_manifest() {
    let base = "https://embed.example/";

    assert_eq!(
        ResolveService::find_manifest("file: 'https://cdn.example/a.m3u8?t=1'", base).unwrap(),
        Some("https://cdn.example/a.m3u8?t=1".to_string())
    );
    assert_eq!(
        ResolveService::find_manifest(r#"{"src":"//cdn.example/b.M3U8"}"#, base).unwrap(),
        Some("https://cdn.example/b.M3U8".to_string())
    );
    assert_eq!(
        ResolveService::find_manifest(r#"src="/c/index.m3u8""#, base).unwrap(),
        Some("https://embed.example/c/index.m3u8".to_string())
    );
    assert_eq!(
        ResolveService::find_manifest("<p>nothing here</p>", base).unwrap(),
        None
    );
}
