// turns an embed page or manifest url into something a player can load through the relay.
// this is the part every provider shared: unpack the page if it's packed, find the manifest,
// pick the best rendition and wrap it in a token
use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use mockall::automock;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::header::HeaderMap;
use tracing::{debug, info};

use crate::server::{
    dtos::source_dto::{Source, SourceFile, SourceRequest},
    error::{AppResult, Error},
    services::upstream_services::DynUpstreamService,
    utils::{
        packer_utils::PackerUtil, playlist_utils::to_absolute_url, token_utils::ProxyToken,
        variant_utils::VariantUtil,
    },
};

pub type DynResolveService = Arc<dyn ResolveServiceTrait + Send + Sync>;

// first quoted thing that looks like a manifest
static QUOTED_MANIFEST: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)["']([^"']*\.m3u8[^"']*)["']"#).expect("manifest regex should compile")
});

#[automock]
#[async_trait]
pub trait ResolveServiceTrait {
    async fn resolve(&self, request: SourceRequest) -> AppResult<Source>;
}

pub struct ResolveService {
    upstream: DynUpstreamService,
    user_agent: String,
}

impl ResolveService {
    pub fn new(upstream: DynUpstreamService, user_agent: String) -> Self {
        Self {
            upstream,
            user_agent,
        }
    }

    /// pulls the manifest url out of a (possibly packed) page
    pub fn find_manifest(page: &str, base: &str) -> AppResult<Option<String>> {
        let script = PackerUtil::unpack_or_plain(page)?;

        Ok(QUOTED_MANIFEST
            .captures(&script)
            .map(|caps| to_absolute_url(&caps[1], base)))
    }

    fn relay_headers(&self, referer: String) -> BTreeMap<String, String> {
        BTreeMap::from([
            ("Referer".to_string(), referer),
            ("User-Agent".to_string(), self.user_agent.clone()),
        ])
    }

    async fn locate_manifest(
        &self,
        page_url: &str,
        origin: &str,
        headers: &HeaderMap,
    ) -> AppResult<String> {
        let page = self.upstream.fetch(page_url, headers).await?;
        if !page.status.is_success() {
            return Err(Error::InternalServerErrorWithContext(format!(
                "Embed page returned {}",
                page.status
            )));
        }

        let html = page.text().await?;
        Self::find_manifest(&html, origin)?
            .ok_or_else(|| Error::NotFound("No media sources found".to_string()))
    }

    /// best effort, anything going wrong here just keeps the url we already have
    async fn pick_rendition(&self, manifest_url: String, headers: &HeaderMap) -> String {
        let response = match self.upstream.fetch(&manifest_url, headers).await {
            Ok(response) if response.status.is_success() => response,
            Ok(response) => {
                debug!("manifest returned {}, keeping it as is", response.status);
                return manifest_url;
            }
            Err(e) => {
                debug!("manifest fetch failed, keeping it as is: {}", e);
                return manifest_url;
            }
        };

        let final_url = response.url.clone();
        let text = match response.text().await {
            Ok(text) => text,
            Err(e) => {
                debug!("manifest unreadable, keeping it as is: {}", e);
                return manifest_url;
            }
        };

        if !text.to_ascii_uppercase().contains("#EXTM3U") {
            return manifest_url;
        }

        let variants = VariantUtil::parse_variants(&text, &final_url);
        match VariantUtil::pick_best(&variants) {
            Some(best) => {
                debug!(
                    "picked {} (resolution {:?}, bandwidth {:?})",
                    best.url, best.resolution, best.bandwidth
                );
                best.url.clone()
            }
            // media playlist, the final url is what the player should load
            None => final_url,
        }
    }
}

#[async_trait]
impl ResolveServiceTrait for ResolveService {
    async fn resolve(&self, request: SourceRequest) -> AppResult<Source> {
        let target = url::Url::parse(&request.url)
            .map_err(|e| Error::BadRequest(format!("Invalid url: {}", e)))?;
        let origin = format!("{}/", target.origin().ascii_serialization());

        let referer = request.referer.clone().unwrap_or_else(|| origin.clone());
        let relay_headers = self.relay_headers(referer);
        let fetch_headers =
            ProxyToken::new(request.url.clone(), relay_headers.clone()).header_map()?;

        let manifest_url = if VariantUtil::is_manifest_url(&request.url) {
            request.url.clone()
        } else {
            self.locate_manifest(&request.url, &origin, &fetch_headers)
                .await?
        };

        let stream_url = self.pick_rendition(manifest_url, &fetch_headers).await;
        info!("resolved {} to {}", request.url, stream_url);

        let token = ProxyToken::new(stream_url, relay_headers.clone());
        let quality = request
            .label
            .as_deref()
            .map(str::trim)
            .filter(|label| !label.is_empty())
            .unwrap_or("auto")
            .to_string();

        Ok(Source {
            sources: vec![SourceFile {
                url: token.playlist_path(),
                quality,
            }],
            headers: relay_headers,
            ..Default::default()
        })
    }
}
