use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use crate::config::AppConfig;

use super::{
    resolve_services::{DynResolveService, ResolveService},
    upstream_services::{DynUpstreamService, UpstreamService},
};

/// everything a request handler can reach, all of it read only
#[derive(Clone)]
pub struct RelayServices {
    pub upstream: DynUpstreamService,
    pub resolver: DynResolveService,
    pub config: Arc<AppConfig>,
}

impl RelayServices {
    pub fn new(config: Arc<AppConfig>) -> Self {
        info!("starting relay services...");

        let upstream = Arc::new(UpstreamService::new(Duration::from_secs(
            config.upstream_timeout_secs,
        ))) as DynUpstreamService;

        let resolver = Arc::new(ResolveService::new(
            upstream.clone(),
            config.user_agent.clone(),
        )) as DynResolveService;

        Self::with_services(config, upstream, resolver)
    }

    /// wires already built services together, tests hand in mocks here
    pub fn with_services(
        config: Arc<AppConfig>,
        upstream: DynUpstreamService,
        resolver: DynResolveService,
    ) -> Self {
        Self {
            upstream,
            resolver,
            config,
        }
    }
}
