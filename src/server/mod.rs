pub mod api;
pub mod dtos;
pub mod error;
pub mod services;
pub mod utils;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Context;
use axum::{Extension, Router, http::HeaderValue, routing::get};
use once_cell::sync::Lazy;
use tokio::net::TcpListener;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{info, warn};

use crate::config::AppConfig;
use api::{HlsController, SourcesController, health_controller::health_endpoint};
use services::RelayServices;

static START_TIME: Lazy<Instant> = Lazy::new(Instant::now);

pub fn get_uptime_seconds() -> u64 {
    START_TIME.elapsed().as_secs()
}

pub fn get_app_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

pub struct ApplicationServer;

impl ApplicationServer {
    pub async fn serve(config: Arc<AppConfig>) -> anyhow::Result<()> {
        Lazy::force(&START_TIME);

        let services = RelayServices::new(config.clone());
        let router = Self::router(services);

        let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("failed to bind to {}", addr))?;

        info!("relay listening on {}", addr);

        axum::serve(listener, router)
            .with_graceful_shutdown(Self::shutdown_signal())
            .await
            .context("error while running the relay")?;

        Ok(())
    }

    /// the whole app, split out from serve so tests can drive it without a socket
    pub fn router(services: RelayServices) -> Router {
        let cors = Self::cors_layer(&services.config.cors_origin);

        // /hls sets its own cors headers, players need them on errors and preflights too
        let api = Router::new()
            .route("/health", get(health_endpoint))
            .merge(SourcesController::app())
            .layer(cors);

        Router::new()
            .merge(HlsController::app())
            .merge(api)
            .layer(TraceLayer::new_for_http())
            .layer(Extension(services))
    }

    // either * or a comma separated list like example.com,something.com
    fn cors_layer(cors_origin: &str) -> CorsLayer {
        let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);

        if cors_origin.trim() == "*" {
            return layer.allow_origin(Any);
        }

        let origins: Vec<HeaderValue> = cors_origin
            .split(',')
            .map(str::trim)
            .filter(|origin| !origin.is_empty())
            .filter_map(|origin| {
                HeaderValue::from_str(origin)
                    .map_err(|_| warn!("ignoring invalid cors origin: {}", origin))
                    .ok()
            })
            .collect();

        layer.allow_origin(AllowOrigin::list(origins))
    }

    async fn shutdown_signal() {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("failed to listen for shutdown signal: {}", e);
            std::future::pending::<()>().await;
        }
        info!("shutting down relay...");
    }
}
