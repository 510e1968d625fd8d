use axum::{Extension, Json, Router, extract::Query, routing::get};
use tracing::{debug, error};
use validator::Validate;

use crate::server::{
    dtos::source_dto::{SourceRequest, SourcesResponse},
    error::{AppResult, Error},
    services::RelayServices,
};

pub struct SourcesController;

impl SourcesController {
    pub fn app() -> Router {
        Router::new().route("/sources", get(Self::sources_get))
    }

    async fn sources_get(
        Extension(services): Extension<RelayServices>,
        Query(params): Query<SourceRequest>,
    ) -> AppResult<Json<SourcesResponse>> {
        params.validate().map_err(|e| {
            debug!("rejected sources query: {}", e);
            Error::BadRequest(format!("Invalid query: {}", e))
        })?;

        let url = params.url.clone();
        let data = services.resolver.resolve(params).await.map_err(|e| {
            error!("Failed to resolve {}: {}", url, e);
            e
        })?;

        Ok(Json(SourcesResponse {
            success: true,
            url,
            data,
        }))
    }
}
