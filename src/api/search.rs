use axum::extract::State;
use axum::Json;
use tracing::Instrument;

use crate::error::SearchError;
use crate::models::{ProbeResponse, SearchRequest, SearchResponse};
use crate::pipeline::direct_search;
use crate::state::AppContext;

/// Check a request body and return the trimmed bio with the effective `k`,
/// falling back to `default_k` when the request leaves it out.
pub fn validate_request(
    req: &SearchRequest,
    default_k: usize,
) -> Result<(String, usize), SearchError> {
    let bio = req.user_input.trim();
    if bio.is_empty() {
        return Err(SearchError::MissingQuery);
    }
    let k = req.k.unwrap_or(default_k);
    if k == 0 {
        return Err(SearchError::InvalidK);
    }
    Ok((bio.to_string(), k))
}

/// A span carrying a fresh request id, shared by everything the request spawns.
pub fn request_span(route: &'static str, k: usize) -> tracing::Span {
    let request_id = uuid::Uuid::new_v4();
    tracing::info_span!("request", %request_id, route, k)
}

/// POST /search - one retrieval for the raw bio, no LLM involved.
pub async fn search(
    State(ctx): State<AppContext>,
    Json(req): Json<SearchRequest>,
) -> Result<Json<SearchResponse>, SearchError> {
    let (bio, k) = validate_request(&req, ctx.config.default_k)?;
    let span = request_span("/search", k);

    async move {
        tracing::info!("Direct search ({} chars)", bio.chars().count());
        let results = direct_search(&ctx.retriever, &bio, k).await?;
        tracing::info!("Direct search returned {} results", results.len());
        Ok::<_, SearchError>(Json(SearchResponse { results }))
    }
    .instrument(span)
    .await
}

/// GET /test
pub async fn probe() -> Json<ProbeResponse> {
    Json(ProbeResponse {
        message: "Hello, World!".to_string(),
    })
}
