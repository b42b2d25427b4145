use std::convert::Infallible;
use std::time::Duration;

use axum::extract::State;
use axum::http::header::CACHE_CONTROL;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::IntoResponse;
use axum::Json;
use futures_util::stream::StreamExt;

use super::search::{request_span, validate_request};
use crate::error::SearchError;
use crate::models::SearchRequest;
use crate::state::AppContext;

const KEEP_ALIVE_SECS: u64 = 15;

/// POST /search_llm - LLM-expanded search streamed as server-sent events.
///
/// Validation failures are plain JSON errors; once the stream starts every
/// failure is reported in-band and the stream still ends with `done`.
pub async fn search_llm(
    State(ctx): State<AppContext>,
    Json(req): Json<SearchRequest>,
) -> Result<impl IntoResponse, SearchError> {
    let (bio, k) = validate_request(&req, ctx.config.default_k)?;
    let span = request_span("/search_llm", k);
    span.in_scope(|| tracing::info!("Expanded search ({} chars)", bio.chars().count()));

    let events = ctx
        .pipeline()
        .run(bio, k, span)
        .map(|event| Ok::<Event, Infallible>(event.to_sse_event()));

    let sse = Sse::new(events)
        .keep_alive(KeepAlive::new().interval(Duration::from_secs(KEEP_ALIVE_SECS)));

    Ok(([(CACHE_CONTROL, "no-transform")], sse))
}
