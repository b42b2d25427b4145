pub mod search;
pub mod search_llm;

use axum::routing::{get, post};
use axum::Router;

use crate::state::AppContext;

pub fn router(ctx: AppContext) -> Router {
    Router::new()
        .route("/search", post(search::search))
        .route("/search_llm", post(search_llm::search_llm))
        .route("/test", get(search::probe))
        .with_state(ctx)
}
