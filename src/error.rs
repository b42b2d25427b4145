use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

use crate::models::ErrorResponse;

/// Errors surfaced to clients. Messages are human-readable; provider
/// internals stay in the logs.
#[derive(Debug, Error)]
pub enum SearchError {
    #[error("Missing query")]
    MissingQuery,

    #[error("k must be at least 1")]
    InvalidK,

    /// The LLM token stream failed before retrieval started.
    #[error("Query expansion failed: {0}")]
    Decomposition(String),

    /// Embedding or similarity search failed for one sub-query.
    #[error("Retrieval failed for '{query}': {message}")]
    Retrieval { query: String, message: String },

    /// The index never reported ready. Callers turn this into an empty result set.
    #[error("Vector index not ready after {attempts} attempts")]
    ReadinessTimeout { attempts: u32 },

    /// Client-side: the connection to the search service failed.
    #[error("Connection error: {0}")]
    Transport(String),

    /// Client-side: the service answered with a non-success status.
    #[error("Server returned {status}: {message}")]
    Rejected { status: u16, message: String },
}

impl SearchError {
    pub fn status(&self) -> StatusCode {
        match self {
            SearchError::MissingQuery | SearchError::InvalidK => StatusCode::BAD_REQUEST,
            SearchError::Transport(_) => StatusCode::BAD_GATEWAY,
            SearchError::Rejected { status, .. } => {
                StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY)
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for SearchError {
    fn into_response(self) -> Response {
        let body = ErrorResponse {
            error: self.to_string(),
        };
        (self.status(), Json(body)).into_response()
    }
}
