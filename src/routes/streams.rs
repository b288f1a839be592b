//! Playback redirects
//!
//! Players build stream URLs as `/{kind}/{username}/{password}/{id}.{ext}`.
//! The entry is looked up in the account's catalog and the player is sent
//! to the playlist's own source URL.

use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use chrono::Utc;
use std::sync::Arc;

use crate::models::StreamKind;
use crate::services::accounts::AccessDenied;
use crate::AppState;

/// Stream id from the last path segment ("123.ts" or "123")
fn parse_stream_id(segment: &str) -> Option<u64> {
    let stem = segment.split_once('.').map_or(segment, |(stem, _)| stem);
    stem.parse().ok()
}

async fn redirect(
    state: &AppState,
    kind: StreamKind,
    username: &str,
    password: &str,
    stream: &str,
) -> Response {
    let account = match state.accounts.authenticate(username, password, Utc::now()) {
        Ok(account) => account,
        Err(reason) => {
            let status = match reason {
                AccessDenied::InvalidCredentials => StatusCode::UNAUTHORIZED,
                _ => StatusCode::FORBIDDEN,
            };
            return (status, reason.to_string()).into_response();
        }
    };

    let Some(stream_id) = parse_stream_id(stream) else {
        return (StatusCode::NOT_FOUND, "Stream not found").into_response();
    };

    match state.query.find_entry(&account, kind, stream_id).await {
        Some(entry) => {
            tracing::debug!(username, kind = %kind, stream_id, "redirecting to source");
            (StatusCode::FOUND, [(header::LOCATION, entry.source_url)]).into_response()
        }
        None => (StatusCode::NOT_FOUND, "Stream not found").into_response(),
    }
}

/// GET /live/:username/:password/:stream
pub async fn live_stream(
    State(state): State<Arc<AppState>>,
    Path((username, password, stream)): Path<(String, String, String)>,
) -> Response {
    redirect(&state, StreamKind::Live, &username, &password, &stream).await
}

/// GET /movie/:username/:password/:stream
pub async fn movie_stream(
    State(state): State<Arc<AppState>>,
    Path((username, password, stream)): Path<(String, String, String)>,
) -> Response {
    redirect(&state, StreamKind::Movie, &username, &password, &stream).await
}

/// GET /series/:username/:password/:stream
pub async fn series_stream(
    State(state): State<Arc<AppState>>,
    Path((username, password, stream)): Path<(String, String, String)>,
) -> Response {
    redirect(&state, StreamKind::Series, &username, &password, &stream).await
}
