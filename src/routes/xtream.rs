//! Xtream Codes Player API facade
//!
//! Serves `player_api.php` from the catalog cache so stock IPTV players can
//! browse an account's playlist as if it were an Xtream server.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::models::{AccountRecord, CatalogEntry, Category, StreamKind};
use crate::services::accounts::AccessDenied;
use crate::AppState;

// ============================================================================
// Query Parameters
// ============================================================================

#[derive(Deserialize, Default)]
pub struct PlayerApiQuery {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    pub action: Option<String>,
    pub category_id: Option<String>,
    pub vod_id: Option<String>,
    pub series_id: Option<String>,
}

// ============================================================================
// Response Types
// ============================================================================

#[derive(Serialize)]
pub struct XtreamCategory {
    pub category_id: String,
    pub category_name: String,
    pub parent_id: i32,
}

impl From<Category> for XtreamCategory {
    fn from(c: Category) -> Self {
        Self {
            category_id: c.id,
            category_name: c.name,
            parent_id: 0,
        }
    }
}

/// Live stream (channel) information
#[derive(Serialize)]
pub struct XtreamLiveStream {
    pub num: u64,
    pub name: String,
    pub stream_type: &'static str,
    pub stream_id: u64,
    pub stream_icon: String,
    pub epg_channel_id: String,
    pub added: &'static str,
    pub category_id: String,
    pub custom_sid: &'static str,
    pub tv_archive: i32,
    pub direct_source: String,
    pub tv_archive_duration: i32,
}

impl From<CatalogEntry> for XtreamLiveStream {
    fn from(e: CatalogEntry) -> Self {
        Self {
            num: e.num,
            name: e.name,
            stream_type: "live",
            stream_id: e.stream_id,
            stream_icon: e.icon,
            epg_channel_id: e.epg_channel_id,
            added: "",
            category_id: e.category_id,
            custom_sid: "",
            tv_archive: 0,
            direct_source: e.source_url,
            tv_archive_duration: 0,
        }
    }
}

/// VOD (movie) stream information
#[derive(Serialize)]
pub struct XtreamVodStream {
    pub num: u64,
    pub name: String,
    pub stream_type: &'static str,
    pub stream_id: u64,
    pub stream_icon: String,
    pub rating: &'static str,
    pub rating_5based: f32,
    pub added: &'static str,
    pub category_id: String,
    pub container_extension: &'static str,
    pub custom_sid: &'static str,
    pub direct_source: String,
}

impl From<CatalogEntry> for XtreamVodStream {
    fn from(e: CatalogEntry) -> Self {
        Self {
            num: e.num,
            name: e.name,
            stream_type: "movie",
            stream_id: e.stream_id,
            stream_icon: e.icon,
            rating: "0",
            rating_5based: 0.0,
            added: "",
            category_id: e.category_id,
            container_extension: "mp4",
            custom_sid: "",
            direct_source: e.source_url,
        }
    }
}

/// Series listing entry
#[derive(Serialize)]
pub struct XtreamSeries {
    pub num: usize,
    pub name: String,
    pub series_id: u64,
    pub cover: String,
    pub plot: &'static str,
    pub cast: &'static str,
    pub director: &'static str,
    pub genre: String,
    pub release_date: &'static str,
    pub rating: &'static str,
    pub rating_5based: f32,
    pub youtube_trailer: &'static str,
    pub category_id: String,
    pub backdrop_path: Vec<String>,
}

impl XtreamSeries {
    fn from_entry(num: usize, e: CatalogEntry) -> Self {
        Self {
            num,
            name: e.name,
            series_id: e.stream_id,
            cover: e.icon,
            plot: "",
            cast: "",
            director: "",
            genre: e.category_id.clone(),
            release_date: "",
            rating: "0",
            rating_5based: 0.0,
            youtube_trailer: "",
            category_id: e.category_id,
            backdrop_path: Vec::new(),
        }
    }
}

/// User account information
#[derive(Serialize)]
pub struct XtreamUserInfo {
    pub auth: u8,
    pub status: &'static str,
    pub username: String,
    pub password: String,
    pub exp_date: String,
    pub is_trial: &'static str,
    pub active_cons: &'static str,
    pub created_at: String,
    pub max_connections: String,
    pub allowed_output_formats: Vec<&'static str>,
}

/// Server information
#[derive(Serialize)]
pub struct XtreamServerInfo {
    pub url: String,
    pub port: String,
    pub https_port: &'static str,
    pub server_protocol: String,
    pub rtmp_port: &'static str,
    pub timezone: &'static str,
    pub timestamp_now: i64,
    pub time_now: String,
}

#[derive(Serialize)]
pub struct XtreamAuthResponse {
    pub user_info: XtreamUserInfo,
    pub server_info: XtreamServerInfo,
}

// ============================================================================
// Helper Functions
// ============================================================================

pub type ApiError = (StatusCode, Json<serde_json::Value>);

fn denied(reason: AccessDenied) -> ApiError {
    let status = match reason {
        AccessDenied::InvalidCredentials => StatusCode::UNAUTHORIZED,
        AccessDenied::Disabled | AccessDenied::Expired => StatusCode::FORBIDDEN,
    };
    (
        status,
        Json(serde_json::json!({"user_info": {"auth": 0, "message": reason.to_string()}})),
    )
}

fn build_auth_response(
    account: &AccountRecord,
    password: &str,
    stream_server: &str,
    now: DateTime<Utc>,
) -> XtreamAuthResponse {
    let server = url::Url::parse(stream_server).ok();
    let port = server
        .as_ref()
        .and_then(|u| u.port_or_known_default())
        .map(|p| p.to_string())
        .unwrap_or_else(|| "80".to_string());
    let protocol = server
        .as_ref()
        .map(|u| u.scheme().to_string())
        .unwrap_or_else(|| "http".to_string());

    XtreamAuthResponse {
        user_info: XtreamUserInfo {
            auth: 1,
            status: "Active",
            username: account.username.clone(),
            password: password.to_string(),
            exp_date: account.expires_at.timestamp().to_string(),
            is_trial: "0",
            active_cons: "0",
            created_at: account.created_at.timestamp().to_string(),
            max_connections: account.max_connections.to_string(),
            allowed_output_formats: vec!["m3u8", "ts", "rtmp"],
        },
        server_info: XtreamServerInfo {
            url: stream_server.to_string(),
            port,
            https_port: "443",
            server_protocol: protocol,
            rtmp_port: "1935",
            timezone: "UTC",
            timestamp_now: now.timestamp(),
            time_now: now.to_rfc3339(),
        },
    }
}

fn parse_id(raw: Option<&str>) -> Option<u64> {
    raw?.trim().parse().ok()
}

// ============================================================================
// Route Handlers
// ============================================================================

/// GET /player_api.php
pub async fn player_api(
    State(state): State<Arc<AppState>>,
    Query(query): Query<PlayerApiQuery>,
) -> Result<Response, ApiError> {
    let now = Utc::now();
    let account = state
        .accounts
        .authenticate(&query.username, &query.password, now)
        .map_err(|reason| {
            tracing::info!(username = %query.username, reason = %reason, "player_api access denied");
            denied(reason)
        })?;

    let category = query.category_id.as_deref().filter(|c| !c.is_empty());
    let action = query.action.as_deref().unwrap_or("get_user_info");
    tracing::debug!(username = %account.username, action, "player_api request");

    let response = match action {
        "" | "get_user_info" => Json(build_auth_response(
            &account,
            &query.password,
            &state.config.stream_server,
            now,
        ))
        .into_response(),

        "get_live_categories" => categories_response(&state, &account, StreamKind::Live).await,
        "get_vod_categories" => categories_response(&state, &account, StreamKind::Movie).await,
        "get_series_categories" => categories_response(&state, &account, StreamKind::Series).await,

        "get_live_streams" => {
            let streams: Vec<XtreamLiveStream> = state
                .query
                .entries(&account, StreamKind::Live, category)
                .await
                .into_iter()
                .map(Into::into)
                .collect();
            Json(streams).into_response()
        }
        "get_vod_streams" => {
            let streams: Vec<XtreamVodStream> = state
                .query
                .entries(&account, StreamKind::Movie, category)
                .await
                .into_iter()
                .map(Into::into)
                .collect();
            Json(streams).into_response()
        }
        "get_series" => {
            let series: Vec<XtreamSeries> = state
                .query
                .entries(&account, StreamKind::Series, category)
                .await
                .into_iter()
                .enumerate()
                .map(|(i, e)| XtreamSeries::from_entry(i + 1, e))
                .collect();
            Json(series).into_response()
        }

        "get_vod_info" => vod_info(&state, &account, query.vod_id.as_deref()).await,
        "get_series_info" => series_info(&state, &account, query.series_id.as_deref()).await,

        "get_short_epg" | "get_simple_data_table" => {
            Json(serde_json::json!({"epg_listings": []})).into_response()
        }

        _ => Json(serde_json::json!({"error": "Unknown action"})).into_response(),
    };

    Ok(response)
}

async fn categories_response(state: &AppState, account: &AccountRecord, kind: StreamKind) -> Response {
    let categories: Vec<XtreamCategory> = state
        .query
        .categories(account, kind)
        .await
        .into_iter()
        .map(Into::into)
        .collect();
    Json(categories).into_response()
}

async fn vod_info(state: &AppState, account: &AccountRecord, vod_id: Option<&str>) -> Response {
    let Some(stream_id) = parse_id(vod_id) else {
        return Json(serde_json::json!({"info": [], "movie_data": {}})).into_response();
    };

    let body = match state.query.find_entry(account, StreamKind::Movie, stream_id).await {
        Some(movie) => serde_json::json!({
            "info": {
                "name": movie.name,
                "o_name": movie.name,
                "movie_image": movie.icon,
                "cover_big": movie.icon,
                "genre": movie.category_id,
                "plot": "",
                "cast": "",
                "director": "",
                "release_date": "",
                "duration": "",
                "rating": "0",
            },
            "movie_data": {
                "stream_id": movie.stream_id,
                "name": movie.name,
                "category_id": movie.category_id,
                "container_extension": "mp4",
                "direct_source": movie.source_url,
            }
        }),
        None => serde_json::json!({
            "info": {
                "name": "Sample Movie",
                "o_name": "Sample Movie",
                "movie_image": "",
                "plot": "This is a sample movie description.",
                "genre": "Action",
                "duration": "120 min",
                "rating": "7.5",
            },
            "movie_data": {
                "stream_id": stream_id,
                "container_extension": "mp4",
                "direct_source": format!("http://sample-stream.com/movie/{}.mp4", stream_id),
            }
        }),
    };

    Json(body).into_response()
}

/// Playlist series entries are single episodes; each is published as a
/// one-season, one-episode series
async fn series_info(state: &AppState, account: &AccountRecord, series_id: Option<&str>) -> Response {
    let entry = match parse_id(series_id) {
        Some(id) => state.query.find_entry(account, StreamKind::Series, id).await,
        None => None,
    };

    let body = match entry {
        Some(episode) => serde_json::json!({
            "seasons": [{"season_number": 1, "name": "Season 1"}],
            "info": {
                "name": episode.name,
                "cover": episode.icon,
                "genre": episode.category_id,
                "category_id": episode.category_id,
                "plot": "",
                "cast": "",
                "director": "",
                "release_date": "",
                "rating": "0",
            },
            "episodes": {
                "1": [{
                    "id": episode.stream_id.to_string(),
                    "episode_num": 1,
                    "title": episode.name,
                    "container_extension": "mp4",
                    "info": {},
                    "custom_sid": "",
                    "added": "",
                    "season": 1,
                    "direct_source": episode.source_url,
                }]
            }
        }),
        None => serde_json::json!({"seasons": [], "info": {}, "episodes": {}}),
    };

    Json(body).into_response()
}
