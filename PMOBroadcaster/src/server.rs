//! Surface HTTP du diffuseur
//!
//! Routes exposées par station (`{brand}` = slug) :
//!
//! - `GET  /{brand}/stream.m3u8` : playlist HLS, démarre la station au besoin
//! - `GET  /{brand}/segments/{name}` : segment MPEG-TS
//! - `POST /{brand}/start`, `POST /{brand}/stop`, `GET /{brand}/status`
//! - `POST /{brand}/agenda/rebuild`, `GET /{brand}/agenda`
//! - `GET  /api-docs/openapi.json`

use crate::openapi::ApiDoc;
use axum::{
    Json, Router,
    extract::{Path, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use pmoagenda::StreamScheduleView;
use pmobroadcast::stream::hls::{PLAYLIST_CONTENT_TYPE, SEGMENT_CONTENT_TYPE};
use pmobroadcast::{
    AgendaRebuildService, BroadcastError, NowPlaying, RadioStation, RadioStationPool,
    StationStatus,
};
use serde::Serialize;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::error;
use utoipa::OpenApi;

/// État partagé par les handlers
#[derive(Clone)]
pub struct AppState {
    pub pool: Arc<RadioStationPool>,
    pub rebuilds: AgendaRebuildService,
}

impl AppState {
    pub fn new(pool: Arc<RadioStationPool>) -> Self {
        Self {
            rebuilds: AgendaRebuildService::new(pool.clone()),
            pool,
        }
    }

    /// Station en cours, ou démarrée si absente ou arrêtée
    async fn running_station(&self, brand: &str) -> Result<RadioStation, ApiError> {
        match self.pool.get(brand) {
            Some(station) if station.status() != StationStatus::OffLine => Ok(station),
            _ => Ok(self.pool.initialize_station(brand).await?),
        }
    }
}

/// Réponse décrivant une station du pool
#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct StationResponse {
    pub brand: String,
    pub name: String,
    #[schema(value_type = String)]
    pub status: StationStatus,
    pub manager_id: String,
}

impl From<&RadioStation> for StationResponse {
    fn from(station: &RadioStation) -> Self {
        Self {
            brand: station.slug(),
            name: station.definition().display_name().to_string(),
            status: station.status(),
            manager_id: station.manager().id().to_string(),
        }
    }
}

/// État public d'une station
#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct StatusResponse {
    pub brand: String,
    #[schema(value_type = String)]
    pub status: StationStatus,
    pub listeners: usize,
    pub recent_requests: usize,
    #[schema(value_type = Option<Object>)]
    pub now_playing: Option<NowPlaying>,
}

/// Résumé d'un agenda reconstruit
#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct RebuildResponse {
    pub brand: String,
    pub total_scenes: usize,
    pub total_songs: usize,
    pub estimated_end_time: String,
}

/// Erreur API
#[derive(Debug)]
pub enum ApiError {
    NotFound(String),
    Internal(anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(message) => (StatusCode::NOT_FOUND, message),
            ApiError::Internal(err) => {
                error!("❌ Request failed: {:?}", err);
                (StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
            }
        };
        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

impl From<BroadcastError> for ApiError {
    fn from(err: BroadcastError) -> Self {
        match err {
            BroadcastError::StationNotFound(_) => ApiError::NotFound(err.to_string()),
            other => ApiError::Internal(other.into()),
        }
    }
}

fn not_pooled(brand: &str) -> ApiError {
    ApiError::NotFound(format!("Station {} is not running", brand))
}

/// GET /{brand}/stream.m3u8 - Playlist HLS de la station
#[utoipa::path(
    get,
    path = "/{brand}/stream.m3u8",
    tag = "stream",
    params(("brand" = String, Path, description = "Slug de la station")),
    responses(
        (status = 200, description = "Playlist HLS", content_type = "application/vnd.apple.mpegurl", body = String),
        (status = 404, description = "Station inconnue")
    )
)]
pub(crate) async fn stream_playlist(
    State(state): State<AppState>,
    Path(brand): Path<String>,
) -> Result<Response, ApiError> {
    let station = state.running_station(&brand).await?;
    let playlist = station.manager().generate_playlist();
    Ok((
        [
            (header::CONTENT_TYPE, PLAYLIST_CONTENT_TYPE),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        playlist,
    )
        .into_response())
}

/// GET /{brand}/segments/{name} - Segment MPEG-TS
#[utoipa::path(
    get,
    path = "/{brand}/segments/{name}",
    tag = "stream",
    params(
        ("brand" = String, Path, description = "Slug de la station"),
        ("name" = String, Path, description = "Nom du segment, ex: jazz-fm_42.ts")
    ),
    responses(
        (status = 200, description = "Segment audio", content_type = "video/MP2T"),
        (status = 404, description = "Segment absent de la fenêtre")
    )
)]
pub(crate) async fn stream_segment(
    State(state): State<AppState>,
    Path((brand, name)): Path<(String, String)>,
) -> Result<Response, ApiError> {
    let station = state.pool.get(&brand).ok_or_else(|| not_pooled(&brand))?;
    let segment = station
        .manager()
        .get_segment(&name)
        .ok_or_else(|| ApiError::NotFound(format!("Segment {} not available", name)))?;
    Ok((
        [(header::CONTENT_TYPE, SEGMENT_CONTENT_TYPE)],
        segment.data.clone(),
    )
        .into_response())
}

/// POST /{brand}/start - Démarre (ou réutilise) la station
#[utoipa::path(
    post,
    path = "/{brand}/start",
    tag = "stations",
    params(("brand" = String, Path, description = "Slug de la station")),
    responses(
        (status = 200, description = "Station démarrée", body = StationResponse),
        (status = 404, description = "Station inconnue")
    )
)]
pub(crate) async fn start_station(
    State(state): State<AppState>,
    Path(brand): Path<String>,
) -> Result<Json<StationResponse>, ApiError> {
    let station = state.running_station(&brand).await?;
    Ok(Json(StationResponse::from(&station)))
}

/// POST /{brand}/stop - Arrête la station, qui reste dans le pool
#[utoipa::path(
    post,
    path = "/{brand}/stop",
    tag = "stations",
    params(("brand" = String, Path, description = "Slug de la station")),
    responses(
        (status = 200, description = "Station arrêtée", body = StationResponse),
        (status = 404, description = "Station absente du pool")
    )
)]
pub(crate) async fn stop_station(
    State(state): State<AppState>,
    Path(brand): Path<String>,
) -> Result<Json<StationResponse>, ApiError> {
    let station = state
        .pool
        .stop(&brand)
        .await
        .ok_or_else(|| not_pooled(&brand))?;
    Ok(Json(StationResponse::from(&station)))
}

/// GET /{brand}/status - État et audience
#[utoipa::path(
    get,
    path = "/{brand}/status",
    tag = "stations",
    params(("brand" = String, Path, description = "Slug de la station")),
    responses(
        (status = 200, description = "État courant (OFF_LINE si absente)", body = StatusResponse)
    )
)]
pub(crate) async fn station_status(
    State(state): State<AppState>,
    Path(brand): Path<String>,
) -> Json<StatusResponse> {
    let live = state.pool.live_status(&brand);
    Json(StatusResponse {
        brand,
        status: live.status,
        listeners: live.listeners,
        recent_requests: live.recent_requests,
        now_playing: live.now_playing,
    })
}

/// POST /{brand}/agenda/rebuild - Reconstruit l'agenda sans couper le flux
#[utoipa::path(
    post,
    path = "/{brand}/agenda/rebuild",
    tag = "agenda",
    params(("brand" = String, Path, description = "Slug de la station")),
    responses(
        (status = 200, description = "Agenda reconstruit", body = RebuildResponse),
        (status = 404, description = "Station absente du pool"),
        (status = 500, description = "Échec de construction, l'ancien agenda reste en place")
    )
)]
pub(crate) async fn rebuild_agenda(
    State(state): State<AppState>,
    Path(brand): Path<String>,
) -> Result<Json<RebuildResponse>, ApiError> {
    let agenda = state.rebuilds.rebuild(&brand).await?;
    Ok(Json(RebuildResponse {
        brand,
        total_scenes: agenda.total_scenes(),
        total_songs: agenda.total_songs(),
        estimated_end_time: agenda.estimated_end_time().to_string(),
    }))
}

/// GET /{brand}/agenda - Vue de l'agenda installé
#[utoipa::path(
    get,
    path = "/{brand}/agenda",
    tag = "agenda",
    params(("brand" = String, Path, description = "Slug de la station")),
    responses(
        (status = 200, description = "Agenda de la station", body = serde_json::Value),
        (status = 404, description = "Station absente ou sans agenda")
    )
)]
pub(crate) async fn station_agenda(
    State(state): State<AppState>,
    Path(brand): Path<String>,
) -> Result<Json<StreamScheduleView>, ApiError> {
    let station = state.pool.get(&brand).ok_or_else(|| not_pooled(&brand))?;
    let agenda = station
        .agenda()
        .ok_or_else(|| ApiError::NotFound(format!("Station {} has no agenda", brand)))?;
    Ok(Json(StreamScheduleView::from(agenda.as_ref())))
}

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

/// Crée le router HTTP du diffuseur
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/{brand}/stream.m3u8", get(stream_playlist))
        .route("/{brand}/segments/{name}", get(stream_segment))
        .route("/{brand}/start", post(start_station))
        .route("/{brand}/stop", post(stop_station))
        .route("/{brand}/status", get(station_status))
        .route("/{brand}/agenda/rebuild", post(rebuild_agenda))
        .route("/{brand}/agenda", get(station_agenda))
        .route("/api-docs/openapi.json", get(openapi_json))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
