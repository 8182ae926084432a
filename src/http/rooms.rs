use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use serde::{Deserialize, Serialize};
use ulid::Ulid;

use super::{ApiError, ApiJson, ApiQuery, AppState, RequireAdmin};
use crate::calendar::DayToken;
use crate::engine::NewRoom;
use crate::model::*;

#[derive(Debug, Deserialize)]
pub struct WindowQuery {
    from: DayToken,
    to: DayToken,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnavailableDays {
    room_id: Ulid,
    from: DayToken,
    to: DayToken,
    days: Vec<DayToken>,
}

fn room_id(raw: &str) -> Result<Ulid, ApiError> {
    raw.parse()
        .map_err(|_| ApiError::bad_request(format!("invalid room id: {raw}")))
}

pub async fn list_rooms(State(state): State<AppState>) -> Json<Vec<RoomSummary>> {
    Json(state.engine.list_rooms(false).await)
}

pub async fn get_room(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<RoomSummary>, ApiError> {
    Ok(Json(state.engine.get_room(room_id(&id)?).await?))
}

/// The days a booking form should disable for this room.
pub async fn unavailable_days(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ApiQuery(window): ApiQuery<WindowQuery>,
) -> Result<Json<UnavailableDays>, ApiError> {
    let room_id = room_id(&id)?;
    let days = state
        .engine
        .unavailable_days(room_id, window.from, window.to)
        .await?;
    Ok(Json(UnavailableDays {
        room_id,
        from: window.from,
        to: window.to,
        days,
    }))
}

pub async fn create_room(
    State(state): State<AppState>,
    _admin: RequireAdmin,
    ApiJson(body): ApiJson<NewRoom>,
) -> Result<(StatusCode, Json<Room>), ApiError> {
    let room = state.engine.create_room(body).await?;
    Ok((StatusCode::CREATED, Json(room)))
}

pub async fn update_room(
    State(state): State<AppState>,
    _admin: RequireAdmin,
    Path(id): Path<String>,
    ApiJson(patch): ApiJson<RoomPatch>,
) -> Result<Json<Room>, ApiError> {
    Ok(Json(state.engine.update_room(room_id(&id)?, patch).await?))
}

pub async fn deactivate_room(
    State(state): State<AppState>,
    _admin: RequireAdmin,
    Path(id): Path<String>,
) -> Result<Json<Room>, ApiError> {
    Ok(Json(state.engine.deactivate_room(room_id(&id)?).await?))
}
