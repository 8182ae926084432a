use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use serde::Deserialize;
use ulid::Ulid;

use super::{ApiError, ApiJson, ApiQuery, AppState, Caller, InstantInput, RequireAdmin, Role};
use crate::engine::{BookingRequest, HoldRequest};
use crate::model::*;

#[derive(Debug, Default, Deserialize)]
pub struct GuestBody {
    #[serde(default)]
    name: String,
    #[serde(default)]
    email: String,
    #[serde(default)]
    mobile: String,
}

impl GuestBody {
    fn into_guest(self) -> Guest {
        Guest {
            name: self.name,
            email: self.email,
            mobile: self.mobile,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StayBody {
    #[serde(alias = "roomId")]
    resource_id: Ulid,
    check_in: InstantInput,
    check_out: InstantInput,
    #[serde(default)]
    guest: Option<GuestBody>,
    #[serde(default)]
    occupants: Occupants,
}

#[derive(Debug, Default, Deserialize)]
pub struct CancelBody {
    #[serde(default)]
    reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ConfirmHoldBody {
    guest: GuestBody,
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    status: Option<String>,
}

/// Customer booking. A guest email left blank is the caller's own.
pub async fn create_booking(
    State(state): State<AppState>,
    caller: Caller,
    ApiJson(body): ApiJson<StayBody>,
) -> Result<(StatusCode, Json<Reservation>), ApiError> {
    let calendar = state.engine.calendar();
    let mut guest = body.guest.unwrap_or_default();
    if guest.email.trim().is_empty() {
        guest.email = caller.email.clone();
    }
    let req = BookingRequest {
        room_id: body.resource_id,
        check_in: body.check_in.resolve(calendar, "checkIn")?,
        check_out: body.check_out.resolve(calendar, "checkOut")?,
        guest: guest.into_guest(),
        occupants: body.occupants,
    };
    let reservation = state.engine.create_booking(req).await?;
    Ok((StatusCode::CREATED, Json(reservation)))
}

pub async fn create_hold(
    State(state): State<AppState>,
    _admin: RequireAdmin,
    ApiJson(body): ApiJson<StayBody>,
) -> Result<Json<Reservation>, ApiError> {
    let calendar = state.engine.calendar();
    let req = HoldRequest {
        room_id: body.resource_id,
        check_in: body.check_in.resolve(calendar, "checkIn")?,
        check_out: body.check_out.resolve(calendar, "checkOut")?,
        occupants: body.occupants,
    };
    Ok(Json(state.engine.hold_dates(req).await?))
}

pub async fn cancel_hold(
    State(state): State<AppState>,
    _admin: RequireAdmin,
    Path(id): Path<String>,
) -> Result<Json<Reservation>, ApiError> {
    Ok(Json(state.engine.cancel_hold(&id).await?))
}

pub async fn confirm_hold(
    State(state): State<AppState>,
    _admin: RequireAdmin,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<ConfirmHoldBody>,
) -> Result<Json<Reservation>, ApiError> {
    let guest = body.guest.into_guest();
    Ok(Json(state.engine.confirm_hold(&id, &guest).await?))
}

pub async fn request_cancellation(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<CancelBody>,
) -> Result<Json<Reservation>, ApiError> {
    let reservation = state
        .engine
        .request_cancellation(&id, &caller.email, body.reason)
        .await?;
    Ok(Json(reservation))
}

pub async fn approve_cancellation(
    State(state): State<AppState>,
    _admin: RequireAdmin,
    Path(id): Path<String>,
) -> Result<Json<Reservation>, ApiError> {
    Ok(Json(state.engine.approve_cancellation(&id).await?))
}

pub async fn reject_cancellation(
    State(state): State<AppState>,
    _admin: RequireAdmin,
    Path(id): Path<String>,
) -> Result<Json<Reservation>, ApiError> {
    Ok(Json(state.engine.reject_cancellation(&id).await?))
}

pub async fn list_bookings(
    State(state): State<AppState>,
    _admin: RequireAdmin,
    ApiQuery(query): ApiQuery<ListQuery>,
) -> Result<Json<Vec<ReservationDetails>>, ApiError> {
    let status = query
        .status
        .as_deref()
        .filter(|s| !s.is_empty())
        .map(str::parse::<ReservationStatus>)
        .transpose()
        .map_err(ApiError::bad_request)?;
    Ok(Json(state.engine.list_reservations(status).await))
}

pub async fn my_bookings(State(state): State<AppState>, caller: Caller) -> Json<Vec<ReservationDetails>> {
    Json(state.engine.reservations_for_guest(&caller.email).await)
}

/// Admins see any reservation; guests only their own.
pub async fn get_booking(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<String>,
) -> Result<Json<ReservationDetails>, ApiError> {
    let details = state.engine.get_reservation(&id).await?;
    if caller.role != Role::Admin && details.reservation.guest_email() != Some(caller.email.as_str()) {
        return Err(crate::engine::EngineError::not_found(&id).into());
    }
    Ok(Json(details))
}
