mod bookings;
mod caller;
mod error;
mod rooms;

pub use caller::{Caller, RequireAdmin, Role, USER_EMAIL_HEADER, USER_ID_HEADER, USER_ROLE_HEADER};
pub use error::ApiError;

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use axum::extract::{FromRequest, FromRequestParts, MatchedPath, Request};
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::{delete, get, patch, post};
use axum::{Json, Router};
use chrono::DateTime;
use serde::Deserialize;
use tokio::net::TcpListener;

use crate::calendar::{Calendar, DayToken};
use crate::engine::Engine;
use crate::model::Ms;
use crate::observability;

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<Engine>,
}

/// `axum::Json` with rejections rendered as [`ApiError`].
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);

/// `axum::extract::Query` with rejections rendered as [`ApiError`].
#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(ApiError))]
pub struct ApiQuery<T>(pub T);

/// An instant as sent by clients: Unix milliseconds, an RFC 3339 timestamp,
/// or a bare `YYYY-MM-DD` date meaning noon of that day in the property
/// calendar.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum InstantInput {
    Millis(i64),
    Text(String),
}

impl InstantInput {
    pub fn resolve(&self, calendar: &Calendar, field: &str) -> Result<Ms, ApiError> {
        match self {
            InstantInput::Millis(ms) => Ok(*ms),
            InstantInput::Text(s) => {
                if let Ok(day) = s.parse::<DayToken>() {
                    return Ok(calendar.noon_of(day));
                }
                DateTime::parse_from_rfc3339(s)
                    .map(|dt| dt.timestamp_millis())
                    .map_err(|_| ApiError::bad_request(format!("{field}: expected RFC 3339 timestamp or YYYY-MM-DD")))
            }
        }
    }
}

pub fn router(engine: Arc<Engine>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/bookings", post(bookings::create_booking).get(bookings::list_bookings))
        .route("/bookings/mine", get(bookings::my_bookings))
        .route("/bookings/:id", get(bookings::get_booking))
        .route("/bookings/:id/cancel", patch(bookings::request_cancellation))
        .route("/bookings/:id/approve-cancel", patch(bookings::approve_cancellation))
        .route("/bookings/:id/reject-cancel", patch(bookings::reject_cancellation))
        .route("/holds", post(bookings::create_hold))
        .route("/holds/:id", delete(bookings::cancel_hold))
        .route("/holds/:id/confirm", post(bookings::confirm_hold))
        .route("/rooms", get(rooms::list_rooms).post(rooms::create_room))
        .route(
            "/rooms/:id",
            get(rooms::get_room).put(rooms::update_room).delete(rooms::deactivate_room),
        )
        .route("/rooms/:id/unavailable", get(rooms::unavailable_days))
        .layer(middleware::from_fn(track_metrics))
        .with_state(AppState { engine })
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

/// RED metrics per matched route.
async fn track_metrics(req: Request, next: Next) -> Response {
    let route = req
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_owned())
        .unwrap_or_else(|| "unmatched".to_owned());
    let start = Instant::now();
    let response = next.run(req).await;
    let status = response.status().as_u16().to_string();
    metrics::histogram!(observability::HTTP_REQUEST_DURATION_SECONDS, "route" => route.clone())
        .record(start.elapsed().as_secs_f64());
    metrics::counter!(observability::HTTP_REQUESTS_TOTAL, "route" => route, "status" => status).increment(1);
    response
}

/// Serve the API on `listener` until `shutdown` resolves.
pub async fn serve(
    listener: TcpListener,
    engine: Arc<Engine>,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> std::io::Result<()> {
    axum::serve(listener, router(engine))
        .with_graceful_shutdown(shutdown)
        .await
}
