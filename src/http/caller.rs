use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use super::error::ApiError;
use crate::model::normalize_email;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_EMAIL_HEADER: &str = "x-user-email";
pub const USER_ROLE_HEADER: &str = "x-user-role";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Admin,
    Customer,
}

/// Verified identity forwarded by the auth gateway. The service trusts these
/// headers and performs no credential checks of its own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    pub id: String,
    /// Normalized (trimmed, lowercased).
    pub email: String,
    pub role: Role,
}

fn header<'a>(parts: &'a Parts, name: &str) -> Option<&'a str> {
    parts
        .headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

#[async_trait]
impl<S> FromRequestParts<S> for Caller
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let id = header(parts, USER_ID_HEADER).ok_or_else(|| ApiError::unauthorized("missing caller identity"))?;
        let email =
            header(parts, USER_EMAIL_HEADER).ok_or_else(|| ApiError::unauthorized("missing caller email"))?;
        let role = match header(parts, USER_ROLE_HEADER).map(str::to_ascii_lowercase).as_deref() {
            Some("admin") => Role::Admin,
            Some("customer") | None => Role::Customer,
            Some(_) => return Err(ApiError::forbidden("unknown role")),
        };
        Ok(Self {
            id: id.to_string(),
            email: normalize_email(email),
            role,
        })
    }
}

/// A caller with the admin role.
#[derive(Debug, Clone)]
pub struct RequireAdmin(pub Caller);

#[async_trait]
impl<S> FromRequestParts<S> for RequireAdmin
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let caller = Caller::from_request_parts(parts, state).await?;
        if caller.role != Role::Admin {
            return Err(ApiError::forbidden("admin role required"));
        }
        Ok(Self(caller))
    }
}
