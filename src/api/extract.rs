//! Axum extractors for authentication.
//!
//! `CurrentUser` resolves the bearer token to a user; `ActiveUser` and
//! `Superuser` narrow it further.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum_extra::TypedHeader;
use axum_extra::headers::Authorization;
use axum_extra::headers::authorization::Bearer;

use super::error::ApiError;
use crate::app::AppState;
use crate::db::UserRecord;

const INVALID_CREDENTIALS: &str = "Could not validate credentials";

/// Any user holding a valid access token. Returns 401 otherwise.
pub struct CurrentUser(pub UserRecord);

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let TypedHeader(Authorization(bearer)) =
            TypedHeader::<Authorization<Bearer>>::from_request_parts(parts, state)
                .await
                .map_err(|_| ApiError::Unauthorized(INVALID_CREDENTIALS.to_string()))?;

        let user_id = state.auth.decode_access_token(bearer.token()).map_err(|e| {
            tracing::debug!(error = %e, "Rejected access token");
            ApiError::Unauthorized(INVALID_CREDENTIALS.to_string())
        })?;

        let user = state
            .db
            .users()
            .get(user_id)
            .await?
            .ok_or_else(|| ApiError::not_found("User not found"))?;

        Ok(CurrentUser(user))
    }
}

/// Authenticated user whose account is active. Returns 400 if inactive.
pub struct ActiveUser(pub UserRecord);

impl FromRequestParts<AppState> for ActiveUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let CurrentUser(user) = CurrentUser::from_request_parts(parts, state).await?;
        if !user.is_active {
            return Err(ApiError::bad_request("Inactive user"));
        }
        Ok(ActiveUser(user))
    }
}

/// Active superuser. Returns 400 for everyone else.
pub struct Superuser(pub UserRecord);

impl FromRequestParts<AppState> for Superuser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let ActiveUser(user) = ActiveUser::from_request_parts(parts, state).await?;
        if !user.is_superuser {
            return Err(ApiError::bad_request("The user doesn't have enough privileges"));
        }
        Ok(Superuser(user))
    }
}
