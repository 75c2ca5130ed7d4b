//! Login, token check and password recovery endpoints

use axum::{
    Json, Router,
    extract::State,
    routing::post,
};
use serde::Deserialize;
use tracing::info;

use super::Msg;
use super::error::{ApiError, ApiResult};
use super::extract::CurrentUser;
use super::input::{ApiForm, ApiJson, ApiPath};
use crate::app::AppState;
use crate::db::{UserRecord, query::FieldMap};
use crate::services::auth::Token;

const UNKNOWN_USER: &str = "The user with this username does not exist in the system.";

/// OAuth2 password grant form. Extra OAuth2 fields (`grant_type`, `scope`)
/// are accepted and ignored.
#[derive(Debug, Deserialize)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct ResetPasswordRequest {
    pub token: String,
    pub new_password: String,
}

/// Exchange email and password for a bearer token
async fn login_access_token(
    State(state): State<AppState>,
    ApiForm(form): ApiForm<LoginForm>,
) -> ApiResult<Json<Token>> {
    let user = state
        .db
        .users()
        .authenticate(&form.username, &form.password)
        .await?
        .ok_or_else(|| ApiError::bad_request("Incorrect email or password"))?;

    if !user.is_active {
        return Err(ApiError::bad_request("Inactive user"));
    }

    let token = state.auth.create_access_token(user.id)?;
    info!(user_id = %user.id, "Access token issued");
    Ok(Json(token))
}

async fn test_token(CurrentUser(user): CurrentUser) -> Json<UserRecord> {
    Json(user)
}

async fn recover_password(
    State(state): State<AppState>,
    ApiPath(email): ApiPath<String>,
) -> ApiResult<Json<Msg>> {
    let user = state
        .db
        .users()
        .get_by_email(&email)
        .await?
        .ok_or_else(|| ApiError::not_found(UNKNOWN_USER))?;

    let token = state.auth.generate_password_reset_token(&user.email)?;
    state.reset_delivery.deliver(&user.email, &token)?;
    info!(user_id = %user.id, "Password reset token issued");

    Ok(Json(Msg::new("Password recovery email sent")))
}

async fn reset_password(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<ResetPasswordRequest>,
) -> ApiResult<Json<Msg>> {
    let email = state
        .auth
        .verify_password_reset_token(&body.token)
        .ok_or_else(|| ApiError::bad_request("Invalid token"))?;

    let users = state.db.users();
    let user = users
        .get_by_email(&email)
        .await?
        .ok_or_else(|| ApiError::not_found(UNKNOWN_USER))?;
    if !user.is_active {
        return Err(ApiError::bad_request("Inactive user"));
    }

    let mut fields = FieldMap::new();
    fields.insert("password", body.new_password);
    users.update(user.id, fields).await?;
    info!(user_id = %user.id, "Password reset");

    Ok(Json(Msg::new("Password updated successfully")))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/login/access-token", post(login_access_token))
        .route("/login/test-token", post(test_token))
        .route("/password-recovery/{email}", post(recover_password))
        .route("/reset-password/", post(reset_password))
}
