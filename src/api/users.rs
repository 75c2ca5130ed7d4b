//! User management endpoints

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    routing::get,
};
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::info;
use uuid::Uuid;

use super::ListParams;
use super::error::{ApiError, ApiResult};
use super::extract::{ActiveUser, Superuser};
use super::input::{ApiJson, ApiPath, ApiQuery};
use crate::app::AppState;
use crate::db::query::{FieldDef, FieldMap, Paginated, TypeTag};
use crate::db::{UserCreate, UserRecord};

const EMAIL_TAKEN: &str = "The user with this username already exists in the system.";

/// Fields an administrator may change on any user
const USER_UPDATE_FIELDS: &[FieldDef] = &[
    FieldDef::new("email", TypeTag::Str),
    FieldDef::new("full_name", TypeTag::Str),
    FieldDef::new("password", TypeTag::Str),
    FieldDef::new("is_active", TypeTag::Bool),
    FieldDef::new("is_superuser", TypeTag::Bool),
];

/// Fields a user may change on their own account
const SELF_UPDATE_FIELDS: &[FieldDef] = &[
    FieldDef::new("email", TypeTag::Str),
    FieldDef::new("full_name", TypeTag::Str),
    FieldDef::new("password", TypeTag::Str),
];

#[derive(Debug, Default, Deserialize)]
pub struct UserFilterParams {
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub is_active: Option<bool>,
    pub is_superuser: Option<bool>,
    pub num_items: Option<i64>,
}

impl UserFilterParams {
    fn into_field_map(self) -> FieldMap {
        let mut fields = FieldMap::new();
        fields.insert_opt("full_name", self.full_name);
        fields.insert_opt("email", self.email);
        fields.insert_opt("is_active", self.is_active);
        fields.insert_opt("is_superuser", self.is_superuser);
        fields.insert_opt("num_items", self.num_items);
        fields
    }
}

#[derive(Debug, Deserialize)]
pub struct OpenRegistration {
    pub email: String,
    pub password: String,
    pub full_name: Option<String>,
}

async fn read_users(
    State(state): State<AppState>,
    _admin: Superuser,
    ApiQuery(filter): ApiQuery<UserFilterParams>,
    ApiQuery(params): ApiQuery<ListParams>,
) -> ApiResult<Json<Paginated<UserRecord>>> {
    let page = state
        .db
        .users()
        .get_multi(&filter.into_field_map(), params.ordering(), params.window())
        .await?;
    Ok(Json(page))
}

async fn create_user(
    State(state): State<AppState>,
    Superuser(admin): Superuser,
    ApiJson(input): ApiJson<UserCreate>,
) -> ApiResult<(StatusCode, Json<UserRecord>)> {
    let users = state.db.users();
    if users.get_by_email(&input.email).await?.is_some() {
        return Err(ApiError::bad_request(EMAIL_TAKEN));
    }

    let user = users.create(input.into_field_map()).await?;
    info!(user_id = %user.id, created_by = %admin.id, "User created");
    Ok((StatusCode::CREATED, Json(user)))
}

async fn read_user_me(ActiveUser(user): ActiveUser) -> Json<UserRecord> {
    Json(user)
}

async fn update_user_me(
    State(state): State<AppState>,
    ActiveUser(user): ActiveUser,
    ApiJson(body): ApiJson<Map<String, Value>>,
) -> ApiResult<Json<UserRecord>> {
    let fields = FieldMap::from_json_object(body, SELF_UPDATE_FIELDS)?;
    let user = state
        .db
        .users()
        .update(user.id, fields)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;
    Ok(Json(user))
}

async fn create_user_open(
    State(state): State<AppState>,
    ApiJson(input): ApiJson<OpenRegistration>,
) -> ApiResult<(StatusCode, Json<UserRecord>)> {
    if !state.config.users_open_registration {
        return Err(ApiError::Forbidden(
            "Open user registration is forbidden on this server".to_string(),
        ));
    }

    let users = state.db.users();
    if users.get_by_email(&input.email).await?.is_some() {
        return Err(ApiError::bad_request(EMAIL_TAKEN));
    }

    let input = UserCreate {
        email: input.email,
        password: input.password,
        full_name: input.full_name,
        is_active: None,
        is_superuser: None,
    };
    let user = users.create(input.into_field_map()).await?;
    info!(user_id = %user.id, "User registered");
    Ok((StatusCode::CREATED, Json(user)))
}

async fn read_user(
    State(state): State<AppState>,
    ActiveUser(current): ActiveUser,
    ApiPath(user_id): ApiPath<Uuid>,
) -> ApiResult<Json<UserRecord>> {
    if user_id == current.id {
        return Ok(Json(current));
    }

    let user = state
        .db
        .users()
        .get(user_id)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;
    if !current.is_superuser {
        return Err(ApiError::bad_request("The user doesn't have enough privileges"));
    }
    Ok(Json(user))
}

async fn update_user(
    State(state): State<AppState>,
    _admin: Superuser,
    ApiPath(user_id): ApiPath<Uuid>,
    ApiJson(body): ApiJson<Map<String, Value>>,
) -> ApiResult<Json<UserRecord>> {
    let fields = FieldMap::from_json_object(body, USER_UPDATE_FIELDS)?;
    let user = state
        .db
        .users()
        .update(user_id, fields)
        .await?
        .ok_or_else(|| ApiError::not_found("The user with this username does not exist in the system"))?;
    Ok(Json(user))
}

async fn delete_user(
    State(state): State<AppState>,
    Superuser(admin): Superuser,
    ApiPath(user_id): ApiPath<Uuid>,
) -> ApiResult<Json<UserRecord>> {
    let user = state
        .db
        .users()
        .remove(user_id)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;
    info!(user_id = %user.id, removed_by = %admin.id, "User removed");
    Ok(Json(user))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/users/", get(read_users).post(create_user))
        .route("/users/me", get(read_user_me).put(update_user_me))
        .route("/users/open", axum::routing::post(create_user_open))
        .route(
            "/users/{user_id}",
            get(read_user).put(update_user).delete(delete_user),
        )
}
