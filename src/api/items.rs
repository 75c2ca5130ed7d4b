//! Item endpoints
//!
//! Regular users only ever see and touch their own items; superusers see all.

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    routing::get,
};
use serde::Deserialize;
use serde_json::{Map, Value};
use uuid::Uuid;

use super::ListParams;
use super::error::{ApiError, ApiResult};
use super::extract::ActiveUser;
use super::input::{ApiJson, ApiPath, ApiQuery};
use crate::app::AppState;
use crate::db::items::ITEM_SHAPE_FIELDS;
use crate::db::query::{FieldMap, Paginated};
use crate::db::{ItemCreate, ItemRecord, UserRecord};

#[derive(Debug, Default, Deserialize)]
pub struct ItemFilterParams {
    pub title: Option<String>,
    pub description: Option<String>,
    #[serde(rename = "owner__id")]
    pub owner_id: Option<Uuid>,
    #[serde(rename = "owner__full_name")]
    pub owner_full_name: Option<String>,
    #[serde(rename = "owner__email")]
    pub owner_email: Option<String>,
}

impl ItemFilterParams {
    fn into_field_map(self) -> FieldMap {
        let mut fields = FieldMap::new();
        fields.insert_opt("title", self.title);
        fields.insert_opt("description", self.description);
        fields.insert_opt("owner__id", self.owner_id);
        fields.insert_opt("owner__full_name", self.owner_full_name);
        fields.insert_opt("owner__email", self.owner_email);
        fields
    }
}

/// Load an item the caller is allowed to act on
async fn load_owned(state: &AppState, user: &UserRecord, item_id: Uuid) -> ApiResult<ItemRecord> {
    let item = state
        .db
        .items()
        .get(item_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Item not found"))?;

    if !user.is_superuser && item.owner.id != user.id {
        return Err(ApiError::bad_request("Not enough permissions"));
    }
    Ok(item)
}

async fn read_items(
    State(state): State<AppState>,
    ActiveUser(user): ActiveUser,
    ApiQuery(filter): ApiQuery<ItemFilterParams>,
    ApiQuery(params): ApiQuery<ListParams>,
) -> ApiResult<Json<Paginated<ItemRecord>>> {
    let mut filter = filter.into_field_map();
    if !user.is_superuser {
        filter.insert("owner__id", user.id);
    }

    let page = state
        .db
        .items()
        .get_multi(&filter, params.ordering(), params.window())
        .await?;
    Ok(Json(page))
}

async fn create_item(
    State(state): State<AppState>,
    ActiveUser(user): ActiveUser,
    ApiJson(input): ApiJson<ItemCreate>,
) -> ApiResult<(StatusCode, Json<ItemRecord>)> {
    let item = state.db.items().create(input.into_field_map(), user.id).await?;
    tracing::info!(item_id = %item.id, owner_id = %user.id, "Item created");
    Ok((StatusCode::CREATED, Json(item)))
}

async fn read_item(
    State(state): State<AppState>,
    ActiveUser(user): ActiveUser,
    ApiPath(item_id): ApiPath<Uuid>,
) -> ApiResult<Json<ItemRecord>> {
    Ok(Json(load_owned(&state, &user, item_id).await?))
}

async fn update_item(
    State(state): State<AppState>,
    ActiveUser(user): ActiveUser,
    ApiPath(item_id): ApiPath<Uuid>,
    ApiJson(body): ApiJson<Map<String, Value>>,
) -> ApiResult<Json<ItemRecord>> {
    let fields = FieldMap::from_json_object(body, ITEM_SHAPE_FIELDS)?;
    load_owned(&state, &user, item_id).await?;

    let item = state
        .db
        .items()
        .update(item_id, fields)
        .await?
        .ok_or_else(|| ApiError::not_found("Item not found"))?;
    Ok(Json(item))
}

async fn delete_item(
    State(state): State<AppState>,
    ActiveUser(user): ActiveUser,
    ApiPath(item_id): ApiPath<Uuid>,
) -> ApiResult<Json<ItemRecord>> {
    load_owned(&state, &user, item_id).await?;

    let item = state
        .db
        .items()
        .remove(item_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Item not found"))?;
    tracing::info!(item_id = %item.id, removed_by = %user.id, "Item removed");
    Ok(Json(item))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/items/", get(read_items).post(create_item))
        .route(
            "/items/{item_id}",
            get(read_item).put(update_item).delete(delete_item),
        )
}
