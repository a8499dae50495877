use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;

use crate::{
    error::AppError,
    model::{AuthUser, CreateItem, RateItem, UpdateItem},
    state::AppState,
};

const DEFAULT_LANG: &str = "en-US";

#[derive(Deserialize)]
pub struct TitleQuery {
    title: String,
    lang: Option<String>,
}

#[derive(Deserialize)]
pub struct LangQuery {
    lang: Option<String>,
}

pub async fn health_handler() -> impl IntoResponse {
    Json(json!({
        "success": true,
        "message": "movielist API is running",
        "timestamp": Utc::now().to_rfc3339(),
    }))
}

pub async fn list_items(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> Result<impl IntoResponse, AppError> {
    let items = state.items.list(&user.identity).await?;

    Ok(Json(json!({ "success": true, "data": items })))
}

pub async fn get_item(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let item = state.items.get(&id, &user.identity).await?;

    Ok(Json(json!({ "success": true, "data": item })))
}

pub async fn create_item(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Json(draft): Json<CreateItem>,
) -> Result<impl IntoResponse, AppError> {
    let id = state.items.create(&user.identity, &draft).await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "message": "Item created",
            "data": { "id": id },
        })),
    ))
}

pub async fn update_item(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<String>,
    Json(patch): Json<UpdateItem>,
) -> Result<impl IntoResponse, AppError> {
    state.items.update(&id, &user.identity, &patch).await?;

    Ok(Json(json!({ "success": true, "message": "Item updated" })))
}

pub async fn delete_item(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    state.items.delete(&id, &user.identity).await?;

    Ok(Json(json!({ "success": true, "message": "Item deleted" })))
}

pub async fn rate_item(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<String>,
    Json(payload): Json<RateItem>,
) -> Result<impl IntoResponse, AppError> {
    state
        .items
        .rate(&id, &user.identity, &user.display_name, &payload)
        .await?;

    Ok(Json(json!({ "success": true, "message": "Rating saved" })))
}

pub async fn unrate_item(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    state.items.unrate(&id, &user.identity).await?;

    Ok(Json(json!({ "success": true, "message": "Rating removed" })))
}

pub async fn search_title(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
    Query(query): Query<TitleQuery>,
) -> Result<impl IntoResponse, AppError> {
    if query.title.trim().is_empty() {
        return Err(AppError::InvalidItem("Title is required".to_string()));
    }

    let lang = query.lang.as_deref().unwrap_or(DEFAULT_LANG);
    let results = state
        .metadata
        .search_title(&state.cache, query.title.trim(), lang)
        .await;

    Ok(Json(json!({ "success": true, "data": results })))
}

pub async fn search_details(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
    Path(provider_id): Path<i64>,
    Query(query): Query<LangQuery>,
) -> Result<impl IntoResponse, AppError> {
    let lang = query.lang.as_deref().unwrap_or(DEFAULT_LANG);

    // "Provider down" and "no such movie" both read as not found.
    let details = state
        .metadata
        .movie_details(&state.cache, provider_id, lang)
        .await
        .ok_or(AppError::NotFound)?;

    Ok(Json(json!({ "success": true, "data": details })))
}

pub async fn search_ratings(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
    Path(imdb_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    if !imdb_id.starts_with("tt") {
        return Err(AppError::InvalidItem(
            "IMDB id must start with \"tt\"".to_string(),
        ));
    }

    let bundle = state.metadata.external_ratings(&state.cache, &imdb_id).await;

    Ok(Json(json!({ "success": true, "data": bundle })))
}
