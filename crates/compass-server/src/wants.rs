use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use compass_core::ids::WantsId;
use compass_engine::wants::{HistoryPage, ReverseAnswers};
use compass_store::wants::WantsRow;

use crate::error::ApiError;
use crate::identity::Owner;
use crate::server::AppState;

#[derive(Deserialize)]
pub struct TextIn {
    pub text: String,
}

#[derive(Serialize)]
pub struct StreamAppendOut {
    pub record: WantsRow,
    pub stream_completed: bool,
}

#[derive(Deserialize)]
pub struct HistoryQuery {
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
}

fn default_page() -> u32 {
    1
}

fn default_page_size() -> u32 {
    10
}

pub async fn get_draft(
    State(state): State<AppState>,
    Owner(user): Owner,
) -> Result<Json<WantsRow>, ApiError> {
    Ok(Json(state.wants.get_or_create_draft(&user)?))
}

pub async fn stream_start(
    State(state): State<AppState>,
    Owner(user): Owner,
) -> Result<Json<WantsRow>, ApiError> {
    Ok(Json(state.wants.start_stream_phase(&user)?))
}

pub async fn stream_append(
    State(state): State<AppState>,
    Owner(user): Owner,
    Json(body): Json<TextIn>,
) -> Result<Json<StreamAppendOut>, ApiError> {
    let (record, stream_completed) = state.wants.append_stream_text(&user, &body.text)?;
    Ok(Json(StreamAppendOut {
        record,
        stream_completed,
    }))
}

pub async fn stream_finish(
    State(state): State<AppState>,
    Owner(user): Owner,
) -> Result<Json<WantsRow>, ApiError> {
    Ok(Json(state.wants.finish_stream_phase(&user)?))
}

pub async fn future_self_set(
    State(state): State<AppState>,
    Owner(user): Owner,
    Json(body): Json<TextIn>,
) -> Result<Json<WantsRow>, ApiError> {
    Ok(Json(state.wants.set_future_self_text(&user, &body.text)?))
}

pub async fn future_self_append(
    State(state): State<AppState>,
    Owner(user): Owner,
    Json(body): Json<TextIn>,
) -> Result<Json<WantsRow>, ApiError> {
    Ok(Json(state.wants.append_future_self_text(&user, &body.text)?))
}

pub async fn future_self_finish(
    State(state): State<AppState>,
    Owner(user): Owner,
) -> Result<Json<WantsRow>, ApiError> {
    Ok(Json(state.wants.finish_future_self_phase(&user)?))
}

pub async fn reverse_update(
    State(state): State<AppState>,
    Owner(user): Owner,
    Json(body): Json<ReverseAnswers>,
) -> Result<Json<WantsRow>, ApiError> {
    Ok(Json(state.wants.update_reverse_answers(&user, &body)?))
}

pub async fn progress(
    State(state): State<AppState>,
    Owner(user): Owner,
) -> Result<Json<WantsRow>, ApiError> {
    Ok(Json(state.wants.progress(&user)?))
}

pub async fn complete(
    State(state): State<AppState>,
    Owner(user): Owner,
) -> Result<Json<WantsRow>, ApiError> {
    Ok(Json(state.wants.complete(&user)?))
}

pub async fn history(
    State(state): State<AppState>,
    Owner(user): Owner,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<HistoryPage>, ApiError> {
    Ok(Json(state.wants.list_history(&user, query.page, query.page_size)?))
}

pub async fn by_id(
    State(state): State<AppState>,
    Owner(user): Owner,
    Path(id): Path<String>,
) -> Result<Json<WantsRow>, ApiError> {
    let id = WantsId::from_raw(id);
    Ok(Json(state.wants.get_completed(&user, &id)?))
}
