use super::auth::acting_user;
use super::AppState;
use crate::errors::{AppError, AppResult};
use crate::models::{
    DeletedObject, EntityKind, ListQuery, Record, RecordInput, RegisterUserPayload, RestoreRequest, TimelineEntry,
    TimelineQuery, UpdateMePayload, User,
};
use crate::service::CrmService;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::{Extension, Json};

/// Runs rusqlite work off the async workers; the connection mutex is held
/// for the whole closure.
async fn blocking<T, F>(state: &AppState, work: F) -> AppResult<T>
where
    T: Send + 'static,
    F: FnOnce(CrmService) -> AppResult<T> + Send + 'static,
{
    let service = state.service.clone();
    match tokio::task::spawn_blocking(move || work(service)).await {
        Ok(result) => result,
        Err(error) => Err(AppError::Internal(error.to_string())),
    }
}

pub async fn health() -> &'static str {
    "ok"
}

pub async fn register_user(
    State(state): State<AppState>,
    Json(payload): Json<RegisterUserPayload>,
) -> AppResult<(StatusCode, Json<User>)> {
    let user = blocking(&state, move |service| service.register_user(payload)).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

pub async fn get_me(State(state): State<AppState>, headers: HeaderMap) -> AppResult<Json<User>> {
    let user = blocking(&state, move |service| acting_user(&service, &headers)).await?;
    Ok(Json(user))
}

pub async fn update_me(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<UpdateMePayload>,
) -> AppResult<Json<User>> {
    let user = blocking(&state, move |service| {
        let actor = acting_user(&service, &headers)?;
        service.update_me(&actor, payload)
    })
    .await?;
    Ok(Json(user))
}

pub async fn list_records(
    State(state): State<AppState>,
    Extension(kind): Extension<EntityKind>,
    Query(query): Query<ListQuery>,
    headers: HeaderMap,
) -> AppResult<Json<Vec<Record>>> {
    let records = blocking(&state, move |service| {
        let actor = acting_user(&service, &headers)?;
        service.list(&actor, kind, &query)
    })
    .await?;
    Ok(Json(records))
}

pub async fn create_record(
    State(state): State<AppState>,
    Extension(kind): Extension<EntityKind>,
    headers: HeaderMap,
    Json(input): Json<RecordInput>,
) -> AppResult<(StatusCode, Json<Record>)> {
    let record = blocking(&state, move |service| {
        let actor = acting_user(&service, &headers)?;
        service.create(&actor, kind, input)
    })
    .await?;
    Ok((StatusCode::CREATED, Json(record)))
}

pub async fn get_record(
    State(state): State<AppState>,
    Extension(kind): Extension<EntityKind>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> AppResult<Json<Record>> {
    let record = blocking(&state, move |service| {
        let actor = acting_user(&service, &headers)?;
        service.get(&actor, kind, &id)
    })
    .await?;
    Ok(Json(record))
}

pub async fn update_record(
    State(state): State<AppState>,
    Extension(kind): Extension<EntityKind>,
    Path(id): Path<String>,
    headers: HeaderMap,
    Json(input): Json<RecordInput>,
) -> AppResult<Json<Record>> {
    let record = blocking(&state, move |service| {
        let actor = acting_user(&service, &headers)?;
        service.update(&actor, kind, &id, input)
    })
    .await?;
    Ok(Json(record))
}

pub async fn delete_record(
    State(state): State<AppState>,
    Extension(kind): Extension<EntityKind>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> AppResult<Json<&'static str>> {
    blocking(&state, move |service| {
        let actor = acting_user(&service, &headers)?;
        service.delete(&actor, kind, &id)
    })
    .await?;
    Ok(Json("ok"))
}

pub async fn list_deleted(State(state): State<AppState>, headers: HeaderMap) -> AppResult<Json<Vec<DeletedObject>>> {
    let deleted = blocking(&state, move |service| {
        let actor = acting_user(&service, &headers)?;
        service.list_deleted(&actor)
    })
    .await?;
    Ok(Json(deleted))
}

pub async fn restore_deleted(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    Json(mut request): Json<RestoreRequest>,
) -> AppResult<Json<&'static str>> {
    if request.id.trim().is_empty() {
        request.id = id;
    }
    blocking(&state, move |service| {
        let actor = acting_user(&service, &headers)?;
        service.restore(&actor, &request)
    })
    .await?;
    Ok(Json("ok"))
}

pub async fn timeline(
    State(state): State<AppState>,
    Query(query): Query<TimelineQuery>,
    headers: HeaderMap,
) -> AppResult<Json<Vec<TimelineEntry>>> {
    let entries = blocking(&state, move |service| {
        let actor = acting_user(&service, &headers)?;
        service.timeline(&actor, &query)
    })
    .await?;
    Ok(Json(entries))
}
