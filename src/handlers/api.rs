use axum::{
    Json,
    extract::{Query, State, rejection::QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::{
    AppState,
    crud::Resource,
    error::ApiError,
    extract::{EntityId, ValidJson},
    pagination::PageParams,
    repository::Order,
};

fn store_error<R: Resource>(err: crate::repository::StoreError) -> ApiError {
    ApiError::from_store(R::NAME, err)
}

/// list
///
/// `GET /api/v1/<resource>`. Returns a plain array, or the paginated envelope when the caller
/// passes `limit`/`page` or the resource always paginates.
pub async fn list<R: Resource>(
    State(state): State<AppState>,
    params: Result<Query<PageParams>, QueryRejection>,
) -> Result<Response, ApiError> {
    let Query(params) = params.map_err(|e| ApiError::Validation(e.body_text()))?;
    let store = R::store(&state);

    let Some(page) = params.resolve(R::DEFAULT_PAGE_SIZE, R::PAGINATE_BY_DEFAULT)? else {
        let records = store
            .list(Order::Listing, None)
            .await
            .map_err(store_error::<R>)?;
        let body: Vec<R::Response> = records.into_iter().map(R::to_response).collect();
        return Ok(Json(body).into_response());
    };

    let count = store.count().await.map_err(store_error::<R>)?;
    let records = store
        .list(Order::Listing, Some(page.window()))
        .await
        .map_err(store_error::<R>)?;
    let results: Vec<R::Response> = records.into_iter().map(R::to_response).collect();

    Ok(Json(page.envelope(R::API_PATH, count, results)).into_response())
}

/// `GET /api/v1/<resource>/{id}`
pub async fn get<R: Resource>(
    State(state): State<AppState>,
    EntityId(id): EntityId,
) -> Result<Json<R::Response>, ApiError> {
    let record = R::store(&state)
        .find(id)
        .await
        .map_err(store_error::<R>)?;
    Ok(Json(R::to_response(record)))
}

/// create
///
/// `POST /api/v1/<resource>`. Unsupplied translations are filled from the base text.
pub async fn create<R: Resource>(
    State(state): State<AppState>,
    ValidJson(payload): ValidJson<R::Payload>,
) -> Result<(StatusCode, Json<R::Response>), ApiError> {
    R::validate(&payload)?;

    let record = R::store(&state)
        .create(R::from_request(payload))
        .await
        .map_err(store_error::<R>)?;
    tracing::info!(entity = R::NAME, id = record.id, "created via api");

    Ok((StatusCode::CREATED, Json(R::to_response(record))))
}

/// update
///
/// `PUT /api/v1/<resource>/{id}`. The record must exist before the body is validated.
pub async fn update<R: Resource>(
    State(state): State<AppState>,
    EntityId(id): EntityId,
    ValidJson(payload): ValidJson<R::Payload>,
) -> Result<Json<R::Response>, ApiError> {
    let store = R::store(&state);
    let mut fields = store.find(id).await.map_err(store_error::<R>)?.fields;

    R::validate(&payload)?;
    fields.apply(payload);

    let record = store.save(id, fields).await.map_err(store_error::<R>)?;
    tracing::info!(entity = R::NAME, id, "updated via api");

    Ok(Json(R::to_response(record)))
}

/// `DELETE /api/v1/<resource>/{id}`. Soft delete; 404 when nothing was affected.
pub async fn delete<R: Resource>(
    State(state): State<AppState>,
    EntityId(id): EntityId,
) -> Result<StatusCode, ApiError> {
    let affected = R::store(&state)
        .delete(id)
        .await
        .map_err(store_error::<R>)?;

    if affected == 0 {
        return Err(ApiError::NotFound(R::NAME));
    }
    tracing::info!(entity = R::NAME, id, "deleted via api");
    Ok(StatusCode::NO_CONTENT)
}
