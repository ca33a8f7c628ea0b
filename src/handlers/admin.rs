use axum::{
    extract::State,
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use tower_sessions::Session;

use crate::{
    AppState,
    auth::{self, Principal},
    crud::Resource,
    error::ApiError,
    extract::EntityId,
    forms::FormInput,
    models::{Record, Role},
    repository::{Order, StoreError},
    storage::ImageService,
    views::{self, AdminRow, FormFragment, ListPage, RowFragment},
};

fn admin_row<R: Resource>(record: &Record<R>) -> AdminRow {
    AdminRow {
        id: record.id,
        cells: R::admin_cells(record),
    }
}

fn has_uploads<R: Resource>() -> bool {
    !R::IMAGE_FIELDS.is_empty()
}

/// Runs every chosen file through the image service and records the resulting paths.
/// Fields without a file leave the payload untouched.
async fn attach_uploads<R: Resource>(
    images: &dyn ImageService,
    form: &FormInput,
    payload: &mut R::Payload,
) -> Result<(), ApiError> {
    for field in R::IMAGE_FIELDS {
        if let Some(upload) = form.file(field) {
            let path = images
                .store_image(&upload.file_name, upload.bytes.clone())
                .await?;
            R::attach_image(payload, field, path);
        }
    }
    Ok(())
}

/// page
///
/// Full list page ordered by id, with the pending flash message.
pub async fn page<R: Resource>(
    State(state): State<AppState>,
    principal: Principal,
    session: Session,
) -> Result<Html<String>, ApiError> {
    let records = R::store(&state)
        .list(Order::Id, None)
        .await
        .map_err(|e| ApiError::from_store(R::NAME, e))?;
    let error = auth::take_flash(&session).await?;

    views::render(&ListPage {
        title: R::TITLE,
        path: R::ADMIN_PATH,
        user: principal.username,
        role: principal.role.to_string(),
        is_admin: principal.role == Role::Admin,
        can_edit: principal.role.can_edit(),
        headers: R::admin_headers(),
        rows: records.iter().map(admin_row::<R>).collect(),
        error,
    })
}

pub async fn new_form<R: Resource>() -> Result<Html<String>, ApiError> {
    views::render(&FormFragment::create(
        R::NAME,
        R::ADMIN_PATH,
        R::form_fields(None),
        has_uploads::<R>(),
    ))
}

/// Edit form for an existing record; a missing id renders the 404 page.
pub async fn edit_form<R: Resource>(
    State(state): State<AppState>,
    EntityId(id): EntityId,
) -> Result<Response, ApiError> {
    let record = match R::store(&state).find(id).await {
        Ok(record) => record,
        Err(StoreError::NotFound) => return Ok(views::not_found_page()),
        Err(e) => return Err(ApiError::from_store(R::NAME, e)),
    };

    let form = FormFragment::edit(
        R::NAME,
        R::ADMIN_PATH,
        id,
        R::form_fields(Some(&record.fields)),
        has_uploads::<R>(),
    );
    Ok(views::render(&form)?.into_response())
}

/// create
///
/// Accepts the submitted form (urlencoded or multipart) and answers with the new table row.
pub async fn create<R: Resource>(
    State(state): State<AppState>,
    principal: Principal,
    form: FormInput,
) -> Result<Html<String>, ApiError> {
    let mut payload = R::from_form(&form)?;
    R::validate(&payload)?;
    attach_uploads::<R>(state.images.as_ref(), &form, &mut payload).await?;

    let record = R::store(&state)
        .create(R::from_request(payload))
        .await
        .map_err(|e| ApiError::from_store(R::NAME, e))?;
    tracing::info!(
        user = %principal.username,
        entity = R::NAME,
        id = record.id,
        "record created"
    );

    views::render(&RowFragment {
        path: R::ADMIN_PATH,
        row: admin_row(&record),
        can_edit: true,
    })
}

/// update
///
/// Applies the submitted form to an existing record and answers with the replacement row.
pub async fn update<R: Resource>(
    State(state): State<AppState>,
    principal: Principal,
    EntityId(id): EntityId,
    form: FormInput,
) -> Result<Html<String>, ApiError> {
    let store = R::store(&state);
    let mut fields = store
        .find(id)
        .await
        .map_err(|e| ApiError::from_store(R::NAME, e))?
        .fields;

    let mut payload = R::from_form(&form)?;
    R::validate(&payload)?;
    attach_uploads::<R>(state.images.as_ref(), &form, &mut payload).await?;
    fields.apply(payload);

    let record = store
        .save(id, fields)
        .await
        .map_err(|e| ApiError::from_store(R::NAME, e))?;
    tracing::info!(user = %principal.username, entity = R::NAME, id, "record updated");

    views::render(&RowFragment {
        path: R::ADMIN_PATH,
        row: admin_row(&record),
        can_edit: true,
    })
}

/// delete
///
/// 200 with an empty body (HTMX drops the row), 404 when nothing matched, 500 on storage failure.
pub async fn delete<R: Resource>(
    State(state): State<AppState>,
    principal: Principal,
    EntityId(id): EntityId,
) -> Response {
    match R::store(&state).delete(id).await {
        Ok(0) => StatusCode::NOT_FOUND.into_response(),
        Ok(_) => {
            tracing::info!(user = %principal.username, entity = R::NAME, id, "record deleted");
            StatusCode::OK.into_response()
        }
        Err(e) => {
            tracing::error!(error = ?e, entity = R::NAME, id, "delete failed");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
