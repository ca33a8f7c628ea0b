use axum::{
    extract::State,
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use tower_sessions::Session;

use crate::{
    accounts,
    auth::{self, Principal},
    error::ApiError,
    extract::EntityId,
    forms::{FormField, FormInput, SelectOption},
    models::{NewUser, ParseError, Role, User},
    repository::{StoreError, UserRepositoryState},
    views::{self, AdminRow, FormFragment, ListPage, RowFragment},
};

pub const USERS_PATH: &str = "/admin/users";

const LAST_ADMIN_MESSAGE: &str = "Cannot delete the last admin user.";

fn user_row(user: &User) -> AdminRow {
    AdminRow {
        id: user.id,
        cells: vec![
            user.id.to_string(),
            user.username.clone(),
            user.email.clone(),
            user.role.to_string(),
        ],
    }
}

fn user_fields(existing: Option<&User>) -> Vec<FormField> {
    let username = existing.map(|user| user.username.clone()).unwrap_or_default();
    let email = existing.map(|user| user.email.clone()).unwrap_or_default();
    let selected = existing.map_or(Role::Reader, |user| user.role);

    let password = FormField::input("password", "password", "Password", String::new());
    let password = if existing.is_none() {
        password.required()
    } else {
        password
    };

    vec![
        FormField::input("text", "username", "Username", username).required(),
        FormField::input("email", "email", "Email", email).required(),
        password,
        FormField::select(
            "role",
            "Role",
            Role::ALL
                .into_iter()
                .map(|role| SelectOption {
                    value: role.as_str().to_owned(),
                    label: role.as_str().to_owned(),
                    selected: role == selected,
                })
                .collect(),
        ),
    ]
}

fn row_fragment(user: &User) -> Result<Html<String>, ApiError> {
    views::render(&RowFragment {
        path: USERS_PATH,
        row: user_row(user),
        can_edit: true,
    })
}

/// Rejected form, rendered again with the error above the fields.
fn invalid_form(form: FormFragment, message: String) -> Result<Response, ApiError> {
    let html = views::render(&form.with_error(message))?;
    Ok((StatusCode::BAD_REQUEST, html).into_response())
}

/// Flashes the last-admin message and asks HTMX to reload the page so it is shown.
async fn last_admin_conflict(session: &Session) -> Result<Response, ApiError> {
    auth::push_flash(session, LAST_ADMIN_MESSAGE).await?;
    Ok((StatusCode::CONFLICT, [("HX-Refresh", "true")]).into_response())
}

async fn hash_in_background(password: String) -> Result<String, ApiError> {
    Ok(tokio::task::spawn_blocking(move || accounts::hash_password(&password)).await??)
}

fn role_from_form(form: &FormInput) -> Result<Role, ApiError> {
    form.text("role")
        .parse()
        .map_err(|e: ParseError| ApiError::Validation(e.to_string()))
}

pub async fn page(
    State(users): State<UserRepositoryState>,
    principal: Principal,
    session: Session,
) -> Result<Html<String>, ApiError> {
    let accounts = users
        .list_users()
        .await
        .map_err(|e| ApiError::from_store("User", e))?;
    let error = auth::take_flash(&session).await?;

    views::render(&ListPage {
        title: "Users",
        path: USERS_PATH,
        user: principal.username,
        role: principal.role.to_string(),
        is_admin: principal.role == Role::Admin,
        can_edit: true,
        headers: vec!["ID", "Username", "Email", "Role"],
        rows: accounts.iter().map(user_row).collect(),
        error,
    })
}

pub async fn new_form() -> Result<Html<String>, ApiError> {
    views::render(&FormFragment::create("User", USERS_PATH, user_fields(None), false))
}

pub async fn edit_form(
    State(users): State<UserRepositoryState>,
    EntityId(id): EntityId,
) -> Result<Response, ApiError> {
    let user = match users.find_user(id).await {
        Ok(user) => user,
        Err(StoreError::NotFound) => return Ok(views::not_found_page()),
        Err(e) => return Err(ApiError::from_store("User", e)),
    };

    let form = FormFragment::edit("User", USERS_PATH, id, user_fields(Some(&user)), false);
    Ok(views::render(&form)?.into_response())
}

/// create
///
/// A password is mandatory for new accounts; it is hashed before anything is stored.
pub async fn create(
    State(users): State<UserRepositoryState>,
    principal: Principal,
    form: FormInput,
) -> Result<Response, ApiError> {
    let fragment = || FormFragment::create("User", USERS_PATH, user_fields(None), false);

    let username = form.text("username");
    if username.is_empty() {
        return invalid_form(fragment(), "username is required".to_owned());
    }
    let email = form.text("email");
    if email.is_empty() {
        return invalid_form(fragment(), "email is required".to_owned());
    }
    let password = form.raw("password").unwrap_or_default().to_owned();
    if password.is_empty() {
        return invalid_form(fragment(), "password is required".to_owned());
    }
    let role = role_from_form(&form)?;

    let created = users
        .create_user(NewUser {
            username,
            email,
            password_hash: hash_in_background(password).await?,
            role,
        })
        .await
        .map_err(|e| ApiError::from_store("User", e))?;
    tracing::info!(
        user = %principal.username,
        account = %created.username,
        role = %created.role,
        "user created"
    );

    Ok(row_fragment(&created)?.into_response())
}

/// update
///
/// Leaves the stored hash alone when the password field is empty. Demoting the last admin is
/// refused the same way deleting it is.
pub async fn update(
    State(users): State<UserRepositoryState>,
    principal: Principal,
    session: Session,
    EntityId(id): EntityId,
    form: FormInput,
) -> Result<Response, ApiError> {
    let mut user = users
        .find_user(id)
        .await
        .map_err(|e| ApiError::from_store("User", e))?;

    let fragment = || FormFragment::edit("User", USERS_PATH, id, user_fields(Some(&user)), false);
    let username = form.text("username");
    if username.is_empty() {
        return invalid_form(fragment(), "username is required".to_owned());
    }
    let email = form.text("email");
    if email.is_empty() {
        return invalid_form(fragment(), "email is required".to_owned());
    }
    let role = role_from_form(&form)?;

    user.username = username;
    user.email = email;
    user.role = role;
    if let Some(password) = form.raw("password").filter(|password| !password.is_empty()) {
        user.password_hash = hash_in_background(password.to_owned()).await?;
    }

    let saved = match users.save_user(&user).await {
        Ok(saved) => saved,
        Err(StoreError::LastAdmin) => {
            tracing::warn!(user = %principal.username, account = %user.username, "refused to demote the last admin");
            return last_admin_conflict(&session).await;
        }
        Err(e) => return Err(ApiError::from_store("User", e)),
    };
    tracing::info!(user = %principal.username, account = %saved.username, "user updated");

    Ok(row_fragment(&saved)?.into_response())
}

async fn remove_user(
    users: &UserRepositoryState,
    session: &Session,
    principal: &Principal,
    id: i64,
) -> Result<Response, ApiError> {
    let user = match users.find_user(id).await {
        Ok(user) => user,
        Err(StoreError::NotFound) => return Ok(StatusCode::NOT_FOUND.into_response()),
        Err(e) => return Err(ApiError::from_store("User", e)),
    };

    match users.delete_user(id).await {
        Ok(0) => return Ok(StatusCode::NOT_FOUND.into_response()),
        Ok(_) => {}
        Err(StoreError::LastAdmin) => {
            tracing::warn!(user = %principal.username, account = %user.username, "refused to delete the last admin");
            return last_admin_conflict(session).await;
        }
        Err(e) => return Err(ApiError::from_store("User", e)),
    }
    tracing::info!(user = %principal.username, account = %user.username, "user deleted");
    Ok(StatusCode::OK.into_response())
}

/// delete
///
/// Hard delete. The last remaining admin is kept: the caller gets 409 and a flash message.
pub async fn delete(
    State(users): State<UserRepositoryState>,
    principal: Principal,
    session: Session,
    EntityId(id): EntityId,
) -> Response {
    match remove_user(&users, &session, &principal, id).await {
        Ok(response) => response,
        Err(e) => {
            tracing::error!(error = ?e, id, "user delete failed");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
