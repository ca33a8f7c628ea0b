use axum::{
    Form,
    extract::State,
    response::{Html, Redirect},
};
use serde::Deserialize;
use tower_sessions::Session;

use crate::{
    accounts,
    auth::{self, LOGIN_PATH, Principal},
    error::ApiError,
    repository::UserRepositoryState,
    views::{self, LoginPage},
};

/// Landing page after a successful sign-in.
pub const HOME_PATH: &str = "/admin/programs";

/// Shown for every failed sign-in, whatever the cause.
pub const INVALID_CREDENTIALS: &str = "Invalid username or password";

#[derive(Debug, Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

pub async fn login_page(session: Session) -> Result<Html<String>, ApiError> {
    let error = auth::take_flash(&session).await?;
    views::render(&LoginPage { error })
}

/// login
///
/// Verifies the credentials and starts a session. Unknown usernames and wrong passwords get
/// the same flash and the same redirect.
pub async fn login(
    State(users): State<UserRepositoryState>,
    session: Session,
    Form(form): Form<LoginForm>,
) -> Result<Redirect, ApiError> {
    let username = form.username.trim();

    let Some(user) = accounts::authenticate(users.as_ref(), username, &form.password).await? else {
        tracing::warn!(%username, "failed sign-in");
        auth::push_flash(&session, INVALID_CREDENTIALS).await?;
        return Ok(Redirect::to(LOGIN_PATH));
    };

    let principal = Principal {
        id: user.id,
        username: user.username,
        role: user.role,
    };
    auth::sign_in(&session, &principal).await?;
    tracing::info!(user = %principal.username, role = %principal.role, "signed in");

    Ok(Redirect::to(HOME_PATH))
}

pub async fn logout(session: Session) -> Result<Redirect, ApiError> {
    if let Some(principal) = auth::load_principal(&session).await {
        tracing::info!(user = %principal.username, "signed out");
    }
    auth::sign_out(&session).await?;
    Ok(Redirect::to(LOGIN_PATH))
}
