use axum::{
    extract::{FromRequestParts, Request, State},
    http::request::Parts,
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use serde::{Deserialize, Serialize};
use tower_sessions::Session;

use crate::{error::ApiError, models::Role, views};

/// Where unauthenticated requests are sent.
pub const LOGIN_PATH: &str = "/admin/login";

const PRINCIPAL_KEY: &str = "principal";
const FLASH_KEY: &str = "flash";

/// Role allow-lists for the admin route groups.
pub const VIEWERS: &[Role] = &[Role::Admin, Role::Editor, Role::Reader];
pub const EDITORS: &[Role] = &[Role::Admin, Role::Editor];
pub const ADMINS: &[Role] = &[Role::Admin];

/// Principal
///
/// The signed-in admin-panel user, as stored in the session. Resolved once per request by
/// [`require_auth`] and handed to handlers through the request extensions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub id: i64,
    pub username: String,
    pub role: Role,
}

/// Reads the principal from the session. A missing or unreadable entry means "not signed in".
pub async fn load_principal(session: &Session) -> Option<Principal> {
    match session.get::<Principal>(PRINCIPAL_KEY).await {
        Ok(principal) => principal,
        Err(e) => {
            tracing::warn!(error = %e, "discarding unreadable session principal");
            None
        }
    }
}

/// Starts an authenticated session. The session id is rotated first.
pub async fn sign_in(session: &Session, principal: &Principal) -> Result<(), ApiError> {
    session.cycle_id().await?;
    session.insert(PRINCIPAL_KEY, principal).await?;
    Ok(())
}

pub async fn sign_out(session: &Session) -> Result<(), ApiError> {
    session.flush().await?;
    Ok(())
}

/// Queues a one-shot message for the next page render.
pub async fn push_flash(session: &Session, message: impl Into<String>) -> Result<(), ApiError> {
    session.insert(FLASH_KEY, message.into()).await?;
    Ok(())
}

/// Removes and returns the pending flash message, if any.
pub async fn take_flash(session: &Session) -> Result<Option<String>, ApiError> {
    Ok(session.remove::<String>(FLASH_KEY).await?)
}

fn to_login() -> Response {
    Redirect::to(LOGIN_PATH).into_response()
}

/// Principal Extractor
///
/// Prefers the copy [`require_auth`] placed in the extensions and falls back to the session,
/// so it also works on routes outside the middleware. Rejects with a redirect to the login page.
impl<S> FromRequestParts<S> for Principal
where
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        if let Some(principal) = parts.extensions.get::<Principal>() {
            return Ok(principal.clone());
        }

        let session = Session::from_request_parts(parts, state)
            .await
            .map_err(IntoResponse::into_response)?;
        load_principal(&session).await.ok_or_else(to_login)
    }
}

/// require_auth
///
/// Outer gate of the admin panel. Requests without a signed-in principal are redirected to the
/// login page before any handler runs.
pub async fn require_auth(session: Session, mut request: Request, next: Next) -> Response {
    let Some(principal) = load_principal(&session).await else {
        tracing::debug!(uri = %request.uri(), "unauthenticated admin request");
        return to_login();
    };

    request.extensions_mut().insert(principal);
    next.run(request).await
}

/// require_role
///
/// Per-group gate. Runs inside [`require_auth`]; a principal whose role is not in `allowed`
/// gets the 403 page and the chain stops.
pub async fn require_role(
    State(allowed): State<&'static [Role]>,
    request: Request,
    next: Next,
) -> Response {
    let Some(principal) = request.extensions().get::<Principal>() else {
        return to_login();
    };

    if !allowed.contains(&principal.role) {
        tracing::warn!(
            user = %principal.username,
            role = %principal.role,
            uri = %request.uri(),
            "role not permitted"
        );
        return views::forbidden();
    }

    next.run(request).await
}
