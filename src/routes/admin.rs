use axum::{
    Router,
    extract::DefaultBodyLimit,
    middleware,
    response::Redirect,
    routing::get,
};

use super::{AdminCrudRoutes, admin_resource_routes};
use crate::{
    AppState,
    auth::{self, ADMINS},
    handlers::{login, users},
    models::{News, Price, Program},
};

/// Largest accepted admin form, uploads included.
const MAX_FORM_BYTES: usize = 10 * 1024 * 1024;

fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(users::page))
        .merge(
            AdminCrudRoutes {
                new_form: users::new_form,
                edit_form: users::edit_form,
                create: users::create,
                update: users::update,
                delete: users::delete,
            }
            .into_router(),
        )
        .route_layer(middleware::from_fn_with_state(ADMINS, auth::require_role))
}

/// Admin Router Module
///
/// Mounted under `/admin`. Login and logout are open; everything else passes [`auth::require_auth`]
/// first and then the role gate of its group.
pub fn admin_routes() -> Router<AppState> {
    let protected = Router::new()
        .route("/", get(|| async { Redirect::to(login::HOME_PATH) }))
        .nest("/programs", admin_resource_routes::<Program>())
        .nest("/prices", admin_resource_routes::<Price>())
        .nest("/news", admin_resource_routes::<News>())
        .nest("/users", user_routes())
        .route_layer(middleware::from_fn(auth::require_auth));

    Router::new()
        .route("/login", get(login::login_page).post(login::login))
        .route("/logout", get(login::logout))
        .merge(protected)
        .layer(DefaultBodyLimit::max(MAX_FORM_BYTES))
}
