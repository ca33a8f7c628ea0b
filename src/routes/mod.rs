//! Routing is split by access level: the JSON API and health check are public, the admin panel
//! sits behind the session gate with per-group role checks.

use axum::{
    Router,
    handler::Handler,
    middleware,
    routing::{get, post, put},
};

use crate::{
    AppState,
    auth::{self, EDITORS, VIEWERS},
    crud::Resource,
    handlers,
};

/// Unauthenticated routes: health check and the `/api/v1` resources.
pub mod public;

/// Login, logout and the role-gated admin panel.
pub mod admin;

/// CrudRoutes
///
/// The five JSON endpoints of one resource, mounted relative to the resource's nest point:
/// `GET /`, `POST /`, `GET /{id}`, `PUT /{id}` and `DELETE /{id}`.
pub struct CrudRoutes<L, G, C, U, D> {
    pub list: L,
    pub get: G,
    pub create: C,
    pub update: U,
    pub delete: D,
}

impl<L, G, C, U, D> CrudRoutes<L, G, C, U, D> {
    pub fn into_router<TL, TG, TC, TU, TD>(self) -> Router<AppState>
    where
        L: Handler<TL, AppState>,
        G: Handler<TG, AppState>,
        C: Handler<TC, AppState>,
        U: Handler<TU, AppState>,
        D: Handler<TD, AppState>,
        TL: 'static,
        TG: 'static,
        TC: 'static,
        TU: 'static,
        TD: 'static,
    {
        Router::new()
            .route("/", get(self.list).post(self.create))
            .route(
                "/{id}",
                get(self.get).put(self.update).delete(self.delete),
            )
    }
}

/// AdminCrudRoutes
///
/// The HTMX form and mutation endpoints of one admin section: `GET /new`, `GET /edit/{id}`,
/// `POST /`, `PUT /{id}` and `DELETE /{id}`.
pub struct AdminCrudRoutes<N, E, C, U, D> {
    pub new_form: N,
    pub edit_form: E,
    pub create: C,
    pub update: U,
    pub delete: D,
}

impl<N, E, C, U, D> AdminCrudRoutes<N, E, C, U, D> {
    pub fn into_router<TN, TE, TC, TU, TD>(self) -> Router<AppState>
    where
        N: Handler<TN, AppState>,
        E: Handler<TE, AppState>,
        C: Handler<TC, AppState>,
        U: Handler<TU, AppState>,
        D: Handler<TD, AppState>,
        TN: 'static,
        TE: 'static,
        TC: 'static,
        TU: 'static,
        TD: 'static,
    {
        Router::new()
            .route("/new", get(self.new_form))
            .route("/edit/{id}", get(self.edit_form))
            .route("/", post(self.create))
            .route("/{id}", put(self.update).delete(self.delete))
    }
}

/// JSON API for any resource, nested under its `/api/v1/...` path.
pub fn api_routes<R: Resource>() -> Router<AppState> {
    CrudRoutes {
        list: handlers::api::list::<R>,
        get: handlers::api::get::<R>,
        create: handlers::api::create::<R>,
        update: handlers::api::update::<R>,
        delete: handlers::api::delete::<R>,
    }
    .into_router()
}

/// admin_resource_routes
///
/// One admin section: the list page is open to every role, forms and mutations to editors.
pub fn admin_resource_routes<R: Resource>() -> Router<AppState> {
    let view = Router::new()
        .route("/", get(handlers::admin::page::<R>))
        .route_layer(middleware::from_fn_with_state(VIEWERS, auth::require_role));

    let mutate = AdminCrudRoutes {
        new_form: handlers::admin::new_form::<R>,
        edit_form: handlers::admin::edit_form::<R>,
        create: handlers::admin::create::<R>,
        update: handlers::admin::update::<R>,
        delete: handlers::admin::delete::<R>,
    }
    .into_router()
    .route_layer(middleware::from_fn_with_state(EDITORS, auth::require_role));

    view.merge(mutate)
}
