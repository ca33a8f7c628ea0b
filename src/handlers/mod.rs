/// JSON CRUD handlers shared by every content resource.
pub mod api;

/// HTMX admin-panel handlers shared by every content resource.
pub mod admin;

/// Account management under `/admin/users`.
pub mod users;

/// Sign-in and sign-out.
pub mod login;

/// health
///
/// Liveness probe for monitoring and load balancers.
#[utoipa::path(
    get,
    path = "/health",
    responses((status = 200, description = "Service is up", body = String))
)]
pub async fn health() -> &'static str {
    "ok"
}
