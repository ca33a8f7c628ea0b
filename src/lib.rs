use std::sync::Arc;

use axum::{
    Router,
    extract::FromRef,
    http::HeaderName,
};
use sha2::{Digest, Sha512};
use sqlx::PgPool;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    services::ServeDir,
    trace::{DefaultOnResponse, TraceLayer},
};
use tower_sessions::{
    Expiry, MemoryStore as SessionStore, SessionManagerLayer,
    cookie::{Key, SameSite, time::Duration},
};
use tracing::{Level, Span};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

// --- Module Structure ---

pub mod accounts;
pub mod auth;
pub mod config;
pub mod crud;
pub mod error;
pub mod extract;
pub mod forms;
pub mod handlers;
pub mod models;
pub mod pagination;
pub mod repository;
pub mod storage;
pub mod views;

// Routing segregation (public API, admin panel).
pub mod routes;
use routes::{admin, public};

// --- Public Re-exports ---

pub use config::{AppConfig, Env};
pub use repository::{
    MemoryStore, MemoryUserRepository, PostgresStore, PostgresUserRepository, StoreState,
    UserRepositoryState,
};
pub use storage::{ImageState, LocalImageStore, MockImageStore};

use models::{News, Price, Program};

/// Name of the session cookie.
pub const SESSION_COOKIE: &str = "clinic_session";

/// Idle time after which a session expires.
const SESSION_IDLE_HOURS: i64 = 12;

/// ApiDoc
///
/// OpenAPI document served at `/api-docs/openapi.json`.
#[derive(OpenApi)]
#[openapi(
    paths(handlers::health),
    components(
        schemas(
            error::ErrorBody,
            models::Category, models::Language, models::Role,
            models::ProgramText, models::ProgramPayload, models::ProgramResponse,
            models::PriceText, models::PricePayload, models::PriceResponse,
            models::NewsText, models::NewsPayload, models::NewsResponse,
        )
    ),
    tags(
        (name = "clinic-cms", description = "Clinic content API")
    )
)]
struct ApiDoc;

/// AppState
///
/// Shared, cheaply cloned container for every service a handler may need.
#[derive(Clone)]
pub struct AppState {
    pub programs: StoreState<Program>,
    pub prices: StoreState<Price>,
    pub news: StoreState<News>,
    pub users: UserRepositoryState,
    pub images: ImageState,
    pub config: AppConfig,
}

impl AppState {
    /// Production wiring: every store shares one connection pool.
    pub fn postgres(pool: PgPool, images: ImageState, config: AppConfig) -> Self {
        Self {
            programs: Arc::new(PostgresStore::<Program>::new(pool.clone())),
            prices: Arc::new(PostgresStore::<Price>::new(pool.clone())),
            news: Arc::new(PostgresStore::<News>::new(pool.clone())),
            users: Arc::new(PostgresUserRepository::new(pool)),
            images,
            config,
        }
    }

    /// Fully in-process state backed by memory stores and the mock image service.
    pub fn in_memory(config: AppConfig) -> Self {
        Self {
            programs: Arc::new(MemoryStore::<Program>::new()),
            prices: Arc::new(MemoryStore::<Price>::new()),
            news: Arc::new(MemoryStore::<News>::new()),
            users: Arc::new(MemoryUserRepository::new()),
            images: Arc::new(MockImageStore::new()),
            config,
        }
    }
}

// --- Axum FromRef Extractor Implementations ---

impl FromRef<AppState> for UserRepositoryState {
    fn from_ref(app_state: &AppState) -> UserRepositoryState {
        app_state.users.clone()
    }
}

impl FromRef<AppState> for ImageState {
    fn from_ref(app_state: &AppState) -> ImageState {
        app_state.images.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

/// create_router
///
/// Assembles the routers, registers the state and wraps everything in the session,
/// observability and CORS layers.
pub fn create_router(state: AppState) -> Router {
    // 1. CORS Configuration
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    // Header name constant for request correlation.
    let x_request_id = HeaderName::from_static("x-request-id");

    // Server-side sessions with a signed cookie. The SHA-512 digest of the secret yields the
    // 64 bytes of key material the cookie jar requires.
    let key = Key::from(Sha512::digest(state.config.session_secret.as_bytes()).as_slice());
    let sessions = SessionManagerLayer::new(SessionStore::default())
        .with_name(SESSION_COOKIE)
        .with_secure(state.config.env == Env::Production)
        .with_same_site(SameSite::Lax)
        .with_expiry(Expiry::OnInactivity(Duration::hours(SESSION_IDLE_HOURS)))
        .with_signed(key);
    let uploads = ServeDir::new(&state.config.upload_dir);

    // 2. Base Router Assembly
    let base_router = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(public::public_routes())
        .nest("/admin", admin::admin_routes())
        .nest_service(storage::UPLOADS_PREFIX, uploads)
        .with_state(state);

    // 3. Observability and Correlation Layers
    base_router
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(trace_span_logger)
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(tower_http::LatencyUnit::Millis),
                        ),
                )
                .layer(PropagateRequestIdLayer::new(x_request_id)),
        )
        .layer(sessions)
        // 4. CORS Layer
        .layer(cors)
}

/// trace_span_logger
///
/// Span for one request, tagged with its `x-request-id` so every log line can be correlated.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}
