#![allow(dead_code)]

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Method, Request, Response, StatusCode, header},
};
use clinic_cms::{AppConfig, AppState, accounts, create_router, models::{Role, User}};
use serde_json::Value;
use tower::ServiceExt;

pub const PASSWORD: &str = "correct horse battery staple";

/// In-process application backed by memory stores; requests go through the full router.
pub struct TestApp {
    pub state: AppState,
    pub router: Router,
}

pub fn spawn_app() -> TestApp {
    spawn_app_with(AppState::in_memory(AppConfig::default()))
}

pub fn spawn_app_with(state: AppState) -> TestApp {
    let router = create_router(state.clone());
    TestApp { state, router }
}

impl TestApp {
    pub async fn request(&self, request: Request<Body>) -> Response<Body> {
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router is infallible")
    }

    pub async fn get(&self, uri: &str, cookie: Option<&str>) -> Response<Body> {
        let mut builder = Request::builder().method(Method::GET).uri(uri);
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        self.request(builder.body(Body::empty()).unwrap()).await
    }

    pub async fn send_json(&self, method: Method, uri: &str, body: Value) -> Response<Body> {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        self.request(request).await
    }

    pub async fn send_empty(&self, method: Method, uri: &str, cookie: Option<&str>) -> Response<Body> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        self.request(builder.body(Body::empty()).unwrap()).await
    }

    pub async fn send_form(
        &self,
        method: Method,
        uri: &str,
        cookie: Option<&str>,
        fields: &[(&str, &str)],
    ) -> Response<Body> {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        let body = serde_urlencoded::to_string(fields).unwrap();
        self.request(builder.body(Body::from(body)).unwrap()).await
    }

    pub async fn seed_user(&self, username: &str, role: Role) -> User {
        accounts::create_superuser(
            self.state.users.as_ref(),
            role,
            username,
            PASSWORD,
            &format!("{username}@clinic.test"),
        )
        .await
        .expect("seed user")
    }

    /// Signs in and returns the `Cookie` header value for the new session.
    pub async fn login(&self, username: &str, password: &str) -> String {
        let response = self
            .send_form(
                Method::POST,
                "/admin/login",
                None,
                &[("username", username), ("password", password)],
            )
            .await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        session_cookie(&response).expect("login sets a session cookie")
    }

    /// Seeds a user with `role` and signs them in.
    pub async fn login_as(&self, username: &str, role: Role) -> String {
        self.seed_user(username, role).await;
        self.login(username, PASSWORD).await
    }
}

pub fn session_cookie(response: &Response<Body>) -> Option<String> {
    response
        .headers()
        .get(header::SET_COOKIE)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(';').next())
        .map(str::to_owned)
}

pub fn location(response: &Response<Body>) -> Option<&str> {
    response
        .headers()
        .get(header::LOCATION)
        .and_then(|value| value.to_str().ok())
}

pub async fn body_text(response: Response<Body>) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}
