mod common;

use std::{io::Cursor, sync::Arc};

use axum::{
    body::{Body, Bytes},
    http::{Method, Request, StatusCode, header},
};
use clinic_cms::{
    AppConfig, AppState, LocalImageStore, MockImageStore,
    models::Role,
    storage::{ImageError, ImageService, MAX_IMAGE_WIDTH, sanitize_file_name},
};
use common::{TestApp, spawn_app, spawn_app_with};
use image::{ImageFormat, RgbImage};

const BOUNDARY: &str = "clinic-test-boundary";

fn png(width: u32, height: u32) -> Vec<u8> {
    let mut bytes = Cursor::new(Vec::new());
    RgbImage::from_pixel(width, height, image::Rgb([200, 120, 40]))
        .write_to(&mut bytes, ImageFormat::Png)
        .unwrap();
    bytes.into_inner()
}

fn multipart_body(fields: &[(&str, &str)], files: &[(&str, &str, &[u8])]) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
    }
    for (name, file_name, bytes) in files {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"; filename=\"{file_name}\"\r\nContent-Type: image/png\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

async fn send_multipart(
    app: &TestApp,
    method: Method,
    uri: &str,
    cookie: &str,
    body: Vec<u8>,
) -> axum::http::Response<Body> {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::COOKIE, cookie)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap();
    app.request(request).await
}

const NEWS_FIELDS: &[(&str, &str)] = &[
    ("title", "New laser"),
    ("header", "Equipment"),
    ("description", "We bought a new laser"),
    ("features", "Faster sessions"),
    ("posted_on", "2024-04-01"),
];

#[tokio::test]
async fn test_local_store_shrinks_wide_images_keeping_aspect_ratio() {
    let dir = tempfile::tempdir().unwrap();
    let store = LocalImageStore::new(dir.path());
    store.ensure_ready().await.unwrap();

    let path = store
        .store_image("../holiday photo.png", Bytes::from(png(1600, 400)))
        .await
        .unwrap();

    assert!(path.starts_with("/uploads/"));
    assert!(path.ends_with("_holiday_photo.png"));

    let file_name = path.trim_start_matches("/uploads/");
    let stored = image::open(dir.path().join(file_name)).unwrap();
    assert_eq!(stored.width(), MAX_IMAGE_WIDTH);
    assert_eq!(stored.height(), 200);
}

#[tokio::test]
async fn test_local_store_never_enlarges_small_images() {
    let dir = tempfile::tempdir().unwrap();
    let store = LocalImageStore::new(dir.path());

    let path = store
        .store_image("small.png", Bytes::from(png(300, 150)))
        .await
        .unwrap();

    let stored = image::open(dir.path().join(path.trim_start_matches("/uploads/"))).unwrap();
    assert_eq!((stored.width(), stored.height()), (300, 150));
}

#[tokio::test]
async fn test_local_store_rejects_bad_input() {
    let dir = tempfile::tempdir().unwrap();
    let store = LocalImageStore::new(dir.path());

    let err = store
        .store_image("notes.txt", Bytes::from_static(b"hello"))
        .await
        .unwrap_err();
    assert!(matches!(err, ImageError::Unsupported(_)));

    let err = store
        .store_image("broken.png", Bytes::from_static(b"not really a png"))
        .await
        .unwrap_err();
    assert!(matches!(err, ImageError::Decode(_)));
}

#[test]
fn test_sanitize_file_name() {
    assert_eq!(sanitize_file_name("photo.jpg"), "photo.jpg");
    assert_eq!(sanitize_file_name("../../etc/passwd"), "passwd");
    assert_eq!(sanitize_file_name("C:\\Users\\me\\my pic.png"), "my_pic.png");
    assert_eq!(sanitize_file_name("zdjęcie.png"), "zdj_cie.png");
    assert_eq!(sanitize_file_name("../"), "upload");
}

#[tokio::test]
async fn test_news_form_with_images_records_upload_paths() {
    let app = spawn_app();
    let cookie = app.login_as("editor", Role::Editor).await;
    let image = png(10, 10);

    let response = send_multipart(
        &app,
        Method::POST,
        "/admin/news",
        &cookie,
        multipart_body(NEWS_FIELDS, &[("image_left", "photo.png", &image)]),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let stored = app.state.news.find(1).await.unwrap();
    assert_eq!(stored.fields.image_left.as_deref(), Some("/uploads/mock_photo.png"));
    assert_eq!(stored.fields.image_right, None);
    assert_eq!(stored.fields.posted_on.format("%Y-%m-%d").to_string(), "2024-04-01");

    // A resubmission without files keeps the stored image.
    let response = send_multipart(
        &app,
        Method::PUT,
        "/admin/news/1",
        &cookie,
        multipart_body(NEWS_FIELDS, &[("image_right", "side.png", &image)]),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let stored = app.state.news.find(1).await.unwrap();
    assert_eq!(stored.fields.image_left.as_deref(), Some("/uploads/mock_photo.png"));
    assert_eq!(stored.fields.image_right.as_deref(), Some("/uploads/mock_side.png"));
}

#[tokio::test]
async fn test_news_edit_form_is_multipart() {
    let app = spawn_app();
    let cookie = app.login_as("editor", Role::Editor).await;

    let response = app.get("/admin/news/new", Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let html = common::body_text(response).await;
    assert!(html.contains("hx-encoding=\"multipart/form-data\""));
    assert!(html.contains("type=\"file\""));
}

#[tokio::test]
async fn test_failed_upload_creates_nothing() {
    let mut state = AppState::in_memory(AppConfig::default());
    state.images = Arc::new(MockImageStore::new_failing());
    let app = spawn_app_with(state);
    let cookie = app.login_as("editor", Role::Editor).await;

    let response = send_multipart(
        &app,
        Method::POST,
        "/admin/news",
        &cookie,
        multipart_body(NEWS_FIELDS, &[("image_left", "photo.png", &png(10, 10))]),
    )
    .await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(app.state.news.count().await.unwrap(), 0);
}
