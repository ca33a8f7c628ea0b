mod common;

use axum::http::{Method, StatusCode};
use clinic_cms::{
    accounts::{self, AccountError},
    models::{Role, User},
    repository::{MemoryUserRepository, StoreError, UserRepository},
};
use common::{PASSWORD, body_text, spawn_app};

const LAST_ADMIN: &str = "Cannot delete the last admin user.";

#[tokio::test]
async fn test_deleting_the_last_admin_is_refused() {
    let app = spawn_app();
    let cookie = app.login_as("boss", Role::Admin).await;
    let boss = app.state.users.find_by_username("boss").await.unwrap().unwrap();

    let response = app
        .send_empty(Method::DELETE, &format!("/admin/users/{}", boss.id), Some(&cookie))
        .await;

    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(
        response.headers().get("HX-Refresh").and_then(|v| v.to_str().ok()),
        Some("true")
    );
    assert_eq!(app.state.users.count_by_role(Role::Admin).await.unwrap(), 1);

    let page = body_text(app.get("/admin/users", Some(&cookie)).await).await;
    assert!(page.contains(LAST_ADMIN));

    // The flash is shown once.
    let page = body_text(app.get("/admin/users", Some(&cookie)).await).await;
    assert!(!page.contains(LAST_ADMIN));
}

#[tokio::test]
async fn test_deleting_an_admin_succeeds_while_another_remains() {
    let app = spawn_app();
    let cookie = app.login_as("boss", Role::Admin).await;
    let deputy = app.seed_user("deputy", Role::Admin).await;

    let response = app
        .send_empty(Method::DELETE, &format!("/admin/users/{}", deputy.id), Some(&cookie))
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_text(response).await.is_empty());
    assert_eq!(app.state.users.count_by_role(Role::Admin).await.unwrap(), 1);
    assert!(app.state.users.find_by_username("deputy").await.unwrap().is_none());
}

#[tokio::test]
async fn test_deleting_unknown_user_is_not_found() {
    let app = spawn_app();
    let cookie = app.login_as("boss", Role::Admin).await;

    let response = app
        .send_empty(Method::DELETE, "/admin/users/999", Some(&cookie))
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_demoting_the_last_admin_is_refused() {
    let app = spawn_app();
    let cookie = app.login_as("boss", Role::Admin).await;
    let boss = app.state.users.find_by_username("boss").await.unwrap().unwrap();

    let response = app
        .send_form(
            Method::PUT,
            &format!("/admin/users/{}", boss.id),
            Some(&cookie),
            &[("username", "boss"), ("email", "boss@clinic.test"), ("role", "reader")],
        )
        .await;

    assert_eq!(response.status(), StatusCode::CONFLICT);
    let stored = app.state.users.find_user(boss.id).await.unwrap();
    assert_eq!(stored.role, Role::Admin);
}

#[tokio::test]
async fn test_admins_deleting_each_other_keep_one_admin() {
    let users = MemoryUserRepository::new();
    let first = accounts::create_superuser(&users, Role::Admin, "first", "pw", "first@clinic.test")
        .await
        .unwrap();
    let second =
        accounts::create_superuser(&users, Role::Admin, "second", "pw", "second@clinic.test")
            .await
            .unwrap();

    let (a, b) = tokio::join!(users.delete_user(second.id), users.delete_user(first.id));

    let outcomes = [a, b];
    assert_eq!(outcomes.iter().filter(|r| matches!(r, Ok(1))).count(), 1);
    assert_eq!(
        outcomes
            .iter()
            .filter(|r| matches!(r, Err(StoreError::LastAdmin)))
            .count(),
        1
    );
    assert_eq!(users.count_by_role(Role::Admin).await.unwrap(), 1);
}

#[tokio::test]
async fn test_repository_refuses_to_demote_the_last_admin() {
    let users = MemoryUserRepository::new();
    let admin = accounts::create_superuser(&users, Role::Admin, "root", "pw", "root@clinic.test")
        .await
        .unwrap();

    let demoted = User {
        role: Role::Editor,
        ..admin.clone()
    };
    let err = users.save_user(&demoted).await.unwrap_err();
    assert!(matches!(err, StoreError::LastAdmin));
    assert_eq!(users.find_user(admin.id).await.unwrap().role, Role::Admin);

    // Editors and readers can always be removed.
    let editor = accounts::create_superuser(&users, Role::Editor, "ed", "pw", "ed@clinic.test")
        .await
        .unwrap();
    assert_eq!(users.delete_user(editor.id).await.unwrap(), 1);
}

#[tokio::test]
async fn test_user_forms_require_email() {
    let app = spawn_app();
    let cookie = app.login_as("boss", Role::Admin).await;

    let response = app
        .send_form(
            Method::POST,
            "/admin/users",
            Some(&cookie),
            &[("username", "nurse"), ("email", "  "), ("password", "pw"), ("role", "editor")],
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(body_text(response).await.contains("email is required"));
    assert!(app.state.users.find_by_username("nurse").await.unwrap().is_none());

    let nurse = app.seed_user("nurse", Role::Reader).await;
    let response = app
        .send_form(
            Method::PUT,
            &format!("/admin/users/{}", nurse.id),
            Some(&cookie),
            &[("username", "nurse"), ("email", ""), ("role", "reader")],
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(body_text(response).await.contains("email is required"));
    let stored = app.state.users.find_user(nurse.id).await.unwrap();
    assert_eq!(stored.email, "nurse@clinic.test");
}

#[tokio::test]
async fn test_create_user_requires_password() {
    let app = spawn_app();
    let cookie = app.login_as("boss", Role::Admin).await;

    let response = app
        .send_form(
            Method::POST,
            "/admin/users",
            Some(&cookie),
            &[("username", "nurse"), ("email", "nurse@clinic.test"), ("role", "editor")],
        )
        .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let html = body_text(response).await;
    assert!(html.contains("password is required"));
    assert!(html.contains("<form"));
    assert!(app.state.users.find_by_username("nurse").await.unwrap().is_none());
}

#[tokio::test]
async fn test_created_user_has_hashed_password_and_can_sign_in() {
    let app = spawn_app();
    let cookie = app.login_as("boss", Role::Admin).await;

    let response = app
        .send_form(
            Method::POST,
            "/admin/users",
            Some(&cookie),
            &[
                ("username", "nurse"),
                ("email", "nurse@clinic.test"),
                ("password", "s3cret-pass"),
                ("role", "editor"),
            ],
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let row = body_text(response).await;
    assert!(row.contains("nurse@clinic.test"));
    assert!(!row.contains("argon2"));

    let nurse = app.state.users.find_by_username("nurse").await.unwrap().unwrap();
    assert_eq!(nurse.role, Role::Editor);
    assert_ne!(nurse.password_hash, "s3cret-pass");
    assert!(nurse.password_hash.starts_with("$argon2"));

    let nurse_cookie = app.login("nurse", "s3cret-pass").await;
    let page = app.get("/admin/programs", Some(&nurse_cookie)).await;
    assert_eq!(page.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_update_keeps_password_when_left_blank() {
    let app = spawn_app();
    let cookie = app.login_as("boss", Role::Admin).await;
    let nurse = app.seed_user("nurse", Role::Reader).await;

    let response = app
        .send_form(
            Method::PUT,
            &format!("/admin/users/{}", nurse.id),
            Some(&cookie),
            &[
                ("username", "nurse"),
                ("email", "head.nurse@clinic.test"),
                ("password", ""),
                ("role", "editor"),
            ],
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let stored = app.state.users.find_user(nurse.id).await.unwrap();
    assert_eq!(stored.email, "head.nurse@clinic.test");
    assert_eq!(stored.role, Role::Editor);
    assert_eq!(stored.password_hash, nurse.password_hash);
    assert!(accounts::verify_password(PASSWORD, &stored.password_hash));
}

#[tokio::test]
async fn test_user_list_never_shows_password_hashes() {
    let app = spawn_app();
    let cookie = app.login_as("boss", Role::Admin).await;

    let html = body_text(app.get("/admin/users", Some(&cookie)).await).await;
    assert!(html.contains("boss@clinic.test"));
    assert!(!html.contains("$argon2"));
}

#[tokio::test]
async fn test_create_superuser_rejects_existing_username() {
    let users = MemoryUserRepository::new();

    let created = accounts::create_superuser(&users, Role::Admin, "root", "pw", "root@clinic.test")
        .await
        .unwrap();
    assert_eq!(created.role, Role::Admin);
    assert!(accounts::verify_password("pw", &created.password_hash));

    let err = accounts::create_superuser(&users, Role::Admin, "root", "other", "other@clinic.test")
        .await
        .unwrap_err();
    assert!(matches!(err, AccountError::UsernameTaken(name) if name == "root"));
    assert_eq!(users.count_by_role(Role::Admin).await.unwrap(), 1);
}

#[tokio::test]
async fn test_create_superuser_uses_requested_role() {
    let users = MemoryUserRepository::new();
    let created = accounts::create_superuser(&users, Role::Editor, "ops", "pw", "ops@clinic.test")
        .await
        .unwrap();
    assert_eq!(created.role, Role::Editor);
}

#[test]
fn test_verify_password_rejects_wrong_and_malformed_hashes() {
    let hash = accounts::hash_password("hunter2").unwrap();
    assert!(accounts::verify_password("hunter2", &hash));
    assert!(!accounts::verify_password("hunter3", &hash));
    assert!(!accounts::verify_password("hunter2", "not-a-phc-string"));
}
