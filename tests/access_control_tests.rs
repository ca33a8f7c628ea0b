mod common;

use axum::http::{Method, StatusCode};
use clinic_cms::{
    handlers::login::INVALID_CREDENTIALS,
    models::{Category, Language, Localized, Program, ProgramText, Role},
};
use common::{PASSWORD, body_text, location, session_cookie, spawn_app};
use std::collections::BTreeMap;

const PROGRAM_FORM: &[(&str, &str)] = &[
    ("title", "Sports rehab"),
    ("description", "Return to training"),
    ("results", "Full range of motion"),
    ("category", "KS"),
];

fn sample_program(title: &str) -> Program {
    Program {
        text: Localized::new(
            ProgramText {
                title: title.to_owned(),
                description: "Seeded".to_owned(),
                results: "Seeded".to_owned(),
            },
            BTreeMap::new(),
        ),
        category: Category::Kosmetologia,
    }
}

#[tokio::test]
async fn test_mutations_without_session_redirect_and_change_nothing() {
    let app = spawn_app();
    let seeded = app
        .state
        .programs
        .create(sample_program("Seeded"))
        .await
        .unwrap();
    let item = format!("/admin/programs/{}", seeded.id);

    let responses = [
        app.send_form(Method::POST, "/admin/programs", None, PROGRAM_FORM).await,
        app.send_form(Method::PUT, &item, None, PROGRAM_FORM).await,
        app.send_empty(Method::DELETE, &item, None).await,
    ];
    for response in &responses {
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(response), Some("/admin/login"));
    }

    assert_eq!(app.state.programs.count().await.unwrap(), 1);
    let stored = app.state.programs.find(seeded.id).await.unwrap();
    assert_eq!(stored.fields.text.base.title, "Seeded");
}

#[tokio::test]
async fn test_admin_pages_redirect_anonymous_visitors() {
    let app = spawn_app();
    for uri in ["/admin", "/admin/programs", "/admin/news/new", "/admin/users"] {
        let response = app.get(uri, None).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER, "{uri}");
        assert_eq!(location(&response), Some("/admin/login"), "{uri}");
    }
}

#[tokio::test]
async fn test_reader_can_browse_but_not_modify() {
    let app = spawn_app();
    let seeded = app
        .state
        .programs
        .create(sample_program("Visible to readers"))
        .await
        .unwrap();
    let cookie = app.login_as("reader", Role::Reader).await;
    let item = format!("/admin/programs/{}", seeded.id);

    let page = app.get("/admin/programs", Some(&cookie)).await;
    assert_eq!(page.status(), StatusCode::OK);
    let html = body_text(page).await;
    assert!(html.contains("Visible to readers"));
    assert!(!html.contains("hx-delete"));

    let responses = [
        app.get("/admin/programs/new", Some(&cookie)).await,
        app.send_form(Method::POST, "/admin/programs", Some(&cookie), PROGRAM_FORM).await,
        app.send_form(Method::PUT, &item, Some(&cookie), PROGRAM_FORM).await,
        app.send_empty(Method::DELETE, &item, Some(&cookie)).await,
    ];
    for response in responses {
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert!(body_text(response).await.contains("403"));
    }

    assert_eq!(app.state.programs.count().await.unwrap(), 1);
    let stored = app.state.programs.find(seeded.id).await.unwrap();
    assert_eq!(stored.fields.text.base.title, "Visible to readers");
}

#[tokio::test]
async fn test_editor_manages_content_through_forms() {
    let app = spawn_app();
    let cookie = app.login_as("editor", Role::Editor).await;

    let response = app
        .send_form(Method::POST, "/admin/programs", Some(&cookie), PROGRAM_FORM)
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let row = body_text(response).await;
    assert!(row.contains("<tr id=\"row-1\">"));
    assert!(row.contains("Sports rehab"));

    let stored = app.state.programs.find(1).await.unwrap();
    assert_eq!(stored.fields.category, Category::Kosmetologia);
    assert_eq!(stored.fields.text.text(Language::Uk).title, "Sports rehab");

    let edit = app.get("/admin/programs/edit/1", Some(&cookie)).await;
    assert_eq!(edit.status(), StatusCode::OK);
    assert!(body_text(edit).await.contains("hx-put=\"/admin/programs/1\""));

    let response = app
        .send_form(
            Method::PUT,
            "/admin/programs/1",
            Some(&cookie),
            &[
                ("title", "Sports rehab"),
                ("description", "Return to training"),
                ("results", "Full range of motion"),
                ("category", "TR"),
                ("title_en", "Sports rehabilitation"),
            ],
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let stored = app.state.programs.find(1).await.unwrap();
    assert_eq!(stored.fields.category, Category::Trychologia);
    assert_eq!(
        stored.fields.text.text(Language::En).title,
        "Sports rehabilitation"
    );

    let response = app
        .send_empty(Method::DELETE, "/admin/programs/1", Some(&cookie))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_text(response).await.is_empty());

    let response = app
        .send_empty(Method::DELETE, "/admin/programs/1", Some(&cookie))
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_edit_form_for_missing_record_renders_not_found_page() {
    let app = spawn_app();
    let cookie = app.login_as("editor", Role::Editor).await;

    let response = app.get("/admin/prices/edit/42", Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert!(body_text(response).await.contains("404 Not found"));
}

#[tokio::test]
async fn test_editor_is_forbidden_from_user_admin() {
    let app = spawn_app();
    let cookie = app.login_as("editor", Role::Editor).await;

    let response = app.get("/admin/users", Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app
        .send_form(
            Method::POST,
            "/admin/users",
            Some(&cookie),
            &[("username", "intruder"), ("password", "x"), ("email", "i@x.test"), ("role", "admin")],
        )
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert!(app.state.users.find_by_username("intruder").await.unwrap().is_none());
}

#[tokio::test]
async fn test_list_page_shows_user_and_role() {
    let app = spawn_app();
    let cookie = app.login_as("boss", Role::Admin).await;

    let html = body_text(app.get("/admin/news", Some(&cookie)).await).await;
    assert!(html.contains("boss (admin)"));
    assert!(html.contains("href=\"/admin/users\""));
}

#[tokio::test]
async fn test_admin_root_redirects_to_programs() {
    let app = spawn_app();
    let cookie = app.login_as("boss", Role::Admin).await;

    let response = app.get("/admin", Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), Some("/admin/programs"));
}

#[tokio::test]
async fn test_successful_login_redirects_to_programs() {
    let app = spawn_app();
    app.seed_user("boss", Role::Admin).await;

    let response = app
        .send_form(
            Method::POST,
            "/admin/login",
            None,
            &[("username", "boss"), ("password", PASSWORD)],
        )
        .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), Some("/admin/programs"));

    let cookie = session_cookie(&response).unwrap();
    assert!(cookie.starts_with("clinic_session="));
    let page = app.get("/admin/programs", Some(&cookie)).await;
    assert_eq!(page.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_login_failures_are_indistinguishable() {
    let app = spawn_app();
    app.seed_user("boss", Role::Admin).await;

    let wrong_password = app
        .send_form(
            Method::POST,
            "/admin/login",
            None,
            &[("username", "boss"), ("password", "wrong")],
        )
        .await;
    let unknown_user = app
        .send_form(
            Method::POST,
            "/admin/login",
            None,
            &[("username", "nobody"), ("password", "wrong")],
        )
        .await;

    assert_eq!(wrong_password.status(), unknown_user.status());
    assert_eq!(wrong_password.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&wrong_password), Some("/admin/login"));
    assert_eq!(location(&unknown_user), Some("/admin/login"));

    let mut pages = Vec::new();
    for response in [&wrong_password, &unknown_user] {
        let cookie = session_cookie(response).expect("flash is stored in a session");
        let page = app.get("/admin/login", Some(&cookie)).await;
        assert_eq!(page.status(), StatusCode::OK);
        pages.push(body_text(page).await);
    }
    assert!(pages[0].contains(INVALID_CREDENTIALS));
    assert_eq!(pages[0], pages[1]);

    // Neither attempt signed anyone in.
    let cookie = session_cookie(&wrong_password).unwrap();
    let response = app.get("/admin/programs", Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
}

#[tokio::test]
async fn test_logout_ends_the_session() {
    let app = spawn_app();
    let cookie = app.login_as("boss", Role::Admin).await;
    assert_eq!(
        app.get("/admin/programs", Some(&cookie)).await.status(),
        StatusCode::OK
    );

    let response = app.get("/admin/logout", Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), Some("/admin/login"));

    let response = app.get("/admin/programs", Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), Some("/admin/login"));
}
