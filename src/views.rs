use askama::Template;
use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};

use crate::{error::ApiError, forms::FormField};

/// One table row of an admin list page.
#[derive(Debug, Clone)]
pub struct AdminRow {
    pub id: i64,
    pub cells: Vec<String>,
}

#[derive(Template)]
#[template(path = "login.html")]
pub struct LoginPage {
    pub error: Option<String>,
}

/// ListPage
///
/// Full admin page: navigation, the signed-in user, the record table and the pending flash.
#[derive(Template)]
#[template(path = "list.html")]
pub struct ListPage {
    pub title: &'static str,
    pub path: &'static str,
    pub user: String,
    pub role: String,
    pub is_admin: bool,
    pub can_edit: bool,
    pub headers: Vec<&'static str>,
    pub rows: Vec<AdminRow>,
    pub error: Option<String>,
}

/// Single `<tr>` returned after an HTMX create or update.
#[derive(Template)]
#[template(path = "row.html")]
pub struct RowFragment {
    pub path: &'static str,
    pub row: AdminRow,
    pub can_edit: bool,
}

/// FormFragment
///
/// Create or edit form swapped into the list page. New records are appended to the table body;
/// edited records replace their own row.
#[derive(Template)]
#[template(path = "form.html")]
pub struct FormFragment {
    pub heading: String,
    pub action: String,
    pub editing: bool,
    pub target: String,
    pub swap: &'static str,
    pub multipart: bool,
    pub fields: Vec<FormField>,
    pub error: Option<String>,
}

impl FormFragment {
    pub fn create(title: &str, path: &str, fields: Vec<FormField>, multipart: bool) -> Self {
        Self {
            heading: format!("New {title}"),
            action: path.to_owned(),
            editing: false,
            target: "#rows".to_owned(),
            swap: "beforeend",
            multipart,
            fields,
            error: None,
        }
    }

    pub fn edit(title: &str, path: &str, id: i64, fields: Vec<FormField>, multipart: bool) -> Self {
        Self {
            heading: format!("Edit {title} #{id}"),
            action: format!("{path}/{id}"),
            editing: true,
            target: format!("#row-{id}"),
            swap: "outerHTML",
            multipart,
            fields,
            error: None,
        }
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }
}

#[derive(Template)]
#[template(path = "error.html")]
pub struct ErrorPage {
    pub status: u16,
    pub title: &'static str,
    pub message: String,
}

pub fn render<T: Template>(template: &T) -> Result<Html<String>, ApiError> {
    Ok(Html(template.render()?))
}

fn error_page(status: StatusCode, title: &'static str, message: &str) -> Response {
    let page = ErrorPage {
        status: status.as_u16(),
        title,
        message: message.to_owned(),
    };
    match render(&page) {
        Ok(html) => (status, html).into_response(),
        Err(e) => {
            tracing::error!(error = ?e, "error page failed to render");
            (status, title).into_response()
        }
    }
}

pub fn forbidden() -> Response {
    error_page(
        StatusCode::FORBIDDEN,
        "Forbidden",
        "Your role does not allow this action.",
    )
}

pub fn not_found_page() -> Response {
    error_page(
        StatusCode::NOT_FOUND,
        "Not found",
        "The requested record does not exist.",
    )
}
