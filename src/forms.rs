use std::collections::HashMap;

use axum::{
    Form,
    body::Bytes,
    extract::{FromRequest, Multipart, Request},
    http::header::CONTENT_TYPE,
};

use crate::{
    error::ApiError,
    models::{Category, Language, Localized, ParseError, TextBundle, Translations},
};

/// A file part of a multipart submission.
#[derive(Debug, Clone)]
pub struct Upload {
    pub file_name: String,
    pub bytes: Bytes,
}

/// FormInput
///
/// Admin form submission, accepted either urlencoded or as multipart. Text fields are kept by
/// name; file parts are kept only when a non-empty file was actually chosen.
#[derive(Debug, Clone, Default)]
pub struct FormInput {
    fields: HashMap<String, String>,
    files: HashMap<String, Upload>,
}

impl FormInput {
    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            fields: pairs
                .into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
            files: HashMap::new(),
        }
    }

    pub fn with_file(mut self, name: &str, file_name: &str, bytes: impl Into<Bytes>) -> Self {
        self.files.insert(
            name.to_owned(),
            Upload {
                file_name: file_name.to_owned(),
                bytes: bytes.into(),
            },
        );
        self
    }

    /// Trimmed value of `name`, empty when absent.
    pub fn text(&self, name: &str) -> String {
        self.fields
            .get(name)
            .map(|value| value.trim().to_owned())
            .unwrap_or_default()
    }

    pub fn optional(&self, name: &str) -> Option<String> {
        Some(self.text(name)).filter(|value| !value.is_empty())
    }

    /// Raw value of `name`, untrimmed (passwords).
    pub fn raw(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    pub fn file(&self, name: &str) -> Option<&Upload> {
        self.files.get(name)
    }

    async fn from_multipart(mut multipart: Multipart) -> Result<Self, ApiError> {
        let mut input = Self::default();
        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| ApiError::Validation(e.body_text()))?
        {
            let Some(name) = field.name().map(str::to_owned) else {
                continue;
            };
            let file_name = field.file_name().map(str::to_owned);
            let bytes = field
                .bytes()
                .await
                .map_err(|e| ApiError::Validation(e.body_text()))?;

            match file_name {
                Some(file_name) if !file_name.is_empty() && !bytes.is_empty() => {
                    input.files.insert(name, Upload { file_name, bytes });
                }
                Some(_) => {}
                None => {
                    input
                        .fields
                        .insert(name, String::from_utf8_lossy(&bytes).into_owned());
                }
            }
        }
        Ok(input)
    }
}

impl<S> FromRequest<S> for FormInput
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let is_multipart = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .is_some_and(|value| value.starts_with("multipart/form-data"));

        if is_multipart {
            let multipart = Multipart::from_request(req, state)
                .await
                .map_err(|e| ApiError::Validation(e.body_text()))?;
            return Self::from_multipart(multipart).await;
        }

        let Form(pairs) = Form::<Vec<(String, String)>>::from_request(req, state)
            .await
            .map_err(|e| ApiError::Validation(e.body_text()))?;
        Ok(Self::from_pairs(pairs))
    }
}

/// One option of a `<select>`.
#[derive(Debug, Clone)]
pub struct SelectOption {
    pub value: String,
    pub label: String,
    pub selected: bool,
}

/// FormField
///
/// View model for a single admin form control. `kind` is the HTML input type, or `textarea` or
/// `select`.
#[derive(Debug, Clone)]
pub struct FormField {
    pub name: String,
    pub label: String,
    pub kind: &'static str,
    pub value: String,
    pub required: bool,
    pub options: Vec<SelectOption>,
}

impl FormField {
    pub fn input(kind: &'static str, name: impl Into<String>, label: impl Into<String>, value: String) -> Self {
        Self {
            name: name.into(),
            label: label.into(),
            kind,
            value,
            required: false,
            options: Vec::new(),
        }
    }

    pub fn select(name: impl Into<String>, label: impl Into<String>, options: Vec<SelectOption>) -> Self {
        Self {
            kind: "select",
            required: true,
            options,
            ..Self::input("select", name, label, String::new())
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }
}

fn humanize(name: &str) -> String {
    let spaced = name.replace('_', " ");
    let mut chars = spaced.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn input_kind<T: TextBundle>(name: &str) -> &'static str {
    if T::MULTILINE.iter().any(|multiline| *multiline == name) {
        "textarea"
    } else {
        "text"
    }
}

/// Base fields followed by every translation, pre-filled from `existing`.
pub fn localized_fields<T: TextBundle>(existing: Option<&Localized<T>>) -> Vec<FormField> {
    let mut fields: Vec<FormField> = T::FIELDS
        .iter()
        .map(|name| {
            let value = existing
                .map(|localized| localized.base.field(name).to_owned())
                .unwrap_or_default();
            let field = FormField::input(input_kind::<T>(name), *name, humanize(name), value);
            if *name == T::FIELDS[0] {
                field.required()
            } else {
                field
            }
        })
        .collect();

    for lang in Language::ALL {
        for name in T::FIELDS {
            let value = existing
                .map(|localized| localized.text(lang).field(name).to_owned())
                .unwrap_or_default();
            fields.push(FormField::input(
                input_kind::<T>(name),
                lang.column(name),
                format!("{} ({})", humanize(name), lang.code().to_uppercase()),
                value,
            ));
        }
    }

    fields
}

/// Reads a base bundle and the translations that have at least one non-blank field.
pub fn localized_from_form<T: TextBundle>(form: &FormInput) -> (T, Translations<T>) {
    let base = T::from_fields(|name| form.text(name));
    let translations = Language::ALL
        .into_iter()
        .filter_map(|lang| {
            let text = T::from_fields(|name| form.text(&lang.column(name)));
            (!text.is_blank()).then_some((lang, text))
        })
        .collect();
    (base, translations)
}

pub fn category_field(selected: Option<Category>) -> FormField {
    let options = Category::ALL
        .into_iter()
        .map(|category| SelectOption {
            value: category.code().to_owned(),
            label: format!("{} ({})", category.label(), category.code()),
            selected: Some(category) == selected,
        })
        .collect();
    FormField::select("category", "Category", options)
}

pub fn category_from_form(form: &FormInput) -> Result<Category, ApiError> {
    form.text("category")
        .parse()
        .map_err(|e: ParseError| ApiError::Validation(e.to_string()))
}
