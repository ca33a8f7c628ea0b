use std::{cmp::Ordering, collections::BTreeMap};

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Row, postgres::PgRow};
use ts_rs::TS;
use utoipa::ToSchema;

use super::{Localized, Record, TextBundle, Translations};
use crate::{
    AppState,
    crud::{self, Resource},
    error::ApiError,
    forms::{self, FormField, FormInput},
    repository::{Columns, SqlValue, StoreState},
};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct NewsText {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub header: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub features: String,
}

impl TextBundle for NewsText {
    const FIELDS: &'static [&'static str] = &["title", "header", "description", "features"];
    const MULTILINE: &'static [&'static str] = &["description", "features"];

    fn field(&self, name: &str) -> &str {
        match name {
            "title" => &self.title,
            "header" => &self.header,
            "description" => &self.description,
            "features" => &self.features,
            _ => "",
        }
    }

    fn from_fields(mut value: impl FnMut(&'static str) -> String) -> Self {
        Self {
            title: value("title"),
            header: value("header"),
            description: value("description"),
            features: value("features"),
        }
    }
}

/// News
///
/// A dated announcement with up to two illustrations.
#[derive(Debug, Clone, PartialEq)]
pub struct News {
    pub text: Localized<NewsText>,
    pub posted_on: DateTime<Utc>,
    pub image_left: Option<String>,
    pub image_right: Option<String>,
}

/// Create and update body for news.
///
/// `posted_on` defaults to the time of creation and is kept on update when omitted. Image paths
/// follow the same rule; an empty string clears a stored image.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct NewsPayload {
    #[serde(flatten)]
    pub text: NewsText,
    #[serde(default)]
    pub posted_on: Option<DateTime<Utc>>,
    #[serde(default)]
    pub image_left: Option<String>,
    #[serde(default)]
    pub image_right: Option<String>,
    #[serde(flatten)]
    #[schema(value_type = BTreeMap<String, String>)]
    pub translations: Translations<NewsText>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct NewsResponse {
    pub pk: i64,
    #[serde(flatten)]
    pub text: NewsText,
    /// Flat `<field>_<lang>` keys, e.g. `title_pl`.
    #[serde(flatten)]
    pub translations: BTreeMap<String, String>,
    #[ts(type = "string")]
    pub posted_on: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub image_left: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub image_right: Option<String>,
}

fn non_empty(path: Option<String>) -> Option<String> {
    path.filter(|path| !path.trim().is_empty())
}

impl Columns for News {
    const TABLE: &'static str = "news";
    const UNIQUE_COLUMN: &'static str = "title";
    const LISTING_ORDER: &'static str = "posted_on DESC, id DESC";

    fn values(&self) -> Vec<(String, SqlValue)> {
        let mut values = self.text.columns();
        values.push(("posted_on".to_owned(), SqlValue::Timestamp(self.posted_on)));
        values.push((
            "image_left".to_owned(),
            SqlValue::OptionalText(self.image_left.clone()),
        ));
        values.push((
            "image_right".to_owned(),
            SqlValue::OptionalText(self.image_right.clone()),
        ));
        values
    }

    fn from_row(row: &PgRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            text: Localized::from_row(row)?,
            posted_on: row.try_get("posted_on")?,
            image_left: non_empty(row.try_get("image_left")?),
            image_right: non_empty(row.try_get("image_right")?),
        })
    }

    fn listing_cmp(&self, other: &Self) -> Ordering {
        other.posted_on.cmp(&self.posted_on)
    }
}

impl Resource for News {
    const NAME: &'static str = "News";
    const TITLE: &'static str = "News";
    const ADMIN_PATH: &'static str = "/admin/news";
    const API_PATH: &'static str = "/api/v1/news";

    const PAGINATE_BY_DEFAULT: bool = true;
    const DEFAULT_PAGE_SIZE: i64 = 1;

    const IMAGE_FIELDS: &'static [&'static str] = &["image_left", "image_right"];

    type Payload = NewsPayload;
    type Response = NewsResponse;

    fn store(state: &AppState) -> StoreState<Self> {
        state.news.clone()
    }

    fn validate(payload: &NewsPayload) -> Result<(), ApiError> {
        for field in ["title", "header", "description", "features"] {
            crud::require(field, payload.text.field(field))?;
        }
        crud::max_chars_localized("title", &payload.text, payload.translations.values(), 250)
    }

    fn from_request(payload: NewsPayload) -> Self {
        Self {
            text: Localized::new(payload.text, payload.translations.into_inner()),
            posted_on: payload.posted_on.unwrap_or_else(Utc::now),
            image_left: non_empty(payload.image_left),
            image_right: non_empty(payload.image_right),
        }
    }

    fn apply(&mut self, payload: NewsPayload) {
        self.text.update(payload.text, payload.translations.into_inner());
        if let Some(posted_on) = payload.posted_on {
            self.posted_on = posted_on;
        }
        if let Some(path) = payload.image_left {
            self.image_left = non_empty(Some(path));
        }
        if let Some(path) = payload.image_right {
            self.image_right = non_empty(Some(path));
        }
    }

    fn to_response(record: Record<Self>) -> NewsResponse {
        let translations = record.fields.text.flat_translations();
        let text = record.fields.text.base;
        NewsResponse {
            pk: record.id,
            text,
            translations,
            posted_on: record.fields.posted_on,
            image_left: record.fields.image_left,
            image_right: record.fields.image_right,
        }
    }

    fn from_form(form: &FormInput) -> Result<NewsPayload, ApiError> {
        let (text, translations) = forms::localized_from_form(form);
        let posted_on = match form.optional("posted_on") {
            Some(raw) => {
                let date = NaiveDate::parse_from_str(&raw, "%Y-%m-%d").map_err(|_| {
                    ApiError::Validation(format!("posted_on '{raw}' is not a YYYY-MM-DD date"))
                })?;
                date.and_hms_opt(0, 0, 0).map(|time| time.and_utc())
            }
            None => None,
        };

        Ok(NewsPayload {
            text,
            posted_on,
            image_left: None,
            image_right: None,
            translations,
        })
    }

    fn attach_image(payload: &mut NewsPayload, field: &str, path: String) {
        match field {
            "image_left" => payload.image_left = Some(path),
            "image_right" => payload.image_right = Some(path),
            _ => {}
        }
    }

    fn admin_headers() -> Vec<&'static str> {
        vec!["ID", "Title", "Posted on", "Images"]
    }

    fn admin_cells(record: &Record<Self>) -> Vec<String> {
        let images = [&record.fields.image_left, &record.fields.image_right]
            .into_iter()
            .filter(|image| image.is_some())
            .count();
        vec![
            record.id.to_string(),
            record.fields.text.base.title.clone(),
            record.fields.posted_on.format("%Y-%m-%d").to_string(),
            images.to_string(),
        ]
    }

    fn form_fields(existing: Option<&Self>) -> Vec<FormField> {
        let mut fields = forms::localized_fields(existing.map(|news| &news.text));
        fields.push(FormField::input(
            "date",
            "posted_on",
            "Posted on",
            existing
                .map(|news| news.posted_on.format("%Y-%m-%d").to_string())
                .unwrap_or_default(),
        ));
        fields.push(FormField::input(
            "file",
            "image_left",
            "Left image",
            existing
                .and_then(|news| news.image_left.clone())
                .unwrap_or_default(),
        ));
        fields.push(FormField::input(
            "file",
            "image_right",
            "Right image",
            existing
                .and_then(|news| news.image_right.clone())
                .unwrap_or_default(),
        ));
        fields
    }
}
