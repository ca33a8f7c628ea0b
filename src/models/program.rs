use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use sqlx::{Row, postgres::PgRow};
use ts_rs::TS;
use utoipa::ToSchema;

use super::{Category, Localized, ParseError, Record, TextBundle, Translations};
use crate::{
    AppState,
    crud::{self, Resource},
    error::ApiError,
    forms::{self, FormField, FormInput},
    repository::{Columns, SqlValue, StoreState},
};

/// Translatable text of a treatment program.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct ProgramText {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub results: String,
}

impl TextBundle for ProgramText {
    const FIELDS: &'static [&'static str] = &["title", "description", "results"];
    const MULTILINE: &'static [&'static str] = &["description", "results"];

    fn field(&self, name: &str) -> &str {
        match name {
            "title" => &self.title,
            "description" => &self.description,
            "results" => &self.results,
            _ => "",
        }
    }

    fn from_fields(mut value: impl FnMut(&'static str) -> String) -> Self {
        Self {
            title: value("title"),
            description: value("description"),
            results: value("results"),
        }
    }
}

/// Program
///
/// A treatment program shown on the clinic site.
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    pub text: Localized<ProgramText>,
    pub category: Category,
}

/// Create and update body for programs. Translations are optional; missing ones copy the base text.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ProgramPayload {
    #[serde(flatten)]
    pub text: ProgramText,
    pub category: Category,
    #[serde(flatten)]
    #[schema(value_type = BTreeMap<String, String>)]
    pub translations: Translations<ProgramText>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct ProgramResponse {
    pub pk: i64,
    #[serde(flatten)]
    pub text: ProgramText,
    /// Flat `<field>_<lang>` keys, e.g. `title_pl`.
    #[serde(flatten)]
    pub translations: BTreeMap<String, String>,
    pub category: Category,
}

impl Columns for Program {
    const TABLE: &'static str = "programs";
    const UNIQUE_COLUMN: &'static str = "title";

    fn values(&self) -> Vec<(String, SqlValue)> {
        let mut values = self.text.columns();
        values.push(("category".to_owned(), SqlValue::Text(self.category.code().to_owned())));
        values
    }

    fn from_row(row: &PgRow) -> Result<Self, sqlx::Error> {
        let category: String = row.try_get("category")?;
        Ok(Self {
            text: Localized::from_row(row)?,
            category: category
                .parse()
                .map_err(|e: ParseError| sqlx::Error::Decode(Box::new(e)))?,
        })
    }
}

impl Resource for Program {
    const NAME: &'static str = "Program";
    const TITLE: &'static str = "Programs";
    const ADMIN_PATH: &'static str = "/admin/programs";
    const API_PATH: &'static str = "/api/v1/programs";

    type Payload = ProgramPayload;
    type Response = ProgramResponse;

    fn store(state: &AppState) -> StoreState<Self> {
        state.programs.clone()
    }

    fn validate(payload: &ProgramPayload) -> Result<(), ApiError> {
        crud::require("title", &payload.text.title)?;
        crud::max_chars_localized("title", &payload.text, payload.translations.values(), 250)
    }

    fn from_request(payload: ProgramPayload) -> Self {
        Self {
            text: Localized::new(payload.text, payload.translations.into_inner()),
            category: payload.category,
        }
    }

    fn apply(&mut self, payload: ProgramPayload) {
        self.text.update(payload.text, payload.translations.into_inner());
        self.category = payload.category;
    }

    fn to_response(record: Record<Self>) -> ProgramResponse {
        let translations = record.fields.text.flat_translations();
        let text = record.fields.text.base;
        ProgramResponse {
            pk: record.id,
            text,
            translations,
            category: record.fields.category,
        }
    }

    fn from_form(form: &FormInput) -> Result<ProgramPayload, ApiError> {
        let (text, translations) = forms::localized_from_form(form);
        Ok(ProgramPayload {
            text,
            category: forms::category_from_form(form)?,
            translations,
        })
    }

    fn admin_headers() -> Vec<&'static str> {
        vec!["ID", "Title", "Category"]
    }

    fn admin_cells(record: &Record<Self>) -> Vec<String> {
        vec![
            record.id.to_string(),
            record.fields.text.base.title.clone(),
            record.fields.category.label().to_owned(),
        ]
    }

    fn form_fields(existing: Option<&Self>) -> Vec<FormField> {
        let mut fields = forms::localized_fields(existing.map(|program| &program.text));
        fields.push(forms::category_field(existing.map(|program| program.category)));
        fields
    }
}
