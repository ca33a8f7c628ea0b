use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
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

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct PriceText {
    #[serde(default)]
    pub item_name: String,
}

impl TextBundle for PriceText {
    const FIELDS: &'static [&'static str] = &["item_name"];

    fn field(&self, name: &str) -> &str {
        match name {
            "item_name" => &self.item_name,
            _ => "",
        }
    }

    fn from_fields(mut value: impl FnMut(&'static str) -> String) -> Self {
        Self {
            item_name: value("item_name"),
        }
    }
}

/// Price
///
/// One line of the clinic price list.
#[derive(Debug, Clone, PartialEq)]
pub struct Price {
    pub text: Localized<PriceText>,
    pub price: f64,
    pub category: Category,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PricePayload {
    #[serde(flatten)]
    pub text: PriceText,
    pub price: f64,
    pub category: Category,
    #[serde(flatten)]
    #[schema(value_type = BTreeMap<String, String>)]
    pub translations: Translations<PriceText>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct PriceResponse {
    pub id: i64,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[serde(flatten)]
    pub text: PriceText,
    /// Flat `<field>_<lang>` keys, e.g. `title_pl`.
    #[serde(flatten)]
    pub translations: BTreeMap<String, String>,
    pub price: f64,
    pub category: Category,
}

impl Columns for Price {
    const TABLE: &'static str = "prices";
    const UNIQUE_COLUMN: &'static str = "item_name";

    fn values(&self) -> Vec<(String, SqlValue)> {
        let mut values = self.text.columns();
        values.push(("price".to_owned(), SqlValue::Float(self.price)));
        values.push(("category".to_owned(), SqlValue::Text(self.category.code().to_owned())));
        values
    }

    fn from_row(row: &PgRow) -> Result<Self, sqlx::Error> {
        let category: String = row.try_get("category")?;
        Ok(Self {
            text: Localized::from_row(row)?,
            price: row.try_get("price")?,
            category: category
                .parse()
                .map_err(|e: ParseError| sqlx::Error::Decode(Box::new(e)))?,
        })
    }
}

impl Resource for Price {
    const NAME: &'static str = "Price";
    const TITLE: &'static str = "Prices";
    const ADMIN_PATH: &'static str = "/admin/prices";
    const API_PATH: &'static str = "/api/v1/prices";

    type Payload = PricePayload;
    type Response = PriceResponse;

    fn store(state: &AppState) -> StoreState<Self> {
        state.prices.clone()
    }

    fn validate(payload: &PricePayload) -> Result<(), ApiError> {
        crud::require("item_name", &payload.text.item_name)?;
        crud::max_chars_localized("item_name", &payload.text, payload.translations.values(), 150)?;
        if !payload.price.is_finite() || payload.price < 0.0 {
            return Err(ApiError::Validation(
                "price must be a non-negative number".to_owned(),
            ));
        }
        Ok(())
    }

    fn from_request(payload: PricePayload) -> Self {
        Self {
            text: Localized::new(payload.text, payload.translations.into_inner()),
            price: payload.price,
            category: payload.category,
        }
    }

    fn apply(&mut self, payload: PricePayload) {
        self.text.update(payload.text, payload.translations.into_inner());
        self.price = payload.price;
        self.category = payload.category;
    }

    fn to_response(record: Record<Self>) -> PriceResponse {
        let translations = record.fields.text.flat_translations();
        let text = record.fields.text.base;
        PriceResponse {
            id: record.id,
            created_at: record.created_at,
            text,
            translations,
            price: record.fields.price,
            category: record.fields.category,
        }
    }

    fn from_form(form: &FormInput) -> Result<PricePayload, ApiError> {
        let (text, translations) = forms::localized_from_form(form);
        let raw_price = form.text("price");
        let price = raw_price
            .replace(',', ".")
            .parse::<f64>()
            .map_err(|_| ApiError::Validation(format!("price '{raw_price}' is not a number")))?;

        Ok(PricePayload {
            text,
            price,
            category: forms::category_from_form(form)?,
            translations,
        })
    }

    fn admin_headers() -> Vec<&'static str> {
        vec!["ID", "Item", "Price", "Category"]
    }

    fn admin_cells(record: &Record<Self>) -> Vec<String> {
        vec![
            record.id.to_string(),
            record.fields.text.base.item_name.clone(),
            format!("{:.2}", record.fields.price),
            record.fields.category.label().to_owned(),
        ]
    }

    fn form_fields(existing: Option<&Self>) -> Vec<FormField> {
        let mut fields = forms::localized_fields(existing.map(|price| &price.text));
        fields.push(
            FormField::input(
                "number",
                "price",
                "Price",
                existing.map(|price| price.price.to_string()).unwrap_or_default(),
            )
            .required(),
        );
        fields.push(forms::category_field(existing.map(|price| price.category)));
        fields
    }
}
