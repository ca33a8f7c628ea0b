use std::{collections::BTreeMap, fmt, marker::PhantomData, ops::Deref, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{
    Deserialize, Deserializer, Serialize, Serializer,
    de::{self, IgnoredAny, MapAccess, Visitor},
    ser::SerializeMap,
};
use sqlx::{Row, postgres::PgRow};
use ts_rs::TS;
use utoipa::ToSchema;

use crate::repository::SqlValue;

pub mod category;
pub mod news;
pub mod price;
pub mod program;
pub mod user;

pub use category::Category;
pub use news::{News, NewsPayload, NewsResponse, NewsText};
pub use price::{Price, PricePayload, PriceResponse, PriceText};
pub use program::{Program, ProgramPayload, ProgramResponse, ProgramText};
pub use user::{NewUser, Role, User};

/// ParseError
///
/// Raised when a stored or submitted code does not name a known enum member.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind} '{value}'")]
pub struct ParseError {
    pub kind: &'static str,
    pub value: String,
}

/// Record
///
/// Row envelope shared by every content table: primary key, bookkeeping timestamps and the
/// entity's own fields.
#[derive(Debug, Clone, PartialEq)]
pub struct Record<T> {
    pub id: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub fields: T,
}

/// Language
///
/// Translation targets. Every translatable column has one sibling per language, suffixed with
/// the language code.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS, ToSchema,
)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum Language {
    Pl,
    En,
    Uk,
}

impl Language {
    pub const ALL: [Language; 3] = [Language::Pl, Language::En, Language::Uk];

    pub fn code(self) -> &'static str {
        match self {
            Language::Pl => "pl",
            Language::En => "en",
            Language::Uk => "uk",
        }
    }

    /// Column (and form field) name of `field` in this language, e.g. `title_pl`.
    pub fn column(self, field: &str) -> String {
        format!("{field}_{}", self.code())
    }

    /// Splits a suffixed name such as `title_pl` into its field and language.
    pub fn split_column(name: &str) -> Option<(&str, Language)> {
        let (field, code) = name.rsplit_once('_')?;
        let lang = Language::ALL.into_iter().find(|lang| lang.code() == code)?;
        (!field.is_empty()).then_some((field, lang))
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Language {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Language::ALL
            .into_iter()
            .find(|lang| lang.code().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ParseError {
                kind: "language",
                value: s.to_owned(),
            })
    }
}

/// TextBundle
///
/// The translatable text fields of one entity, in one language.
pub trait TextBundle: Clone + Default + Send + Sync + 'static {
    /// Field names, which double as base column names.
    const FIELDS: &'static [&'static str];

    /// Fields edited with a multi-line input in the admin panel.
    const MULTILINE: &'static [&'static str] = &[];

    fn field(&self, name: &str) -> &str;

    fn from_fields(value: impl FnMut(&'static str) -> String) -> Self;

    fn is_blank(&self) -> bool {
        Self::FIELDS
            .iter()
            .all(|name| self.field(name).trim().is_empty())
    }

    /// Copy of `self` with blank fields taken from `base`.
    fn filled_from(&self, base: &Self) -> Self {
        Self::from_fields(|name| {
            let own = self.field(name);
            if own.trim().is_empty() {
                base.field(name).to_owned()
            } else {
                own.to_owned()
            }
        })
    }
}

/// Localized
///
/// A base-language text bundle plus one bundle per [`Language`].
#[derive(Debug, Clone, PartialEq)]
pub struct Localized<T> {
    pub base: T,
    pub translations: BTreeMap<Language, T>,
}

impl<T: TextBundle> Localized<T> {
    /// Builds a fully populated set: languages not supplied copy the base bundle, and blank
    /// fields in supplied bundles fall back to the base field.
    pub fn new(base: T, mut supplied: BTreeMap<Language, T>) -> Self {
        let translations = Language::ALL
            .into_iter()
            .map(|lang| {
                let text = match supplied.remove(&lang) {
                    Some(text) => text.filled_from(&base),
                    None => base.clone(),
                };
                (lang, text)
            })
            .collect();

        Self { base, translations }
    }

    /// Replaces the base bundle and any supplied translations. Translations not supplied are
    /// kept as stored.
    pub fn update(&mut self, base: T, supplied: BTreeMap<Language, T>) {
        for (lang, text) in supplied {
            self.translations.insert(lang, text.filled_from(&base));
        }
        self.base = base;

        for lang in Language::ALL {
            self.translations
                .entry(lang)
                .or_insert_with(|| self.base.clone());
        }
    }

    /// Every translation as flat `<field>_<lang>` pairs, the shape the JSON API exposes.
    pub fn flat_translations(&self) -> BTreeMap<String, String> {
        Language::ALL
            .into_iter()
            .flat_map(|lang| {
                let text = self.text(lang);
                T::FIELDS
                    .iter()
                    .map(move |name| (lang.column(name), text.field(name).to_owned()))
            })
            .collect()
    }

    pub fn text(&self, lang: Language) -> &T {
        self.translations.get(&lang).unwrap_or(&self.base)
    }

    /// Base columns followed by the suffixed translation columns.
    pub fn columns(&self) -> Vec<(String, SqlValue)> {
        let mut columns: Vec<(String, SqlValue)> = T::FIELDS
            .iter()
            .map(|name| ((*name).to_owned(), SqlValue::Text(self.base.field(name).to_owned())))
            .collect();

        for lang in Language::ALL {
            let text = self.text(lang);
            columns.extend(T::FIELDS.iter().map(|name| {
                (lang.column(name), SqlValue::Text(text.field(name).to_owned()))
            }));
        }

        columns
    }

    /// Reads the bundle back out of a row written by [`Localized::columns`]. NULL translation
    /// columns (legacy rows) fall back to the base value.
    pub fn from_row(row: &PgRow) -> Result<Self, sqlx::Error> {
        let mut base = BTreeMap::new();
        for name in T::FIELDS {
            let value: Option<String> = row.try_get(*name)?;
            base.insert(*name, value.unwrap_or_default());
        }
        let base = T::from_fields(|name| base.get(name).cloned().unwrap_or_default());

        let mut translations = BTreeMap::new();
        for lang in Language::ALL {
            let mut values = BTreeMap::new();
            for name in T::FIELDS {
                let value: Option<String> = row.try_get(lang.column(name).as_str())?;
                values.insert(*name, value.unwrap_or_default());
            }
            let text = T::from_fields(|name| values.get(name).cloned().unwrap_or_default());
            translations.insert(lang, text.filled_from(&base));
        }

        Ok(Self { base, translations })
    }
}

/// Translations
///
/// Per-language bundles as submitted through the API or a form. On the wire they are flat
/// `<field>_<lang>` keys next to the base fields (`title_pl`, `item_name_en`, ...). Languages
/// whose fields are all blank count as not supplied. Suffixed keys that name no field of the
/// bundle, and a nested `translations` object, are rejected.
#[derive(Debug, Clone, PartialEq)]
pub struct Translations<T>(pub BTreeMap<Language, T>);

impl<T> Translations<T> {
    pub fn into_inner(self) -> BTreeMap<Language, T> {
        self.0
    }
}

impl<T> Default for Translations<T> {
    fn default() -> Self {
        Self(BTreeMap::new())
    }
}

impl<T> Deref for Translations<T> {
    type Target = BTreeMap<Language, T>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<T> From<BTreeMap<Language, T>> for Translations<T> {
    fn from(map: BTreeMap<Language, T>) -> Self {
        Self(map)
    }
}

impl<T: TextBundle> FromIterator<(Language, T)> for Translations<T> {
    fn from_iter<I: IntoIterator<Item = (Language, T)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<T: TextBundle> Serialize for Translations<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len() * T::FIELDS.len()))?;
        for (lang, text) in &self.0 {
            for name in T::FIELDS {
                map.serialize_entry(&lang.column(name), text.field(name))?;
            }
        }
        map.end()
    }
}

impl<'de, T: TextBundle> Deserialize<'de> for Translations<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_map(TranslationsVisitor(PhantomData))
    }
}

struct TranslationsVisitor<T>(PhantomData<T>);

impl<'de, T: TextBundle> Visitor<'de> for TranslationsVisitor<T> {
    type Value = Translations<T>;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("translation fields such as `title_pl`")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
        let mut supplied: BTreeMap<Language, BTreeMap<&'static str, String>> = BTreeMap::new();

        while let Some(key) = map.next_key::<String>()? {
            if key == "translations" {
                return Err(de::Error::custom(
                    "translations are sent as flat `<field>_<lang>` keys, e.g. `title_pl`",
                ));
            }
            let Some((field, lang)) = Language::split_column(&key) else {
                map.next_value::<IgnoredAny>()?;
                continue;
            };
            let Some(name) = T::FIELDS.iter().copied().find(|name| *name == field) else {
                return Err(de::Error::custom(format!("unknown translation field `{key}`")));
            };

            let value: Option<String> = map.next_value()?;
            if let Some(value) = value.filter(|value| !value.trim().is_empty()) {
                supplied.entry(lang).or_default().insert(name, value);
            }
        }

        Ok(supplied
            .into_iter()
            .map(|(lang, values)| {
                let text = T::from_fields(|name| values.get(name).cloned().unwrap_or_default());
                (lang, text)
            })
            .collect())
    }
}
