use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use ts_rs::TS;
use utoipa::ToSchema;

use super::ParseError;

/// Category
///
/// The seven treatment areas content is filed under. Serialized and stored as the two-letter code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub enum Category {
    #[serde(rename = "KS")]
    Kosmetologia,
    #[serde(rename = "LS")]
    Laseroterapia,
    #[serde(rename = "KT")]
    Kosmetyka,
    #[serde(rename = "ZE")]
    ZabiegiEstetyczne,
    #[serde(rename = "TR")]
    Trychologia,
    #[serde(rename = "PD")]
    Podologia,
    #[serde(rename = "MS")]
    Masaze,
}

impl Category {
    pub const ALL: [Category; 7] = [
        Category::Kosmetologia,
        Category::Laseroterapia,
        Category::Kosmetyka,
        Category::ZabiegiEstetyczne,
        Category::Trychologia,
        Category::Podologia,
        Category::Masaze,
    ];

    pub fn code(self) -> &'static str {
        match self {
            Category::Kosmetologia => "KS",
            Category::Laseroterapia => "LS",
            Category::Kosmetyka => "KT",
            Category::ZabiegiEstetyczne => "ZE",
            Category::Trychologia => "TR",
            Category::Podologia => "PD",
            Category::Masaze => "MS",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Category::Kosmetologia => "Kosmetologia",
            Category::Laseroterapia => "Laseroterapia",
            Category::Kosmetyka => "Kosmetyka",
            Category::ZabiegiEstetyczne => "Zabiegi estetyczne",
            Category::Trychologia => "Trychologia",
            Category::Podologia => "Podologia",
            Category::Masaze => "Masaże",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Category {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let code = s.trim();
        Category::ALL
            .into_iter()
            .find(|category| category.code().eq_ignore_ascii_case(code))
            .ok_or_else(|| ParseError {
                kind: "category",
                value: s.to_owned(),
            })
    }
}
