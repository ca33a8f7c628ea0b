use serde::{Deserialize, Serialize};
use utoipa::IntoParams;

use crate::{error::ApiError, repository::Window};

/// Largest page a client may request.
pub const MAX_PAGE_SIZE: i64 = 100;

/// Query string accepted by every API list endpoint.
#[derive(Debug, Clone, Copy, Default, Deserialize, IntoParams)]
pub struct PageParams {
    /// Results per page (1 to 100).
    pub limit: Option<i64>,
    /// 1-based page number.
    pub page: Option<i64>,
}

/// A validated page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: i64,
    pub limit: i64,
}

/// Paginated
///
/// List envelope with the total count and ready-made links to the neighbouring pages.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Paginated<T> {
    pub count: i64,
    pub next: Option<String>,
    pub previous: Option<String>,
    pub results: Vec<T>,
}

impl PageParams {
    /// Returns `None` when the caller asked for no pagination and the resource does not
    /// paginate by default.
    pub fn resolve(&self, default_limit: i64, always: bool) -> Result<Option<PageRequest>, ApiError> {
        if !always && self.limit.is_none() && self.page.is_none() {
            return Ok(None);
        }

        let limit = self.limit.unwrap_or(default_limit);
        if limit < 1 {
            return Err(ApiError::Validation(
                "limit must be a positive integer".to_owned(),
            ));
        }
        let page = self.page.unwrap_or(1);
        if page < 1 {
            return Err(ApiError::Validation(
                "page must be a positive integer".to_owned(),
            ));
        }

        let request = PageRequest {
            page,
            limit: limit.min(MAX_PAGE_SIZE),
        };
        request
            .offset()
            .ok_or_else(|| ApiError::Validation("page is out of range".to_owned()))?;
        Ok(Some(request))
    }
}

impl PageRequest {
    /// `(page - 1) * limit`, or `None` on overflow.
    pub fn offset(&self) -> Option<i64> {
        (self.page - 1).checked_mul(self.limit)
    }

    pub fn window(&self) -> Window {
        Window {
            limit: self.limit,
            offset: self.offset().unwrap_or(i64::MAX),
        }
    }

    pub fn has_next(&self, count: i64) -> bool {
        self.page
            .checked_mul(self.limit)
            .is_some_and(|seen| seen < count)
    }

    pub fn has_previous(&self) -> bool {
        self.page > 1
    }

    fn link(&self, base: &str, page: i64) -> String {
        format!("{base}?limit={}&page={page}", self.limit)
    }

    pub fn envelope<T>(&self, base: &str, count: i64, results: Vec<T>) -> Paginated<T> {
        Paginated {
            count,
            next: self
                .has_next(count)
                .then(|| self.link(base, self.page + 1)),
            previous: self
                .has_previous()
                .then(|| self.link(base, self.page - 1)),
            results,
        }
    }
}
