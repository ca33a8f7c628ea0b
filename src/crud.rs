use serde::{Serialize, de::DeserializeOwned};

use crate::{
    AppState,
    error::ApiError,
    forms::{FormField, FormInput},
    models::{Record, TextBundle},
    repository::{Columns, StoreState},
};

/// Resource
///
/// Entity-mapping strategy for the generic API and admin handlers. One implementation per
/// content type tells the shared handlers how to validate input, build or update the stored
/// fields, and shape the outgoing JSON and admin markup.
pub trait Resource: Columns + Clone + Send + Sync + 'static {
    /// Singular name used in error messages ("Program not found").
    const NAME: &'static str;
    /// Heading of the admin list page.
    const TITLE: &'static str;
    const ADMIN_PATH: &'static str;
    const API_PATH: &'static str;

    /// Whether the API list always returns a paginated envelope.
    const PAGINATE_BY_DEFAULT: bool = false;
    const DEFAULT_PAGE_SIZE: i64 = 10;

    /// Multipart fields holding image uploads.
    const IMAGE_FIELDS: &'static [&'static str] = &[];

    /// Body of create and update requests.
    type Payload: DeserializeOwned + Send + Sync + 'static;
    type Response: Serialize + Send + 'static;

    fn store(state: &AppState) -> StoreState<Self>;

    fn validate(payload: &Self::Payload) -> Result<(), ApiError>;

    /// Builds a new entity, populating every translation.
    fn from_request(payload: Self::Payload) -> Self;

    /// Applies an update payload onto stored fields.
    fn apply(&mut self, payload: Self::Payload);

    fn to_response(record: Record<Self>) -> Self::Response;

    /// Parses a submitted admin form into the same payload the JSON API accepts.
    fn from_form(form: &FormInput) -> Result<Self::Payload, ApiError>;

    /// Stores the public path of a processed upload on the payload.
    fn attach_image(_payload: &mut Self::Payload, _field: &str, _path: String) {}

    fn admin_headers() -> Vec<&'static str>;

    fn admin_cells(record: &Record<Self>) -> Vec<String>;

    fn form_fields(existing: Option<&Self>) -> Vec<FormField>;
}

pub fn require(field: &str, value: &str) -> Result<(), ApiError> {
    if value.trim().is_empty() {
        return Err(ApiError::Validation(format!("{field} is required")));
    }
    Ok(())
}

pub fn max_chars(field: &str, value: &str, max: usize) -> Result<(), ApiError> {
    if value.chars().count() > max {
        return Err(ApiError::Validation(format!(
            "{field} must be at most {max} characters"
        )));
    }
    Ok(())
}

/// Length check for one field across the base bundle and every translation.
pub fn max_chars_localized<'a, T: TextBundle>(
    field: &str,
    base: &T,
    translations: impl IntoIterator<Item = &'a T>,
    max: usize,
) -> Result<(), ApiError> {
    max_chars(field, base.field(field), max)?;
    for text in translations {
        max_chars(field, text.field(field), max)?;
    }
    Ok(())
}
