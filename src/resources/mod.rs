pub mod article;
pub mod letter;
pub mod product;
pub mod program;
pub mod project;
pub mod staff;

pub use article::Article;
pub use letter::Letter;
pub use product::Product;
pub use program::Program;
pub use project::Project;
pub use staff::Staff;

use serde::de::DeserializeOwned;
use serde::Serialize;
use sqlx::postgres::PgRow;
use sqlx::FromRow;

use crate::database::values::{ColumnValues, SqlValue};
use crate::error::ApiError;

/// One CRUD resource kind. A single generic controller/repository pair is
/// parameterized over this trait instead of six copy-pasted controllers.
pub trait Resource:
    Serialize + for<'r> FromRow<'r, PgRow> + Send + Sync + Unpin + 'static
{
    const TABLE: &'static str;
    /// Singular name used in client-facing messages.
    const KIND: &'static str;
    /// Column holding the media reference, if this kind carries one.
    const MEDIA_COLUMN: Option<&'static str> = None;
    /// Column holding the media mime type, for kinds that record it.
    const MEDIA_TYPE_COLUMN: Option<&'static str> = None;
    /// Whether create requests must include a file.
    const MEDIA_REQUIRED: bool = false;
    /// Column searched with ILIKE when `search` is supplied.
    const SEARCH_COLUMN: Option<&'static str> = None;
    /// Whitelist of sortable columns; anything else falls back to the default.
    const SORTABLE: &'static [&'static str];
    const DEFAULT_SORT: &'static str = "created_at";
    const DEFAULT_LIMIT: i64 = 10;

    /// Text fields accepted on create. All fields are optional at the type
    /// level; `validate_create` enforces which are required.
    type Create: DeserializeOwned + Send + Sync + 'static;
    /// Partial update: only present fields are applied, absent fields keep
    /// their prior value.
    type Update: DeserializeOwned + Send + Sync + 'static;

    fn validate_create(input: &Self::Create) -> Result<(), ApiError>;

    /// Validate the fields present on a partial update. Required columns may
    /// be absent, but a supplied value must satisfy the same rules as on
    /// create; a blank required field cannot sneak in through PUT.
    fn validate_update(input: &Self::Update) -> Result<(), ApiError>;

    /// Build INSERT columns from validated input. Only called after
    /// `validate_create` passed; required values fall back to empty defaults
    /// rather than panicking.
    fn insert_values(input: &Self::Create) -> ColumnValues;

    /// Build UPDATE columns from the present fields only.
    fn update_values(input: &Self::Update) -> ColumnValues;

    fn media_path(&self) -> Option<&str> {
        None
    }
}

/// Reject a missing or blank required text field.
pub(crate) fn require(field: &'static str, value: &Option<String>) -> Result<(), ApiError> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(()),
        _ => Err(ApiError::validation(format!("{field} is required"))),
    }
}

/// Reject a supplied-but-blank value on update; absent is fine.
pub(crate) fn non_blank(field: &'static str, value: &Option<String>) -> Result<(), ApiError> {
    match value {
        Some(v) if v.trim().is_empty() => {
            Err(ApiError::validation(format!("{field} must not be blank")))
        }
        _ => Ok(()),
    }
}

/// Required text value; trimmed. Assumes `require` has already passed.
pub(crate) fn text(value: &Option<String>) -> SqlValue {
    SqlValue::Text(value.as_deref().unwrap_or_default().trim().to_string())
}

/// Optional text value; trimmed, blank collapses to NULL.
pub(crate) fn opt_text(value: &Option<String>) -> SqlValue {
    SqlValue::NullableText(
        value
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| s.to_string()),
    )
}
