use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::{non_blank, opt_text, require, text, Resource};
use crate::database::values::ColumnValues;
use crate::error::ApiError;

/// Thank-you letter. The scanned image is the point of the record, so the
/// attachment is required on create.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Letter {
    pub id: i32,
    pub title: String,
    pub description: Option<String>,
    pub image_url: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CreateLetter {
    pub title: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateLetter {
    pub title: Option<String>,
    pub description: Option<String>,
}

impl Resource for Letter {
    const TABLE: &'static str = "letters";
    const KIND: &'static str = "letter";
    const MEDIA_COLUMN: Option<&'static str> = Some("image_url");
    const MEDIA_REQUIRED: bool = true;
    const SEARCH_COLUMN: Option<&'static str> = Some("title");
    const SORTABLE: &'static [&'static str] = &["title", "created_at", "updated_at"];
    const DEFAULT_LIMIT: i64 = 12;

    type Create = CreateLetter;
    type Update = UpdateLetter;

    fn validate_create(input: &Self::Create) -> Result<(), ApiError> {
        require("title", &input.title)
    }

    fn validate_update(input: &Self::Update) -> Result<(), ApiError> {
        non_blank("title", &input.title)
    }

    fn insert_values(input: &Self::Create) -> ColumnValues {
        vec![
            ("title", text(&input.title)),
            ("description", opt_text(&input.description)),
        ]
    }

    fn update_values(input: &Self::Update) -> ColumnValues {
        let mut values = ColumnValues::new();
        if input.title.is_some() {
            values.push(("title", text(&input.title)));
        }
        if input.description.is_some() {
            values.push(("description", opt_text(&input.description)));
        }
        values
    }

    fn media_path(&self) -> Option<&str> {
        Some(&self.image_url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn title_is_required() {
        let err = Letter::validate_create(&CreateLetter::default()).unwrap_err();
        assert_eq!(err.error_code(), "VALIDATION_ERROR");
    }

    #[test]
    fn media_is_required_on_create() {
        assert!(Letter::MEDIA_REQUIRED);
        assert_eq!(Letter::MEDIA_COLUMN, Some("image_url"));
    }
}
