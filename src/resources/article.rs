use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::{non_blank, require, text, Resource};
use crate::database::values::{ColumnValues, SqlValue};
use crate::error::ApiError;

/// Press article. The only kind without a media attachment; `url` points at
/// the external publication and must be unique.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Article {
    pub id: i32,
    pub title: String,
    pub date: NaiveDate,
    pub url: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CreateArticle {
    pub title: Option<String>,
    pub date: Option<NaiveDate>,
    pub url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateArticle {
    pub title: Option<String>,
    pub date: Option<NaiveDate>,
    pub url: Option<String>,
}

fn validate_url(url: &str) -> Result<(), ApiError> {
    if url.starts_with("http://") || url.starts_with("https://") {
        Ok(())
    } else {
        Err(ApiError::validation("url must be an http(s) URL"))
    }
}

impl Resource for Article {
    const TABLE: &'static str = "articles";
    const KIND: &'static str = "article";
    const SORTABLE: &'static [&'static str] = &["date", "title", "created_at", "updated_at"];
    const DEFAULT_SORT: &'static str = "date";

    type Create = CreateArticle;
    type Update = UpdateArticle;

    fn validate_create(input: &Self::Create) -> Result<(), ApiError> {
        require("title", &input.title)?;
        require("url", &input.url)?;
        validate_url(input.url.as_deref().unwrap_or_default().trim())?;
        if input.date.is_none() {
            return Err(ApiError::validation("date is required"));
        }
        Ok(())
    }

    fn validate_update(input: &Self::Update) -> Result<(), ApiError> {
        non_blank("title", &input.title)?;
        non_blank("url", &input.url)?;
        if let Some(url) = input.url.as_deref() {
            validate_url(url.trim())?;
        }
        Ok(())
    }

    fn insert_values(input: &Self::Create) -> ColumnValues {
        vec![
            ("title", text(&input.title)),
            ("date", SqlValue::Date(input.date.unwrap_or(NaiveDate::MIN))),
            ("url", text(&input.url)),
        ]
    }

    fn update_values(input: &Self::Update) -> ColumnValues {
        let mut values = ColumnValues::new();
        if input.title.is_some() {
            values.push(("title", text(&input.title)));
        }
        if let Some(date) = input.date {
            values.push(("date", SqlValue::Date(date)));
        }
        if input.url.is_some() {
            values.push(("url", text(&input.url)));
        }
        values
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> CreateArticle {
        CreateArticle {
            title: Some("Opening night".to_string()),
            date: NaiveDate::from_ymd_opt(2024, 3, 1),
            url: Some("https://example.com/article".to_string()),
        }
    }

    #[test]
    fn valid_input_passes() {
        assert!(Article::validate_create(&valid()).is_ok());
    }

    #[test]
    fn blank_title_is_rejected() {
        let input = CreateArticle {
            title: Some("   ".to_string()),
            ..valid()
        };
        let err = Article::validate_create(&input).unwrap_err();
        assert_eq!(err.error_code(), "VALIDATION_ERROR");
    }

    #[test]
    fn non_http_url_is_rejected() {
        let input = CreateArticle {
            url: Some("ftp://example.com".to_string()),
            ..valid()
        };
        assert!(Article::validate_create(&input).is_err());
    }

    #[test]
    fn missing_date_is_rejected() {
        let input = CreateArticle {
            date: None,
            ..valid()
        };
        assert!(Article::validate_create(&input).is_err());
    }

    #[test]
    fn update_rejects_non_http_url() {
        let input = UpdateArticle {
            url: Some("javascript:alert(1)".to_string()),
            ..Default::default()
        };
        let err = Article::validate_update(&input).unwrap_err();
        assert_eq!(err.error_code(), "VALIDATION_ERROR");
    }

    #[test]
    fn update_rejects_blank_title_but_allows_absent() {
        let blank = UpdateArticle {
            title: Some("   ".to_string()),
            ..Default::default()
        };
        assert!(Article::validate_update(&blank).is_err());

        assert!(Article::validate_update(&UpdateArticle::default()).is_ok());
    }

    #[test]
    fn update_only_includes_present_fields() {
        let input = UpdateArticle {
            title: Some("New title".to_string()),
            date: None,
            url: None,
        };
        let values = Article::update_values(&input);
        assert_eq!(values.len(), 1);
        assert_eq!(values[0].0, "title");
    }
}
