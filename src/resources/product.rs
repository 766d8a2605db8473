use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::{non_blank, opt_text, require, text, Resource};
use crate::database::values::ColumnValues;
use crate::error::ApiError;

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Product {
    pub id: i32,
    pub title: String,
    pub description: Option<String>,
    pub media: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CreateProduct {
    pub title: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateProduct {
    pub title: Option<String>,
    pub description: Option<String>,
}

impl Resource for Product {
    const TABLE: &'static str = "products";
    const KIND: &'static str = "product";
    const MEDIA_COLUMN: Option<&'static str> = Some("media");
    const SEARCH_COLUMN: Option<&'static str> = Some("title");
    const SORTABLE: &'static [&'static str] = &["title", "created_at", "updated_at"];

    type Create = CreateProduct;
    type Update = UpdateProduct;

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
        self.media.as_deref()
    }
}
