use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::{non_blank, opt_text, require, text, Resource};
use crate::database::values::ColumnValues;
use crate::error::ApiError;

/// Team member profile. `callsign` is unique; the photo is optional.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Staff {
    pub id: i32,
    pub name: String,
    pub position: String,
    pub callsign: String,
    pub about: Option<String>,
    pub external_texts: Option<String>,
    pub photo: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CreateStaff {
    pub name: Option<String>,
    pub position: Option<String>,
    pub callsign: Option<String>,
    pub about: Option<String>,
    pub external_texts: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateStaff {
    pub name: Option<String>,
    pub position: Option<String>,
    pub callsign: Option<String>,
    pub about: Option<String>,
    pub external_texts: Option<String>,
}

impl Resource for Staff {
    const TABLE: &'static str = "staff";
    const KIND: &'static str = "staff member";
    const MEDIA_COLUMN: Option<&'static str> = Some("photo");
    const SEARCH_COLUMN: Option<&'static str> = Some("name");
    const SORTABLE: &'static [&'static str] =
        &["name", "position", "callsign", "created_at", "updated_at"];

    type Create = CreateStaff;
    type Update = UpdateStaff;

    fn validate_create(input: &Self::Create) -> Result<(), ApiError> {
        require("name", &input.name)?;
        require("position", &input.position)?;
        require("callsign", &input.callsign)?;
        Ok(())
    }

    fn validate_update(input: &Self::Update) -> Result<(), ApiError> {
        non_blank("name", &input.name)?;
        non_blank("position", &input.position)?;
        non_blank("callsign", &input.callsign)?;
        Ok(())
    }

    fn insert_values(input: &Self::Create) -> ColumnValues {
        vec![
            ("name", text(&input.name)),
            ("position", text(&input.position)),
            ("callsign", text(&input.callsign)),
            ("about", opt_text(&input.about)),
            ("external_texts", opt_text(&input.external_texts)),
        ]
    }

    fn update_values(input: &Self::Update) -> ColumnValues {
        let mut values = ColumnValues::new();
        if input.name.is_some() {
            values.push(("name", text(&input.name)));
        }
        if input.position.is_some() {
            values.push(("position", text(&input.position)));
        }
        if input.callsign.is_some() {
            values.push(("callsign", text(&input.callsign)));
        }
        if input.about.is_some() {
            values.push(("about", opt_text(&input.about)));
        }
        if input.external_texts.is_some() {
            values.push(("external_texts", opt_text(&input.external_texts)));
        }
        values
    }

    fn media_path(&self) -> Option<&str> {
        self.photo.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::values::SqlValue;

    #[test]
    fn requires_name_position_and_callsign() {
        let input = CreateStaff {
            name: Some("Ivan Petrov".to_string()),
            position: Some("Lead".to_string()),
            callsign: None,
            ..Default::default()
        };
        assert!(Staff::validate_create(&input).is_err());

        let input = CreateStaff {
            callsign: Some("Hawk".to_string()),
            ..input
        };
        assert!(Staff::validate_create(&input).is_ok());
    }

    #[test]
    fn blank_optional_fields_become_null() {
        let input = CreateStaff {
            name: Some("Ivan Petrov".to_string()),
            position: Some("Lead".to_string()),
            callsign: Some("Hawk".to_string()),
            about: Some("   ".to_string()),
            external_texts: None,
        };
        let values = Staff::insert_values(&input);
        let about = values.iter().find(|(col, _)| *col == "about").unwrap();
        assert_eq!(about.1, SqlValue::NullableText(None));
    }

    #[test]
    fn update_cannot_blank_out_required_fields() {
        let input = UpdateStaff {
            callsign: Some("".to_string()),
            ..Default::default()
        };
        assert!(Staff::validate_update(&input).is_err());

        let input = UpdateStaff {
            callsign: Some("Hawk".to_string()),
            ..Default::default()
        };
        assert!(Staff::validate_update(&input).is_ok());
    }

    #[test]
    fn absent_update_fields_are_not_applied() {
        let input = UpdateStaff {
            position: Some("Senior Lead".to_string()),
            ..Default::default()
        };
        let values = Staff::update_values(&input);
        assert_eq!(values.len(), 1);
        assert_eq!(values[0].0, "position");
    }
}
