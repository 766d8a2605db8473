use chrono::NaiveDate;
use sqlx::{Postgres, QueryBuilder};

/// Owned bind value for dynamically assembled statements. Resource kinds
/// describe their columns as `(name, SqlValue)` pairs and the repository
/// turns them into parameterized SQL.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Text(String),
    NullableText(Option<String>),
    Date(NaiveDate),
}

impl SqlValue {
    pub fn push_bind(self, builder: &mut QueryBuilder<'_, Postgres>) {
        match self {
            SqlValue::Text(v) => {
                builder.push_bind(v);
            }
            SqlValue::NullableText(v) => {
                builder.push_bind(v);
            }
            SqlValue::Date(v) => {
                builder.push_bind(v);
            }
        }
    }
}

/// Named column/value pairs for an INSERT or UPDATE.
pub type ColumnValues = Vec<(&'static str, SqlValue)>;
