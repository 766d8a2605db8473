use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{FromRow, PgPool};

use crate::database::repository::PersistError;

/// Persisted admin record. The password hash never leaves this module's
/// callers; API responses use [`AdminPublic`].
#[derive(Debug, Clone, FromRow)]
pub struct Admin {
    pub id: i32,
    pub login: String,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct AdminPublic {
    pub id: i32,
    pub login: String,
}

impl Admin {
    pub fn public(&self) -> AdminPublic {
        AdminPublic {
            id: self.id,
            login: self.login.clone(),
        }
    }
}

pub async fn find_by_login(pool: &PgPool, login: &str) -> Result<Option<Admin>, sqlx::Error> {
    sqlx::query_as::<_, Admin>("SELECT * FROM admins WHERE login = $1")
        .bind(login)
        .fetch_optional(pool)
        .await
}

pub async fn insert(pool: &PgPool, login: &str, password_hash: &str) -> Result<Admin, PersistError> {
    sqlx::query_as::<_, Admin>(
        "INSERT INTO admins (login, password_hash) VALUES ($1, $2) RETURNING *",
    )
    .bind(login)
    .bind(password_hash)
    .fetch_one(pool)
    .await
    .map_err(PersistError::from)
}
