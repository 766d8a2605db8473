use axum::{
    extract::State,
    routing::{get, post},
    Extension, Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::auth::{self, admin, password};
use crate::database::repository::PersistError;
use crate::error::ApiError;
use crate::middleware::auth::{jwt_auth, AuthUser};
use crate::middleware::response::{ApiResponse, ApiResult};
use crate::state::AppState;

const MIN_PASSWORD_LEN: usize = 6;

pub fn routes(state: AppState) -> Router<AppState> {
    let guarded = Router::new()
        .route("/verify", get(verify))
        .route("/logout", post(logout))
        .route_layer(axum::middleware::from_fn_with_state(state, jwt_auth));

    Router::new()
        .route("/login", post(login))
        .route("/register", post(register))
        .merge(guarded)
}

#[derive(Debug, Deserialize)]
pub struct Credentials {
    pub login: Option<String>,
    pub password: Option<String>,
}

impl Credentials {
    fn checked(&self) -> Result<(&str, &str), ApiError> {
        let login = self.login.as_deref().map(str::trim).unwrap_or_default();
        let password = self.password.as_deref().unwrap_or_default();
        if login.is_empty() || password.is_empty() {
            return Err(ApiError::validation("login and password are required"));
        }
        Ok((login, password))
    }
}

/// POST /api/auth/login - authenticate an admin and issue an access token.
pub async fn login(
    State(state): State<AppState>,
    Json(credentials): Json<Credentials>,
) -> ApiResult<Value> {
    let (login, password) = credentials.checked()?;

    let admin = admin::find_by_login(&state.pool, login).await?;

    // Unknown login and wrong password produce the same response, so the
    // endpoint cannot be used to enumerate accounts.
    let Some(admin) = admin else {
        warn!(login, "login attempt for unknown admin");
        return Err(ApiError::InvalidCredentials);
    };
    if !password::verify_password(password, &admin.password_hash) {
        warn!(login, "login attempt with wrong password");
        return Err(ApiError::InvalidCredentials);
    }

    let token = auth::issue_token(&state.config.security, admin.id, &admin.login)?;
    info!(admin_id = admin.id, login = %admin.login, "admin logged in");

    Ok(ApiResponse::success(json!({
        "token": token,
        "admin": admin.public(),
    })))
}

/// POST /api/auth/register - create an admin account. Disabled outside
/// development unless explicitly enabled.
pub async fn register(
    State(state): State<AppState>,
    Json(credentials): Json<Credentials>,
) -> ApiResult<Value> {
    if !state.config.security.allow_registration {
        return Err(ApiError::forbidden("registration is disabled"));
    }

    let (login, password) = credentials.checked()?;
    if password.len() < MIN_PASSWORD_LEN {
        return Err(ApiError::validation(format!(
            "password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }

    let hash = password::hash_password(password)
        .map_err(|e| ApiError::internal(format!("password hashing failed: {e}")))?;

    let admin = admin::insert(&state.pool, login, &hash)
        .await
        .map_err(|err| match err {
            PersistError::UniqueViolation { .. } => {
                ApiError::conflict("admin with this login already exists")
            }
            other => other.into(),
        })?;

    let token = auth::issue_token(&state.config.security, admin.id, &admin.login)?;
    info!(admin_id = admin.id, login = %admin.login, "admin registered");

    Ok(ApiResponse::created(json!({
        "token": token,
        "admin": admin.public(),
    })))
}

/// GET /api/auth/verify - confirm the presented token. The auth gate has
/// already validated it; this just echoes the identity back.
pub async fn verify(Extension(user): Extension<AuthUser>) -> ApiResult<Value> {
    Ok(ApiResponse::success(json!({
        "admin": { "id": user.id, "login": user.login },
    })))
}

/// POST /api/auth/logout - tokens are stateless, so logout is a client-side
/// discard. The endpoint acknowledges it and records the event.
pub async fn logout(Extension(user): Extension<AuthUser>) -> ApiResult<Value> {
    info!(admin_id = user.id, login = %user.login, "admin logged out");
    Ok(ApiResponse::success(json!({})).with_message("logged out"))
}
