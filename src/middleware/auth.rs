use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use tracing::{debug, warn};

use crate::auth::{self, Claims};
use crate::error::ApiError;
use crate::state::AppState;

/// Verified admin identity attached to the request after the auth gate.
/// Used for audit logging; there are no per-resource ownership checks.
#[derive(Clone, Debug)]
pub struct AuthUser {
    pub id: i32,
    pub login: String,
}

impl From<Claims> for AuthUser {
    fn from(claims: Claims) -> Self {
        Self {
            id: claims.sub,
            login: claims.login,
        }
    }
}

/// Bearer-token gate for mutating routes. A missing or malformed header is
/// rejected before the token service is consulted at all.
pub async fn jwt_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = extract_bearer(request.headers())?;

    let claims = auth::verify_token(&state.config.security, &token).map_err(|err| {
        warn!(error = %err, "token verification failed");
        ApiError::from(err)
    })?;

    let user = AuthUser::from(claims);
    debug!(admin_id = user.id, login = %user.login, "authenticated request");
    request.extensions_mut().insert(user);

    Ok(next.run(request).await)
}

fn extract_bearer(headers: &HeaderMap) -> Result<String, ApiError> {
    let header = headers
        .get(axum::http::header::AUTHORIZATION)
        .ok_or(ApiError::AuthRequired)?;

    let value = header.to_str().map_err(|_| ApiError::TokenMalformed)?;

    match value.strip_prefix("Bearer ") {
        Some(token) if !token.trim().is_empty() => Ok(token.trim().to_string()),
        _ => Err(ApiError::TokenMalformed),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::header::AUTHORIZATION;

    fn headers_with(value: Option<&str>) -> HeaderMap {
        let mut headers = HeaderMap::new();
        if let Some(v) = value {
            headers.insert(AUTHORIZATION, v.parse().unwrap());
        }
        headers
    }

    #[test]
    fn missing_header_requires_auth() {
        let err = extract_bearer(&headers_with(None)).unwrap_err();
        assert_eq!(err.error_code(), "AUTH_REQUIRED");
    }

    #[test]
    fn non_bearer_scheme_is_malformed() {
        let err = extract_bearer(&headers_with(Some("Basic dXNlcjpwYXNz"))).unwrap_err();
        assert_eq!(err.error_code(), "TOKEN_MALFORMED");
    }

    #[test]
    fn empty_bearer_token_is_malformed() {
        let err = extract_bearer(&headers_with(Some("Bearer   "))).unwrap_err();
        assert_eq!(err.error_code(), "TOKEN_MALFORMED");
    }

    #[test]
    fn bearer_token_is_extracted() {
        let token = extract_bearer(&headers_with(Some("Bearer abc.def.ghi"))).unwrap();
        assert_eq!(token, "abc.def.ghi");
    }
}
