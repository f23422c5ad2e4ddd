// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Bearer-token authentication middleware.
//!
//! Tokens are HS256 JWTs issued by an external identity service and
//! validated here against the shared secret. The `sub` claim carries the
//! numeric user ID; handlers read it from the [`AuthUser`] extension.

use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::Response;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::envelope::{codes, fail};

/// Authentication configuration shared with the middleware.
#[derive(Clone)]
pub struct AuthState {
    pub jwt_secret: String,
}

impl std::fmt::Debug for AuthState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthState")
            .field("jwt_secret", &"[redacted]")
            .finish()
    }
}

/// The authenticated caller, inserted into request extensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthUser(pub i64);

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Numeric user ID, as a string per JWT convention.
    pub sub: String,
    /// Expiry, seconds since the epoch.
    pub exp: usize,
}

/// Validates `Authorization: Bearer <jwt>` and injects [`AuthUser`].
pub async fn auth_middleware(
    State(auth): State<AuthState>,
    mut request: Request,
    next: Next,
) -> Response {
    let token = request
        .headers()
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));

    let Some(token) = token else {
        return unauthorized();
    };

    let decoded = decode::<Claims>(
        token,
        &DecodingKey::from_secret(auth.jwt_secret.as_bytes()),
        &Validation::new(Algorithm::HS256),
    );
    let claims = match decoded {
        Ok(data) => data.claims,
        Err(e) => {
            debug!(error = %e, "token validation failed");
            return unauthorized();
        }
    };

    let Ok(user_id) = claims.sub.parse::<i64>() else {
        debug!(sub = claims.sub.as_str(), "token subject is not a user id");
        return unauthorized();
    };

    request.extensions_mut().insert(AuthUser(user_id));
    next.run(request).await
}

fn unauthorized() -> Response {
    fail(StatusCode::UNAUTHORIZED, codes::UNAUTHORIZED, "unauthorized")
}

/// Issue a token for tests and local tooling.
pub fn issue_token(jwt_secret: &str, user_id: i64, ttl_secs: u64) -> String {
    let claims = Claims {
        sub: user_id.to_string(),
        exp: (chrono::Utc::now().timestamp() as u64 + ttl_secs) as usize,
    };
    jsonwebtoken::encode(
        &jsonwebtoken::Header::new(Algorithm::HS256),
        &claims,
        &jsonwebtoken::EncodingKey::from_secret(jwt_secret.as_bytes()),
    )
    .expect("HS256 token encoding cannot fail")
}
