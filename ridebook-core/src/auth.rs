use axum::extract::{Request, State};
use axum::http::header::AUTHORIZATION;
use axum::middleware::Next;
use axum::response::Response;
use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::api::{ApiError, AppState};
use crate::error::BookingError;
use crate::models::{Role, User};

/// Authenticated principal stored in request extensions.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CurrentUser {
    pub email: String,
    pub role: Role,
}

impl CurrentUser {
    /// Fails with 403 unless the principal holds one of `roles`.
    pub fn require_role(&self, roles: &[Role]) -> Result<(), ApiError> {
        if roles.contains(&self.role) {
            Ok(())
        } else {
            Err(ApiError::forbidden(format!(
                "{} accounts cannot perform this action",
                self.role
            )))
        }
    }
}

/// Claims carried inside the bearer token.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Subject - the user's email.
    pub sub: String,
    pub role: Role,
    pub iat: usize,
    pub exp: usize,
}

/// Longest token lifetime accepted, one year.
pub const MAX_TOKEN_MAXAGE_MINUTES: i64 = 525_600;

/// Signing configuration for bearer tokens.
#[derive(Clone)]
pub struct TokenKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    maxage_minutes: i64,
}

impl TokenKeys {
    /// `maxage_minutes` is clamped to `1..=MAX_TOKEN_MAXAGE_MINUTES`.
    pub fn new(secret: &str, maxage_minutes: i64) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            maxage_minutes: maxage_minutes.clamp(1, MAX_TOKEN_MAXAGE_MINUTES),
        }
    }

    /// Issues an HS256 token for `user`.
    pub fn issue(&self, user: &User) -> Result<String, BookingError> {
        let now = Utc::now();
        let claims = Claims {
            sub: user.email.clone(),
            role: user.role,
            iat: now.timestamp() as usize,
            exp: (now + chrono::Duration::minutes(self.maxage_minutes)).timestamp() as usize,
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| BookingError::validation(format!("cannot issue token: {}", e)))
    }

    pub fn verify(&self, token: &str) -> Option<CurrentUser> {
        match decode::<Claims>(token, &self.decoding, &Validation::new(Algorithm::HS256)) {
            Ok(data) => Some(CurrentUser {
                email: data.claims.sub,
                role: data.claims.role,
            }),
            Err(e) => {
                warn!("Rejected bearer token: {}", e);
                None
            }
        }
    }
}

/// Hashes a password with bcrypt.
pub fn hash_password(password: &str) -> Result<String, BookingError> {
    bcrypt::hash(password, bcrypt::DEFAULT_COST)
        .map_err(|e| BookingError::validation(format!("cannot hash password: {}", e)))
}

/// Verifies a password against its bcrypt digest; malformed digests never match.
pub fn verify_password(password: &str, digest: &str) -> bool {
    bcrypt::verify(password, digest).unwrap_or(false)
}

/// Middleware to validate a Bearer JWT in the `Authorization` header.
///
/// On success the principal is attached to the request; on failure a
/// `401` is returned.
pub async fn jwt_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = req
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
        .ok_or_else(|| ApiError::unauthorized("missing bearer token"))?;

    let user = state
        .tokens
        .verify(token)
        .ok_or_else(|| ApiError::unauthorized("invalid or expired token"))?;

    req.extensions_mut().insert(user);

    Ok(next.run(req).await)
}
