//! Bearer-token authentication with role claims.

use crate::domain::{Role, UserId};
use crate::error::AppError;
use axum::http::header::AUTHORIZATION;
use axum::http::HeaderMap;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub role: String,
    pub exp: i64,
}

#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: UserId,
    pub role: Role,
}

impl AuthUser {
    pub fn ensure_super_admin(&self) -> Result<(), AppError> {
        if self.role.is_super_admin() {
            Ok(())
        } else {
            Err(AppError::PermissionDenied(
                "Super admin role required".to_string(),
            ))
        }
    }

    pub fn ensure_can_settle(&self) -> Result<(), AppError> {
        if self.role.can_settle_matches() {
            Ok(())
        } else {
            Err(AppError::PermissionDenied(
                "Match admin role required".to_string(),
            ))
        }
    }

    pub fn ensure_can_approve_deposits(&self) -> Result<(), AppError> {
        if self.role.can_approve_deposits() {
            Ok(())
        } else {
            Err(AppError::PermissionDenied(
                "Deposit admin role required".to_string(),
            ))
        }
    }

    pub fn ensure_can_approve_withdrawals(&self) -> Result<(), AppError> {
        if self.role.can_approve_withdrawals() {
            Ok(())
        } else {
            Err(AppError::PermissionDenied(
                "Withdrawal admin role required".to_string(),
            ))
        }
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    value.strip_prefix("Bearer ")
}

/// Authenticate a request from its Authorization header.
pub fn authenticate(headers: &HeaderMap, jwt_secret: &str) -> Result<AuthUser, AppError> {
    let token = bearer_token(headers)
        .ok_or_else(|| AppError::Unauthenticated("Missing bearer token".to_string()))?;

    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_exp = true;

    let decoded = decode::<Claims>(
        token,
        &DecodingKey::from_secret(jwt_secret.as_bytes()),
        &validation,
    )
    .map_err(|_| AppError::Unauthenticated("Invalid token".to_string()))?;

    if decoded.claims.sub.trim().is_empty() {
        return Err(AppError::Unauthenticated("Invalid token subject".to_string()));
    }

    let role = Role::parse(&decoded.claims.role)
        .ok_or_else(|| AppError::Unauthenticated("Unknown role claim".to_string()))?;

    Ok(AuthUser {
        user_id: UserId::new(decoded.claims.sub),
        role,
    })
}

/// Mint a token. Used by operational tooling and the test suites; token
/// issuance for real users is the identity provider's concern.
pub fn make_token(
    jwt_secret: &str,
    user_id: &UserId,
    role: Role,
    ttl_secs: i64,
) -> Result<String, AppError> {
    let claims = Claims {
        sub: user_id.as_str().to_string(),
        role: role.as_str().to_string(),
        exp: chrono::Utc::now().timestamp() + ttl_secs,
    };
    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(jwt_secret.as_bytes()),
    )
    .map_err(|e| AppError::Internal(format!("Token encoding failed: {}", e)))
}
