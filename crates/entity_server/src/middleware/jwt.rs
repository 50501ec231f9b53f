//! Request authentication.
//!
//! `jwt_auth` verifies the user token and attaches `UserDetails`.
//! `internal_auth` additionally requires the shared internal access token;
//! behind it the user token is optional and the tenant comes from headers.

use std::sync::Arc;

use axum::extract::Request;
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::Response;
use axum::Extension;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};

use entity_core::error::EntityError;
use entity_core::messages;
use entity_core::principal::{JwtClaims, UserDetails};

use crate::error::AppError;

pub const AUTH_HEADER: &str = "x-auth-token";
pub const INTERNAL_TOKEN_HEADER: &str = "internal-access-token";
pub const TENANT_HEADER: &str = "tenant-id";
pub const ORG_HEADER: &str = "org-id";

#[derive(Clone)]
pub struct JwtConfig {
    decoding_key: DecodingKey,
    validation: Validation,
    internal_access_token: Option<Arc<str>>,
}

impl JwtConfig {
    pub fn from_secret(secret: &[u8]) -> Self {
        Self {
            decoding_key: DecodingKey::from_secret(secret),
            validation: Validation::new(Algorithm::HS256),
            internal_access_token: None,
        }
    }

    pub fn with_internal_access_token(mut self, token: Option<String>) -> Self {
        self.internal_access_token = token.map(Arc::from);
        self
    }

    pub fn verify(&self, token: &str) -> Result<UserDetails, EntityError> {
        let token = token.strip_prefix("Bearer ").unwrap_or(token).trim();
        let data = decode::<JwtClaims>(token, &self.decoding_key, &self.validation).map_err(|e| {
            tracing::debug!(error = %e, "token rejected");
            EntityError::Unauthorized(messages::TOKEN_INVALID.into())
        })?;
        UserDetails::from_jwt_claims(&data.claims)
    }

    fn internal_token_matches(&self, supplied: Option<&str>) -> bool {
        match (&self.internal_access_token, supplied) {
            (Some(expected), Some(got)) => expected.as_ref() == got,
            _ => false,
        }
    }
}

fn header(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_owned)
}

pub async fn jwt_auth(
    Extension(config): Extension<JwtConfig>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = header(req.headers(), AUTH_HEADER)
        .ok_or_else(|| EntityError::Unauthorized(messages::TOKEN_MISSING.into()))?;
    let user = config.verify(&token)?;
    req.extensions_mut().insert(user);
    Ok(next.run(req).await)
}

pub async fn internal_auth(
    Extension(config): Extension<JwtConfig>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let headers = req.headers();
    if !config.internal_token_matches(header(headers, INTERNAL_TOKEN_HEADER).as_deref()) {
        return Err(EntityError::Unauthorized(messages::INTERNAL_TOKEN_INVALID.into()).into());
    }
    let user = match header(headers, AUTH_HEADER) {
        Some(token) => config.verify(&token)?,
        None => {
            let tenant = header(headers, TENANT_HEADER).ok_or_else(|| {
                EntityError::Unauthorized(format!("{TENANT_HEADER} header is required"))
            })?;
            UserDetails::internal(tenant, header(headers, ORG_HEADER).unwrap_or_default())
        }
    };
    req.extensions_mut().insert(user);
    Ok(next.run(req).await)
}
