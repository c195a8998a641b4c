use axum::{
    async_trait,
    extract::{FromRequestParts, Request, State},
    http::{header::AUTHORIZATION, request::Parts},
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::models::Role;
use crate::AppState;

pub mod accounts;
pub mod password;

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: i32,
    pub role: String,
    pub exp: usize,
}

/// The caller, as established by [`authenticate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthUser {
    pub id: i32,
    pub role: Role,
}

impl AuthUser {
    /// 403 unless the caller holds one of `roles`.
    pub fn require(&self, roles: &[Role]) -> Result<(), AppError> {
        if roles.contains(&self.role) {
            Ok(())
        } else {
            log::info!(
                "User {} with role {} denied; needs one of {:?}",
                self.id,
                self.role,
                roles
            );
            Err(AppError::Forbidden)
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

/// The caller stored by [`authenticate`]; 401 when the middleware did not run.
fn caller(parts: &Parts) -> Result<AuthUser, AppError> {
    parts
        .extensions
        .get::<AuthUser>()
        .copied()
        .ok_or_else(|| AppError::Unauthorized("Missing Authorization header".to_string()))
}

/// An owner or admin. Listed ahead of a body extractor, it rejects other
/// roles with 403 before the body is read.
#[derive(Debug, Clone, Copy)]
pub struct Operator(pub AuthUser);

#[async_trait]
impl<S> FromRequestParts<S> for Operator
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user = caller(parts)?;
        user.require(&[Role::Owner, Role::Admin])?;
        Ok(Self(user))
    }
}

/// A tenant, gated the same way as [`Operator`].
#[derive(Debug, Clone, Copy)]
pub struct TenantCaller(pub AuthUser);

#[async_trait]
impl<S> FromRequestParts<S> for TenantCaller
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user = caller(parts)?;
        user.require(&[Role::Tenant])?;
        Ok(Self(user))
    }
}

/// An owner, gated the same way as [`Operator`].
#[derive(Debug, Clone, Copy)]
pub struct OwnerCaller(pub AuthUser);

#[async_trait]
impl<S> FromRequestParts<S> for OwnerCaller
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user = caller(parts)?;
        user.require(&[Role::Owner])?;
        Ok(Self(user))
    }
}

pub fn create_token(
    user_id: i32,
    role: Role,
    jwt_secret: &str,
    ttl_hours: i64,
) -> Result<String, AppError> {
    let expiration = chrono::Utc::now() + chrono::Duration::hours(ttl_hours);
    let claims = Claims {
        sub: user_id,
        role: role.as_str().to_string(),
        exp: expiration.timestamp().max(0) as usize,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(jwt_secret.as_bytes()),
    )
    .map_err(|e| AppError::Internal(format!("failed to sign token: {}", e)))
}

pub fn validate_token(token: &str, jwt_secret: &str) -> Result<AuthUser, AppError> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(jwt_secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|_| AppError::Unauthorized("Invalid or expired token".to_string()))?;
    let role = token_data
        .claims
        .role
        .parse::<Role>()
        .map_err(|_| AppError::Unauthorized("Invalid or expired token".to_string()))?;
    Ok(AuthUser {
        id: token_data.claims.sub,
        role,
    })
}

/// Validates the bearer token and stores the caller as a request extension.
pub async fn authenticate(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let auth_header = request
        .headers()
        .get(AUTHORIZATION)
        .ok_or_else(|| AppError::Unauthorized("Missing Authorization header".to_string()))?;
    let token = auth_header
        .to_str()
        .ok()
        .and_then(|value| value.strip_prefix("Bearer "))
        .ok_or_else(|| {
            AppError::Unauthorized("Invalid Authorization header format".to_string())
        })?;
    let user = validate_token(token.trim(), &state.config.jwt_secret)?;
    log::debug!("Authenticated user {} ({})", user.id, user.role);
    request.extensions_mut().insert(user);
    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_round_trip_keeps_id_and_role() {
        let token = create_token(42, Role::Owner, "secret", 1).unwrap();
        let user = validate_token(&token, "secret").unwrap();
        assert_eq!(user, AuthUser { id: 42, role: Role::Owner });
    }

    #[test]
    fn wrong_secret_or_expired_token_is_rejected() {
        let token = create_token(1, Role::Tenant, "secret", 1).unwrap();
        assert!(matches!(
            validate_token(&token, "other"),
            Err(AppError::Unauthorized(_))
        ));
        let expired = create_token(1, Role::Tenant, "secret", -2).unwrap();
        assert!(validate_token(&expired, "secret").is_err());
    }

    #[tokio::test]
    async fn role_extractors_reject_before_the_handler_runs() {
        let (mut parts, ()) = axum::http::Request::new(()).into_parts();
        assert!(matches!(
            Operator::from_request_parts(&mut parts, &()).await,
            Err(AppError::Unauthorized(_))
        ));

        parts.extensions.insert(AuthUser { id: 3, role: Role::Tenant });
        assert!(matches!(
            Operator::from_request_parts(&mut parts, &()).await,
            Err(AppError::Forbidden)
        ));
        assert!(matches!(
            OwnerCaller::from_request_parts(&mut parts, &()).await,
            Err(AppError::Forbidden)
        ));
        let TenantCaller(user) = TenantCaller::from_request_parts(&mut parts, &()).await.unwrap();
        assert_eq!(user.id, 3);
    }

    #[test]
    fn role_gate_forbids_other_roles() {
        let tenant = AuthUser { id: 3, role: Role::Tenant };
        assert!(matches!(
            tenant.require(&[Role::Owner, Role::Admin]),
            Err(AppError::Forbidden)
        ));
        assert!(tenant.require(&[Role::Tenant]).is_ok());
    }
}
