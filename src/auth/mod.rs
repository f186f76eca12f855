/*!
 * # Authentication and Authorization Module
 *
 * Provides authentication and authorization services for the Supply Hub API:
 *
 * - JWT (JSON Web Tokens) with refresh token support
 * - Argon2 password hashing
 * - Role-based access control with static role → permission mapping
 */

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use axum::{
    extract::{DefaultBodyLimit, Request, State},
    http::{header, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{Duration as ChronoDuration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

// Entity modules
pub mod user;

// Feature modules
mod roles;

// Re-exports
pub use roles::{consts, Role};

/// Claim structure for JWT tokens
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,              // Subject (user ID)
    pub name: Option<String>,     // User's name
    pub email: Option<String>,    // User's email
    pub roles: Vec<String>,       // User's roles
    pub permissions: Vec<String>, // User's explicit permissions
    pub jti: String,              // JWT ID (unique identifier for this token)
    pub iat: i64,                 // Issued at time
    pub exp: i64,                 // Expiration time
    pub nbf: i64,                 // Not valid before time
    pub iss: String,              // Issuer
    pub aud: String,              // Audience
}

/// Authenticated user data extracted from the JWT token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthUser {
    pub user_id: String,
    pub name: Option<String>,
    pub email: Option<String>,
    pub roles: Vec<String>,
    pub permissions: Vec<String>,
    pub token_id: String,
}

impl AuthUser {
    /// Check if the user has a specific role
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }

    /// Check if the user has a specific permission
    pub fn has_permission(&self, permission: &str) -> bool {
        self.permissions.iter().any(|p| p == permission)
    }

    /// Check if the user is an admin
    pub fn is_admin(&self) -> bool {
        self.has_role("admin")
    }

    /// The user id parsed as a UUID.
    pub fn uuid(&self) -> Result<Uuid, AuthError> {
        Uuid::parse_str(&self.user_id).map_err(|_| AuthError::InvalidToken)
    }
}

/// Authentication configuration
#[derive(Clone, Debug)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub jwt_issuer: String,
    pub jwt_audience: String,
    pub access_token_expiration: Duration,
    pub refresh_token_expiration: Duration,
}

impl AuthConfig {
    pub fn new(
        jwt_secret: String,
        jwt_issuer: String,
        jwt_audience: String,
        access_token_expiration: Duration,
        refresh_token_expiration: Duration,
    ) -> Self {
        Self {
            jwt_secret,
            jwt_issuer,
            jwt_audience,
            access_token_expiration,
            refresh_token_expiration,
        }
    }
}

/// Hash a password with Argon2 and a fresh random salt.
pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AuthError::InternalError(format!("password hashing failed: {e}")))
}

/// Verify a password against a stored Argon2 hash.
pub fn verify_password(password: &str, stored_hash: &str) -> Result<bool, AuthError> {
    let parsed = PasswordHash::new(stored_hash)
        .map_err(|e| AuthError::InternalError(format!("stored hash unreadable: {e}")))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

/// Authentication service that handles token issuance and validation
#[derive(Debug, Clone)]
pub struct AuthService {
    pub config: AuthConfig,
    pub db: Arc<DatabaseConnection>,
}

impl AuthService {
    /// Create a new authentication service
    pub fn new(config: AuthConfig, db: Arc<DatabaseConnection>) -> Self {
        Self { config, db }
    }

    /// Authenticate by email and password, returning a token pair.
    pub async fn login(&self, email: &str, password: &str) -> Result<TokenPair, AuthError> {
        let account = user::Entity::find()
            .filter(user::Column::Email.eq(email))
            .one(&*self.db)
            .await
            .map_err(|e| AuthError::DatabaseError(e.to_string()))?
            .ok_or(AuthError::InvalidCredentials)?;

        if !account.active {
            return Err(AuthError::InvalidCredentials);
        }
        if !verify_password(password, &account.password_hash)? {
            return Err(AuthError::InvalidCredentials);
        }

        self.generate_token(&account).await
    }

    /// Generate a JWT token pair for a user
    pub async fn generate_token(&self, account: &user::Model) -> Result<TokenPair, AuthError> {
        let now = Utc::now();
        let access_exp = now
            + ChronoDuration::from_std(self.config.access_token_expiration)
                .map_err(|_| AuthError::InternalError("Invalid token duration".to_string()))?;
        let refresh_exp = now
            + ChronoDuration::from_std(self.config.refresh_token_expiration)
                .map_err(|_| AuthError::InternalError("Invalid token duration".to_string()))?;

        let access_jti = Uuid::new_v4().to_string();
        let refresh_jti = Uuid::new_v4().to_string();

        let roles = vec![account.role.as_claim().to_string()];
        let permissions = account.role.permissions();

        let access_claims = Claims {
            sub: account.id.to_string(),
            name: Some(account.name.clone()),
            email: Some(account.email.clone()),
            roles: roles.clone(),
            permissions: permissions.clone(),
            jti: access_jti,
            iat: now.timestamp(),
            exp: access_exp.timestamp(),
            nbf: now.timestamp(),
            iss: self.config.jwt_issuer.clone(),
            aud: self.config.jwt_audience.clone(),
        };

        // Refresh token claims carry minimal data
        let refresh_claims = Claims {
            sub: account.id.to_string(),
            name: None,
            email: None,
            roles: vec![],
            permissions: vec![],
            jti: refresh_jti,
            iat: now.timestamp(),
            exp: refresh_exp.timestamp(),
            nbf: now.timestamp(),
            iss: self.config.jwt_issuer.clone(),
            aud: self.config.jwt_audience.clone(),
        };

        let key = EncodingKey::from_secret(self.config.jwt_secret.as_bytes());
        let access_token = encode(&Header::new(Algorithm::HS256), &access_claims, &key)
            .map_err(|e| AuthError::TokenCreation(e.to_string()))?;
        let refresh_token = encode(&Header::new(Algorithm::HS256), &refresh_claims, &key)
            .map_err(|e| AuthError::TokenCreation(e.to_string()))?;

        Ok(TokenPair {
            access_token,
            refresh_token,
            token_type: "Bearer".to_string(),
            expires_in: (access_exp - now).num_seconds(),
            refresh_expires_in: (refresh_exp - now).num_seconds(),
        })
    }

    /// Validate a JWT token and return its claims
    pub async fn validate_token(&self, token: &str) -> Result<Claims, AuthError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_audience(&[self.config.jwt_audience.clone()]);
        validation.set_issuer(&[self.config.jwt_issuer.clone()]);

        let token_data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.config.jwt_secret.as_bytes()),
            &validation,
        )
        .map_err(|e| match e.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::TokenExpired,
            _ => AuthError::InvalidToken,
        })?;

        Ok(token_data.claims)
    }

    /// Exchange a refresh token for a fresh token pair.
    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenPair, AuthError> {
        let claims = self.validate_token(refresh_token).await?;
        let user_id = Uuid::parse_str(&claims.sub).map_err(|_| AuthError::InvalidToken)?;

        let account = user::Entity::find_by_id(user_id)
            .one(&*self.db)
            .await
            .map_err(|e| AuthError::DatabaseError(e.to_string()))?
            .ok_or(AuthError::UserNotFound)?;

        if !account.active {
            return Err(AuthError::InvalidCredentials);
        }

        debug!(user_id = %account.id, "Refreshing token pair");
        self.generate_token(&account).await
    }
}

/// Token pair response
#[derive(Debug, Serialize, Deserialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    pub expires_in: i64,
    pub refresh_expires_in: i64,
}

/// Login credentials
#[derive(Debug, Serialize, Deserialize)]
pub struct LoginCredentials {
    pub email: String,
    pub password: String,
}

/// Refresh request payload
#[derive(Debug, Serialize, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

/// Authentication error types
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Missing authentication")]
    MissingAuth,

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Token has expired")]
    TokenExpired,

    #[error("Token creation failed: {0}")]
    TokenCreation(String),

    #[error("User not found")]
    UserNotFound,

    #[error("Insufficient permissions")]
    InsufficientPermissions,

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, error_code, error_message): (StatusCode, &str, String) = match &self {
            Self::MissingAuth => (
                StatusCode::UNAUTHORIZED,
                "AUTH_MISSING",
                "Authentication required".to_string(),
            ),
            Self::InvalidCredentials => (
                StatusCode::UNAUTHORIZED,
                "AUTH_INVALID_CREDENTIALS",
                "Invalid credentials".to_string(),
            ),
            Self::InvalidToken => (
                StatusCode::UNAUTHORIZED,
                "AUTH_INVALID_TOKEN",
                "Invalid authentication token".to_string(),
            ),
            Self::TokenExpired => (
                StatusCode::UNAUTHORIZED,
                "AUTH_TOKEN_EXPIRED",
                "Token has expired".to_string(),
            ),
            Self::TokenCreation(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "AUTH_TOKEN_CREATION_FAILED",
                msg.clone(),
            ),
            Self::UserNotFound => (
                StatusCode::NOT_FOUND,
                "AUTH_USER_NOT_FOUND",
                "User not found".to_string(),
            ),
            Self::InsufficientPermissions => (
                StatusCode::FORBIDDEN,
                "AUTH_INSUFFICIENT_PERMISSIONS",
                "Insufficient permissions".to_string(),
            ),
            Self::DatabaseError(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "AUTH_DATABASE_ERROR",
                "Internal error".to_string(),
            ),
            Self::InternalError(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "AUTH_INTERNAL_ERROR",
                "Internal error".to_string(),
            ),
        };

        let body = Json(serde_json::json!({
            "error": {
                "code": error_code,
                "message": error_message,
            }
        }));

        (status, body).into_response()
    }
}

/// Permission middleware to check if a user has the required permission
pub async fn permission_middleware(
    State(required_permission): State<String>,
    request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let user = match request.extensions().get::<AuthUser>() {
        Some(user) => user.clone(),
        None => return Err(AuthError::MissingAuth),
    };

    // Admins have all permissions
    if user.is_admin() {
        return Ok(next.run(request).await);
    }

    if !user.has_permission(&required_permission) {
        return Err(AuthError::InsufficientPermissions);
    }

    Ok(next.run(request).await)
}

/// Role middleware to check if a user has the required role
pub async fn role_middleware(
    State(required_role): State<String>,
    request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let user = match request.extensions().get::<AuthUser>() {
        Some(user) => user.clone(),
        None => return Err(AuthError::MissingAuth),
    };

    if !user.has_role(&required_role) {
        return Err(AuthError::InsufficientPermissions);
    }

    Ok(next.run(request).await)
}

/// Authentication middleware that extracts and validates auth tokens
pub async fn auth_middleware(mut request: Request, next: Next) -> Response {
    let headers = request.headers().clone();

    let auth_service = match request.extensions().get::<Arc<AuthService>>() {
        Some(service) => service.clone(),
        None => {
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Authentication service not available",
            )
                .into_response();
        }
    };

    match extract_auth_from_headers(&headers, &auth_service).await {
        Ok(user) => {
            request.extensions_mut().insert(user);
            next.run(request).await
        }
        Err(e) => e.into_response(),
    }
}

/// Extract authentication info from request headers
async fn extract_auth_from_headers(
    headers: &HeaderMap,
    auth_service: &AuthService,
) -> Result<AuthUser, AuthError> {
    if let Some(auth_header) = headers.get(header::AUTHORIZATION) {
        if let Ok(auth_value) = auth_header.to_str() {
            if auth_value.starts_with("Bearer ") {
                let token = auth_value.trim_start_matches("Bearer ").trim();
                let claims = auth_service.validate_token(token).await?;

                return Ok(AuthUser {
                    user_id: claims.sub,
                    name: claims.name,
                    email: claims.email,
                    roles: claims.roles,
                    permissions: claims.permissions,
                    token_id: claims.jti,
                });
            }
        }
    }

    Err(AuthError::MissingAuth)
}

/// Authentication routes
pub fn auth_routes() -> axum::Router<Arc<AuthService>> {
    axum::Router::new()
        .route("/login", axum::routing::post(login_handler))
        .route("/refresh", axum::routing::post(refresh_token_handler))
        .layer(DefaultBodyLimit::max(1024 * 64)) // 64KB limit
}

/// Login handler
pub async fn login_handler(
    State(auth_service): State<Arc<AuthService>>,
    Json(credentials): Json<LoginCredentials>,
) -> Result<Json<TokenPair>, AuthError> {
    let tokens = auth_service
        .login(&credentials.email, &credentials.password)
        .await?;
    Ok(Json(tokens))
}

/// Refresh token handler
pub async fn refresh_token_handler(
    State(auth_service): State<Arc<AuthService>>,
    Json(payload): Json<RefreshRequest>,
) -> Result<Json<TokenPair>, AuthError> {
    let tokens = auth_service.refresh(&payload.refresh_token).await?;
    Ok(Json(tokens))
}

/// Router extension for attaching auth and permission layers
pub trait AuthRouterExt {
    fn with_auth(self) -> Self;
    fn with_permission(self, permission: &str) -> Self;
    fn with_role(self, role: &str) -> Self;
}

impl<S> AuthRouterExt for axum::Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    fn with_auth(self) -> Self {
        self.layer(axum::middleware::from_fn(auth_middleware))
    }

    fn with_permission(self, permission: &str) -> Self {
        self.layer(axum::middleware::from_fn_with_state(
            permission.to_string(),
            permission_middleware,
        ))
        .with_auth()
    }

    fn with_role(self, role: &str) -> Self {
        self.layer(axum::middleware::from_fn_with_state(
            role.to_string(),
            role_middleware,
        ))
        .with_auth()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_auth_service() -> AuthService {
        let config = AuthConfig::new(
            "unit_test_secret_key_that_is_long_enough_for_hs256_use_only".to_string(),
            "supply-hub-auth".to_string(),
            "supply-hub-api".to_string(),
            Duration::from_secs(1800),
            Duration::from_secs(86_400),
        );
        AuthService::new(config, Arc::new(sea_orm::DatabaseConnection::Disconnected))
    }

    fn test_account(role: Role) -> user::Model {
        let now = Utc::now();
        user::Model {
            id: Uuid::new_v4(),
            name: "Test User".to_string(),
            email: "test@example.com".to_string(),
            password_hash: String::new(),
            role,
            active: true,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn password_hash_roundtrip() {
        let hash = hash_password("correct horse battery staple").unwrap();
        assert!(verify_password("correct horse battery staple", &hash).unwrap());
        assert!(!verify_password("wrong password", &hash).unwrap());
    }

    #[tokio::test]
    async fn token_roundtrip_carries_role_and_permissions() {
        let service = test_auth_service();
        let account = test_account(Role::Approver);

        let pair = service.generate_token(&account).await.unwrap();
        let claims = service.validate_token(&pair.access_token).await.unwrap();

        assert_eq!(claims.sub, account.id.to_string());
        assert_eq!(claims.roles, vec!["approver".to_string()]);
        assert!(claims
            .permissions
            .iter()
            .any(|p| p == consts::REQUESTS_APPROVE));
    }

    #[tokio::test]
    async fn tampered_token_is_rejected() {
        let service = test_auth_service();
        let account = test_account(Role::User);
        let pair = service.generate_token(&account).await.unwrap();

        let mut tampered = pair.access_token.clone();
        tampered.push('x');
        assert!(matches!(
            service.validate_token(&tampered).await,
            Err(AuthError::InvalidToken)
        ));
    }

    #[test]
    fn auth_user_permission_checks() {
        let user = AuthUser {
            user_id: Uuid::new_v4().to_string(),
            name: None,
            email: None,
            roles: vec!["approver".to_string()],
            permissions: Role::Approver.permissions(),
            token_id: "jti".to_string(),
        };
        assert!(user.has_permission(consts::REQUESTS_APPROVE));
        assert!(!user.has_permission(consts::USERS_MANAGE));
        assert!(!user.is_admin());
    }
}
