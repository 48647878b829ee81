//! JWT 认证模块
//!
//! 提供 JWT token 生成、验证，以及 REST 请求的身份提取器

use application::{ApplicationError, CredentialVerifier, VerifiedCredential};
use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
};
use config::JwtConfig;
use domain::{UserId, UserIdentity, UserRole};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{error::ApiError, state::AppState};

/// JWT Claims 结构
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub user_id: Uuid,
    pub role: UserRole,
    pub exp: i64, // 过期时间 (Unix timestamp)
}

/// JWT Token 服务
#[derive(Clone)]
pub struct JwtService {
    config: JwtConfig,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl JwtService {
    pub fn new(config: JwtConfig) -> Self {
        let encoding_key = EncodingKey::from_secret(config.secret.as_ref());
        let decoding_key = DecodingKey::from_secret(config.secret.as_ref());

        Self {
            config,
            encoding_key,
            decoding_key,
        }
    }

    /// 生成 JWT token
    pub fn generate_token(&self, user_id: UserId, role: UserRole) -> Result<String, ApiError> {
        let exp = chrono::Utc::now() + chrono::Duration::hours(self.config.expiration_hours);

        let claims = Claims {
            user_id: user_id.as_uuid(),
            role,
            exp: exp.timestamp(),
        };

        encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|err| ApiError::internal_server_error(format!("token generation failed: {err}")))
    }

    /// 验证并解析 JWT token
    pub fn verify_token(&self, token: &str) -> Result<Claims, ApplicationError> {
        decode::<Claims>(token, &self.decoding_key, &Validation::default())
            .map(|token_data| token_data.claims)
            .map_err(|err| ApplicationError::authentication(format!("invalid token: {err}")))
    }
}

impl CredentialVerifier for JwtService {
    fn verify(&self, credential: &str) -> Result<VerifiedCredential, ApplicationError> {
        let claims = self.verify_token(credential)?;
        Ok(VerifiedCredential {
            user_id: UserId::new(claims.user_id),
            role: claims.role,
        })
    }
}

/// 从 `Authorization: Bearer <token>` 头中取出 token
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)
        .and_then(|header| header.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
}

/// 已认证的请求方
#[derive(Debug, Clone)]
pub struct AuthUser(pub UserIdentity);

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let identity = state
            .handshake
            .authenticate(bearer_token(&parts.headers))
            .await?;
        Ok(AuthUser(identity))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn service() -> JwtService {
        JwtService::new(JwtConfig {
            secret: "test-secret-key-with-at-least-32-characters".into(),
            expiration_hours: 1,
        })
    }

    #[test]
    fn issued_token_verifies_with_role() {
        let jwt = service();
        let user_id = UserId::generate();
        let token = jwt.generate_token(user_id, UserRole::Tasker).unwrap();

        let verified = jwt.verify(&token).unwrap();
        assert_eq!(verified.user_id, user_id);
        assert_eq!(verified.role, UserRole::Tasker);
    }

    #[test]
    fn token_from_other_secret_is_rejected() {
        let other = JwtService::new(JwtConfig {
            secret: "a-completely-different-secret-of-32-chars".into(),
            expiration_hours: 1,
        });
        let token = other.generate_token(UserId::generate(), UserRole::Guest).unwrap();
        assert!(matches!(
            service().verify(&token),
            Err(ApplicationError::Authentication(_))
        ));
    }

    #[test]
    fn bearer_prefix_is_required() {
        let mut headers = HeaderMap::new();
        assert_eq!(bearer_token(&headers), None);
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Token abc"));
        assert_eq!(bearer_token(&headers), None);
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer abc"));
        assert_eq!(bearer_token(&headers), Some("abc"));
    }
}
