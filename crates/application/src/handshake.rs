//! 连接握手
//!
//! 将连接时出示的凭证解析为用户身份。凭证缺失、无效、过期，
//! 或者解析出的用户不存在时握手失败，不会创建连接。

use std::sync::Arc;

use domain::{UserDirectory, UserId, UserIdentity, UserRole};

use crate::error::ApplicationError;

/// 凭证校验结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VerifiedCredential {
    pub user_id: UserId,
    pub role: UserRole,
}

/// 身份校验器，由传输层提供具体实现
pub trait CredentialVerifier: Send + Sync {
    fn verify(&self, credential: &str) -> Result<VerifiedCredential, ApplicationError>;
}

pub struct Handshake {
    verifier: Arc<dyn CredentialVerifier>,
    users: Arc<dyn UserDirectory>,
}

impl Handshake {
    pub fn new(verifier: Arc<dyn CredentialVerifier>, users: Arc<dyn UserDirectory>) -> Self {
        Self { verifier, users }
    }

    /// 解析凭证并确认用户存在
    ///
    /// 角色取自凭证本身，展示名称取自用户目录。
    pub async fn authenticate(
        &self,
        credential: Option<&str>,
    ) -> Result<UserIdentity, ApplicationError> {
        let credential = credential
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .ok_or_else(|| ApplicationError::authentication("missing credential"))?;

        let verified = self.verifier.verify(credential)?;

        let user = self
            .users
            .find_by_id(verified.user_id)
            .await?
            .ok_or_else(|| ApplicationError::authentication("user does not exist"))?;

        Ok(UserIdentity::new(user.id, user.name, verified.role))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::MockUserDirectory;

    struct FixedVerifier(Option<VerifiedCredential>);

    impl CredentialVerifier for FixedVerifier {
        fn verify(&self, _credential: &str) -> Result<VerifiedCredential, ApplicationError> {
            self.0
                .ok_or_else(|| ApplicationError::authentication("invalid token"))
        }
    }

    fn handshake(verified: Option<VerifiedCredential>, known: Option<UserIdentity>) -> Handshake {
        let mut users = MockUserDirectory::new();
        users
            .expect_find_by_id()
            .returning(move |_| Ok(known.clone()));
        Handshake::new(Arc::new(FixedVerifier(verified)), Arc::new(users))
    }

    #[tokio::test]
    async fn missing_credential_is_refused() {
        let handshake = handshake(None, None);
        let err = handshake.authenticate(None).await.unwrap_err();
        assert!(matches!(err, ApplicationError::Authentication(_)));
        let err = handshake.authenticate(Some("  ")).await.unwrap_err();
        assert!(matches!(err, ApplicationError::Authentication(_)));
    }

    #[tokio::test]
    async fn invalid_credential_is_refused() {
        let err = handshake(None, None)
            .authenticate(Some("garbage"))
            .await
            .unwrap_err();
        assert!(matches!(err, ApplicationError::Authentication(_)));
    }

    #[tokio::test]
    async fn unknown_user_is_refused() {
        let verified = VerifiedCredential {
            user_id: UserId::generate(),
            role: UserRole::Customer,
        };
        let err = handshake(Some(verified), None)
            .authenticate(Some("token"))
            .await
            .unwrap_err();
        assert!(matches!(err, ApplicationError::Authentication(_)));
    }

    #[tokio::test]
    async fn identity_takes_role_from_credential() {
        let user_id = UserId::generate();
        let verified = VerifiedCredential {
            user_id,
            role: UserRole::Admin,
        };
        let stored = UserIdentity::new(user_id, "Mai", UserRole::Customer);
        let identity = handshake(Some(verified), Some(stored))
            .authenticate(Some("token"))
            .await
            .unwrap();
        assert_eq!(identity.id, user_id);
        assert_eq!(identity.name, "Mai");
        assert_eq!(identity.role, UserRole::Admin);
    }
}
