//! 用户目录接口定义

use async_trait::async_trait;

use crate::entities::UserIdentity;
use crate::errors::DomainResult;
use crate::value_objects::UserId;

/// 用户目录，握手时用于确认令牌中的用户确实存在
#[cfg_attr(feature = "testing", mockall::automock)]
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// 根据ID查找用户
    async fn find_by_id(&self, id: UserId) -> DomainResult<Option<UserIdentity>>;
}
