//! 用户身份定义
//!
//! 实时层只需要用户的标识、展示名称和角色，完整的用户资料由外部系统维护。

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::DomainError;
use crate::value_objects::UserId;

/// 用户角色
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UserRole {
    Admin,
    Tasker,
    Customer,
    Guest,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Admin => "Admin",
            UserRole::Tasker => "Tasker",
            UserRole::Customer => "Customer",
            UserRole::Guest => "Guest",
        }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, UserRole::Admin)
    }
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UserRole {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Admin" => Ok(UserRole::Admin),
            "Tasker" => Ok(UserRole::Tasker),
            "Customer" => Ok(UserRole::Customer),
            "Guest" => Ok(UserRole::Guest),
            other => Err(DomainError::validation_error(
                "role",
                format!("unknown role '{other}'"),
            )),
        }
    }
}

/// 已认证的用户身份，连接在其生命周期内绑定此身份
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserIdentity {
    pub id: UserId,
    pub name: String,
    pub role: UserRole,
}

impl UserIdentity {
    pub fn new(id: UserId, name: impl Into<String>, role: UserRole) -> Self {
        Self {
            id,
            name: name.into(),
            role,
        }
    }
}
