//! 用户目录实现

use std::sync::Arc;

use async_trait::async_trait;
use domain::{DomainResult, UserDirectory, UserId, UserIdentity, UserRole};
use sqlx::{query_as, FromRow};
use uuid::Uuid;

use crate::db::{db_error, DbPool};

#[derive(Debug, Clone, FromRow)]
struct DbUser {
    id: Uuid,
    name: String,
    role: String,
}

impl TryFrom<DbUser> for UserIdentity {
    type Error = domain::DomainError;

    fn try_from(row: DbUser) -> Result<Self, Self::Error> {
        Ok(UserIdentity::new(
            UserId::new(row.id),
            row.name,
            row.role.parse::<UserRole>()?,
        ))
    }
}

pub struct PgUserDirectory {
    pool: Arc<DbPool>,
}

impl PgUserDirectory {
    pub fn new(pool: Arc<DbPool>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserDirectory for PgUserDirectory {
    async fn find_by_id(&self, id: UserId) -> DomainResult<Option<UserIdentity>> {
        let row = query_as::<_, DbUser>("SELECT id, name, role FROM users WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(db_error)?;
        row.map(UserIdentity::try_from).transpose()
    }
}
