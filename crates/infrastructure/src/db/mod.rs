//! Database utilities and repositories (Core DB Layer)

use domain::DomainError;
use sqlx::{Pool, Postgres};

pub mod repositories;

pub type DbPool = Pool<Postgres>;

pub struct Db;

impl Db {
    pub async fn create_pool(database_url: &str, max_size: u32) -> Result<DbPool, sqlx::Error> {
        sqlx::postgres::PgPoolOptions::new()
            .max_connections(max_size)
            .connect(database_url)
            .await
    }
}

/// 将 sqlx 错误转换为领域错误
///
/// 唯一约束冲突映射为资源已存在，外键冲突映射为资源不存在。
pub(crate) fn map_db_error(resource: &str, err: sqlx::Error) -> DomainError {
    if let Some(db_err) = err.as_database_error() {
        if db_err.is_unique_violation() {
            return DomainError::resource_already_exists(resource, db_err.message());
        }
        if db_err.is_foreign_key_violation() {
            return DomainError::resource_not_found(resource, db_err.message());
        }
    }
    DomainError::database_error(err.to_string())
}

pub(crate) fn db_error(err: sqlx::Error) -> DomainError {
    DomainError::database_error(err.to_string())
}
