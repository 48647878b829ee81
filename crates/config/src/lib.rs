//! 统一配置中心
//!
//! 提供应用的全局配置管理，包括：
//! - 服务监听地址
//! - 数据库连接（未配置时使用内存存储）
//! - JWT认证
//! - 实时通道的计时参数
//!
//! 加载顺序：内置默认值 -> 配置文件（`CHAT_CONFIG`，默认 `config.yaml`）
//! -> `CHAT_` 前缀环境变量（`__` 表示嵌套）-> `DATABASE_URL` / `JWT_SECRET`。

use std::path::Path;
use std::time::Duration;

use figment::providers::{Env, Format, Json, Serialized, Toml, Yaml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

pub const CONFIG_PATH_ENV: &str = "CHAT_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "config.yaml";

/// 全局应用配置
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct AppConfig {
    #[validate(nested)]
    pub server: ServerConfig,
    #[validate(nested)]
    pub database: DatabaseConfig,
    #[validate(nested)]
    pub jwt: JwtConfig,
    #[validate(nested)]
    pub realtime: RealtimeConfig,
    /// 内存存储模式下预置的用户
    #[serde(default)]
    pub seed_users: Vec<SeedUser>,
}

/// 服务器配置
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ServerConfig {
    #[validate(length(min = 1, message = "host cannot be empty"))]
    pub host: String,
    #[validate(range(min = 1, message = "port must be greater than 0"))]
    pub port: u16,
}

/// 数据库配置
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct DatabaseConfig {
    /// 为空时使用内存存储
    pub url: Option<String>,
    #[validate(range(min = 1, message = "max connections must be greater than 0"))]
    pub max_connections: u32,
    pub run_migrations: bool,
}

/// JWT配置
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct JwtConfig {
    #[validate(length(min = 32, message = "JWT secret must be at least 32 characters long"))]
    pub secret: String,
    #[validate(range(min = 1, message = "expiration must be at least one hour"))]
    pub expiration_hours: i64,
}

/// 实时通道配置
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct RealtimeConfig {
    #[validate(range(min = 1))]
    pub typing_timeout_ms: u64,
    #[validate(range(min = 1))]
    pub read_throttle_ms: u64,
    #[validate(range(min = 1))]
    pub notification_preview_chars: usize,
}

impl RealtimeConfig {
    pub fn typing_timeout(&self) -> Duration {
        Duration::from_millis(self.typing_timeout_ms)
    }

    pub fn read_throttle(&self) -> Duration {
        Duration::from_millis(self.read_throttle_ms)
    }
}

/// 预置用户
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedUser {
    pub id: Uuid,
    pub name: String,
    pub role: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "127.0.0.1".into(),
                port: 8080,
            },
            database: DatabaseConfig {
                url: None,
                max_connections: 5,
                run_migrations: true,
            },
            jwt: JwtConfig {
                secret: "dev-secret-key-not-for-production-use-minimum-32-chars".into(),
                expiration_hours: 24,
            },
            realtime: RealtimeConfig {
                typing_timeout_ms: 3000,
                read_throttle_ms: 5000,
                notification_preview_chars: 100,
            },
            seed_users: Vec::new(),
        }
    }
}

impl AppConfig {
    /// 按默认顺序加载并验证配置
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.into());
        Self::from_figment(Self::figment(&path))
    }

    /// 构建分层配置源
    pub fn figment(path: &str) -> Figment {
        let mut fig = Figment::from(Serialized::defaults(AppConfig::default()));
        if Path::new(path).exists() {
            fig = if path.ends_with(".json") {
                fig.merge(Json::file(path))
            } else if path.ends_with(".toml") {
                fig.merge(Toml::file(path))
            } else {
                fig.merge(Yaml::file(path))
            };
        }
        fig.merge(Env::prefixed("CHAT_").split("__"))
            .merge(Env::raw().only(&["DATABASE_URL"]).map(|_| "database.url".into()))
            .merge(Env::raw().only(&["JWT_SECRET"]).map(|_| "jwt.secret".into()))
    }

    pub fn from_figment(figment: Figment) -> Result<Self, ConfigError> {
        let config: AppConfig = figment.extract().map_err(Box::new)?;
        config.validate()?;
        Ok(config)
    }

    /// 是否使用内存存储
    pub fn uses_memory_store(&self) -> bool {
        self.database
            .url
            .as_deref()
            .map_or(true, |url| url.trim().is_empty())
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    /// 日志用的脱敏表示
    pub fn sanitize(&self) -> String {
        let database = if self.uses_memory_store() {
            "memory".to_string()
        } else {
            "postgres://[REDACTED]".to_string()
        };
        format!(
            "server={} database={} max_connections={} typing_timeout_ms={} read_throttle_ms={}",
            self.bind_address(),
            database,
            self.database.max_connections,
            self.realtime.typing_timeout_ms,
            self.realtime.read_throttle_ms,
        )
    }
}

/// 配置错误类型
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] Box<figment::Error>),
    #[error("invalid configuration: {0}")]
    Invalid(#[from] validator::ValidationErrors),
}
