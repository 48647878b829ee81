use domain::DomainError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApplicationError {
    #[error("domain error: {0}")]
    Domain(#[from] DomainError),
    #[error("authentication failed: {0}")]
    Authentication(String),
    #[error("authorization failed: {0}")]
    Authorization(String),
    #[error("infrastructure error: {0}")]
    Infrastructure(String),
}

impl ApplicationError {
    pub fn authentication(message: impl Into<String>) -> Self {
        ApplicationError::Authentication(message.into())
    }

    pub fn authorization(message: impl Into<String>) -> Self {
        ApplicationError::Authorization(message.into())
    }

    /// 创建基础设施错误
    pub fn infrastructure(message: impl Into<String>) -> Self {
        ApplicationError::Infrastructure(message.into())
    }

    pub fn not_participant() -> Self {
        ApplicationError::authorization("you are not a participant of this conversation")
    }

    /// 面向客户端的错误描述，存储层细节不外泄
    pub fn client_message(&self) -> String {
        match self {
            ApplicationError::Domain(DomainError::DatabaseError { .. })
            | ApplicationError::Infrastructure(_) => "internal server error".to_string(),
            ApplicationError::Domain(DomainError::ValidationError { message, .. }) => {
                message.clone()
            }
            ApplicationError::Domain(err) => err.to_string(),
            ApplicationError::Authentication(message) | ApplicationError::Authorization(message) => {
                message.clone()
            }
        }
    }
}
