mod conversation_service;
mod message_service;
mod notification_service;

pub use conversation_service::{
    ConversationService, ConversationServiceDependencies, ConversationSummary,
    CreateConversationRequest, CreatedConversation,
};
pub use message_service::{MessageService, MessageServiceDependencies, SendMessageRequest};
pub use notification_service::{NotificationService, NotificationServiceDependencies};

use domain::{Conversation, ConversationId, ConversationRepository, DomainError, UserId};

use crate::error::ApplicationError;

/// 载入会话并确认调用者是有效参与者
///
/// 会话不存在或已停用返回未找到，调用者不是参与者返回授权错误。
pub(crate) async fn load_for_participant(
    conversations: &dyn ConversationRepository,
    conversation_id: ConversationId,
    user_id: UserId,
) -> Result<Conversation, ApplicationError> {
    let conversation = conversations
        .find_by_id(conversation_id)
        .await?
        .filter(|c| c.is_active)
        .ok_or_else(|| DomainError::resource_not_found("conversation", conversation_id))?;

    if !conversation.is_active_participant(user_id) {
        return Err(ApplicationError::not_participant());
    }
    Ok(conversation)
}
