use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{delete, get, post, put},
    Json, Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use uuid::Uuid;

use application::{CreateConversationRequest, SendMessageRequest};
use domain::{
    Conversation, ConversationId, ConversationType, Message, MessageId, MessageType, Notification,
    NotificationId, NotificationStats, Pagination, Participant, UserId,
};

use crate::{
    auth::AuthUser,
    dto::{
        AddParticipantPayload, ConversationSummaryDto, CountDto, CreateConversationPayload,
        CreateNotificationPayload, CreateNotificationsPayload, ListResponse, MessageListQuery,
        NotificationQuery, PageQuery, ReadReceiptDto, SearchQuery, SendMessagePayload,
        UnreadNotificationsQuery, UpdateConversationPayload, UpdateMessagePayload,
    },
    error::ApiError,
    state::AppState,
    websocket::websocket_upgrade,
};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/ws", get(websocket_upgrade))
        .nest("/api/v1", api_routes())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

fn api_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/conversations",
            post(create_conversation).get(list_conversations),
        )
        .route(
            "/conversations/{conversation_id}",
            get(get_conversation)
                .put(update_conversation)
                .delete(delete_conversation),
        )
        .route(
            "/conversations/{conversation_id}/participants",
            post(add_participant),
        )
        .route(
            "/conversations/{conversation_id}/participants/{user_id}",
            delete(remove_participant),
        )
        .route("/conversations/{conversation_id}/read", post(mark_read))
        .route(
            "/conversations/{conversation_id}/messages",
            get(list_messages).post(send_message),
        )
        .route(
            "/conversations/{conversation_id}/messages/search",
            get(search_messages),
        )
        .route(
            "/conversations/{conversation_id}/unread/count",
            get(unread_count),
        )
        .route("/conversations/{conversation_id}/unread", get(unread_messages))
        .route("/conversations/{conversation_id}/latest", get(latest_message))
        .route(
            "/messages/{message_id}",
            get(get_message).put(update_message).delete(delete_message),
        )
        .route(
            "/messages/{message_id}/permanent",
            delete(delete_message_permanently),
        )
        .route(
            "/notifications",
            get(list_notifications).post(create_notification),
        )
        .route("/notifications/multiple", post(create_notifications))
        .route("/notifications/stats", get(notification_stats))
        .route("/notifications/unread", get(unread_notifications))
        .route(
            "/notifications/unread/count",
            get(notification_unread_count),
        )
        .route("/notifications/expired", delete(delete_expired_notifications))
        .route("/notifications/read-all", put(mark_all_notifications_read))
        .route("/notifications/read", delete(delete_read_notifications))
        .route(
            "/notifications/{notification_id}/read",
            put(mark_notification_read),
        )
        .route(
            "/notifications/{notification_id}",
            get(get_notification).delete(delete_notification),
        )
        .route("/presence/online", get(online_users))
}

async fn health() -> StatusCode {
    StatusCode::OK
}

// ---- conversations ----

async fn create_conversation(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(payload): Json<CreateConversationPayload>,
) -> Result<(StatusCode, Json<Conversation>), ApiError> {
    let conversation_type = payload.conversation_type.parse::<ConversationType>()?;
    let result = state
        .conversation_service
        .create(CreateConversationRequest {
            creator_id: user.id,
            conversation_type,
            title: payload.title,
            participants: payload.participants.into_iter().map(UserId::new).collect(),
        })
        .await?;

    let status = if result.created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(result.conversation)))
}

async fn list_conversations(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Query(query): Query<PageQuery>,
) -> Result<Json<ListResponse<ConversationSummaryDto>>, ApiError> {
    let page = state
        .conversation_service
        .list(user.id, query.pagination())
        .await?;

    let page = page.map(|summary| ConversationSummaryDto {
        conversation: summary.conversation,
        last_message: summary.last_message,
        unread_count: summary.unread_count,
    });
    Ok(Json(page.into()))
}

async fn get_conversation(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(conversation_id): Path<Uuid>,
) -> Result<Json<Conversation>, ApiError> {
    let conversation = state
        .conversation_service
        .get(user.id, ConversationId::new(conversation_id))
        .await?;
    Ok(Json(conversation))
}

async fn update_conversation(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(conversation_id): Path<Uuid>,
    Json(payload): Json<UpdateConversationPayload>,
) -> Result<Json<Conversation>, ApiError> {
    let conversation = state
        .conversation_service
        .update_title(user.id, ConversationId::new(conversation_id), payload.title)
        .await?;
    Ok(Json(conversation))
}

async fn delete_conversation(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(conversation_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    state
        .conversation_service
        .delete(user.id, ConversationId::new(conversation_id))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn add_participant(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(conversation_id): Path<Uuid>,
    Json(payload): Json<AddParticipantPayload>,
) -> Result<(StatusCode, Json<Participant>), ApiError> {
    let participant = state
        .conversation_service
        .add_participant(
            user.id,
            ConversationId::new(conversation_id),
            UserId::new(payload.participant_id),
            payload.role,
        )
        .await?;
    Ok((StatusCode::CREATED, Json(participant)))
}

async fn remove_participant(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path((conversation_id, participant_id)): Path<(Uuid, Uuid)>,
) -> Result<StatusCode, ApiError> {
    state
        .conversation_service
        .remove_participant(
            user.id,
            ConversationId::new(conversation_id),
            UserId::new(participant_id),
        )
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn mark_read(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(conversation_id): Path<Uuid>,
) -> Result<Json<ReadReceiptDto>, ApiError> {
    let conversation_id = ConversationId::new(conversation_id);
    let read_at = state
        .conversation_service
        .mark_read(user.id, conversation_id)
        .await?;
    Ok(Json(ReadReceiptDto {
        conversation_id,
        read_at,
    }))
}

async fn unread_count(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(conversation_id): Path<Uuid>,
) -> Result<Json<CountDto>, ApiError> {
    let count = state
        .conversation_service
        .unread_count(user.id, ConversationId::new(conversation_id))
        .await?;
    Ok(Json(CountDto { count }))
}

async fn unread_messages(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(conversation_id): Path<Uuid>,
) -> Result<Json<Vec<Message>>, ApiError> {
    let messages = state
        .conversation_service
        .unread_messages(user.id, ConversationId::new(conversation_id))
        .await?;
    Ok(Json(messages))
}

// ---- messages ----

async fn list_messages(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(conversation_id): Path<Uuid>,
    Query(query): Query<MessageListQuery>,
) -> Result<Json<ListResponse<Message>>, ApiError> {
    let page = state
        .message_service
        .list(
            user.id,
            ConversationId::new(conversation_id),
            query.pagination(),
            query.before.map(MessageId::new),
        )
        .await?;
    Ok(Json(page.into()))
}

async fn send_message(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(conversation_id): Path<Uuid>,
    Json(payload): Json<SendMessagePayload>,
) -> Result<(StatusCode, Json<Message>), ApiError> {
    let message_type = payload
        .message_type
        .as_deref()
        .map(str::parse::<MessageType>)
        .transpose()?;

    let message = state
        .message_service
        .send(
            &user,
            SendMessageRequest {
                conversation_id: ConversationId::new(conversation_id),
                content: payload.content,
                message_type,
                reply_to_message_id: payload.reply_to_message_id.map(MessageId::new),
                attachment: payload.attachment,
            },
        )
        .await?;
    Ok((StatusCode::CREATED, Json(message)))
}

async fn search_messages(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(conversation_id): Path<Uuid>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<ListResponse<Message>>, ApiError> {
    let pagination = Pagination::new(query.page.unwrap_or(1), query.limit.unwrap_or(20));
    let page = state
        .message_service
        .search(
            user.id,
            ConversationId::new(conversation_id),
            &query.q,
            pagination,
        )
        .await?;
    Ok(Json(page.into()))
}

async fn latest_message(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(conversation_id): Path<Uuid>,
) -> Result<Json<Option<Message>>, ApiError> {
    let message = state
        .message_service
        .latest(user.id, ConversationId::new(conversation_id))
        .await?;
    Ok(Json(message))
}

async fn get_message(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(message_id): Path<Uuid>,
) -> Result<Json<Message>, ApiError> {
    let message = state
        .message_service
        .get(user.id, MessageId::new(message_id))
        .await?;
    Ok(Json(message))
}

async fn update_message(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(message_id): Path<Uuid>,
    Json(payload): Json<UpdateMessagePayload>,
) -> Result<Json<Message>, ApiError> {
    let message = state
        .message_service
        .update(user.id, MessageId::new(message_id), &payload.content)
        .await?;
    Ok(Json(message))
}

async fn delete_message(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(message_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    state
        .message_service
        .delete(user.id, MessageId::new(message_id))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn delete_message_permanently(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(message_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    state
        .message_service
        .delete_permanently(&user, MessageId::new(message_id))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

// ---- notifications ----

async fn list_notifications(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Query(query): Query<NotificationQuery>,
) -> Result<Json<ListResponse<Notification>>, ApiError> {
    let pagination = Pagination::new(query.page.unwrap_or(1), query.limit.unwrap_or(20));
    let page = state
        .notification_service
        .list(user.id, query.filter(), pagination)
        .await?;
    Ok(Json(page.into()))
}

async fn get_notification(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(notification_id): Path<Uuid>,
) -> Result<Json<Notification>, ApiError> {
    let notification = state
        .notification_service
        .get(user.id, NotificationId::new(notification_id))
        .await?;
    Ok(Json(notification))
}

async fn notification_stats(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> Result<Json<NotificationStats>, ApiError> {
    Ok(Json(state.notification_service.stats(user.id).await?))
}

async fn unread_notifications(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Query(query): Query<UnreadNotificationsQuery>,
) -> Result<Json<Vec<Notification>>, ApiError> {
    let notifications = state
        .notification_service
        .unread(user.id, query.limit)
        .await?;
    Ok(Json(notifications))
}

async fn create_notification(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(payload): Json<CreateNotificationPayload>,
) -> Result<(StatusCode, Json<Notification>), ApiError> {
    let draft = payload.notification.draft();
    let notification = state
        .notification_service
        .create(&user, UserId::new(payload.user_id), &draft)
        .await?;
    Ok((StatusCode::CREATED, Json(notification)))
}

async fn create_notifications(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(payload): Json<CreateNotificationsPayload>,
) -> Result<(StatusCode, Json<Vec<Notification>>), ApiError> {
    let recipients: Vec<UserId> = payload.user_ids.into_iter().map(UserId::new).collect();
    let draft = payload.notification.draft();
    let notifications = state
        .notification_service
        .create_for_users(&user, &recipients, &draft)
        .await?;
    Ok((StatusCode::CREATED, Json(notifications)))
}

async fn delete_expired_notifications(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> Result<Json<CountDto>, ApiError> {
    let count = state.notification_service.delete_expired(&user).await?;
    Ok(Json(CountDto { count }))
}

async fn notification_unread_count(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> Result<Json<CountDto>, ApiError> {
    let count = state.notification_service.unread_count(user.id).await?;
    Ok(Json(CountDto { count }))
}

async fn mark_notification_read(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(notification_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    state
        .notification_service
        .mark_read(user.id, NotificationId::new(notification_id))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn mark_all_notifications_read(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> Result<Json<CountDto>, ApiError> {
    let count = state.notification_service.mark_all_read(user.id).await?;
    Ok(Json(CountDto { count }))
}

async fn delete_notification(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(notification_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    state
        .notification_service
        .delete(user.id, NotificationId::new(notification_id))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn delete_read_notifications(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> Result<Json<CountDto>, ApiError> {
    let count = state.notification_service.delete_read(user.id).await?;
    Ok(Json(CountDto { count }))
}

// ---- presence ----

async fn online_users(
    State(state): State<AppState>,
    AuthUser(_user): AuthUser,
) -> Json<Vec<UserId>> {
    Json(state.gateway.online_users().await)
}
