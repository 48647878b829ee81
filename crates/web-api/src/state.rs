use std::sync::Arc;

use application::{
    Clock, ConversationService, ConversationServiceDependencies, DeliveryDispatcher, EventSink,
    Handshake, MessageService, MessageServiceDependencies, NotificationService,
    NotificationServiceDependencies, RealtimeGateway, RealtimeSettings, RealtimeState,
};
use config::JwtConfig;
use infrastructure::Storage;

use crate::{hub::ConnectionHub, JwtService};

#[derive(Clone)]
pub struct AppState {
    pub gateway: RealtimeGateway,
    pub handshake: Arc<Handshake>,
    pub hub: Arc<ConnectionHub>,
    pub conversation_service: Arc<ConversationService>,
    pub message_service: Arc<MessageService>,
    pub notification_service: Arc<NotificationService>,
    pub jwt_service: Arc<JwtService>,
}

impl AppState {
    /// 装配实时层与用例服务
    pub fn new(
        storage: Storage,
        jwt: JwtConfig,
        settings: RealtimeSettings,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let hub = Arc::new(ConnectionHub::new());
        let sink: Arc<dyn EventSink> = hub.clone();
        let jwt_service = Arc::new(JwtService::new(jwt));
        let realtime = RealtimeState::shared(settings.read_throttle_window);

        let dispatcher = Arc::new(DeliveryDispatcher::new(
            storage.conversations.clone(),
            storage.messages.clone(),
            storage.notifications.clone(),
            clock.clone(),
            realtime.clone(),
            settings.notification_preview_chars,
        ));

        let notification_service = Arc::new(NotificationService::new(
            NotificationServiceDependencies {
                notifications: storage.notifications.clone(),
                state: realtime.clone(),
                sink: sink.clone(),
                clock: clock.clone(),
            },
        ));

        let conversation_service = Arc::new(ConversationService::new(
            ConversationServiceDependencies {
                conversations: storage.conversations.clone(),
                messages: storage.messages.clone(),
                users: storage.users.clone(),
                clock: clock.clone(),
            },
        ));

        let message_service = Arc::new(MessageService::new(MessageServiceDependencies {
            conversations: storage.conversations.clone(),
            messages: storage.messages.clone(),
            dispatcher: dispatcher.clone(),
            sink: sink.clone(),
            clock: clock.clone(),
        }));

        let gateway = RealtimeGateway::new(
            realtime,
            storage.conversations.clone(),
            notification_service.clone(),
            dispatcher,
            sink,
            clock,
            settings,
        );

        let handshake = Arc::new(Handshake::new(jwt_service.clone(), storage.users));

        Self {
            gateway,
            handshake,
            hub,
            conversation_service,
            message_service,
            notification_service,
            jwt_service,
        }
    }
}
