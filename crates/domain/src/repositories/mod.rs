//! Repository接口定义
//!
//! 定义数据访问层的抽象接口，内层定义接口，外层实现接口。
//! 实时核心通过这些接口访问用户目录、成员关系存储、消息存储与通知存储。

pub mod conversation_repository;
pub mod message_repository;
pub mod notification_repository;
pub mod user_repository;

// 重新导出所有Repository特征
pub use conversation_repository::ConversationRepository;
pub use message_repository::{MessageCursor, MessageRepository};
pub use notification_repository::NotificationRepository;
pub use user_repository::UserDirectory;

#[cfg(feature = "testing")]
pub use conversation_repository::MockConversationRepository;
#[cfg(feature = "testing")]
pub use message_repository::MockMessageRepository;
#[cfg(feature = "testing")]
pub use notification_repository::MockNotificationRepository;
#[cfg(feature = "testing")]
pub use user_repository::MockUserDirectory;

/// 分页参数
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub page: u32,
    pub page_size: u32,
    pub offset: u64,
    pub limit: u64,
}

impl Pagination {
    pub const MAX_PAGE_SIZE: u32 = 100;

    /// 页码从 1 开始；每页条数限制在 1..=100
    pub fn new(page: u32, page_size: u32) -> Self {
        let page = page.max(1);
        let page_size = page_size.clamp(1, Self::MAX_PAGE_SIZE);
        let offset = (page as u64 - 1) * page_size as u64;
        let limit = page_size as u64;
        Self {
            page,
            page_size,
            offset,
            limit,
        }
    }

    pub fn default_page() -> Self {
        Self::new(1, 20)
    }
}

impl Default for Pagination {
    fn default() -> Self {
        Self::default_page()
    }
}

/// 分页结果
#[derive(Debug, Clone, PartialEq)]
pub struct PaginatedResult<T> {
    pub items: Vec<T>,
    pub total_count: u64,
    pub page: u32,
    pub page_size: u32,
    pub total_pages: u32,
    pub has_next: bool,
    pub has_prev: bool,
}

impl<T> PaginatedResult<T> {
    pub fn new(items: Vec<T>, total_count: u64, pagination: Pagination) -> Self {
        let has_next = (pagination.page as u64 * pagination.page_size as u64) < total_count;
        let has_prev = pagination.page > 1;
        let total_pages = total_count.div_ceil(pagination.page_size as u64) as u32;

        Self {
            items,
            total_count,
            page: pagination.page,
            page_size: pagination.page_size,
            total_pages,
            has_next,
            has_prev,
        }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> PaginatedResult<U> {
        PaginatedResult {
            items: self.items.into_iter().map(f).collect(),
            total_count: self.total_count,
            page: self.page,
            page_size: self.page_size,
            total_pages: self.total_pages,
            has_next: self.has_next,
            has_prev: self.has_prev,
        }
    }
}
