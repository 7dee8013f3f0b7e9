//! taskvault: client core for a team task manager backed by a hosted
//! backend-as-a-service platform (table API + object storage + identity).
//!
//! 视图层不在本 crate 范围内：前端只读取状态快照、派发意图、订阅通知。

mod app_state;
mod config;
mod error;
mod gateway;
mod session;
mod state;
mod types;
mod utils;

pub use app_state::AppState;
pub use config::{GatewayConfig, DEFAULT_STORAGE_BUCKET};
pub use error::{AppError, AppResult, ResultExt};
pub use gateway::{
    AuthEvent, AuthGateway, AuthSession, AuthUser, DataGateway, Filter, Gateway, ObjectStorage,
    Order, Page, Query, RangeSpec, RestGateway,
};
pub use session::{SessionState, SessionStore};
pub use state::{
    FilterPatch, TaskFilters, TaskStore, TasksState, UserDirectory, UsersState, DEFAULT_PAGE_SIZE,
};
pub use types::*;
pub use utils::notify::{Notice, NoticeLevel, Notices};
pub use utils::validation;
pub use utils::validation::MAX_ATTACHMENTS;

/// 初始化 tracing 订阅器（RUST_LOG 控制过滤级别）
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
