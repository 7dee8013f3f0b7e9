use std::sync::Arc;

use crate::config::GatewayConfig;
use crate::error::AppResult;
use crate::gateway::{Gateway, RestGateway};
use crate::session::SessionStore;
use crate::state::{TaskStore, UserDirectory};
use crate::utils::notify::Notices;

#[derive(Clone)]
pub struct AppState {
    pub gateway: Arc<dyn Gateway>,
    pub session: Arc<SessionStore>,
    pub tasks: Arc<TaskStore>,
    pub users: Arc<UserDirectory>,
    pub notices: Notices,
}

impl AppState {
    /// 连接网关并恢复既有会话
    pub async fn init(config: &GatewayConfig) -> AppResult<Self> {
        let gateway: Arc<dyn Gateway> = Arc::new(RestGateway::new(config));
        Self::with_gateway(gateway).await
    }

    pub async fn with_gateway(gateway: Arc<dyn Gateway>) -> AppResult<Self> {
        let notices = Notices::default();
        let session = SessionStore::bootstrap(gateway.clone()).await?;
        let tasks = Arc::new(TaskStore::new(
            gateway.clone(),
            session.clone(),
            notices.clone(),
        ));
        let users = Arc::new(UserDirectory::new(
            gateway.clone(),
            session.clone(),
            notices.clone(),
        ));
        Ok(Self {
            gateway,
            session,
            tasks,
            users,
            notices,
        })
    }
}
