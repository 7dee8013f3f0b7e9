//! 会话存储
//!
//! 包装网关的身份接口：启动时恢复既有会话并解析档案，
//! 之后由登录/登出事件流驱动状态变化。

use std::sync::Arc;

use serde_json::json;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;

use crate::error::AppResult;
use crate::gateway::{AuthEvent, Filter, Gateway, Query};
use crate::types::{Profile, UserRole};

/// 会话三态
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Loading,
    Authenticated(Profile),
    Unauthenticated,
}

impl SessionState {
    pub fn profile(&self) -> Option<&Profile> {
        match self {
            SessionState::Authenticated(profile) => Some(profile),
            _ => None,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.profile()
            .map(|profile| profile.role == UserRole::Admin)
            .unwrap_or(false)
    }
}

pub struct SessionStore {
    gateway: Arc<dyn Gateway>,
    state: Arc<watch::Sender<SessionState>>,
    listener: JoinHandle<()>,
}

impl SessionStore {
    /// 恢复既有会话，并订阅后续的登录/登出事件
    pub async fn bootstrap(gateway: Arc<dyn Gateway>) -> AppResult<Arc<Self>> {
        let (state, _) = watch::channel(SessionState::Loading);
        let state = Arc::new(state);

        let initial = match gateway.current_session().await? {
            Some(session) => match fetch_profile(gateway.as_ref(), &session.user.id).await? {
                Some(profile) => SessionState::Authenticated(profile),
                None => SessionState::Unauthenticated,
            },
            None => SessionState::Unauthenticated,
        };
        // send_replace：没有任何订阅者时也要更新状态值
        state.send_replace(initial);

        let listener = tokio::spawn(run_listener(
            gateway.clone(),
            gateway.subscribe(),
            state.clone(),
        ));

        Ok(Arc::new(Self {
            gateway,
            state,
            listener,
        }))
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    pub fn current(&self) -> SessionState {
        self.state.borrow().clone()
    }

    pub fn current_profile(&self) -> Option<Profile> {
        self.current().profile().cloned()
    }

    /// 注册新账号并写入档案行（默认角色 user）
    ///
    /// 档案行写入失败不阻断注册，留给登录后的档案解析兜底。
    pub async fn sign_up(&self, email: &str, password: &str) -> AppResult<()> {
        let session = self.gateway.sign_up(email, password).await?;

        let row = json!({ "id": session.user.id, "email": email, "role": "user" });
        if let Err(err) = self.gateway.insert("profiles", row).await {
            tracing::error!(error = %err, "profile creation after sign-up failed");
        }
        Ok(())
    }

    /// 登录；状态变化由事件流驱动
    pub async fn sign_in(&self, email: &str, password: &str) -> AppResult<()> {
        self.gateway.sign_in(email, password).await?;
        Ok(())
    }

    /// 登出；状态变化由事件流驱动
    pub async fn sign_out(&self) -> AppResult<()> {
        self.gateway.sign_out().await?;
        Ok(())
    }
}

impl Drop for SessionStore {
    fn drop(&mut self) {
        // 会话结束（无论何种方式）都要释放事件订阅
        self.listener.abort();
    }
}

async fn run_listener(
    gateway: Arc<dyn Gateway>,
    mut events: broadcast::Receiver<AuthEvent>,
    state: Arc<watch::Sender<SessionState>>,
) {
    loop {
        match events.recv().await {
            Ok(AuthEvent::SignedIn(session)) => {
                let next = match fetch_profile(gateway.as_ref(), &session.user.id).await {
                    Ok(Some(profile)) => {
                        tracing::debug!(user_id = %profile.id, "session established");
                        SessionState::Authenticated(profile)
                    }
                    Ok(None) => {
                        tracing::warn!(user_id = %session.user.id, "signed in without profile row");
                        SessionState::Unauthenticated
                    }
                    Err(err) => {
                        tracing::error!(error = %err, "profile fetch after sign-in failed");
                        SessionState::Unauthenticated
                    }
                };
                state.send_replace(next);
            }
            Ok(AuthEvent::SignedOut) => {
                tracing::debug!("session cleared");
                state.send_replace(SessionState::Unauthenticated);
            }
            Err(broadcast::error::RecvError::Lagged(_)) => continue,
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

async fn fetch_profile(gateway: &dyn Gateway, user_id: &str) -> AppResult<Option<Profile>> {
    let page = gateway
        .select("profiles", Query::new().filter(Filter::eq("id", user_id)))
        .await?;
    match page.rows.into_iter().next() {
        Some(row) => Ok(Some(serde_json::from_value(row)?)),
        None => Ok(None),
    }
}
