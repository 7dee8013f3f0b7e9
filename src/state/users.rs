//! 用户目录状态管理
//!
//! 管理员专用的用户管理操作。这里的角色检查只是 UX 拦截，
//! 真正的约束由网关侧的行级策略兜底。

use std::sync::Arc;

use chrono::Utc;
use serde_json::json;
use tokio::sync::Mutex;

use crate::error::{AppError, AppResult};
use crate::gateway::{Filter, Gateway, Query};
use crate::session::SessionStore;
use crate::types::{Profile, ProfilePatch, SortDirection, UserRole};
use crate::utils::notify::Notices;

/// 用户目录状态快照
#[derive(Debug, Clone, Default)]
pub struct UsersState {
    pub users: Vec<Profile>,
    pub loading: bool,
    pub error: Option<String>,
}

pub struct UserDirectory {
    gateway: Arc<dyn Gateway>,
    session: Arc<SessionStore>,
    notices: Notices,
    state: Mutex<UsersState>,
}

impl UserDirectory {
    pub fn new(gateway: Arc<dyn Gateway>, session: Arc<SessionStore>, notices: Notices) -> Self {
        Self {
            gateway,
            session,
            notices,
            state: Mutex::new(UsersState::default()),
        }
    }

    pub async fn snapshot(&self) -> UsersState {
        self.state.lock().await.clone()
    }

    /// 拉取全部档案，按创建时间倒序；不筛选不分页
    pub async fn fetch(&self) -> AppResult<()> {
        if self.session.current_profile().is_none() {
            tracing::debug!("fetch skipped: no active session");
            return Ok(());
        }

        {
            let mut state = self.state.lock().await;
            state.loading = true;
        }

        let query = Query::new().order("created_at", SortDirection::Desc);
        match self.gateway.select("profiles", query).await {
            Ok(page) => {
                let users = page
                    .rows
                    .into_iter()
                    .map(serde_json::from_value)
                    .collect::<Result<Vec<Profile>, _>>();
                match users {
                    Ok(users) => {
                        let mut state = self.state.lock().await;
                        state.users = users;
                        state.loading = false;
                        state.error = None;
                        Ok(())
                    }
                    Err(err) => {
                        let err = AppError::from(err);
                        self.fail("failed to fetch users", &err).await;
                        Err(err)
                    }
                }
            }
            Err(err) => {
                self.fail("failed to fetch users", &err).await;
                Err(err)
            }
        }
    }

    /// 更新档案（改角色），仅管理员
    pub async fn update(&self, id: &str, patch: ProfilePatch) -> AppResult<Profile> {
        let _admin = self.require_admin("更新用户")?;

        {
            let mut state = self.state.lock().await;
            state.loading = true;
        }

        match self.update_inner(id, patch).await {
            Ok(profile) => {
                let mut state = self.state.lock().await;
                if let Some(slot) = state.users.iter_mut().find(|u| u.id == profile.id) {
                    *slot = profile.clone();
                }
                state.loading = false;
                state.error = None;
                drop(state);

                tracing::debug!(user_id = %profile.id, role = ?profile.role, "user updated");
                self.notices.success("user updated");
                Ok(profile)
            }
            Err(err) => {
                self.fail("failed to update user", &err).await;
                Err(err)
            }
        }
    }

    /// 删除用户，仅管理员，且不能删自己
    ///
    /// 先把该用户名下的任务（被指派的和创建的）转给当前管理员，
    /// 再删档案行，最后修补内存集合。
    pub async fn delete(&self, id: &str) -> AppResult<()> {
        let admin = self.require_admin("删除用户")?;
        if id == admin.id {
            let err = AppError::Unauthorized("不能删除当前登录账号".to_string());
            self.notices.error("cannot delete your own account");
            return Err(err);
        }

        {
            let mut state = self.state.lock().await;
            state.loading = true;
        }

        match self.delete_inner(&admin, id).await {
            Ok(()) => {
                let mut state = self.state.lock().await;
                state.users.retain(|user| user.id != id);
                state.loading = false;
                state.error = None;
                drop(state);

                tracing::debug!(user_id = %id, "user deleted");
                self.notices.success("user deleted");
                Ok(())
            }
            Err(err) => {
                self.fail("failed to delete user", &err).await;
                Err(err)
            }
        }
    }

    async fn update_inner(&self, id: &str, patch: ProfilePatch) -> AppResult<Profile> {
        let mut body = serde_json::to_value(&patch)?;
        body["updated_at"] = json!(Utc::now().to_rfc3339());

        let rows = self
            .gateway
            .update("profiles", vec![Filter::eq("id", id)], body)
            .await?;
        let row = rows.into_iter().next().ok_or_else(|| AppError::NotFound {
            entity: "profile",
            id: id.to_string(),
        })?;
        Ok(serde_json::from_value(row)?)
    }

    async fn delete_inner(&self, admin: &Profile, id: &str) -> AppResult<()> {
        self.gateway
            .update(
                "tasks",
                vec![Filter::eq("assigned_to", id)],
                json!({ "assigned_to": admin.id }),
            )
            .await?;
        self.gateway
            .update(
                "tasks",
                vec![Filter::eq("created_by", id)],
                json!({ "created_by": admin.id }),
            )
            .await?;
        self.gateway
            .delete("profiles", vec![Filter::eq("id", id)])
            .await?;
        Ok(())
    }

    /// 角色检查在任何网关调用之前完成；被拒时只发通知，不动状态
    fn require_admin(&self, action: &str) -> AppResult<Profile> {
        match self.session.current_profile() {
            Some(user) if user.role == UserRole::Admin => Ok(user),
            Some(_) => {
                let err = AppError::Unauthorized(format!("仅管理员可{}", action));
                self.notices.error("unauthorized");
                Err(err)
            }
            None => {
                let err = AppError::Unauthorized("未登录".to_string());
                self.notices.error("unauthorized");
                Err(err)
            }
        }
    }

    async fn fail(&self, context: &str, err: &AppError) {
        tracing::error!(error = %err, "{}", context);
        {
            let mut state = self.state.lock().await;
            state.loading = false;
            state.error = Some(err.to_string());
        }
        self.notices.error(context);
    }
}
