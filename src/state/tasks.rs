//! 任务集合状态管理
//!
//! 所有增删改查经由网关执行，成功后就地修补内存集合；
//! 失败时集合保持最后一次成功的内容。

use std::sync::Arc;

use chrono::Utc;
use futures_util::future::join_all;
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde_json::{json, Value};
use tokio::sync::Mutex;

use crate::error::{AppError, AppResult};
use crate::gateway::{Filter, Gateway, Page, Query};
use crate::session::SessionStore;
use crate::types::{Attachment, NewTask, Profile, TaskPatch, TaskRecord, UserRole};
use crate::utils::file::get_extension;
use crate::utils::notify::Notices;
use crate::utils::validation::validate_attachment_batch;

/// 任务查询的关联展开表达式：一次往返带回负责人档案与附件列表
const TASK_SELECT: &str =
    "*,assigned_user:profiles!tasks_assigned_to_fkey(id,email,role,created_at,updated_at),documents:task_documents(*)";

/// 任务列表状态快照
#[derive(Debug, Clone, Default)]
pub struct TasksState {
    pub tasks: Vec<TaskRecord>,
    pub total_count: u64,
    pub loading: bool,
    pub error: Option<String>,
    pub filters: super::TaskFilters,
}

pub struct TaskStore {
    gateway: Arc<dyn Gateway>,
    session: Arc<SessionStore>,
    notices: Notices,
    state: Mutex<TasksState>,
}

impl TaskStore {
    pub fn new(gateway: Arc<dyn Gateway>, session: Arc<SessionStore>, notices: Notices) -> Self {
        Self {
            gateway,
            session,
            notices,
            state: Mutex::new(TasksState::default()),
        }
    }

    pub async fn snapshot(&self) -> TasksState {
        self.state.lock().await.clone()
    }

    /// 按当前（或给定）筛选集拉取任务列表
    ///
    /// 非管理员只能看到自己创建或被指派的任务。
    pub async fn fetch(&self, filters: Option<super::TaskFilters>) -> AppResult<()> {
        let Some(user) = self.session.current_profile() else {
            tracing::debug!("fetch skipped: no active session");
            return Ok(());
        };

        let filters = {
            let mut state = self.state.lock().await;
            if let Some(filters) = filters {
                state.filters = filters;
            }
            state.loading = true;
            state.filters.clone()
        };

        let mut query = Query::new().select(TASK_SELECT).count_exact();
        if let Some(status) = filters.status {
            query = query.filter(Filter::eq("status", status.as_str()));
        }
        if let Some(priority) = filters.priority {
            query = query.filter(Filter::eq("priority", priority.as_str()));
        }
        if let Some(assigned_to) = &filters.assigned_to {
            query = query.filter(Filter::eq("assigned_to", assigned_to));
        }
        if let Some(search) = &filters.search {
            let pattern = format!("%{}%", search.trim());
            query = query.or_group(vec![
                Filter::ilike("title", pattern.clone()),
                Filter::ilike("description", pattern),
            ]);
        }
        if user.role != UserRole::Admin {
            query = query.or_group(vec![
                Filter::eq("created_by", &user.id),
                Filter::eq("assigned_to", &user.id),
            ]);
        }
        query = query.order(filters.sort_by.as_str(), filters.sort_order);
        let (from, to) = filters.range();
        query = query.range(from, to);

        match self.gateway.select("tasks", query).await {
            Ok(page) => match decode_page(page) {
                Ok((tasks, total)) => {
                    let mut state = self.state.lock().await;
                    state.tasks = tasks;
                    state.total_count = total;
                    state.loading = false;
                    state.error = None;
                    Ok(())
                }
                Err(err) => {
                    self.fail("failed to fetch tasks", &err).await;
                    Err(err)
                }
            },
            Err(err) => {
                self.fail("failed to fetch tasks", &err).await;
                Err(err)
            }
        }
    }

    /// 创建任务，附件可选
    ///
    /// 三段式顺序是硬约束：任务行 → 并行附件写入 → 带关联重取。
    /// 附件失败不回滚已创建的任务行。
    pub async fn create(
        &self,
        input: NewTask,
        attachments: Vec<Attachment>,
    ) -> AppResult<TaskRecord> {
        let Some(user) = self.session.current_profile() else {
            return Err(AppError::Unauthorized("未登录".to_string()));
        };
        // 附件策略在任何写入发生前校验
        validate_attachment_batch(&attachments)?;

        self.begin().await;
        match self.create_inner(&user, input, attachments).await {
            Ok(task) => {
                let mut state = self.state.lock().await;
                state.tasks.insert(0, task.clone());
                state.total_count += 1;
                state.loading = false;
                state.error = None;
                drop(state);

                tracing::debug!(task_id = %task.id, title = %task.title, "task created");
                self.notices.success("task created");
                Ok(task)
            }
            Err(err) => {
                self.fail("failed to create task", &err).await;
                Err(err)
            }
        }
    }

    /// 部分更新任务，附件语义与 create 相同
    ///
    /// 成功后按 id 原位替换集合里的条目，不重排不翻页。
    pub async fn update(
        &self,
        id: &str,
        patch: TaskPatch,
        attachments: Vec<Attachment>,
    ) -> AppResult<TaskRecord> {
        if self.session.current_profile().is_none() {
            return Err(AppError::Unauthorized("未登录".to_string()));
        }
        validate_attachment_batch(&attachments)?;

        self.begin().await;
        match self.update_inner(id, patch, attachments).await {
            Ok(task) => {
                let mut state = self.state.lock().await;
                if let Some(slot) = state.tasks.iter_mut().find(|t| t.id == task.id) {
                    *slot = task.clone();
                }
                state.loading = false;
                state.error = None;
                drop(state);

                tracing::debug!(task_id = %task.id, "task updated");
                self.notices.success("task updated");
                Ok(task)
            }
            Err(err) => {
                self.fail("failed to update task", &err).await;
                Err(err)
            }
        }
    }

    /// 删除任务及其全部附件
    ///
    /// 顺序：列出附件路径 → 删存储对象 → 删附件记录 → 删任务行。
    /// 中途失败不会留下指向已删存储的任务行；集合只在整链成功后修补。
    pub async fn delete(&self, id: &str) -> AppResult<()> {
        if self.session.current_profile().is_none() {
            return Err(AppError::Unauthorized("未登录".to_string()));
        }

        self.begin().await;
        match self.delete_inner(id).await {
            Ok(()) => {
                let mut state = self.state.lock().await;
                state.tasks.retain(|task| task.id != id);
                state.total_count = state.total_count.saturating_sub(1);
                state.loading = false;
                state.error = None;
                drop(state);

                tracing::debug!(task_id = %id, "task deleted");
                self.notices.success("task deleted");
                Ok(())
            }
            Err(err) => {
                self.fail("failed to delete task", &err).await;
                Err(err)
            }
        }
    }

    pub async fn set_filters(&self, patch: super::FilterPatch) {
        let mut state = self.state.lock().await;
        state.filters.apply(patch);
    }

    pub async fn clear_filters(&self) {
        let mut state = self.state.lock().await;
        state.filters = super::TaskFilters::default();
    }

    async fn create_inner(
        &self,
        user: &Profile,
        input: NewTask,
        attachments: Vec<Attachment>,
    ) -> AppResult<TaskRecord> {
        let mut row = serde_json::to_value(&input)?;
        row["created_by"] = json!(user.id);

        let created = self.gateway.insert("tasks", row).await?;
        let task: TaskRecord = serde_json::from_value(created)?;

        if attachments.is_empty() {
            return Ok(task);
        }
        self.upload_documents(&task.id, attachments).await?;
        // 插入响应不含附件关联，上传完成后带关联重取一次
        self.refetch_task(&task.id).await
    }

    async fn update_inner(
        &self,
        id: &str,
        patch: TaskPatch,
        attachments: Vec<Attachment>,
    ) -> AppResult<TaskRecord> {
        let mut body = serde_json::to_value(&patch)?;
        // updated_at 由客户端显式提供
        body["updated_at"] = json!(Utc::now().to_rfc3339());

        let rows = self
            .gateway
            .update("tasks", vec![Filter::eq("id", id)], body)
            .await?;
        let row = rows.into_iter().next().ok_or_else(|| AppError::NotFound {
            entity: "task",
            id: id.to_string(),
        })?;
        let task: TaskRecord = serde_json::from_value(row)?;

        if attachments.is_empty() {
            return Ok(task);
        }
        self.upload_documents(id, attachments).await?;
        self.refetch_task(id).await
    }

    async fn delete_inner(&self, id: &str) -> AppResult<()> {
        let paths = self.list_document_paths(id).await?;
        if !paths.is_empty() {
            self.gateway.remove(&paths).await?;
            self.gateway
                .delete("task_documents", vec![Filter::eq("task_id", id)])
                .await?;
        }
        self.gateway
            .delete("tasks", vec![Filter::eq("id", id)])
            .await?;
        Ok(())
    }

    /// 并行上传整批附件，每个成功的上传写一条附件记录
    async fn upload_documents(&self, task_id: &str, attachments: Vec<Attachment>) -> AppResult<()> {
        let uploads = attachments
            .into_iter()
            .map(|attachment| self.upload_one(task_id, attachment));
        let results = join_all(uploads).await;

        let failures: Vec<String> = results.into_iter().filter_map(Result::err).collect();
        if failures.is_empty() {
            Ok(())
        } else {
            Err(AppError::Attachment(format!(
                "上传失败: {}",
                failures.join(", ")
            )))
        }
    }

    async fn upload_one(&self, task_id: &str, attachment: Attachment) -> Result<(), String> {
        let Attachment {
            filename,
            content_type,
            bytes,
        } = attachment;
        let size = bytes.len() as i64;
        let path = document_path(task_id, &filename);

        let stored = self
            .gateway
            .upload(&path, bytes, &content_type)
            .await
            .map_err(|e| format!("{} ({})", filename, e))?;

        let row = json!({
            "task_id": task_id,
            "filename": filename,
            "file_path": stored,
            "file_size": size,
        });
        self.gateway
            .insert("task_documents", row)
            .await
            .map_err(|e| format!("{} ({})", filename, e))?;
        Ok(())
    }

    async fn refetch_task(&self, id: &str) -> AppResult<TaskRecord> {
        let page = self
            .gateway
            .select(
                "tasks",
                Query::new().select(TASK_SELECT).filter(Filter::eq("id", id)),
            )
            .await?;
        let row = page
            .rows
            .into_iter()
            .next()
            .ok_or_else(|| AppError::NotFound {
                entity: "task",
                id: id.to_string(),
            })?;
        Ok(serde_json::from_value(row)?)
    }

    async fn list_document_paths(&self, task_id: &str) -> AppResult<Vec<String>> {
        let query = Query::new()
            .select("file_path")
            .filter(Filter::eq("task_id", task_id));
        let page = self.gateway.select("task_documents", query).await?;
        Ok(page
            .rows
            .iter()
            .filter_map(|row| {
                row.get("file_path")
                    .and_then(Value::as_str)
                    .map(str::to_string)
            })
            .collect())
    }

    async fn begin(&self) {
        let mut state = self.state.lock().await;
        state.loading = true;
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

/// 存储路径：{task_id}/{毫秒时间戳}-{随机后缀}.{扩展名}，避免同名冲突
fn document_path(task_id: &str, filename: &str) -> String {
    let ext = get_extension(filename).unwrap_or_else(|| "pdf".to_string());
    let token: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(8)
        .map(char::from)
        .collect();
    format!(
        "{}/{}-{}.{}",
        task_id,
        Utc::now().timestamp_millis(),
        token,
        ext
    )
}

fn decode_page(page: Page) -> AppResult<(Vec<TaskRecord>, u64)> {
    let total = page.total.unwrap_or(page.rows.len() as u64);
    let tasks = page
        .rows
        .into_iter()
        .map(serde_json::from_value)
        .collect::<Result<Vec<TaskRecord>, _>>()?;
    Ok((tasks, total))
}
