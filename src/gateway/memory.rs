//! In-memory gateway used by the state-manager tests.
//!
//! Implements the three gateway traits over hash-map tables, records every
//! call so tests can assert ordering, and supports injected failures.

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::{broadcast, Mutex};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::types::{SortDirection, UserRole};

use super::{
    AuthEvent, AuthGateway, AuthSession, AuthUser, DataGateway, Filter, ObjectStorage, Page, Query,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayCall {
    Select { table: String },
    Insert { table: String },
    Update { table: String },
    Delete { table: String },
    Upload { path: String },
    Download { path: String },
    Remove { paths: Vec<String> },
}

#[derive(Default)]
struct Inner {
    tables: HashMap<String, Vec<Value>>,
    objects: HashMap<String, Vec<u8>>,
    calls: Vec<GatewayCall>,
    /// (op, message)：下一次匹配 op 的调用直接失败
    fail_next: Option<(String, String)>,
    seq: u64,
}

pub struct MemoryGateway {
    inner: Mutex<Inner>,
    session: Mutex<Option<AuthSession>>,
    auth_events: broadcast::Sender<AuthEvent>,
}

impl MemoryGateway {
    pub fn new() -> Self {
        let (auth_events, _) = broadcast::channel(16);
        Self {
            inner: Mutex::new(Inner::default()),
            session: Mutex::new(None),
            auth_events,
        }
    }

    pub async fn calls(&self) -> Vec<GatewayCall> {
        self.inner.lock().await.calls.clone()
    }

    pub async fn table_rows(&self, table: &str) -> Vec<Value> {
        self.inner
            .lock()
            .await
            .tables
            .get(table)
            .cloned()
            .unwrap_or_default()
    }

    pub async fn object_paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = self.inner.lock().await.objects.keys().cloned().collect();
        paths.sort();
        paths
    }

    pub async fn fail_next(&self, op: &str, message: &str) {
        self.inner.lock().await.fail_next = Some((op.to_string(), message.to_string()));
    }

    pub async fn seed_row(&self, table: &str, mut row: Value) {
        let mut inner = self.inner.lock().await;
        let ts = stamp(&mut inner);
        if let Some(object) = row.as_object_mut() {
            object
                .entry("created_at")
                .or_insert_with(|| json!(ts.clone()));
            object
                .entry("updated_at")
                .or_insert_with(|| json!(ts.clone()));
        }
        inner.tables.entry(table.to_string()).or_default().push(row);
    }

    pub async fn seed_profile(&self, id: &str, email: &str, role: UserRole) {
        self.seed_row(
            "profiles",
            json!({ "id": id, "email": email, "role": role.as_str() }),
        )
        .await;
    }

    pub async fn seed_task(&self, id: &str, title: &str, created_by: &str, assigned_to: &str) {
        self.seed_row(
            "tasks",
            json!({
                "id": id,
                "title": title,
                "description": format!("description of {title}"),
                "status": "todo",
                "priority": "medium",
                "due_date": "2026-09-01T00:00:00Z",
                "assigned_to": assigned_to,
                "created_by": created_by,
            }),
        )
        .await;
    }
}

#[async_trait]
impl DataGateway for MemoryGateway {
    async fn select(&self, table: &str, query: Query) -> AppResult<Page> {
        let mut inner = self.inner.lock().await;
        inner.calls.push(GatewayCall::Select {
            table: table.to_string(),
        });
        if let Some(err) = take_failure(&mut inner, "select") {
            return Err(err);
        }

        let rows = inner.tables.get(table).cloned().unwrap_or_default();
        let mut matched: Vec<Value> = rows
            .into_iter()
            .filter(|row| row_matches(row, &query))
            .collect();

        if let Some(order) = &query.order {
            matched.sort_by(|a, b| {
                let ordering = field_str(a, &order.column).cmp(&field_str(b, &order.column));
                match order.direction {
                    SortDirection::Asc => ordering,
                    SortDirection::Desc => ordering.reverse(),
                }
            });
        }

        let total = query.count.then_some(matched.len() as u64);

        if let Some(range) = query.range {
            let from = (range.from as usize).min(matched.len());
            let to = ((range.to + 1) as usize).min(matched.len());
            matched = matched.get(from..to).map(<[Value]>::to_vec).unwrap_or_default();
        }

        if table == "tasks" {
            if let Some(select) = &query.select {
                for row in &mut matched {
                    expand_task(&inner.tables, row, select);
                }
            }
        }

        Ok(Page {
            rows: matched,
            total,
        })
    }

    async fn insert(&self, table: &str, mut row: Value) -> AppResult<Value> {
        let mut inner = self.inner.lock().await;
        inner.calls.push(GatewayCall::Insert {
            table: table.to_string(),
        });
        if let Some(err) = take_failure(&mut inner, "insert") {
            return Err(err);
        }

        let ts = stamp(&mut inner);
        let object = row
            .as_object_mut()
            .ok_or_else(|| AppError::Business("insert body must be an object".to_string()))?;
        object
            .entry("id")
            .or_insert_with(|| json!(Uuid::new_v4().to_string()));
        object
            .entry("created_at")
            .or_insert_with(|| json!(ts.clone()));
        object
            .entry("updated_at")
            .or_insert_with(|| json!(ts.clone()));
        if table == "task_documents" {
            object.entry("uploaded_at").or_insert_with(|| json!(ts));
        }

        inner
            .tables
            .entry(table.to_string())
            .or_default()
            .push(row.clone());
        Ok(row)
    }

    async fn update(
        &self,
        table: &str,
        filters: Vec<Filter>,
        patch: Value,
    ) -> AppResult<Vec<Value>> {
        let mut inner = self.inner.lock().await;
        inner.calls.push(GatewayCall::Update {
            table: table.to_string(),
        });
        if let Some(err) = take_failure(&mut inner, "update") {
            return Err(err);
        }

        let patch = patch
            .as_object()
            .ok_or_else(|| AppError::Business("update body must be an object".to_string()))?
            .clone();

        let mut updated = Vec::new();
        if let Some(rows) = inner.tables.get_mut(table) {
            for row in rows.iter_mut() {
                if filters.iter().all(|filter| filter_matches(row, filter)) {
                    if let Some(object) = row.as_object_mut() {
                        for (key, value) in &patch {
                            object.insert(key.clone(), value.clone());
                        }
                    }
                    updated.push(row.clone());
                }
            }
        }
        Ok(updated)
    }

    async fn delete(&self, table: &str, filters: Vec<Filter>) -> AppResult<()> {
        let mut inner = self.inner.lock().await;
        inner.calls.push(GatewayCall::Delete {
            table: table.to_string(),
        });
        if let Some(err) = take_failure(&mut inner, "delete") {
            return Err(err);
        }

        if let Some(rows) = inner.tables.get_mut(table) {
            rows.retain(|row| !filters.iter().all(|filter| filter_matches(row, filter)));
        }
        Ok(())
    }
}

#[async_trait]
impl ObjectStorage for MemoryGateway {
    async fn upload(&self, path: &str, bytes: Vec<u8>, _content_type: &str) -> AppResult<String> {
        let mut inner = self.inner.lock().await;
        inner.calls.push(GatewayCall::Upload {
            path: path.to_string(),
        });
        if let Some(err) = take_failure(&mut inner, "upload") {
            return Err(err);
        }
        inner.objects.insert(path.to_string(), bytes);
        Ok(path.to_string())
    }

    async fn download(&self, path: &str) -> AppResult<Vec<u8>> {
        let mut inner = self.inner.lock().await;
        inner.calls.push(GatewayCall::Download {
            path: path.to_string(),
        });
        inner
            .objects
            .get(path)
            .cloned()
            .ok_or_else(|| AppError::NotFound {
                entity: "object",
                id: path.to_string(),
            })
    }

    async fn remove(&self, paths: &[String]) -> AppResult<()> {
        let mut inner = self.inner.lock().await;
        inner.calls.push(GatewayCall::Remove {
            paths: paths.to_vec(),
        });
        if let Some(err) = take_failure(&mut inner, "remove") {
            return Err(err);
        }
        for path in paths {
            inner.objects.remove(path);
        }
        Ok(())
    }
}

#[async_trait]
impl AuthGateway for MemoryGateway {
    async fn current_session(&self) -> AppResult<Option<AuthSession>> {
        Ok(self.session.lock().await.clone())
    }

    async fn sign_up(&self, email: &str, _password: &str) -> AppResult<AuthSession> {
        let session = AuthSession {
            access_token: Uuid::new_v4().to_string(),
            user: AuthUser {
                id: Uuid::new_v4().to_string(),
                email: Some(email.to_string()),
            },
        };
        *self.session.lock().await = Some(session.clone());
        let _ = self.auth_events.send(AuthEvent::SignedIn(session.clone()));
        Ok(session)
    }

    async fn sign_in(&self, email: &str, _password: &str) -> AppResult<AuthSession> {
        // 以 email 在档案表中定位身份
        let profile = {
            let inner = self.inner.lock().await;
            inner.tables.get("profiles").and_then(|rows| {
                rows.iter()
                    .find(|row| row.get("email").and_then(Value::as_str) == Some(email))
                    .cloned()
            })
        };
        let profile = profile.ok_or(AppError::Gateway {
            status: 400,
            message: "invalid login credentials".to_string(),
        })?;

        let session = AuthSession {
            access_token: Uuid::new_v4().to_string(),
            user: AuthUser {
                id: profile
                    .get("id")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
                email: Some(email.to_string()),
            },
        };
        *self.session.lock().await = Some(session.clone());
        let _ = self.auth_events.send(AuthEvent::SignedIn(session.clone()));
        Ok(session)
    }

    async fn sign_out(&self) -> AppResult<()> {
        *self.session.lock().await = None;
        let _ = self.auth_events.send(AuthEvent::SignedOut);
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.auth_events.subscribe()
    }
}

/// 单调递增的假时间戳，保证字典序与插入序一致
fn stamp(inner: &mut Inner) -> String {
    inner.seq += 1;
    format!("2026-01-01T00:00:00.{:06}Z", inner.seq)
}

fn take_failure(inner: &mut Inner, op: &str) -> Option<AppError> {
    match &inner.fail_next {
        Some((target, message)) if target == op => {
            let message = message.clone();
            inner.fail_next = None;
            Some(AppError::Gateway {
                status: 500,
                message,
            })
        }
        _ => None,
    }
}

fn row_matches(row: &Value, query: &Query) -> bool {
    query
        .filters
        .iter()
        .all(|filter| filter_matches(row, filter))
        && query
            .or_groups
            .iter()
            .all(|group| group.iter().any(|filter| filter_matches(row, filter)))
}

fn filter_matches(row: &Value, filter: &Filter) -> bool {
    match filter {
        Filter::Eq(column, value) => field_str(row, column).as_deref() == Some(value.as_str()),
        Filter::Ilike(column, pattern) => {
            let needle = pattern.trim_matches('%').to_lowercase();
            field_str(row, column)
                .map(|field| field.to_lowercase().contains(&needle))
                .unwrap_or(false)
        }
    }
}

fn field_str(row: &Value, column: &str) -> Option<String> {
    match row.get(column)? {
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// 关联展开：任务行附带 documents 和 assigned_user
fn expand_task(tables: &HashMap<String, Vec<Value>>, row: &mut Value, select: &str) {
    let task_id = row
        .get("id")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    if select.contains("documents") {
        let documents: Vec<Value> = tables
            .get("task_documents")
            .map(|docs| {
                docs.iter()
                    .filter(|doc| {
                        doc.get("task_id").and_then(Value::as_str) == Some(task_id.as_str())
                    })
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        row["documents"] = Value::Array(documents);
    }

    if select.contains("assigned_user") {
        let assignee = row
            .get("assigned_to")
            .and_then(Value::as_str)
            .map(str::to_string);
        let profile = assignee.and_then(|id| {
            tables.get("profiles").and_then(|profiles| {
                profiles
                    .iter()
                    .find(|profile| profile.get("id").and_then(Value::as_str) == Some(id.as_str()))
                    .cloned()
            })
        });
        row["assigned_user"] = profile.unwrap_or(Value::Null);
    }
}
