//! 网关记录类型定义（从查询结果反序列化）

use serde::{Deserialize, Serialize};

use super::enums::*;

/// 用户档案记录
///
/// id 与认证身份共用同一个标识符。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub id: String,
    pub email: String,
    pub role: UserRole,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
}

/// 任务记录
///
/// `documents` 和 `assigned_user` 来自查询时的关联展开；
/// 插入/更新的响应不带它们，反序列化时落到默认值。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskRecord {
    pub id: String,
    pub title: String,
    pub description: String,
    pub status: TaskStatus,
    pub priority: TaskPriority,
    pub due_date: String,
    pub assigned_to: String,
    pub created_by: String,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
    #[serde(default)]
    pub documents: Vec<DocumentRecord>,
    #[serde(default)]
    pub assigned_user: Option<Profile>,
}

/// 任务附件记录
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub id: String,
    pub task_id: String,
    pub filename: String,
    pub file_path: String,
    pub file_size: i64,
    pub uploaded_at: Option<String>,
}
