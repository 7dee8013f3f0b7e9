//! 任务列表筛选状态（仅客户端，不持久化）

use serde::{Deserialize, Serialize};

use crate::types::{SortDirection, SortKey, TaskPriority, TaskStatus};

pub const DEFAULT_PAGE_SIZE: u32 = 10;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskFilters {
    pub status: Option<TaskStatus>,
    pub priority: Option<TaskPriority>,
    pub assigned_to: Option<String>,
    pub search: Option<String>,
    pub sort_by: SortKey,
    pub sort_order: SortDirection,
    pub page: u32,
    pub limit: u32,
}

impl Default for TaskFilters {
    fn default() -> Self {
        Self {
            status: None,
            priority: None,
            assigned_to: None,
            search: None,
            sort_by: SortKey::CreatedAt,
            sort_order: SortDirection::Desc,
            page: 1,
            limit: DEFAULT_PAGE_SIZE,
        }
    }
}

impl TaskFilters {
    /// 合并部分更新
    ///
    /// 页码规则：补丁带 page 则用它，否则重置到第一页。
    /// 于是“仅翻页”保留其余字段，而任何筛选变更都回到第一页。
    pub fn apply(&mut self, patch: FilterPatch) {
        if let Some(status) = patch.status {
            self.status = status;
        }
        if let Some(priority) = patch.priority {
            self.priority = priority;
        }
        if let Some(assigned_to) = patch.assigned_to {
            self.assigned_to = assigned_to;
        }
        if let Some(search) = patch.search {
            self.search = search;
        }
        if let Some(sort_by) = patch.sort_by {
            self.sort_by = sort_by;
        }
        if let Some(sort_order) = patch.sort_order {
            self.sort_order = sort_order;
        }
        self.page = patch.page.unwrap_or(1).max(1);
    }

    /// 当前页对应的闭区间行范围（zero-based）
    pub fn range(&self) -> (u64, u64) {
        let from = u64::from(self.page.saturating_sub(1)) * u64::from(self.limit);
        let to = from + u64::from(self.limit) - 1;
        (from, to)
    }
}

/// 筛选状态的部分更新
///
/// 外层 None = 字段保持不变；可选筛选字段的内层 None = 清除该筛选。
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FilterPatch {
    pub status: Option<Option<TaskStatus>>,
    pub priority: Option<Option<TaskPriority>>,
    pub assigned_to: Option<Option<String>>,
    pub search: Option<Option<String>>,
    pub sort_by: Option<SortKey>,
    pub sort_order: Option<SortDirection>,
    pub page: Option<u32>,
}

impl FilterPatch {
    pub fn status(mut self, status: Option<TaskStatus>) -> Self {
        self.status = Some(status);
        self
    }

    pub fn priority(mut self, priority: Option<TaskPriority>) -> Self {
        self.priority = Some(priority);
        self
    }

    pub fn assigned_to(mut self, assigned_to: Option<String>) -> Self {
        self.assigned_to = Some(assigned_to);
        self
    }

    pub fn search(mut self, search: Option<String>) -> Self {
        self.search = Some(search);
        self
    }

    pub fn sort(mut self, sort_by: SortKey, sort_order: SortDirection) -> Self {
        self.sort_by = Some(sort_by);
        self.sort_order = Some(sort_order);
        self
    }

    pub fn page(mut self, page: u32) -> Self {
        self.page = Some(page);
        self
    }
}
