//! Query builder for the gateway's table surface.
//!
//! Mirrors the predicate surface the platform exposes: equality, case-
//! insensitive pattern match, OR groups, ordering, an inclusive zero-based
//! row range, and relationship embeds via the select expression.

use crate::types::SortDirection;

/// 单个列谓词
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Filter {
    /// column = value
    Eq(String, String),
    /// column ILIKE pattern（pattern 自带 % 通配符）
    Ilike(String, String),
}

impl Filter {
    pub fn eq(column: impl Into<String>, value: impl ToString) -> Self {
        Filter::Eq(column.into(), value.to_string())
    }

    pub fn ilike(column: impl Into<String>, pattern: impl Into<String>) -> Self {
        Filter::Ilike(column.into(), pattern.into())
    }

    /// or=(...) 分组里的谓词写法
    fn encode(&self) -> String {
        match self {
            Filter::Eq(column, value) => format!("{}.eq.{}", column, value),
            Filter::Ilike(column, pattern) => format!("{}.ilike.{}", column, pattern),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    pub column: String,
    pub direction: SortDirection,
}

/// 闭区间行范围，zero-based，两端含
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RangeSpec {
    pub from: u64,
    pub to: u64,
}

#[derive(Debug, Clone, Default)]
pub struct Query {
    /// 逐个 AND
    pub filters: Vec<Filter>,
    /// 每组内部 OR，组与组之间以及与 filters 之间 AND
    pub or_groups: Vec<Vec<Filter>>,
    pub order: Option<Order>,
    pub range: Option<RangeSpec>,
    /// 投影/关联展开表达式；None 等价于 "*"
    pub select: Option<String>,
    /// 是否要求返回命中总数
    pub count: bool,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn or_group(mut self, group: Vec<Filter>) -> Self {
        self.or_groups.push(group);
        self
    }

    pub fn order(mut self, column: impl Into<String>, direction: SortDirection) -> Self {
        self.order = Some(Order {
            column: column.into(),
            direction,
        });
        self
    }

    pub fn range(mut self, from: u64, to: u64) -> Self {
        self.range = Some(RangeSpec { from, to });
        self
    }

    pub fn select(mut self, expr: impl Into<String>) -> Self {
        self.select = Some(expr.into());
        self
    }

    pub fn count_exact(mut self) -> Self {
        self.count = true;
        self
    }

    /// 编码为 REST 查询参数（行范围走 Range 头，不在这里）
    pub fn to_params(&self) -> Vec<(String, String)> {
        let mut params = vec![(
            "select".to_string(),
            self.select.clone().unwrap_or_else(|| "*".to_string()),
        )];
        params.extend(filter_params(&self.filters));
        for group in &self.or_groups {
            let encoded = group
                .iter()
                .map(Filter::encode)
                .collect::<Vec<_>>()
                .join(",");
            params.push(("or".to_string(), format!("({})", encoded)));
        }
        if let Some(order) = &self.order {
            params.push((
                "order".to_string(),
                format!("{}.{}", order.column, order.direction.as_str()),
            ));
        }
        params
    }
}

/// 谓词列表编码为查询参数（变更接口的行定位也用它）
pub(crate) fn filter_params(filters: &[Filter]) -> Vec<(String, String)> {
    filters
        .iter()
        .map(|filter| match filter {
            Filter::Eq(column, value) => (column.clone(), format!("eq.{}", value)),
            Filter::Ilike(column, pattern) => (column.clone(), format!("ilike.{}", pattern)),
        })
        .collect()
}
