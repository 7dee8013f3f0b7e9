//! 统一错误类型定义
//!
//! 使用 `thiserror` 简化错误类型定义，
//! 提供 `AppError` 枚举和 `AppResult` 类型别名。

use serde::Serialize;
use thiserror::Error;

/// 应用级统一错误类型
#[derive(Debug, Error)]
pub enum AppError {
    /// 网络/传输层错误
    #[error("请求失败: {0}")]
    Http(#[from] reqwest::Error),

    /// 网关拒绝（约束冲突、权限策略、服务端错误）
    #[error("网关错误 ({status}): {message}")]
    Gateway { status: u16, message: String },

    /// 响应体解码失败
    #[error("数据解码失败: {0}")]
    Decode(#[from] serde_json::Error),

    /// 文件操作错误
    #[error("文件操作错误: {0}")]
    Io(#[from] std::io::Error),

    /// 验证错误（输入参数不合法）
    #[error("验证失败: {0}")]
    Validation(String),

    /// 权限不足（本地 UX 拦截，真正的约束在网关侧策略里）
    #[error("权限不足: {0}")]
    Unauthorized(String),

    /// 附件策略违规（类型或数量）
    #[error("附件不合法: {0}")]
    Attachment(String),

    /// 记录未找到
    #[error("记录不存在: {entity} (id={id})")]
    NotFound { entity: &'static str, id: String },

    /// 配置错误
    #[error("配置错误: {0}")]
    Config(String),

    /// 业务逻辑错误
    #[error("{0}")]
    Business(String),
}

// ========== From 实现：String 和 &str ==========

impl From<String> for AppError {
    fn from(s: String) -> Self {
        AppError::Business(s)
    }
}

impl From<&str> for AppError {
    fn from(s: &str) -> Self {
        AppError::Business(s.to_string())
    }
}

// ========== Serialize 实现：视图层需要序列化错误 ==========

impl Serialize for AppError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeStruct;

        let mut state = serializer.serialize_struct("AppError", 2)?;

        // 根据枚举变体写入 "type" 字段
        let error_type = match self {
            AppError::Http(_) => "http",
            AppError::Gateway { .. } => "gateway",
            AppError::Decode(_) => "decode",
            AppError::Io(_) => "io",
            AppError::Validation(_) => "validation",
            AppError::Unauthorized(_) => "unauthorized",
            AppError::Attachment(_) => "attachment",
            AppError::NotFound { .. } => "not_found",
            AppError::Config(_) => "config",
            AppError::Business(_) => "business",
        };
        state.serialize_field("type", error_type)?;
        state.serialize_field("message", &self.to_string())?;

        state.end()
    }
}

/// 应用级 Result 类型别名
pub type AppResult<T> = Result<T, AppError>;

// ========== 扩展 trait：为 Result 添加上下文方法 ==========

/// 为 Result 类型添加错误上下文转换方法
pub trait ResultExt<T> {
    /// 将错误转换为验证错误
    fn validation_err(self, msg: &str) -> AppResult<T>;

    /// 将错误转换为配置错误
    fn config_err(self, msg: &str) -> AppResult<T>;

    /// 将错误转换为网关错误（状态码未知时记 0）
    fn gateway_err(self, msg: &str) -> AppResult<T>;
}

impl<T, E: std::fmt::Display> ResultExt<T> for Result<T, E> {
    fn validation_err(self, msg: &str) -> AppResult<T> {
        self.map_err(|e| AppError::Validation(format!("{}: {}", msg, e)))
    }

    fn config_err(self, msg: &str) -> AppResult<T> {
        self.map_err(|e| AppError::Config(format!("{}: {}", msg, e)))
    }

    fn gateway_err(self, msg: &str) -> AppResult<T> {
        self.map_err(|e| AppError::Gateway {
            status: 0,
            message: format!("{}: {}", msg, e),
        })
    }
}
