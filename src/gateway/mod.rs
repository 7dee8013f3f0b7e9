//! Remote data gateway: the hosted platform's table, storage and identity
//! surfaces, behind object-safe traits so the state managers can run against
//! the HTTP implementation or a test double.

#[cfg(test)]
pub(crate) mod memory;
mod query;
mod rest;

pub use query::{Filter, Order, Query, RangeSpec};
pub use rest::RestGateway;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::broadcast;

use crate::error::AppResult;

/// 一次查询的返回：行 + 命中总数（请求了 count 才有）
#[derive(Debug, Clone)]
pub struct Page {
    pub rows: Vec<Value>,
    pub total: Option<u64>,
}

/// 认证身份（网关侧）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: String,
    pub email: Option<String>,
}

/// 已建立的会话凭据
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthSession {
    pub access_token: String,
    pub user: AuthUser,
}

/// 登录/登出事件，异步派发给订阅者
#[derive(Debug, Clone)]
pub enum AuthEvent {
    SignedIn(AuthSession),
    SignedOut,
}

/// 表查询/变更表面
#[async_trait]
pub trait DataGateway: Send + Sync {
    async fn select(&self, table: &str, query: Query) -> AppResult<Page>;

    /// 插入一行，返回包含网关分配的 id 与时间戳的完整行
    async fn insert(&self, table: &str, row: Value) -> AppResult<Value>;

    /// 部分更新所有匹配行，返回更新后的行
    async fn update(&self, table: &str, filters: Vec<Filter>, patch: Value)
        -> AppResult<Vec<Value>>;

    async fn delete(&self, table: &str, filters: Vec<Filter>) -> AppResult<()>;
}

/// 对象存储表面；路径由调用方决定，对网关不透明
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    async fn upload(&self, path: &str, bytes: Vec<u8>, content_type: &str) -> AppResult<String>;

    async fn download(&self, path: &str) -> AppResult<Vec<u8>>;

    async fn remove(&self, paths: &[String]) -> AppResult<()>;
}

/// 身份表面
#[async_trait]
pub trait AuthGateway: Send + Sync {
    async fn current_session(&self) -> AppResult<Option<AuthSession>>;

    async fn sign_up(&self, email: &str, password: &str) -> AppResult<AuthSession>;

    async fn sign_in(&self, email: &str, password: &str) -> AppResult<AuthSession>;

    async fn sign_out(&self) -> AppResult<()>;

    fn subscribe(&self) -> broadcast::Receiver<AuthEvent>;
}

/// 三个表面的组合；生产实现与测试替身都实现它
pub trait Gateway: DataGateway + ObjectStorage + AuthGateway {}

impl<T: DataGateway + ObjectStorage + AuthGateway> Gateway for T {}
