//! 网关连接配置
//!
//! 配置文件存放在系统应用数据目录；环境变量优先于文件。
//! api_key 是可公开的客户端密钥，不是机密，明文 JSON 即可。

use std::fs;
use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};

pub const DEFAULT_STORAGE_BUCKET: &str = "task-documents";

const ENV_GATEWAY_URL: &str = "TASKVAULT_GATEWAY_URL";
const ENV_GATEWAY_KEY: &str = "TASKVAULT_GATEWAY_KEY";
const ENV_STORAGE_BUCKET: &str = "TASKVAULT_STORAGE_BUCKET";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    pub base_url: String,
    pub api_key: String,
    #[serde(default = "default_bucket")]
    pub storage_bucket: String,
}

fn default_bucket() -> String {
    DEFAULT_STORAGE_BUCKET.to_string()
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            api_key: String::new(),
            storage_bucket: default_bucket(),
        }
    }
}

impl GatewayConfig {
    /// 加载配置：先读配置文件（不存在则用默认值），再用环境变量覆盖
    pub fn load() -> AppResult<Self> {
        let mut config = match Self::config_path() {
            Some(path) if path.exists() => Self::from_file(&path)?,
            _ => Self::default(),
        };

        if let Ok(url) = std::env::var(ENV_GATEWAY_URL) {
            config.base_url = url;
        }
        if let Ok(key) = std::env::var(ENV_GATEWAY_KEY) {
            config.api_key = key;
        }
        if let Ok(bucket) = std::env::var(ENV_STORAGE_BUCKET) {
            config.storage_bucket = bucket;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> AppResult<Self> {
        let raw = fs::read(path)?;
        serde_json::from_slice(&raw)
            .map_err(|e| AppError::Config(format!("配置文件解析失败: {}", e)))
    }

    pub fn validate(&self) -> AppResult<()> {
        if self.base_url.trim().is_empty() {
            return Err(AppError::Config(format!("{} 未配置", ENV_GATEWAY_URL)));
        }
        if self.api_key.trim().is_empty() {
            return Err(AppError::Config(format!("{} 未配置", ENV_GATEWAY_KEY)));
        }
        Ok(())
    }

    /// 保存到默认配置文件位置
    pub fn save(&self) -> AppResult<()> {
        let path = Self::config_path()
            .ok_or_else(|| AppError::Config("无法定位应用数据目录".to_string()))?;
        self.save_to(&path)
    }

    pub fn save_to(&self, path: &Path) -> AppResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_vec_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    fn config_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "taskvault").map(|dirs| dirs.config_dir().join("gateway.json"))
    }
}
