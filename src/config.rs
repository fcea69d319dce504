//! 应用配置模块
//!
//! 配置来自配置目录下的 `config.json`（`bot` 段），环境变量优先。

use crate::core::MediaFormats;
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

const APP_DIR_NAME: &str = "mediabackup";

pub const ENV_CONFIG_DIR: &str = "BOT_CONFIG_DIR";
pub const ENV_BOT_TOKEN: &str = "TELEGRAM_BOT_TOKEN";
pub const ENV_GROUP_CHAT_ID: &str = "TELEGRAM_GROUP_CHAT_ID";
pub const ENV_ADMIN_CHAT_ID: &str = "TELEGRAM_ADMIN_CHAT_ID";
pub const ENV_DOWNLOADS_DIR: &str = "DOWNLOADS_DIR";
pub const ENV_FAILED_DIR: &str = "FAILED_TRANSFER_DIR";

/// 机器人配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BotConfig {
    #[serde(default)]
    pub telegram_bot_token: String,
    /// 接收备份文件的群组
    #[serde(default)]
    pub group_chat_id: Option<i64>,
    /// 接收 /start 通知的管理员会话
    #[serde(default)]
    pub admin_chat_id: Option<i64>,
    #[serde(default = "default_downloads_dir")]
    pub downloads_dir: PathBuf,
    #[serde(default = "default_failed_dir")]
    pub failed_transfer_dir: PathBuf,
    #[serde(default)]
    pub formats: MediaFormats,
    /// 长轮询超时（秒）
    #[serde(default = "default_poll_timeout")]
    pub poll_timeout_secs: u64,
    #[serde(default = "default_api_base")]
    pub api_base_url: String,
}

fn default_downloads_dir() -> PathBuf {
    PathBuf::from("downloads")
}

fn default_failed_dir() -> PathBuf {
    PathBuf::from("failed_transfers")
}

fn default_poll_timeout() -> u64 {
    30
}

fn default_api_base() -> String {
    crate::transport::telegram::DEFAULT_API_BASE.to_string()
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            telegram_bot_token: String::new(),
            group_chat_id: None,
            admin_chat_id: None,
            downloads_dir: default_downloads_dir(),
            failed_transfer_dir: default_failed_dir(),
            formats: MediaFormats::default(),
            poll_timeout_secs: default_poll_timeout(),
            api_base_url: default_api_base(),
        }
    }
}

impl BotConfig {
    /// 从配置文件加载，再应用环境变量
    pub fn load(config_dir: &Path) -> Result<Self> {
        let mut config = Self::load_file(config_dir)?;
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// 读取 `config.json` 中的 `bot` 段；文件不存在时使用默认值
    fn load_file(config_dir: &Path) -> Result<Self> {
        let config_file = config_dir.join("config.json");
        if !config_file.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&config_file)
            .with_context(|| format!("读取配置文件失败: {}", config_file.display()))?;
        let value: serde_json::Value = serde_json::from_str(&content)
            .with_context(|| format!("配置文件格式错误: {}", config_file.display()))?;

        match value.get("bot") {
            Some(bot) => serde_json::from_value(bot.clone()).context("bot 配置无效"),
            None => Ok(Self::default()),
        }
    }

    fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(token) = var(ENV_BOT_TOKEN) {
            self.telegram_bot_token = token;
        }
        if let Some(id) = var(ENV_GROUP_CHAT_ID) {
            self.group_chat_id = Some(parse_chat_id(ENV_GROUP_CHAT_ID, &id)?);
        }
        if let Some(id) = var(ENV_ADMIN_CHAT_ID) {
            self.admin_chat_id = Some(parse_chat_id(ENV_ADMIN_CHAT_ID, &id)?);
        }
        if let Some(dir) = var(ENV_DOWNLOADS_DIR) {
            self.downloads_dir = PathBuf::from(dir);
        }
        if let Some(dir) = var(ENV_FAILED_DIR) {
            self.failed_transfer_dir = PathBuf::from(dir);
        }
        Ok(())
    }

    /// 校验必填项
    pub fn validate(&self) -> Result<()> {
        if self.telegram_bot_token.trim().is_empty() {
            return Err(anyhow!("缺少 bot token（{}）", ENV_BOT_TOKEN));
        }
        if self.group_chat_id.is_none() {
            return Err(anyhow!("缺少群组 ID（{}）", ENV_GROUP_CHAT_ID));
        }
        if self.downloads_dir == self.failed_transfer_dir {
            return Err(anyhow!("下载目录与失败目录不能相同"));
        }
        Ok(())
    }

    /// 创建下载目录和失败目录
    pub fn setup_directories(&self) -> Result<()> {
        for dir in [&self.downloads_dir, &self.failed_transfer_dir] {
            fs::create_dir_all(dir)
                .with_context(|| format!("创建目录失败: {}", dir.display()))?;
        }
        Ok(())
    }
}

fn parse_chat_id(key: &str, value: &str) -> Result<i64> {
    value
        .trim()
        .parse()
        .with_context(|| format!("{} 不是有效的 chat id: {}", key, value))
}

/// 获取配置目录：优先 `BOT_CONFIG_DIR`，否则使用系统配置目录
pub fn config_dir() -> PathBuf {
    match std::env::var(ENV_CONFIG_DIR) {
        Ok(dir) if !dir.trim().is_empty() => PathBuf::from(dir),
        _ => default_config_dir(),
    }
}

fn default_config_dir() -> PathBuf {
    dirs::config_dir()
        .map(|p| p.join(APP_DIR_NAME))
        .unwrap_or_else(|| PathBuf::from(format!(".{}", APP_DIR_NAME)))
}
