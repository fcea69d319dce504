//! 日志模块 - 控制台输出加按天滚动的日志文件

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{Builder, Rotation};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogConfig {
    /// 是否启用日志记录
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// 日志级别: "off", "error", "warn", "info", "debug", "trace"
    #[serde(default = "default_level")]
    pub level: String,
    /// 保留的日志文件数（按天）
    #[serde(default = "default_keep_days")]
    pub keep_days: usize,
}

fn default_enabled() -> bool {
    true
}

fn default_level() -> String {
    "info".to_string()
}

fn default_keep_days() -> usize {
    7
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            level: default_level(),
            keep_days: default_keep_days(),
        }
    }
}

impl LogConfig {
    /// 从配置文件加载日志配置，读取失败时使用默认值
    pub fn load(config_dir: &Path) -> Self {
        fs::read_to_string(config_dir.join("config.json"))
            .ok()
            .and_then(|content| serde_json::from_str::<serde_json::Value>(&content).ok())
            .and_then(|config| config.get("log").cloned())
            .and_then(|log| serde_json::from_value::<LogConfig>(log).ok())
            .unwrap_or_default()
    }

    /// 配置的默认级别，无法识别时为 info
    pub fn level_filter(&self) -> LevelFilter {
        self.level.trim().parse().unwrap_or(LevelFilter::INFO)
    }
}

/// 日志目录
pub fn get_log_dir(config_dir: &Path) -> PathBuf {
    config_dir.join("logs")
}

fn build_filter(config: &LogConfig) -> EnvFilter {
    // RUST_LOG 中的指令优先于配置的默认级别
    let mut filter = EnvFilter::builder()
        .with_default_directive(config.level_filter().into())
        .from_env_lossy();
    for directive in ["hyper=warn", "reqwest=warn"] {
        if let Ok(d) = directive.parse() {
            filter = filter.add_directive(d);
        }
    }
    filter
}

/// 初始化日志系统
///
/// 返回的 guard 需要在 main 中一直持有，否则文件日志会丢失。
pub fn init_logging(config: &LogConfig, log_dir: &Path) -> Option<WorkerGuard> {
    if !config.enabled {
        // 日志已禁用，只初始化一个空的 subscriber
        let _ = tracing::subscriber::set_global_default(tracing_subscriber::registry());
        return None;
    }

    let console_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_thread_ids(false)
        .with_thread_names(false);

    let appender = fs::create_dir_all(log_dir).ok().and_then(|_| {
        Builder::new()
            .rotation(Rotation::DAILY)
            .filename_prefix("bot")
            .filename_suffix("log")
            .max_log_files(config.keep_days.max(1))
            .build(log_dir)
            .ok()
    });

    match appender {
        Some(appender) => {
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let file_layer = tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(false);

            let _ = tracing_subscriber::registry()
                .with(build_filter(config))
                .with(console_layer)
                .with(file_layer)
                .try_init();
            Some(guard)
        }
        None => {
            // 文件日志创建失败，回退到控制台
            let _ = tracing_subscriber::registry()
                .with(build_filter(config))
                .with(console_layer)
                .try_init();
            tracing::warn!("无法创建日志目录 {}，仅输出到控制台", log_dir.display());
            None
        }
    }
}
