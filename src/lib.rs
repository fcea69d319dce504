use anyhow::Result;
use std::sync::Arc;

pub mod bot;
pub mod config;
pub mod core;
pub mod logging;
pub mod transport;

pub use bot::Bot;
pub use config::BotConfig;
pub use crate::core::{BackupReport, BackupRunner, FileEntry, MediaScanner, RetryReport, TransferRouter};
pub use transport::{ChatApi, TelegramClient, Transport};

/// 根据配置组装机器人：同一个 Telegram 客户端既发送文件也处理命令
pub fn build_bot(config: BotConfig) -> Result<Bot> {
    config.validate()?;
    config.setup_directories()?;

    let group_chat_id = config
        .group_chat_id
        .ok_or_else(|| anyhow::anyhow!("group chat id is required"))?;

    let client = Arc::new(TelegramClient::with_base_url(
        &config.api_base_url,
        &config.telegram_bot_token,
    )?);
    tracing::info!("初始化传输: {}", client.name());

    let router = TransferRouter::new(client.clone(), group_chat_id, &config.failed_transfer_dir);
    let runner = BackupRunner::new(MediaScanner::new(config.formats.clone()), router);

    Ok(Bot::new(client, runner, config))
}
