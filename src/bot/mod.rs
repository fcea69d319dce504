//! 命令前端：长轮询获取更新并逐条处理
//!
//! 更新按到达顺序依次处理，同一时间最多只有一个备份或重试在运行。

pub mod commands;

pub use commands::Command;

use crate::config::BotConfig;
use crate::core::{BackupRunner, PassProgress};
use crate::transport::{ChatApi, Message, Update};
use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// 轮询失败后的等待时间
const POLL_RETRY_DELAY: Duration = Duration::from_secs(5);
/// 每处理多少个文件更新一次进度消息
const PROGRESS_EDIT_EVERY: usize = 10;

const WELCOME_TEXT: &str = "Welcome! I'm a backup bot that can help you transfer media files \
to the group chat. Use /backup to start the process!";

pub struct Bot {
    api: Arc<dyn ChatApi>,
    runner: BackupRunner,
    config: BotConfig,
}

impl Bot {
    pub fn new(api: Arc<dyn ChatApi>, runner: BackupRunner, config: BotConfig) -> Self {
        Self {
            api,
            runner,
            config,
        }
    }

    /// 运行直到收到 Ctrl+C
    pub async fn run_polling(&self) -> Result<()> {
        info!("开始轮询更新");
        let mut offset: Option<i64> = None;

        loop {
            let updates = tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    info!("收到退出信号，停止轮询");
                    return Ok(());
                }
                result = self.api.get_updates(offset, self.config.poll_timeout_secs) => result,
            };

            match updates {
                Ok(updates) => {
                    for update in updates {
                        offset = Some(update.update_id + 1);
                        self.handle_update(&update).await;
                    }
                }
                Err(e) => {
                    error!("获取更新失败: {}", e);
                    tokio::time::sleep(POLL_RETRY_DELAY).await;
                }
            }
        }
    }

    /// 处理单条更新；非命令消息直接忽略
    pub async fn handle_update(&self, update: &Update) {
        let Some(message) = update.message.as_ref() else {
            return;
        };
        let Some(command) = message.text.as_deref().and_then(Command::parse) else {
            return;
        };

        debug!("收到命令 {:?} (chat {})", command, message.chat.id);

        let result = match command {
            Command::Start => self.start(message).await,
            Command::Backup => self.backup(message).await,
            Command::RetryFailed => self.retry_failed(message).await,
        };

        if let Err(e) = result {
            error!("Error in {:?} command: {:#}", command, e);
            let text = format!(
                "Sorry, an error occurred: {}. Please try again later.",
                command.failure_context()
            );
            if let Err(e) = self.api.send_message(message.chat.id, &text).await {
                error!("发送错误提示失败: {}", e);
            }
        }
    }

    async fn start(&self, message: &Message) -> Result<()> {
        let chat_id = message.chat.id;
        let user_name = message
            .from
            .as_ref()
            .and_then(|u| u.username.clone())
            .unwrap_or_else(|| "Unknown user".to_string());

        self.api.send_message(chat_id, WELCOME_TEXT).await?;

        if let Some(admin) = self.config.admin_chat_id {
            let text = format!("Bot initialized by user: {} (Chat ID: {})", user_name, chat_id);
            self.api.send_message(admin, &text).await?;
        }

        info!("New user started bot: {}", user_name);
        Ok(())
    }

    async fn backup(&self, message: &Message) -> Result<()> {
        let chat_id = message.chat.id;
        let status = self
            .api
            .send_message(chat_id, "Starting backup process...")
            .await?;

        let (tx, forwarder) = self.spawn_progress_forwarder(chat_id, status.message_id, "files", "backup");
        let result = self.runner.run_backup(&self.config.downloads_dir, Some(tx)).await;
        // 等待进度消息全部发出，保证汇总是最后一次编辑
        let _ = forwarder.await;

        let report = result?;
        self.api
            .edit_message_text(chat_id, status.message_id, &report.summary(self.runner.formats()))
            .await?;
        Ok(())
    }

    async fn retry_failed(&self, message: &Message) -> Result<()> {
        let chat_id = message.chat.id;
        let status = self
            .api
            .send_message(chat_id, "Checking for failed transfers...")
            .await?;

        let (tx, forwarder) =
            self.spawn_progress_forwarder(chat_id, status.message_id, "failed transfers", "retry");
        let report = self.runner.run_retry(Some(tx)).await;
        let _ = forwarder.await;

        self.api
            .edit_message_text(chat_id, status.message_id, &report.summary())
            .await?;
        Ok(())
    }

    /// 把进度事件转成状态消息的编辑
    fn spawn_progress_forwarder(
        &self,
        chat_id: i64,
        message_id: i64,
        noun: &'static str,
        action: &'static str,
    ) -> (mpsc::Sender<PassProgress>, JoinHandle<()>) {
        let (tx, mut rx) = mpsc::channel::<PassProgress>(100);
        let api = self.api.clone();

        let handle = tokio::spawn(async move {
            while let Some(progress) = rx.recv().await {
                let Some(text) = progress_text(&progress, noun, action) else {
                    continue;
                };
                if let Err(e) = api.edit_message_text(chat_id, message_id, &text).await {
                    warn!("更新进度消息失败: {}", e);
                }
            }
        });

        (tx, handle)
    }
}

/// 进度文本；Processed 只在整十和最后一个文件时返回，避免频繁编辑
fn progress_text(progress: &PassProgress, noun: &str, action: &str) -> Option<String> {
    match *progress {
        PassProgress::Discovered { total } => {
            Some(format!("Found {} {}. Starting {}...", total, noun, action))
        }
        PassProgress::Processed { done, total } if done % PROGRESS_EDIT_EVERY == 0 && done < total => {
            Some(format!("Processed {}/{} {}...", done, total, noun))
        }
        PassProgress::Processed { .. } => None,
    }
}
