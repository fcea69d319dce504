pub mod models;
pub mod telegram;

use async_trait::async_trait;
use thiserror::Error;

pub use models::{Chat, Message, Update, User};
pub use telegram::TelegramClient;

// ============ 公共常量 ============

/// 单次 HTTP 请求超时（秒）；上传大文件需要较长时间
pub const REQUEST_TIMEOUT_SECS: u64 = 300;
/// 连接超时（秒）
pub const CONNECT_TIMEOUT_SECS: u64 = 30;

/// 传输层错误
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),
    /// 服务端返回 `ok: false`
    #[error("api error: {description}")]
    Api {
        code: Option<i64>,
        description: String,
    },
    /// 响应缺少 `result` 字段等格式问题
    #[error("unexpected response: {0}")]
    Decode(String),
}

/// 文档发送接口（备份核心只依赖这一个能力）
#[async_trait]
pub trait Transport: Send + Sync {
    /// 发送一个文件；返回 Ok 即视为对方已接收
    async fn send_document(
        &self,
        chat_id: i64,
        document: tokio::fs::File,
        filename: &str,
        caption: Option<&str>,
    ) -> Result<(), TransportError>;

    /// 获取传输名称（用于日志）
    fn name(&self) -> &str;
}

/// 聊天交互接口（命令前端使用）
#[async_trait]
pub trait ChatApi: Send + Sync {
    async fn send_message(&self, chat_id: i64, text: &str) -> Result<Message, TransportError>;

    async fn edit_message_text(
        &self,
        chat_id: i64,
        message_id: i64,
        text: &str,
    ) -> Result<(), TransportError>;

    /// 长轮询获取更新
    async fn get_updates(
        &self,
        offset: Option<i64>,
        timeout_secs: u64,
    ) -> Result<Vec<Update>, TransportError>;
}
