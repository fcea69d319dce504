//! Telegram Bot API 客户端

use super::models::{ApiResponse, Message, Update};
use super::{ChatApi, Transport, TransportError, CONNECT_TIMEOUT_SECS, REQUEST_TIMEOUT_SECS};
use anyhow::Result;
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tokio_util::io::ReaderStream;

pub const DEFAULT_API_BASE: &str = "https://api.telegram.org";

pub struct TelegramClient {
    client: reqwest::Client,
    base_url: String,
    token: String,
    name: String,
}

/// URL 中带有 token，错误信息里不能出现
fn strip_url(err: reqwest::Error) -> TransportError {
    TransportError::Http(err.without_url())
}

impl TelegramClient {
    pub fn new(token: &str) -> Result<Self> {
        Self::with_base_url(DEFAULT_API_BASE, token)
    }

    pub fn with_base_url(base_url: &str, token: &str) -> Result<Self> {
        if token.trim().is_empty() {
            return Err(anyhow::anyhow!("Telegram bot token is empty"));
        }

        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;

        let base_url = base_url.trim_end_matches('/').to_string();
        let name = format!("telegram:{}", base_url);

        Ok(Self {
            client,
            base_url,
            token: token.to_string(),
            name,
        })
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.base_url, self.token, method)
    }

    /// 解析响应外层；Telegram 在 4xx 时也会返回 JSON 描述
    async fn decode<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T, TransportError> {
        let status = resp.status();
        let body: ApiResponse<T> = resp.json().await.map_err(strip_url)?;

        if !body.ok {
            return Err(TransportError::Api {
                code: body.error_code.or(Some(i64::from(status.as_u16()))),
                description: body
                    .description
                    .unwrap_or_else(|| format!("HTTP {}", status)),
            });
        }

        body.result
            .ok_or_else(|| TransportError::Decode("missing result".to_string()))
    }

    async fn post_json<T: DeserializeOwned>(
        &self,
        method: &str,
        payload: &serde_json::Value,
        timeout: Option<Duration>,
    ) -> Result<T, TransportError> {
        let mut request = self.client.post(self.method_url(method)).json(payload);
        if let Some(t) = timeout {
            request = request.timeout(t);
        }

        let resp = request.send().await.map_err(strip_url)?;
        Self::decode(resp).await
    }
}

#[async_trait]
impl Transport for TelegramClient {
    async fn send_document(
        &self,
        chat_id: i64,
        document: tokio::fs::File,
        filename: &str,
        caption: Option<&str>,
    ) -> Result<(), TransportError> {
        let len = document.metadata().await.ok().map(|m| m.len());

        // 流式上传，避免把整个文件读进内存
        let body = reqwest::Body::wrap_stream(ReaderStream::new(document));
        let part = match len {
            Some(len) => Part::stream_with_length(body, len),
            None => Part::stream(body),
        }
        .file_name(filename.to_string());

        let mut form = Form::new()
            .text("chat_id", chat_id.to_string())
            .part("document", part);
        if let Some(caption) = caption {
            form = form.text("caption", caption.to_string());
        }

        let resp = self
            .client
            .post(self.method_url("sendDocument"))
            .multipart(form)
            .send()
            .await
            .map_err(strip_url)?;

        let _: Message = Self::decode(resp).await?;
        Ok(())
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[async_trait]
impl ChatApi for TelegramClient {
    async fn send_message(&self, chat_id: i64, text: &str) -> Result<Message, TransportError> {
        let payload = serde_json::json!({ "chat_id": chat_id, "text": text });
        self.post_json("sendMessage", &payload, None).await
    }

    async fn edit_message_text(
        &self,
        chat_id: i64,
        message_id: i64,
        text: &str,
    ) -> Result<(), TransportError> {
        let payload = serde_json::json!({
            "chat_id": chat_id,
            "message_id": message_id,
            "text": text,
        });
        // 返回值可能是 Message 也可能是 true
        let _: serde_json::Value = self.post_json("editMessageText", &payload, None).await?;
        Ok(())
    }

    async fn get_updates(
        &self,
        offset: Option<i64>,
        timeout_secs: u64,
    ) -> Result<Vec<Update>, TransportError> {
        let mut payload = serde_json::json!({
            "timeout": timeout_secs,
            "allowed_updates": ["message"],
        });
        if let Some(offset) = offset {
            payload["offset"] = serde_json::json!(offset);
        }

        // HTTP 超时要比长轮询时间长
        let timeout = Duration::from_secs(timeout_secs + CONNECT_TIMEOUT_SECS);
        self.post_json("getUpdates", &payload, Some(timeout)).await
    }
}
