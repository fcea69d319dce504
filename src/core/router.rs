//! 单文件发送与失败转移

use super::error::{RelocationError, TransferError};
use super::scanner::FileEntry;
use crate::transport::Transport;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tracing::{debug, error, info, warn};

/// 重试时的说明前缀
pub const RETRY_CAPTION_PREFIX: &str = "Retry";

/// 一次发送尝试的结果
#[derive(Debug)]
pub enum TransferOutcome {
    Success,
    Failed {
        error: TransferError,
        /// 发送失败且转移也失败，文件仍留在原位置
        stranded: bool,
    },
}

impl TransferOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, TransferOutcome::Success)
    }
}

/// 生成文件说明
pub fn build_caption(prefix: Option<&str>, relative_dir: &str) -> Option<String> {
    match (prefix, relative_dir.is_empty()) {
        (None, true) => None,
        (None, false) => Some(format!("From folder: {}", relative_dir)),
        (Some(p), true) => Some(p.to_string()),
        (Some(p), false) => Some(format!("{} - From folder: {}", p, relative_dir)),
    }
}

/// 传输路由：发送成功删除源文件，失败则移入失败目录
pub struct TransferRouter {
    transport: Arc<dyn Transport>,
    chat_id: i64,
    failed_root: PathBuf,
}

impl TransferRouter {
    pub fn new(transport: Arc<dyn Transport>, chat_id: i64, failed_root: impl Into<PathBuf>) -> Self {
        Self {
            transport,
            chat_id,
            failed_root: failed_root.into(),
        }
    }

    pub fn failed_root(&self) -> &Path {
        &self.failed_root
    }

    /// 打开并发送文件
    async fn send(&self, entry: &FileEntry, caption_prefix: Option<&str>) -> Result<(), TransferError> {
        let file = fs::File::open(&entry.path)
            .await
            .map_err(|source| TransferError::Open {
                path: entry.path.clone(),
                source,
            })?;

        let caption = build_caption(caption_prefix, &entry.relative_display());
        self.transport
            .send_document(self.chat_id, file, &entry.display_name(), caption.as_deref())
            .await?;

        Ok(())
    }

    /// 发送源目录中的一个文件
    pub async fn route_one(&self, entry: &FileEntry, caption_prefix: Option<&str>) -> TransferOutcome {
        match self.send(entry, caption_prefix).await {
            Ok(()) => {
                debug!("已发送: {} via {}", entry.path.display(), self.transport.name());
                // 发送成功即视为完成，删除失败只记录
                if let Err(e) = fs::remove_file(&entry.path).await {
                    error!("发送成功但删除源文件失败 {}: {}", entry.path.display(), e);
                }
                TransferOutcome::Success
            }
            Err(error) => {
                let relocated = self.handle_failure(entry, &error).await;
                if relocated {
                    info!("文件 {} 已移入失败目录", entry.path.display());
                } else {
                    error!("无法处理失败的文件 {}", entry.path.display());
                }
                TransferOutcome::Failed {
                    error,
                    stranded: !relocated,
                }
            }
        }
    }

    /// 重新发送失败目录中的一个文件
    ///
    /// 成功后删除文件并逐级清理空目录（不删除失败目录本身）；失败时文件保持原位。
    pub async fn route_retry(&self, entry: &FileEntry) -> TransferOutcome {
        match self.send(entry, Some(RETRY_CAPTION_PREFIX)).await {
            Ok(()) => {
                match fs::remove_file(&entry.path).await {
                    Ok(()) => {
                        if let Some(parent) = entry.path.parent() {
                            self.prune_empty_dirs(parent).await;
                        }
                    }
                    Err(e) => error!("重发成功但删除文件失败 {}: {}", entry.path.display(), e),
                }
                TransferOutcome::Success
            }
            Err(error) => {
                error!("重试失败 {}: {}", entry.path.display(), error);
                TransferOutcome::Failed {
                    error,
                    stranded: false,
                }
            }
        }
    }

    /// 处理发送失败：保持目录结构移入失败目录，返回是否转移成功
    pub async fn handle_failure(&self, entry: &FileEntry, error: &TransferError) -> bool {
        let name = entry.display_name();
        match self.relocate(entry).await {
            Ok(failed_path) => {
                error!(
                    file = %name,
                    original_path = %entry.path.display(),
                    failed_path = %failed_path.display(),
                    error = %error,
                    timestamp = %chrono::Local::now().to_rfc3339(),
                    "Transfer failed for {}: {}",
                    name,
                    error
                );
                true
            }
            Err(e) => {
                error!(
                    file = %name,
                    original_path = %entry.path.display(),
                    error = %error,
                    "Error handling failed transfer for {}: {}",
                    name,
                    e
                );
                false
            }
        }
    }

    async fn relocate(&self, entry: &FileEntry) -> Result<PathBuf, RelocationError> {
        let target_dir = if entry.relative_dir.as_os_str().is_empty() {
            self.failed_root.clone()
        } else {
            self.failed_root.join(&entry.relative_dir)
        };

        fs::create_dir_all(&target_dir)
            .await
            .map_err(|source| RelocationError::CreateDir {
                path: target_dir.clone(),
                source,
            })?;

        let target = target_dir.join(&entry.name);
        move_file(&entry.path, &target).await?;
        Ok(target)
    }

    /// 从 dir 向上删除空目录，遇到失败目录根或非空目录即停止
    async fn prune_empty_dirs(&self, dir: &Path) {
        let mut current = Some(dir);

        while let Some(dir) = current {
            if dir == self.failed_root || !dir.starts_with(&self.failed_root) {
                break;
            }

            match is_empty_dir(dir).await {
                Ok(true) => {
                    if let Err(e) = fs::remove_dir(dir).await {
                        warn!("删除空目录失败 {}: {}", dir.display(), e);
                        break;
                    }
                    debug!("已删除空目录: {}", dir.display());
                }
                Ok(false) => break,
                Err(e) => {
                    warn!("读取目录失败 {}: {}", dir.display(), e);
                    break;
                }
            }

            current = dir.parent();
        }
    }
}

async fn is_empty_dir(dir: &Path) -> std::io::Result<bool> {
    let mut entries = fs::read_dir(dir).await?;
    Ok(entries.next_entry().await?.is_none())
}

/// 优先原子重命名；跨设备等情况下回退为复制后删除
async fn move_file(from: &Path, to: &Path) -> Result<(), RelocationError> {
    let rename_err = match fs::rename(from, to).await {
        Ok(()) => return Ok(()),
        Err(e) => e,
    };
    debug!("重命名失败，尝试复制: {}", rename_err);

    copy_then_remove(from, to).await
}

/// 先复制到临时文件再重命名到目标，目标只会是完整文件或保持原状
async fn copy_then_remove(from: &Path, to: &Path) -> Result<(), RelocationError> {
    let move_error = |source| RelocationError::Move {
        from: from.to_path_buf(),
        to: to.to_path_buf(),
        source,
    };

    let mut temp = to.as_os_str().to_os_string();
    temp.push(".part");
    let temp = PathBuf::from(temp);

    let staged = match fs::copy(from, &temp).await {
        Ok(_) => fs::rename(&temp, to).await,
        Err(e) => Err(e),
    };
    if let Err(e) = staged {
        let _ = fs::remove_file(&temp).await;
        return Err(move_error(e));
    }

    if let Err(e) = fs::remove_file(from).await {
        // 避免同一个文件同时出现在两处
        let _ = fs::remove_file(to).await;
        return Err(move_error(e));
    }

    Ok(())
}
