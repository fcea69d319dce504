//! 备份流程的错误类型

use crate::transport::TransportError;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// 单个文件发送失败的原因
#[derive(Debug, Error)]
pub enum TransferError {
    /// 打开源文件失败
    #[error("failed to open {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    /// 传输层拒绝或网络错误
    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// 把文件移入失败目录时出错（发送与转移都失败）
#[derive(Debug, Error)]
pub enum RelocationError {
    #[error("failed to create directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to move {from} to {to}: {source}")]
    Move {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// 整个 pass 无法开始
#[derive(Debug, Error)]
pub enum PassError {
    #[error("source directory not found: {path}")]
    SourceMissing { path: PathBuf },
}
