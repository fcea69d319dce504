//! 备份与重试流程编排
//!
//! 每个 pass 严格顺序处理：一个文件发送并删除（或转移并记录）之后才处理下一个。
//! 同一目录上不能同时运行两个 pass，由调用方保证。

use super::error::PassError;
use super::formats::MediaFormats;
use super::router::{TransferOutcome, TransferRouter};
use super::scanner::MediaScanner;
use serde::Serialize;
use std::path::Path;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// 进度事件
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PassProgress {
    /// 扫描完成
    Discovered { total: usize },
    /// 已处理 done 个文件
    Processed { done: usize, total: usize },
}

/// 备份报告；total == successful + failed
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupReport {
    pub total: usize,
    pub successful: usize,
    pub failed: usize,
    /// 发送与转移都失败、仍留在源目录的文件数（包含在 failed 中）
    pub stranded: usize,
}

impl BackupReport {
    pub fn summary(&self, formats: &MediaFormats) -> String {
        if self.total == 0 {
            return "No supported media files found in downloads directory!".to_string();
        }

        let mut message = format!(
            "Backup completed!\nTotal files: {}\nSuccessfully sent to group: {}\nFailed: {}\n",
            self.total, self.successful, self.failed
        );

        if self.stranded > 0 {
            message.push_str(&format!(
                "Could not move to failed transfers (left in place): {}\n",
                self.stranded
            ));
        }

        if self.failed > 0 {
            message.push_str("\nUse /retry_failed to attempt resending failed transfers.");
        }

        message.push_str("\n\n");
        message.push_str(&formats.describe());
        message
    }
}

/// 重试报告；successful + still_failed == scanned
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RetryReport {
    pub scanned: usize,
    pub successful: usize,
    pub still_failed: usize,
}

impl RetryReport {
    pub fn summary(&self) -> String {
        if self.scanned == 0 {
            return "No failed transfers found to retry.".to_string();
        }

        format!(
            "Retry completed!\nSuccessfully resent: {}\nStill failed: {}",
            self.successful, self.still_failed
        )
    }
}

/// 备份/重试执行器
pub struct BackupRunner {
    scanner: MediaScanner,
    router: TransferRouter,
}

impl BackupRunner {
    pub fn new(scanner: MediaScanner, router: TransferRouter) -> Self {
        Self { scanner, router }
    }

    pub fn formats(&self) -> &MediaFormats {
        self.scanner.formats()
    }

    async fn send_progress(progress_tx: &Option<mpsc::Sender<PassProgress>>, progress: PassProgress) {
        if let Some(tx) = progress_tx {
            // 接收方已关闭不影响流程
            let _ = tx.send(progress).await;
        }
    }

    /// 备份源目录中的所有媒体文件
    pub async fn run_backup(
        &self,
        source_dir: &Path,
        progress_tx: Option<mpsc::Sender<PassProgress>>,
    ) -> Result<BackupReport, PassError> {
        if !source_dir.exists() {
            return Err(PassError::SourceMissing {
                path: source_dir.to_path_buf(),
            });
        }

        let entries = self.scanner.scan(source_dir).await;
        let total = entries.len();
        let mut report = BackupReport {
            total,
            ..Default::default()
        };

        if entries.is_empty() {
            info!("源目录中没有可备份的文件: {}", source_dir.display());
            return Ok(report);
        }

        info!("开始备份 {} 个文件: {}", total, source_dir.display());
        Self::send_progress(&progress_tx, PassProgress::Discovered { total }).await;

        for (index, entry) in entries.iter().enumerate() {
            match self.router.route_one(entry, None).await {
                TransferOutcome::Success => report.successful += 1,
                TransferOutcome::Failed { stranded, .. } => {
                    report.failed += 1;
                    if stranded {
                        report.stranded += 1;
                    }
                }
            }

            debug!("进度: {}/{} ({})", index + 1, total, entry.path.display());
            Self::send_progress(
                &progress_tx,
                PassProgress::Processed {
                    done: index + 1,
                    total,
                },
            )
            .await;
        }

        if report.failed > 0 {
            warn!(
                "备份完成: 成功 {}, 失败 {} (其中 {} 个未能移入失败目录)",
                report.successful, report.failed, report.stranded
            );
        } else {
            info!("备份完成: 成功 {}", report.successful);
        }

        Ok(report)
    }

    /// 重试失败目录中的所有文件
    pub async fn run_retry(&self, progress_tx: Option<mpsc::Sender<PassProgress>>) -> RetryReport {
        let failed_root = self.router.failed_root().to_path_buf();
        let entries = self.scanner.scan(&failed_root).await;
        let scanned = entries.len();
        let mut report = RetryReport {
            scanned,
            ..Default::default()
        };

        if entries.is_empty() {
            info!("没有需要重试的文件");
            return report;
        }

        info!("开始重试 {} 个文件", scanned);
        Self::send_progress(&progress_tx, PassProgress::Discovered { total: scanned }).await;

        for (index, entry) in entries.iter().enumerate() {
            if self.router.route_retry(entry).await.is_success() {
                report.successful += 1;
            } else {
                report.still_failed += 1;
            }

            Self::send_progress(
                &progress_tx,
                PassProgress::Processed {
                    done: index + 1,
                    total: scanned,
                },
            )
            .await;
        }

        info!(
            "重试完成: 成功 {}, 仍失败 {}",
            report.successful, report.still_failed
        );

        report
    }
}
