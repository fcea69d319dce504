use async_trait::async_trait;
use mediabackup_lib::core::{MediaFormats, PassError, PassProgress};
use mediabackup_lib::transport::{Transport, TransportError};
use mediabackup_lib::{BackupRunner, MediaScanner, TransferRouter};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

/// 可切换成败的假传输
#[derive(Default)]
struct ScriptedTransport {
    fail: Mutex<HashSet<String>>,
    fail_all: AtomicBool,
    sent: Mutex<Vec<String>>,
}

impl ScriptedTransport {
    fn failing(names: &[&str]) -> Self {
        let transport = Self::default();
        transport
            .fail
            .lock()
            .unwrap()
            .extend(names.iter().map(|n| n.to_string()));
        transport
    }

    fn heal(&self) {
        self.fail.lock().unwrap().clear();
        self.fail_all.store(false, Ordering::SeqCst);
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send_document(
        &self,
        _chat_id: i64,
        _document: tokio::fs::File,
        filename: &str,
        _caption: Option<&str>,
    ) -> Result<(), TransportError> {
        if self.fail_all.load(Ordering::SeqCst) || self.fail.lock().unwrap().contains(filename) {
            return Err(TransportError::Api {
                code: Some(502),
                description: "Bad Gateway".to_string(),
            });
        }
        self.sent.lock().unwrap().push(filename.to_string());
        Ok(())
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

struct Fixture {
    _dir: tempfile::TempDir,
    source: PathBuf,
    failed: PathBuf,
    transport: Arc<ScriptedTransport>,
    runner: BackupRunner,
}

fn fixture(transport: ScriptedTransport) -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("downloads");
    let failed = dir.path().join("failed_transfers");
    fs::create_dir_all(&source).unwrap();
    fs::create_dir_all(&failed).unwrap();

    let transport = Arc::new(transport);
    let router = TransferRouter::new(transport.clone(), -100, &failed);
    let runner = BackupRunner::new(MediaScanner::new(MediaFormats::default()), router);

    Fixture {
        _dir: dir,
        source,
        failed,
        transport,
        runner,
    }
}

fn touch(path: &Path) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, b"content").unwrap();
}

fn file_count(root: &Path) -> usize {
    walkdir::WalkDir::new(root)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .count()
}

#[tokio::test]
async fn test_mixed_outcomes_scenario() {
    let fx = fixture(ScriptedTransport::failing(&["b.mp4"]));
    touch(&fx.source.join("a.jpg"));
    touch(&fx.source.join("sub/b.mp4"));

    let report = fx.runner.run_backup(&fx.source, None).await.unwrap();

    assert_eq!((report.total, report.successful, report.failed), (2, 1, 1));
    assert_eq!(report.stranded, 0);
    assert!(!fx.source.join("a.jpg").exists());
    assert!(!fx.source.join("sub/b.mp4").exists());
    assert!(fx.failed.join("sub/b.mp4").is_file());
    assert_eq!(fx.transport.sent.lock().unwrap().as_slice(), &["a.jpg".to_string()]);
}

#[tokio::test]
async fn test_empty_source_does_nothing() {
    let fx = fixture(ScriptedTransport::default());

    let report = fx.runner.run_backup(&fx.source, None).await.unwrap();

    assert_eq!(report.total, 0);
    assert_eq!(
        report.summary(fx.runner.formats()),
        "No supported media files found in downloads directory!"
    );
    assert!(fx.transport.sent.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_missing_source_fails_fast() {
    let fx = fixture(ScriptedTransport::default());
    touch(&fx.failed.join("keep.png"));
    let missing = fx.source.join("not-there");

    let err = fx.runner.run_backup(&missing, None).await.unwrap_err();

    assert!(matches!(err, PassError::SourceMissing { path } if path == missing));
    assert!(fx.failed.join("keep.png").exists());
}

#[tokio::test]
async fn test_retry_removes_emptied_folder() {
    let fx = fixture(ScriptedTransport::default());
    touch(&fx.failed.join("sub/c.png"));

    let report = fx.runner.run_retry(None).await;

    assert_eq!((report.scanned, report.successful, report.still_failed), (1, 1, 0));
    assert!(!fx.failed.join("sub/c.png").exists());
    assert!(!fx.failed.join("sub").exists());
    assert!(fx.failed.is_dir());
}

#[tokio::test]
async fn test_unsupported_files_never_touched() {
    let fx = fixture(ScriptedTransport::default());
    touch(&fx.source.join("tool.exe"));
    touch(&fx.source.join("sub/clip.mov"));
    touch(&fx.failed.join("old/setup.exe"));

    let report = fx.runner.run_backup(&fx.source, None).await.unwrap();
    let retry = fx.runner.run_retry(None).await;

    assert_eq!(report.total, 1);
    assert_eq!(retry.scanned, 0);
    assert!(fx.source.join("tool.exe").exists());
    assert!(fx.failed.join("old/setup.exe").exists());
}

#[tokio::test]
async fn test_every_file_ends_in_exactly_one_place() {
    let transport = ScriptedTransport::default();
    transport.fail_all.store(true, Ordering::SeqCst);
    let fx = fixture(transport);

    let files = ["a.jpg", "x/b.pdf", "x/y/c.flac", "z/d.webm"];
    for f in files {
        touch(&fx.source.join(f));
    }

    let report = fx.runner.run_backup(&fx.source, None).await.unwrap();

    assert_eq!(report.total, report.successful + report.failed);
    assert_eq!(report.failed, files.len());
    for f in files {
        assert!(!fx.source.join(f).exists(), "{f} left in source");
        assert!(fx.failed.join(f).is_file(), "{f} missing from failed tree");
    }
}

#[tokio::test]
async fn test_retry_converges_once_transport_recovers() {
    let transport = ScriptedTransport::failing(&["b.pdf", "c.flac"]);
    let fx = fixture(transport);
    for f in ["a.jpg", "x/b.pdf", "x/y/c.flac"] {
        touch(&fx.source.join(f));
    }

    let backup = fx.runner.run_backup(&fx.source, None).await.unwrap();
    assert_eq!(backup.failed, 2);

    // 传输仍失败：文件原地保留
    let first = fx.runner.run_retry(None).await;
    assert_eq!(first.successful + first.still_failed, first.scanned);
    assert_eq!(first.still_failed, 2);
    assert_eq!(file_count(&fx.failed), 2);

    fx.transport.heal();
    let second = fx.runner.run_retry(None).await;
    assert_eq!((second.successful, second.still_failed), (2, 0));
    assert_eq!(file_count(&fx.failed), 0);
    assert!(!fx.failed.join("x").exists());

    let third = fx.runner.run_retry(None).await;
    assert_eq!(third.scanned, 0);
}

#[tokio::test]
async fn test_progress_events_cover_every_file() {
    let fx = fixture(ScriptedTransport::default());
    touch(&fx.source.join("a.jpg"));
    touch(&fx.source.join("b.jpg"));

    let (tx, mut rx) = mpsc::channel(16);
    fx.runner.run_backup(&fx.source, Some(tx)).await.unwrap();

    let mut events = Vec::new();
    while let Some(event) = rx.recv().await {
        events.push(event);
    }

    assert_eq!(
        events,
        vec![
            PassProgress::Discovered { total: 2 },
            PassProgress::Processed { done: 1, total: 2 },
            PassProgress::Processed { done: 2, total: 2 },
        ]
    );
}

#[tokio::test]
async fn test_stranded_file_is_retried_by_next_backup() {
    let fx = fixture(ScriptedTransport::failing(&["a.jpg"]));
    touch(&fx.source.join("a.jpg"));
    // 失败目录被普通文件占用，转移无法完成
    fs::remove_dir_all(&fx.failed).unwrap();
    fs::write(&fx.failed, b"").unwrap();

    let first = fx.runner.run_backup(&fx.source, None).await.unwrap();

    assert_eq!((first.total, first.failed, first.stranded), (1, 1, 1));
    assert!(fx.source.join("a.jpg").is_file());
    assert!(first
        .summary(fx.runner.formats())
        .contains("Could not move to failed transfers (left in place): 1"));

    fs::remove_file(&fx.failed).unwrap();
    fs::create_dir_all(&fx.failed).unwrap();

    let second = fx.runner.run_backup(&fx.source, None).await.unwrap();

    assert_eq!((second.total, second.failed, second.stranded), (1, 1, 0));
    assert!(!fx.source.join("a.jpg").exists());
    assert!(fx.failed.join("a.jpg").is_file());
}

#[cfg(target_os = "linux")]
#[tokio::test]
async fn test_non_utf8_sibling_dirs_stay_distinct() {
    use std::ffi::OsStr;
    use std::os::unix::ffi::OsStrExt;

    let transport = ScriptedTransport::default();
    transport.fail_all.store(true, Ordering::SeqCst);
    let fx = fixture(transport);
    let first = OsStr::from_bytes(b"caf\xe9");
    let second = OsStr::from_bytes(b"caf\xe8");
    touch(&fx.source.join(first).join("b.jpg"));
    touch(&fx.source.join(second).join("b.jpg"));

    let report = fx.runner.run_backup(&fx.source, None).await.unwrap();

    assert_eq!((report.failed, report.stranded), (2, 0));
    assert!(fx.failed.join(first).join("b.jpg").is_file());
    assert!(fx.failed.join(second).join("b.jpg").is_file());
    assert_eq!(file_count(&fx.source), 0);
}
