use super::formats::MediaFormats;
use std::ffi::OsString;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, error, info};
use walkdir::WalkDir;

/// 扫描到的单个文件
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    /// 文件当前位置
    pub path: PathBuf,
    /// 原始文件名，失败目录中沿用同一名称
    pub name: OsString,
    /// 相对扫描根目录的所在目录；位于根目录时为空路径
    pub relative_dir: PathBuf,
}

impl FileEntry {
    /// 发送和日志使用的文件名（非 UTF-8 字节做有损替换）
    pub fn display_name(&self) -> String {
        self.name.to_string_lossy().into_owned()
    }

    /// 说明文字中的目录，统一使用 `/`，根目录为空字符串
    pub fn relative_display(&self) -> String {
        let parts: Vec<String> = self
            .relative_dir
            .components()
            .filter_map(|c| match c {
                Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
                _ => None,
            })
            .collect();
        parts.join("/")
    }
}

/// 媒体文件扫描器
#[derive(Debug, Clone, Default)]
pub struct MediaScanner {
    formats: MediaFormats,
}

impl MediaScanner {
    pub fn new(formats: MediaFormats) -> Self {
        Self { formats }
    }

    pub fn formats(&self) -> &MediaFormats {
        &self.formats
    }

    /// 递归扫描目录
    ///
    /// 遍历在阻塞线程池中执行。任何遍历错误只记录日志并返回空列表，
    /// 调用方把"目录不可读"和"没有文件"同样视为无事可做。
    pub async fn scan(&self, root: &Path) -> Vec<FileEntry> {
        let scanner = self.clone();
        let root = root.to_path_buf();

        // 使用 spawn_blocking 避免阻塞 async runtime
        match tokio::task::spawn_blocking(move || scanner.scan_blocking(&root)).await {
            Ok(entries) => entries,
            Err(e) => {
                error!("扫描任务失败: {}", e);
                Vec::new()
            }
        }
    }

    /// 同步版本的扫描
    pub fn scan_blocking(&self, root: &Path) -> Vec<FileEntry> {
        if !root.exists() {
            debug!("扫描目录不存在: {}", root.display());
            return Vec::new();
        }

        // walkdir 内部使用显式目录栈，深层目录不会加深调用栈
        let walker = WalkDir::new(root)
            .follow_links(false)
            .into_iter()
            .map(|entry| entry.map(|e| (e.path().to_path_buf(), e.file_type().is_file())));

        self.collect(root, walker)
    }

    /// 汇总遍历结果：任一遍历错误都使整个扫描返回空列表
    fn collect<E: std::fmt::Display>(
        &self,
        root: &Path,
        walker: impl Iterator<Item = Result<(PathBuf, bool), E>>,
    ) -> Vec<FileEntry> {
        match self.filter_media(root, walker) {
            Ok(mut entries) => {
                entries.sort_by(|a, b| a.path.cmp(&b.path));
                info!("扫描完成: {} 个文件 ({})", entries.len(), root.display());
                entries
            }
            Err(e) => {
                error!("扫描目录出错 {}: {}", root.display(), e);
                Vec::new()
            }
        }
    }

    fn filter_media<E>(
        &self,
        root: &Path,
        walker: impl Iterator<Item = Result<(PathBuf, bool), E>>,
    ) -> Result<Vec<FileEntry>, E> {
        let mut entries = Vec::new();
        let mut skipped = 0usize;

        for item in walker {
            let (path, is_file) = item?;
            if !is_file {
                continue;
            }
            let Some(name) = path.file_name().map(|n| n.to_os_string()) else {
                continue;
            };

            if !self.formats.is_supported(&name.to_string_lossy()) {
                skipped += 1;
                continue;
            }

            let relative_dir = path
                .parent()
                .and_then(|parent| parent.strip_prefix(root).ok())
                .map(Path::to_path_buf)
                .unwrap_or_default();

            entries.push(FileEntry {
                path,
                name,
                relative_dir,
            });
        }

        if skipped > 0 {
            debug!("跳过 {} 个不支持的文件", skipped);
        }

        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn touch(path: &Path) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, b"data").unwrap();
    }

    #[test]
    fn test_relative_dir_for_root_and_nested() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("a.jpg"));
        touch(&dir.path().join("sub/b.mp4"));
        touch(&dir.path().join("sub/deep/c.PNG"));

        let entries = MediaScanner::default().scan_blocking(dir.path());

        let mut found: Vec<(String, String)> = entries
            .iter()
            .map(|e| (e.display_name(), e.relative_display()))
            .collect();
        found.sort();
        assert_eq!(
            found,
            vec![
                ("a.jpg".to_string(), String::new()),
                ("b.mp4".to_string(), "sub".to_string()),
                ("c.PNG".to_string(), "sub/deep".to_string()),
            ]
        );

        for entry in &entries {
            assert!(entry.path.is_file());
            assert_eq!(entry.path.file_name().unwrap(), entry.name.as_os_str());
            assert_eq!(entry.path.parent().unwrap(), dir.path().join(&entry.relative_dir));
        }
    }

    #[test]
    fn test_unsupported_files_are_invisible() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("setup.exe"));
        touch(&dir.path().join("sub/README"));
        touch(&dir.path().join("sub/song.mp3"));

        let entries = MediaScanner::default().scan_blocking(dir.path());

        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].display_name(), "song.mp3");
    }

    #[test]
    fn test_missing_root_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let entries = MediaScanner::default().scan_blocking(&dir.path().join("nope"));
        assert!(entries.is_empty());
    }

    #[test]
    fn test_rescan_reflects_current_state() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("a.jpg"));
        let scanner = MediaScanner::default();
        assert_eq!(scanner.scan_blocking(dir.path()).len(), 1);

        fs::remove_file(dir.path().join("a.jpg")).unwrap();
        touch(&dir.path().join("x/b.gif"));
        let entries = scanner.scan_blocking(dir.path());
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].relative_dir, PathBuf::from("x"));
    }

    #[tokio::test]
    async fn test_async_scan_matches_blocking() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("a.jpg"));
        touch(&dir.path().join("sub/b.pdf"));

        let scanner = MediaScanner::default();
        let entries = scanner.scan(dir.path()).await;
        assert_eq!(entries, scanner.scan_blocking(dir.path()));
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_non_utf8_dirs_keep_their_bytes() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let dir = tempfile::tempdir().unwrap();
        let first = OsStr::from_bytes(b"caf\xe9");
        let second = OsStr::from_bytes(b"caf\xe8");
        touch(&dir.path().join(first).join("b.jpg"));
        touch(&dir.path().join(second).join("b.jpg"));

        let entries = MediaScanner::default().scan_blocking(dir.path());

        assert_eq!(entries.len(), 2);
        let mut dirs: Vec<&[u8]> = entries
            .iter()
            .map(|e| e.relative_dir.as_os_str().as_bytes())
            .collect();
        dirs.sort();
        assert_eq!(dirs, vec![b"caf\xe8".as_slice(), b"caf\xe9".as_slice()]);
        // 仅展示形式有损，两者展示相同
        assert_eq!(entries[0].relative_display(), entries[1].relative_display());
    }

    #[test]
    fn test_walk_error_discards_partial_results() {
        let root = Path::new("/media");
        let walker = vec![
            Ok((root.join("a.jpg"), true)),
            Err(std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied")),
            Ok((root.join("sub/b.jpg"), true)),
        ];

        let entries = MediaScanner::default().collect(root, walker.into_iter());
        assert!(entries.is_empty());
    }

    #[test]
    fn test_collect_skips_directories() {
        let root = Path::new("/media");
        let walker = vec![
            Ok::<_, std::io::Error>((root.to_path_buf(), false)),
            Ok((root.join("sub"), false)),
            Ok((root.join("sub/b.jpg"), true)),
        ];

        let entries = MediaScanner::default().collect(root, walker.into_iter());
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].relative_dir, PathBuf::from("sub"));
    }

    #[cfg(unix)]
    #[test]
    fn test_unreadable_subdir_yields_empty() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("a.jpg"));
        let locked = dir.path().join("locked");
        touch(&locked.join("b.jpg"));
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();

        // root 用户不受目录权限限制，此时无法构造遍历错误
        if fs::read_dir(&locked).is_ok() {
            fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();
            return;
        }

        let entries = MediaScanner::default().scan_blocking(dir.path());
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();

        assert!(entries.is_empty());
    }
}
