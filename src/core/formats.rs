//! 支持的媒体格式（按类别划分的扩展名白名单）

use serde::{Deserialize, Serialize};

/// 媒体格式白名单
///
/// 扩展名带前导点、小写，例如 `.jpg`。过滤时只看扩展名是否在并集中，类别仅用于展示。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MediaFormats {
    #[serde(default = "default_images")]
    pub images: Vec<String>,
    #[serde(default = "default_videos")]
    pub videos: Vec<String>,
    #[serde(default = "default_audio")]
    pub audio: Vec<String>,
    #[serde(default = "default_documents")]
    pub documents: Vec<String>,
}

fn to_owned_list(exts: &[&str]) -> Vec<String> {
    exts.iter().map(|e| e.to_string()).collect()
}

fn default_images() -> Vec<String> {
    to_owned_list(&[".jpg", ".jpeg", ".png", ".gif", ".webp", ".bmp"])
}

fn default_videos() -> Vec<String> {
    to_owned_list(&[".mp4", ".avi", ".mkv", ".mov", ".wmv", ".flv", ".webm"])
}

fn default_audio() -> Vec<String> {
    to_owned_list(&[".mp3", ".wav", ".ogg", ".m4a", ".flac"])
}

fn default_documents() -> Vec<String> {
    to_owned_list(&[".pdf", ".doc", ".docx", ".txt", ".zip", ".rar"])
}

impl Default for MediaFormats {
    fn default() -> Self {
        Self {
            images: default_images(),
            videos: default_videos(),
            audio: default_audio(),
            documents: default_documents(),
        }
    }
}

impl MediaFormats {
    /// 所有类别（名称, 图标, 扩展名列表）
    pub fn categories(&self) -> [(&'static str, &'static str, &[String]); 4] {
        [
            ("Images", "📸", self.images.as_slice()),
            ("Videos", "🎥", self.videos.as_slice()),
            ("Audio", "🎵", self.audio.as_slice()),
            ("Documents", "📄", self.documents.as_slice()),
        ]
    }

    /// 判断文件名的扩展名是否在白名单内（大小写不敏感）
    pub fn is_supported(&self, file_name: &str) -> bool {
        let Some(ext) = extension_of(file_name) else {
            return false;
        };

        self.categories()
            .iter()
            .flat_map(|(_, _, exts)| exts.iter())
            .any(|e| e.eq_ignore_ascii_case(&ext))
    }

    /// 生成用于汇总消息的格式说明
    pub fn describe(&self) -> String {
        let mut lines = vec!["Supported formats:".to_string()];
        for (label, icon, exts) in self.categories() {
            lines.push(format!("{} {}: {}", icon, label, exts.join(", ")));
        }
        lines.join("\n")
    }
}

/// 取出带前导点的小写扩展名；`.bashrc` 这类隐藏文件没有扩展名
fn extension_of(file_name: &str) -> Option<String> {
    std::path::Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| format!(".{}", e.to_lowercase()))
}
