//! 命令解析

/// 支持的命令
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Start,
    Backup,
    RetryFailed,
}

impl Command {
    /// 解析消息文本，支持 `/cmd` 与 `/cmd@botname` 形式，忽略参数
    pub fn parse(text: &str) -> Option<Self> {
        let word = text.split_whitespace().next()?;
        let name = word.strip_prefix('/')?;
        let name = name.split('@').next().unwrap_or(name);

        match name.to_lowercase().as_str() {
            "start" => Some(Command::Start),
            "backup" => Some(Command::Backup),
            "retry_failed" => Some(Command::RetryFailed),
            _ => None,
        }
    }

    /// 出错时展示给用户的描述
    pub fn failure_context(&self) -> &'static str {
        match self {
            Command::Start => "Failed to initialize bot",
            Command::Backup => "Backup process failed",
            Command::RetryFailed => "Retry process failed",
        }
    }
}
