use std::fmt;

/// 通知级别
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    Info,
    Success,
    Error,
}

impl fmt::Display for NoticeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self {
            Self::Info => "info",
            Self::Success => "success",
            Self::Error => "error",
        };

        write!(f, "{}", kind)
    }
}

/// 通知接收端（toast 等用户提示）
///
/// 发送即忘：实现方不能阻塞队列，返回值和失败都不被关心
pub trait NotificationSink: Send + Sync {
    fn notify(&self, kind: NoticeKind, message: &str);
}

/// 把通知写进日志的默认实现
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

impl NotificationSink for LogSink {
    fn notify(&self, kind: NoticeKind, message: &str) {
        match kind {
            NoticeKind::Info | NoticeKind::Success => {
                tracing::info!(kind = %kind, "{}", message);
            }
            NoticeKind::Error => {
                tracing::warn!(kind = %kind, "{}", message);
            }
        }
    }
}
