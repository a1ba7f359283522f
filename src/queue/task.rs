use bytes::Bytes;
use chrono::{DateTime, Utc};
use crate::selection::{SelectedFile, SourceHandle};
use super::types::{UploadId, UploadState};

/// 一个文件的上传任务及其完整生命周期状态
#[derive(Debug, Clone)]
pub struct UploadTask {
    pub id: UploadId,
    pub name: String,
    pub size: u64,
    pub mime_type: String,
    /// 原始内容的句柄，队列只引用，不复制也不修改字节
    pub source: SourceHandle,
    pub state: UploadState,
    /// 展示进度 [0, 100]，只在上传中有意义
    pub progress: f64,
    /// 估算速度（字节/秒），非上传中为 0
    pub transfer_rate: f64,
    /// 失败原因，重新进入上传中时清空
    pub error: Option<String>,
    /// 预览数据，创建时一次性设置，之后不变
    pub preview: Option<Bytes>,
    pub created_at: DateTime<Utc>,
    /// 成功时刻
    pub completed_at: Option<DateTime<Utc>>,
    /// 成功后回执里的远端地址
    pub remote_url: Option<String>,
}

impl UploadTask {
    pub(crate) fn new(file: SelectedFile) -> Self {
        Self {
            id: UploadId::new(),
            name: file.name,
            size: file.size,
            mime_type: file.mime_type,
            source: file.source,
            state: UploadState::Pending,
            progress: 0.0,
            transfer_rate: 0.0,
            error: None,
            preview: file.preview,
            created_at: Utc::now(),
            completed_at: None,
            remote_url: None,
        }
    }

    /// 状态机允许的迁移
    pub fn is_valid_transition(from: UploadState, to: UploadState) -> bool {
        use UploadState::*;

        matches!(
            (from, to),
            (Pending, Uploading)
                | (Uploading, Success)
                | (Uploading, Error)
                | (Error, Uploading)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_transition() {
        use UploadState::*;

        // valid
        assert!(UploadTask::is_valid_transition(Pending, Uploading));
        assert!(UploadTask::is_valid_transition(Uploading, Success));
        assert!(UploadTask::is_valid_transition(Uploading, Error));
        assert!(UploadTask::is_valid_transition(Error, Uploading));

        // invalid
        assert!(!UploadTask::is_valid_transition(Success, Uploading));
        assert!(!UploadTask::is_valid_transition(Pending, Success));
        assert!(!UploadTask::is_valid_transition(Pending, Error));
        assert!(!UploadTask::is_valid_transition(Error, Success));
        assert!(!UploadTask::is_valid_transition(Success, Pending));
    }

    #[test]
    fn test_new_task_is_pending() {
        let file = SelectedFile::from_bytes("photo.png", "image/png", vec![0u8; 16]);
        let task = UploadTask::new(file);

        assert_eq!(task.state, UploadState::Pending);
        assert_eq!(task.progress, 0.0);
        assert_eq!(task.transfer_rate, 0.0);
        assert!(task.error.is_none());
        assert!(task.completed_at.is_none());
        assert!(task.remote_url.is_none());
    }

    #[test]
    fn test_id_generation() {
        let id1 = UploadId::new();
        let id2 = UploadId::new();

        assert_ne!(id1, id2);
        assert_eq!(id1, id1);

        let id_str = id1.to_string();
        assert!(!id_str.is_empty());
    }
}
