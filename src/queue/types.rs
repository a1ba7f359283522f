use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;
use uuid::Uuid;
use crate::errors::Result;
use crate::selection::{Constraints, RejectedFile, SelectedFile};
use super::task::UploadTask;

/// 任务标识，创建后在整个生命周期内不变
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub struct UploadId(Uuid);

impl UploadId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for UploadId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for UploadId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub enum UploadState {
    /// 等待开始
    Pending,
    /// 上传中
    Uploading,
    /// 已成功（终态）
    Success,
    /// 失败，可通过 retry 再次尝试
    Error,
}

impl UploadState {
    /// 只有等待中和失败的任务可以开始上传
    pub fn can_start(&self) -> bool {
        matches!(self, Self::Pending | Self::Error)
    }
}

/// 队列统计，各状态计数之和恒等于 total
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueStats {
    pub total: usize,
    pub pending: usize,
    pub uploading: usize,
    pub success: usize,
    pub error: usize,
}

/// 一次入队的结果
#[derive(Debug, Clone, Default)]
pub struct EnqueueReport {
    /// 新建任务的 id，按提交顺序
    pub accepted: Vec<UploadId>,
    /// 被拒绝的文件和原因
    pub rejected: Vec<RejectedFile>,
}

/// 清空队列的确认结果
///
/// 确认交互由调用方完成（对话框等），核心只认结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClearConfirmation {
    Confirmed,
    Declined,
}

/// 队列事件
#[derive(Debug, Clone)]
pub enum UploadEvent {
    /// 新任务入队
    TaskAdded {
        id: UploadId,
    },

    /// 任务状态变更
    StateChanged {
        id: UploadId,
        old_state: UploadState,
        new_state: UploadState,
    },

    /// 估算进度更新
    Progress {
        id: UploadId,
        progress: f64,
        transfer_rate: f64,
    },

    /// 上传完成
    Completed {
        id: UploadId,
        url: String,
    },

    /// 上传失败
    Failed {
        id: UploadId,
        error: String,
    },

    /// 任务被移除
    TaskRemoved {
        id: UploadId,
    },

    /// 队列被清空
    Cleared {
        removed: usize,
    },
}

/// 队列管理器命令
pub enum ManagerCommand {
    /// 校验并入队一批文件
    Enqueue {
        files: Vec<SelectedFile>,
        constraints: Constraints,
        reply: oneshot::Sender<Result<EnqueueReport>>,
    },

    /// 开始（或重试）一个任务
    Start {
        id: UploadId,
        reply: oneshot::Sender<Result<()>>,
    },

    /// 开始所有等待中和失败的任务
    StartAll {
        reply: oneshot::Sender<Result<usize>>,
    },

    /// 移除任务，任何状态都允许
    Remove {
        id: UploadId,
        reply: oneshot::Sender<Result<()>>,
    },

    /// 清空队列
    ClearAll {
        confirmation: ClearConfirmation,
        reply: oneshot::Sender<Result<usize>>,
    },

    /// 当前统计
    Stats {
        reply: oneshot::Sender<QueueStats>,
    },

    /// 获取任务快照
    GetTask {
        id: UploadId,
        reply: oneshot::Sender<Option<UploadTask>>,
    },

    /// 获取所有任务快照，按提交顺序
    GetAllTasks {
        reply: oneshot::Sender<Vec<UploadTask>>,
    },
}
