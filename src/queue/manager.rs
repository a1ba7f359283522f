use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use crate::acquire::Dependency;
use crate::backend::TransferBackend;
use crate::config::UploadConfig;
use crate::errors::{QueueError, Result};
use crate::history::HistoryStore;
use crate::notify::{LogSink, NotificationSink};
use crate::selection::{Constraints, SelectedFile};
use super::task::UploadTask;
use super::types::{
    ClearConfirmation, EnqueueReport, ManagerCommand, QueueStats, UploadEvent, UploadId,
};
use super::worker::QueueWorker;

/// 上传队列管理器
///
/// 所有操作都转成命令交给工作者串行处理，本身只是个轻量句柄，可以随意克隆
#[derive(Clone)]
pub struct UploadManager {
    command_tx: mpsc::Sender<ManagerCommand>,
    event_tx: broadcast::Sender<UploadEvent>,
}

/// 管理器句柄 - 包含管理器和工作者任务
pub struct UploadManagerHandle {
    pub manager: UploadManager,
    pub worker_handle: JoinHandle<()>,
}

impl UploadManagerHandle {
    /// 释放所有句柄并等待工作者退出
    pub async fn shutdown(self) -> Result<()> {
        drop(self.manager);
        self.worker_handle.await
            .map_err(|err| QueueError::InternalError(format!("Worker panic: {}", err)))
    }
}

/// 管理器装配器
pub struct UploadManagerBuilder {
    config: UploadConfig,
    backend: Option<Dependency<Arc<dyn TransferBackend>>>,
    notifier: Arc<dyn NotificationSink>,
    history: Option<Arc<dyn HistoryStore>>,
}

impl UploadManagerBuilder {
    pub fn new() -> Self {
        Self {
            config: UploadConfig::default(),
            backend: None,
            notifier: Arc::new(LogSink),
            history: None,
        }
    }

    pub fn config(mut self, config: UploadConfig) -> Self {
        self.config = config;
        self
    }

    /// 已就绪的传输后端
    pub fn backend(mut self, backend: Arc<dyn TransferBackend>) -> Self {
        self.backend = Some(Dependency::ready(backend));
        self
    }

    /// 延迟绑定的传输后端（可能还在探测中）
    pub fn backend_dependency(mut self, backend: Dependency<Arc<dyn TransferBackend>>) -> Self {
        self.backend = Some(backend);
        self
    }

    pub fn notifier(mut self, notifier: Arc<dyn NotificationSink>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn history(mut self, history: Arc<dyn HistoryStore>) -> Self {
        self.history = Some(history);
        self
    }

    pub fn build(self) -> UploadManagerHandle {
        // 未配置后端时视为始终未就绪，start 会以 BackendUnavailable 失败
        let backend = self.backend.unwrap_or_else(Dependency::probing);

        UploadManager::spawn(backend, self.config, self.notifier, self.history)
    }
}

impl Default for UploadManagerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl UploadManager {
    pub fn builder() -> UploadManagerBuilder {
        UploadManagerBuilder::new()
    }

    /// 用默认通知端（日志）创建管理器
    pub fn new(
        backend: Dependency<Arc<dyn TransferBackend>>,
        config: UploadConfig,
    ) -> UploadManagerHandle {
        Self::spawn(backend, config, Arc::new(LogSink), None)
    }

    fn spawn(
        backend: Dependency<Arc<dyn TransferBackend>>,
        config: UploadConfig,
        notifier: Arc<dyn NotificationSink>,
        history: Option<Arc<dyn HistoryStore>>,
    ) -> UploadManagerHandle {
        let (command_tx, command_rx) = mpsc::channel(100);
        // 最大缓存 256 个事件
        let (event_tx, _) = broadcast::channel(256);

        let worker_handle = tokio::spawn(QueueWorker::run(
            backend,
            config,
            notifier,
            history,
            command_rx,
            event_tx.clone(),
        ));

        let manager = Self {
            command_tx,
            event_tx,
        };

        UploadManagerHandle {
            manager,
            worker_handle,
        }
    }

    /// 校验并入队一批文件
    ///
    /// 整批数量超过 `constraints.max_files` 时全部拒绝；单个文件不合规
    /// 只影响它自己。开启 auto_upload 时接受的任务会立即开始
    pub async fn enqueue(
        &self,
        files: Vec<SelectedFile>,
        constraints: Constraints,
    ) -> Result<EnqueueReport> {
        let (reply_tx, reply_rx) = oneshot::channel();

        self.command_tx
            .send(ManagerCommand::Enqueue {
                files,
                constraints,
                reply: reply_tx,
            })
            .await
            .map_err(|_| QueueError::internal_error("Manager shut down"))?;

        // 等待响应
        reply_rx
            .await
            .map_err(|err| QueueError::internal_error(err.to_string()))?
    }

    /// 开始上传任务
    ///
    /// 任务不存在或不在可开始状态（pending/error）时是空操作
    pub async fn start(&self, id: UploadId) -> Result<()> {
        let (reply_tx, reply_rx) = oneshot::channel();

        self.command_tx
            .send(ManagerCommand::Start { id, reply: reply_tx })
            .await
            .map_err(|_| QueueError::internal_error("Manager shut down"))?;

        reply_rx
            .await
            .map_err(|err| QueueError::internal_error(err.to_string()))?
    }

    /// 重试失败的任务，等价于 start，每次都是独立的新尝试
    pub async fn retry(&self, id: UploadId) -> Result<()> {
        self.start(id).await
    }

    /// 开始所有等待中和失败的任务，返回实际开始的数量
    pub async fn start_all(&self) -> Result<usize> {
        let (reply_tx, reply_rx) = oneshot::channel();

        self.command_tx
            .send(ManagerCommand::StartAll { reply: reply_tx })
            .await
            .map_err(|_| QueueError::internal_error("Manager shut down"))?;

        reply_rx
            .await
            .map_err(|err| QueueError::internal_error(err.to_string()))?
    }

    /// 移除任务，任何状态都允许
    ///
    /// 上传中的任务被移除后，传输本身不会中止，但结果会被丢弃
    pub async fn remove(&self, id: UploadId) -> Result<()> {
        let (reply_tx, reply_rx) = oneshot::channel();

        self.command_tx
            .send(ManagerCommand::Remove { id, reply: reply_tx })
            .await
            .map_err(|_| QueueError::internal_error("Manager shut down"))?;

        reply_rx
            .await
            .map_err(|err| QueueError::internal_error(err.to_string()))?
    }

    /// 清空队列，需要调用方先拿到用户确认
    pub async fn clear_all(&self, confirmation: ClearConfirmation) -> Result<usize> {
        let (reply_tx, reply_rx) = oneshot::channel();

        self.command_tx
            .send(ManagerCommand::ClearAll {
                confirmation,
                reply: reply_tx,
            })
            .await
            .map_err(|_| QueueError::internal_error("Manager shut down"))?;

        reply_rx
            .await
            .map_err(|err| QueueError::internal_error(err.to_string()))?
    }

    /// 当前各状态的任务计数
    pub async fn stats(&self) -> Result<QueueStats> {
        let (reply_tx, reply_rx) = oneshot::channel();

        self.command_tx
            .send(ManagerCommand::Stats { reply: reply_tx })
            .await
            .map_err(|_| QueueError::internal_error("Manager shut down"))?;

        reply_rx
            .await
            .map_err(|err| QueueError::internal_error(err.to_string()))
    }

    /// 获取任务快照
    pub async fn get_task(&self, id: UploadId) -> Result<Option<UploadTask>> {
        let (reply_tx, reply_rx) = oneshot::channel();

        self.command_tx
            .send(ManagerCommand::GetTask { id, reply: reply_tx })
            .await
            .map_err(|_| QueueError::internal_error("Manager shut down"))?;

        let task = reply_rx
            .await
            .map_err(|err| QueueError::internal_error(err.to_string()))?;

        Ok(task)
    }

    /// 获取所有任务快照，按提交顺序
    pub async fn all_tasks(&self) -> Result<Vec<UploadTask>> {
        let (reply_tx, reply_rx) = oneshot::channel();

        self.command_tx
            .send(ManagerCommand::GetAllTasks { reply: reply_tx })
            .await
            .map_err(|_| QueueError::internal_error("Manager shut down"))?;

        let tasks = reply_rx
            .await
            .map_err(|err| QueueError::internal_error(err.to_string()))?;

        Ok(tasks)
    }

    /// 订阅事件
    ///
    /// 注意：
    /// - 如果接收速度跟不上发送速度，可能会丢失事件（lagged error）
    /// - 每个订阅者都会收到完整的事件副本
    /// - 订阅者应该尽快处理事件，避免阻塞
    pub fn subscribe_events(&self) -> broadcast::Receiver<UploadEvent> {
        self.event_tx.subscribe()
    }

    pub fn subscribe_filtered<F>(&self, filter: F) -> FilteredEventReceiver<F>
    where
        F: Fn(&UploadEvent) -> bool,
    {
        FilteredEventReceiver {
            receiver: self.event_tx.subscribe(),
            filter,
        }
    }
}

/// 过滤的事件接收器
pub struct FilteredEventReceiver<F> {
    receiver: broadcast::Receiver<UploadEvent>,
    filter: F,
}

impl<F> FilteredEventReceiver<F>
where
    F: Fn(&UploadEvent) -> bool,
{
    pub async fn recv(&mut self) -> Result<UploadEvent, broadcast::error::RecvError> {
        loop {
            let event = self.receiver.recv().await?;
            if (self.filter)(&event) {
                return Ok(event);
            }
        }
    }
}
