use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{broadcast, mpsc};
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use crate::acquire::Dependency;
use crate::backend::{TransferBackend, TransferReceipt};
use crate::config::UploadConfig;
use crate::errors::{QueueError, Result, TransferError};
use crate::history::{HistoryStore, UploadRecord};
use crate::notify::{NoticeKind, NotificationSink};
use crate::selection::{Constraints, RejectedFile, SelectedFile};
use crate::utils::{estimate_progress, estimate_rate};
use super::task::UploadTask;
use super::types::{
    ClearConfirmation, EnqueueReport, ManagerCommand, QueueStats, UploadEvent, UploadId,
    UploadState,
};

struct TaskHandle {
    task: UploadTask,
    /// 当前尝试的序号，过期尝试发来的事件按此丢弃
    attempt: u64,
    estimator_token: Option<CancellationToken>,
}

/// 一次上传尝试发回的内部事件
enum AttemptEvent {
    /// 估算器 tick
    Tick {
        id: UploadId,
        attempt: u64,
        progress: f64,
        transfer_rate: f64,
    },

    /// 真实传输有了结果
    Finished {
        id: UploadId,
        attempt: u64,
        outcome: Result<TransferReceipt, TransferError>,
    },
}

/// 队列工作者 - 唯一持有任务集合的 actor
///
/// 命令串行处理；每个任务的传输和进度估算跑在独立的 spawn 里，
/// 只通过内部通道把结果送回来，不直接碰集合
pub(crate) struct QueueWorker {
    backend: Dependency<Arc<dyn TransferBackend>>,
    config: UploadConfig,
    notifier: Arc<dyn NotificationSink>,
    history: Option<Arc<dyn HistoryStore>>,
    tasks: HashMap<UploadId, TaskHandle>,
    /// 提交顺序
    order: Vec<UploadId>,

    event_tx: broadcast::Sender<UploadEvent>,
    attempt_tx: mpsc::UnboundedSender<AttemptEvent>,
    attempt_rx: mpsc::UnboundedReceiver<AttemptEvent>,
}

impl QueueWorker {
    pub(crate) async fn run(
        backend: Dependency<Arc<dyn TransferBackend>>,
        config: UploadConfig,
        notifier: Arc<dyn NotificationSink>,
        history: Option<Arc<dyn HistoryStore>>,
        mut command_rx: mpsc::Receiver<ManagerCommand>,
        event_tx: broadcast::Sender<UploadEvent>,
    ) {
        let (attempt_tx, attempt_rx) = mpsc::unbounded_channel();
        let mut worker = Self {
            backend,
            config,
            notifier,
            history,
            tasks: HashMap::new(),
            order: Vec::new(),
            event_tx,
            attempt_tx,
            attempt_rx,
        };

        // 主事件循环：命令和尝试事件二选一，串行应用
        loop {
            tokio::select! {
                command = command_rx.recv() => {
                    match command {
                        Some(command) => worker.handle_command(command).await,
                        // 所有管理器句柄都已释放
                        None => break,
                    }
                }
                Some(event) = worker.attempt_rx.recv() => {
                    worker.handle_attempt_event(event);
                }
            }
        }

        tracing::debug!("queue worker exited");
    }

    async fn handle_command(&mut self, command: ManagerCommand) {
        match command {
            ManagerCommand::Enqueue { files, constraints, reply } => {
                let result = self.enqueue(files, constraints).await;
                let _ = reply.send(result);
            }
            ManagerCommand::Start { id, reply } => {
                let result = self.start(id).await;
                let _ = reply.send(result);
            }
            ManagerCommand::StartAll { reply } => {
                let result = self.start_all().await;
                let _ = reply.send(result);
            }
            ManagerCommand::Remove { id, reply } => {
                let result = self.remove(id);
                let _ = reply.send(result);
            }
            ManagerCommand::ClearAll { confirmation, reply } => {
                let result = self.clear_all(confirmation);
                let _ = reply.send(result);
            }
            ManagerCommand::Stats { reply } => {
                let _ = reply.send(self.stats());
            }
            ManagerCommand::GetTask { id, reply } => {
                let task = self.tasks
                    .get(&id)
                    .map(|handle| handle.task.clone());
                let _ = reply.send(task);
            }
            ManagerCommand::GetAllTasks { reply } => {
                let tasks: Vec<_> = self.order
                    .iter()
                    .filter_map(|id| self.tasks.get(id))
                    .map(|handle| handle.task.clone())
                    .collect();
                let _ = reply.send(tasks);
            }
        }
    }

    async fn enqueue(
        &mut self,
        files: Vec<SelectedFile>,
        constraints: Constraints,
    ) -> Result<EnqueueReport> {
        if files.is_empty() {
            return Ok(EnqueueReport::default());
        }

        // 整批超数直接拒绝，一个任务都不建
        if files.len() > constraints.max_files {
            let message = format!("Maximum {} files allowed", constraints.max_files);
            self.notifier.notify(NoticeKind::Error, &message);

            return Err(QueueError::TooManyFiles {
                given: files.len(),
                limit: constraints.max_files,
            });
        }

        let mut report = EnqueueReport::default();

        for file in files {
            match constraints.check(&file) {
                Ok(()) => {
                    let task = UploadTask::new(file);
                    let id = task.id;

                    tracing::debug!(%id, name = %task.name, size = task.size, "task enqueued");

                    self.order.push(id);
                    self.tasks.insert(id, TaskHandle {
                        task,
                        attempt: 0,
                        estimator_token: None,
                    });

                    let _ = self.event_tx.send(UploadEvent::TaskAdded { id });
                    report.accepted.push(id);
                }
                Err(reason) => {
                    let rejected = RejectedFile { name: file.name, reason };
                    self.notifier.notify(NoticeKind::Error, &rejected.to_string());
                    report.rejected.push(rejected);
                }
            }
        }

        if !report.accepted.is_empty() {
            let count = report.accepted.len();
            let message = format!("{} file{} added to queue", count, plural(count));
            self.notifier.notify(NoticeKind::Success, &message);

            if self.config.auto_upload {
                for id in report.accepted.clone() {
                    // 入队本身已经成功，自动开始失败只记日志
                    if let Err(err) = self.start(id).await {
                        tracing::warn!(%id, %err, "auto upload could not start");
                    }
                }
            }
        }

        Ok(report)
    }

    async fn start(&mut self, id: UploadId) -> Result<()> {
        // 后端未就绪时本次操作直接失败，任务保持原状
        let backend = self.backend.get().await.ok_or(QueueError::BackendUnavailable)?;

        let handle = match self.tasks.get_mut(&id) {
            Some(handle) => handle,
            // 不存在的任务是空操作
            None => return Ok(()),
        };

        // 只有 pending/error 可以开始，其余状态幂等忽略
        if !handle.task.state.can_start() {
            return Ok(());
        }

        let old_state = handle.task.state;
        handle.attempt += 1;
        handle.task.state = UploadState::Uploading;
        handle.task.progress = 0.0;
        handle.task.transfer_rate = 0.0;
        handle.task.error = None;

        let attempt = handle.attempt;
        let task = handle.task.clone();

        let estimator_token = CancellationToken::new();
        handle.estimator_token = Some(estimator_token.clone());

        tracing::debug!(%id, attempt, "upload started");
        self.emit_state_change(id, old_state, UploadState::Uploading);

        self.spawn_estimator(id, attempt, task.size, estimator_token);
        self.spawn_transfer(backend, task, attempt);

        Ok(())
    }

    /// 估算进度：按经过时间周期性推进，封顶 95，真实结果到达时被取消
    fn spawn_estimator(
        &self,
        id: UploadId,
        attempt: u64,
        size: u64,
        token: CancellationToken,
    ) {
        let attempt_tx = self.attempt_tx.clone();
        let tick_interval = self.config.progress_interval;
        let expected = self.config.estimated_duration;

        tokio::spawn(async move {
            let started = Instant::now();
            let mut ticker = interval(tick_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            // interval 的第一次 tick 立即完成，消耗掉，让进度从一个完整间隔后开始
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {
                        let elapsed = started.elapsed();
                        let progress = estimate_progress(elapsed, expected);
                        let transfer_rate = estimate_rate(size, progress, elapsed);

                        let event = AttemptEvent::Tick { id, attempt, progress, transfer_rate };
                        if attempt_tx.send(event).is_err() {
                            break;
                        }
                    }
                }
            }
        });
    }

    /// 真实传输，结果送回主循环；工作者已退出时结果被丢弃
    fn spawn_transfer(&self, backend: Arc<dyn TransferBackend>, task: UploadTask, attempt: u64) {
        let attempt_tx = self.attempt_tx.clone();
        let id = task.id;

        tokio::spawn(async move {
            let outcome = backend.transfer(&task).await;
            let _ = attempt_tx.send(AttemptEvent::Finished { id, attempt, outcome });
        });
    }

    fn handle_attempt_event(&mut self, event: AttemptEvent) {
        match event {
            AttemptEvent::Tick { id, attempt, progress, transfer_rate } => {
                let handle = match self.tasks.get_mut(&id) {
                    Some(handle) => handle,
                    // 任务已移除，丢弃
                    None => return,
                };

                // 过期尝试或已不在上传中的 tick 直接丢弃
                if handle.attempt != attempt || handle.task.state != UploadState::Uploading {
                    return;
                }

                handle.task.progress = progress;
                handle.task.transfer_rate = transfer_rate;

                let _ = self.event_tx.send(UploadEvent::Progress { id, progress, transfer_rate });
            }
            AttemptEvent::Finished { id, attempt, outcome } => {
                let handle = match self.tasks.get_mut(&id) {
                    Some(handle) => handle,
                    None => {
                        // 上传中被移除：按约定丢弃真实传输的结果
                        tracing::debug!(%id, "transfer finished for a removed task, discarding");
                        return;
                    }
                };

                if handle.attempt != attempt || handle.task.state != UploadState::Uploading {
                    tracing::debug!(%id, attempt, "stale transfer result, discarding");
                    return;
                }

                // 真实结果到达，估算器立即停止
                if let Some(token) = handle.estimator_token.take() {
                    token.cancel();
                }

                match outcome {
                    Ok(receipt) => {
                        handle.task.state = UploadState::Success;
                        handle.task.progress = 100.0;
                        handle.task.transfer_rate = 0.0;
                        handle.task.completed_at = Some(chrono::Utc::now());
                        handle.task.remote_url = Some(receipt.url.clone());

                        let task = handle.task.clone();
                        tracing::info!(%id, name = %task.name, url = %receipt.url, "upload completed");

                        self.emit_state_change(id, UploadState::Uploading, UploadState::Success);
                        let _ = self.event_tx.send(UploadEvent::Completed { id, url: receipt.url });
                        self.notifier.notify(
                            NoticeKind::Success,
                            &format!("{} uploaded successfully!", task.name),
                        );
                        self.record_history(&task);
                    }
                    Err(err) => {
                        let message = err.to_string();
                        handle.task.state = UploadState::Error;
                        handle.task.progress = 0.0;
                        handle.task.transfer_rate = 0.0;
                        handle.task.error = Some(message.clone());

                        let task = handle.task.clone();
                        tracing::warn!(%id, name = %task.name, error = %message, "upload failed");

                        self.emit_state_change(id, UploadState::Uploading, UploadState::Error);
                        let _ = self.event_tx.send(UploadEvent::Failed { id, error: message });
                        self.notifier.notify(
                            NoticeKind::Error,
                            &format!("Failed to upload {}", task.name),
                        );
                        self.record_history(&task);
                    }
                }
            }
        }
    }

    async fn start_all(&mut self) -> Result<usize> {
        // 后端闸门统一检查一次，之后的逐个 start 不会再失败
        if self.backend.get().await.is_none() {
            return Err(QueueError::BackendUnavailable);
        }

        let eligible: Vec<UploadId> = self.order
            .iter()
            .filter(|id| {
                self.tasks
                    .get(id)
                    .map(|handle| handle.task.state.can_start())
                    .unwrap_or(false)
            })
            .copied()
            .collect();

        if eligible.is_empty() {
            self.notifier.notify(NoticeKind::Info, "No files to upload");
            return Ok(0);
        }

        let count = eligible.len();
        let message = format!("Starting upload for {} file{}", count, plural(count));
        self.notifier.notify(NoticeKind::Info, &message);

        for id in eligible {
            if let Err(err) = self.start(id).await {
                tracing::warn!(%id, %err, "failed to start upload");
            }
        }

        Ok(count)
    }

    fn remove(&mut self, id: UploadId) -> Result<()> {
        let mut handle = match self.tasks.remove(&id) {
            Some(handle) => handle,
            // 不存在视为已经移除
            None => return Ok(()),
        };

        self.order.retain(|other| *other != id);

        // 上传中移除：估算器立刻停掉，传输照常跑完但结果会被丢弃
        if let Some(token) = handle.estimator_token.take() {
            token.cancel();
        }

        tracing::debug!(%id, name = %handle.task.name, "task removed");

        let _ = self.event_tx.send(UploadEvent::TaskRemoved { id });
        self.notifier.notify(NoticeKind::Info, "File removed from queue");

        Ok(())
    }

    fn clear_all(&mut self, confirmation: ClearConfirmation) -> Result<usize> {
        // 未确认时静默放弃
        if confirmation != ClearConfirmation::Confirmed {
            return Ok(0);
        }

        if self.tasks.is_empty() {
            return Ok(0);
        }

        let removed = self.tasks.len();

        for (_, mut handle) in self.tasks.drain() {
            if let Some(token) = handle.estimator_token.take() {
                token.cancel();
            }
        }
        self.order.clear();

        tracing::debug!(removed, "queue cleared");

        let _ = self.event_tx.send(UploadEvent::Cleared { removed });
        self.notifier.notify(NoticeKind::Info, "All files removed");

        Ok(removed)
    }

    fn stats(&self) -> QueueStats {
        let mut stats = QueueStats::default();

        for handle in self.tasks.values() {
            stats.total += 1;
            match handle.task.state {
                UploadState::Pending => stats.pending += 1,
                UploadState::Uploading => stats.uploading += 1,
                UploadState::Success => stats.success += 1,
                UploadState::Error => stats.error += 1,
            }
        }

        stats
    }

    fn emit_state_change(&self, id: UploadId, old_state: UploadState, new_state: UploadState) {
        let _ = self.event_tx.send(UploadEvent::StateChanged {
            id,
            old_state,
            new_state,
        });
    }

    /// 终态写进历史，尽力而为：失败只记日志，不影响队列
    fn record_history(&self, task: &UploadTask) {
        let history = match &self.history {
            Some(history) => history.clone(),
            None => return,
        };

        let record = UploadRecord {
            upload_id: task.id,
            file_name: task.name.clone(),
            file_size: task.size,
            mime_type: task.mime_type.clone(),
            remote_url: task.remote_url.clone(),
            status: task.state,
            uploaded_at: task.completed_at.unwrap_or_else(chrono::Utc::now),
        };

        tokio::spawn(async move {
            if let Err(err) = history.append(record).await {
                tracing::warn!(%err, "failed to record upload history");
            }
        });
    }
}

fn plural(count: usize) -> &'static str {
    if count > 1 { "s" } else { "" }
}
