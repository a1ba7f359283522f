use std::sync::Arc;
use std::time::Duration;
use chute::utils::format_speed;
use chute::{
    AcquireConfig, AcquirePhase, Constraints, Dependency, HistoryStore, MemoryHistory,
    SelectedFile, SimulatedBackend, TransferBackend, UploadConfig, UploadEvent, UploadManager,
};

/// 演示：把几个内存文件丢进队列，打印事件直到全部结束
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = UploadConfig::from_file("chute.toml");
    let constraints = Constraints::from_config(&config)
        .allow_types(["image/*", "application/pdf", "text/*"]);

    // 后端延迟绑定，按固定间隔探测
    let backend = Dependency::acquire_with(
        AcquireConfig {
            max_attempts: 5,
            interval: Duration::from_millis(100),
        },
        || async {
            let backend: Arc<dyn TransferBackend> =
                Arc::new(SimulatedBackend::new(Duration::from_millis(800)));
            Some(backend)
        },
    );

    let history = Arc::new(MemoryHistory::new());
    let handle = UploadManager::builder()
        .config(config)
        .backend_dependency(backend.clone())
        .history(history.clone())
        .build();
    let manager = &handle.manager;

    // 等探测出结果再入队，否则自动开始会因后端未就绪而失败
    while backend.phase().await == AcquirePhase::Probing {
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    if backend.phase().await == AcquirePhase::Failed {
        anyhow::bail!("transfer backend unavailable");
    }

    let mut events = manager.subscribe_events();

    let files = vec![
        SelectedFile::from_bytes("report.pdf", "application/pdf", vec![0u8; 48 * 1024]),
        SelectedFile::from_bytes("notes.txt", "text/plain", vec![0u8; 2 * 1024]),
        SelectedFile::from_bytes("photo.png", "image/png", vec![0u8; 640 * 1024])
            .with_preview(vec![0u8; 128]),
    ];
    let expected = files.len();

    let report = manager.enqueue(files, constraints).await?;
    tracing::info!(accepted = report.accepted.len(), "files enqueued");

    // 打印事件直到所有任务到达终态
    let mut finished = 0;
    while finished < expected {
        match tokio::time::timeout(Duration::from_secs(10), events.recv()).await {
            Ok(Ok(event)) => match &event {
                UploadEvent::Progress { id, progress, transfer_rate } => {
                    tracing::info!(
                        %id,
                        progress = %format!("{:.0}%", progress),
                        rate = %format_speed(*transfer_rate),
                        "uploading"
                    );
                }
                UploadEvent::Completed { id, url } => {
                    tracing::info!(%id, %url, "completed");
                    finished += 1;
                }
                UploadEvent::Failed { id, error } => {
                    tracing::warn!(%id, %error, "failed");
                    finished += 1;
                }
                other => tracing::debug!(?other, "event"),
            },
            Ok(Err(_)) | Err(_) => break,
        }
    }

    let stats = manager.stats().await?;
    tracing::info!(
        total = stats.total,
        success = stats.success,
        error = stats.error,
        "queue finished"
    );

    for record in history.recent(10).await? {
        tracing::info!(name = %record.file_name, status = ?record.status, "history");
    }

    handle.shutdown().await?;

    Ok(())
}
