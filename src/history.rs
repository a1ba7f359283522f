use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use crate::queue::types::{UploadId, UploadState};

/// 默认查询条数
pub const DEFAULT_HISTORY_LIMIT: usize = 50;

/// 一条上传历史
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UploadRecord {
    pub upload_id: UploadId,
    pub file_name: String,
    pub file_size: u64,
    pub mime_type: String,
    /// 成功时的远端地址
    pub remote_url: Option<String>,
    /// 终态，Success 或 Error
    pub status: UploadState,
    pub uploaded_at: DateTime<Utc>,
}

/// 上传历史存储
///
/// 记录是尽力而为的：写入失败只会被记进日志，不影响队列
#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// 追加一条记录
    async fn append(&self, record: UploadRecord) -> anyhow::Result<()>;

    /// 最近的记录，按时间从新到旧
    async fn recent(&self, limit: usize) -> anyhow::Result<Vec<UploadRecord>>;
}

/// 内存实现
#[derive(Debug, Default)]
pub struct MemoryHistory {
    records: Mutex<Vec<UploadRecord>>,
}

impl MemoryHistory {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl HistoryStore for MemoryHistory {
    async fn append(&self, record: UploadRecord) -> anyhow::Result<()> {
        self.records.lock().await.push(record);
        Ok(())
    }

    async fn recent(&self, limit: usize) -> anyhow::Result<Vec<UploadRecord>> {
        let records = self.records.lock().await;

        // 追加顺序即时间顺序，倒着取就是从新到旧
        Ok(records.iter().rev().take(limit).cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(name: &str) -> UploadRecord {
        UploadRecord {
            upload_id: UploadId::new(),
            file_name: name.to_string(),
            file_size: 128,
            mime_type: "text/plain".to_string(),
            remote_url: Some(format!("https://example.com/uploads/{}", name)),
            status: UploadState::Success,
            uploaded_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_recent_is_newest_first() {
        let history = MemoryHistory::new();

        history.append(record("a.txt")).await.unwrap();
        history.append(record("b.txt")).await.unwrap();
        history.append(record("c.txt")).await.unwrap();

        let recent = history.recent(DEFAULT_HISTORY_LIMIT).await.unwrap();
        let names: Vec<_> = recent.iter().map(|r| r.file_name.as_str()).collect();

        assert_eq!(names, ["c.txt", "b.txt", "a.txt"]);
    }

    #[tokio::test]
    async fn test_recent_respects_limit() {
        let history = MemoryHistory::new();

        for i in 0..5 {
            history.append(record(&format!("{}.txt", i))).await.unwrap();
        }

        let recent = history.recent(2).await.unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].file_name, "4.txt");
    }
}
