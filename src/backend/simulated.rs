use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use async_trait::async_trait;
use crate::errors::TransferError;
use crate::queue::UploadTask;
use super::{TransferBackend, TransferReceipt};

/// 模拟后端每次传输的结局
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimulatedOutcome {
    /// 总是成功
    Succeed,
    /// 总是拒绝
    Reject,
    /// 前 N 次拒绝，之后成功
    FailFirst(u32),
}

/// 模拟传输后端 - 固定延迟加可配置的确定性结局
///
/// 用于测试和演示，不产生任何网络流量
pub struct SimulatedBackend {
    delay: Duration,
    outcome: SimulatedOutcome,
    attempt_count: AtomicU32,
}

impl SimulatedBackend {
    pub fn new(delay: Duration) -> Self {
        Self::with_outcome(delay, SimulatedOutcome::Succeed)
    }

    pub fn with_outcome(delay: Duration, outcome: SimulatedOutcome) -> Self {
        Self {
            delay,
            outcome,
            attempt_count: AtomicU32::new(0),
        }
    }

    /// 到目前为止的传输次数
    pub fn attempts(&self) -> u32 {
        self.attempt_count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TransferBackend for SimulatedBackend {
    async fn transfer(&self, task: &UploadTask) -> Result<TransferReceipt, TransferError> {
        let attempt = self.attempt_count.fetch_add(1, Ordering::SeqCst);

        // 模拟传输耗时
        tokio::time::sleep(self.delay).await;

        let rejected = match self.outcome {
            SimulatedOutcome::Succeed => false,
            SimulatedOutcome::Reject => true,
            SimulatedOutcome::FailFirst(n) => attempt < n,
        };

        if rejected {
            return Err(TransferError::rejected("Network error - please try again"));
        }

        Ok(TransferReceipt {
            url: format!("https://example.com/uploads/{}", task.id),
            uploaded_at: chrono::Utc::now(),
            size: task.size,
            mime_type: task.mime_type.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::selection::SelectedFile;
    use crate::queue::UploadTask;

    fn task() -> UploadTask {
        UploadTask::new(SelectedFile::from_bytes("a.txt", "text/plain", vec![0u8; 64]))
    }

    #[tokio::test]
    async fn test_succeed_returns_receipt() {
        let backend = SimulatedBackend::new(Duration::ZERO);
        let task = task();

        let receipt = backend.transfer(&task).await.unwrap();

        assert_eq!(receipt.url, format!("https://example.com/uploads/{}", task.id));
        assert_eq!(receipt.size, 64);
        assert_eq!(receipt.mime_type, "text/plain");
        assert_eq!(backend.attempts(), 1);
    }

    #[tokio::test]
    async fn test_reject_has_user_facing_message() {
        let backend = SimulatedBackend::with_outcome(Duration::ZERO, SimulatedOutcome::Reject);

        let err = backend.transfer(&task()).await.unwrap_err();
        assert_eq!(err.to_string(), "Network error - please try again");
    }

    #[tokio::test]
    async fn test_fail_first_then_succeed() {
        let backend = SimulatedBackend::with_outcome(Duration::ZERO, SimulatedOutcome::FailFirst(2));
        let task = task();

        assert!(backend.transfer(&task).await.is_err());
        assert!(backend.transfer(&task).await.is_err());
        assert!(backend.transfer(&task).await.is_ok());
        assert_eq!(backend.attempts(), 3);
    }
}
