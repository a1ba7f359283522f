use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use crate::errors::TransferError;
use crate::queue::UploadTask;

mod remote;
mod simulated;

pub use remote::{RemoteBackend, RemoteBackendConfig};
pub use simulated::{SimulatedBackend, SimulatedOutcome};

/// 传输回执，成功上传后由后端返回
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TransferReceipt {
    /// 持久化后的远端地址
    pub url: String,
    pub uploaded_at: DateTime<Utc>,
    pub size: u64,
    pub mime_type: String,
}

/// 真正搬运字节的传输后端
///
/// 队列对后端的失败没有假设：拒绝原因会原样展示给用户。
/// 超时控制由后端自己负责，队列不额外施加
#[async_trait]
pub trait TransferBackend: Send + Sync {
    async fn transfer(&self, task: &UploadTask) -> Result<TransferReceipt, TransferError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    // 回执的线上格式，字段名和服务端约定一致
    #[test]
    fn test_receipt_parses_service_response() {
        let json = r#"{
            "url": "https://example.com/uploads/8f14e45f",
            "uploaded_at": "2025-06-01T12:00:00Z",
            "size": 1024,
            "mime_type": "image/png"
        }"#;

        let receipt: TransferReceipt = serde_json::from_str(json).unwrap();

        assert_eq!(receipt.url, "https://example.com/uploads/8f14e45f");
        assert_eq!(receipt.size, 1024);
        assert_eq!(receipt.mime_type, "image/png");
        assert_eq!(receipt.uploaded_at.to_rfc3339(), "2025-06-01T12:00:00+00:00");
    }
}
