use std::time::Duration;
use async_trait::async_trait;
use base64::Engine;
use base64::prelude::BASE64_STANDARD;
use reqwest::header::{HeaderValue, CONTENT_LENGTH, CONTENT_TYPE};
use reqwest::{Client, StatusCode};
use tokio::fs::File;
use tokio_util::io::ReaderStream;
use url::Url;
use crate::config::{ConfigSource, PersistedConfig};
use crate::errors::{QueueError, Result, TransferError};
use crate::history::{HistoryStore, UploadRecord};
use crate::queue::UploadTask;
use crate::selection::SourceHandle;
use super::{TransferBackend, TransferReceipt};

/// 携带文件元数据的请求头，值为 "key base64(value)" 列表
const METADATA_HEADER: &str = "Upload-Metadata";

/// 流式读文件的缓冲大小
const STREAM_CAPACITY: usize = 64 * 1024;

#[derive(Debug, Clone)]
pub struct RemoteBackendConfig {
    pub endpoint: String,

    /// 单次请求的整体超时
    pub timeout: Duration,
}

impl Default for RemoteBackendConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            timeout: Duration::from_secs(30),
        }
    }
}

/// 远端传输后端
///
/// 同一个服务托管三类记录：`files`（上传内容）、`config`（配置记录）、
/// `history`（上传历史），所以这里同时实现 [`TransferBackend`]、
/// [`ConfigSource`] 和 [`HistoryStore`]
#[derive(Debug, Clone)]
pub struct RemoteBackend {
    client: Client,
    base: Url,
}

impl RemoteBackend {
    pub fn new(endpoint: &str) -> Result<Self> {
        Self::with_config(RemoteBackendConfig {
            endpoint: endpoint.to_string(),
            ..Default::default()
        })
    }

    pub fn with_config(config: RemoteBackendConfig) -> Result<Self> {
        let base = Url::parse(&config.endpoint)
            .map_err(|_| QueueError::param_error(format!("Invalid url: {:?}", config.endpoint)))?;

        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|err| QueueError::internal_error(format!("Failed to build HTTP client: {}", err)))?;

        Ok(Self { client, base })
    }

    fn route(&self, segment: &str) -> String {
        format!("{}/{}", self.base.as_str().trim_end_matches('/'), segment)
    }

    /// 文件名走 base64，避免非 ASCII 名字撑坏请求头
    fn metadata_header(task: &UploadTask) -> String {
        format!("filename {}", BASE64_STANDARD.encode(&task.name))
    }

    async fn body_for(task: &UploadTask) -> Result<reqwest::Body, TransferError> {
        match &task.source {
            SourceHandle::Memory(bytes) => Ok(reqwest::Body::from(bytes.clone())),
            SourceHandle::Path(path) => {
                let file = File::open(path).await?;
                let stream = ReaderStream::with_capacity(file, STREAM_CAPACITY);
                Ok(reqwest::Body::wrap_stream(stream))
            }
        }
    }
}

#[async_trait]
impl TransferBackend for RemoteBackend {
    async fn transfer(&self, task: &UploadTask) -> Result<TransferReceipt, TransferError> {
        let body = Self::body_for(task).await?;

        let response = self.client
            .post(self.route("files"))
            .header(CONTENT_TYPE, HeaderValue::from_str(&task.mime_type)?)
            .header(CONTENT_LENGTH, HeaderValue::from_str(&task.size.to_string())?)
            .header(METADATA_HEADER, HeaderValue::from_str(&Self::metadata_header(task))?)
            .body(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransferError::server_error(status.as_u16(), "Upload request failed"));
        }

        let receipt = response.json::<TransferReceipt>().await?;

        Ok(receipt)
    }
}

#[async_trait]
impl ConfigSource for RemoteBackend {
    async fn fetch_config(&self) -> anyhow::Result<Option<PersistedConfig>> {
        let response = self.client.get(self.route("config")).send().await?;

        // 没有配置记录不是错误
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        if !response.status().is_success() {
            anyhow::bail!("config request failed with status {}", response.status());
        }

        Ok(Some(response.json().await?))
    }
}

#[async_trait]
impl HistoryStore for RemoteBackend {
    async fn append(&self, record: UploadRecord) -> anyhow::Result<()> {
        let response = self.client
            .post(self.route("history"))
            .json(&record)
            .send()
            .await?;

        if !response.status().is_success() {
            anyhow::bail!("history append failed with status {}", response.status());
        }

        Ok(())
    }

    async fn recent(&self, limit: usize) -> anyhow::Result<Vec<UploadRecord>> {
        let response = self.client
            .get(self.route("history"))
            .query(&[("limit", limit)])
            .send()
            .await?;

        if !response.status().is_success() {
            anyhow::bail!("history fetch failed with status {}", response.status());
        }

        Ok(response.json().await?)
    }
}
