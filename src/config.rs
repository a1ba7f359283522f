use std::path::Path;
use std::time::Duration;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// 默认单个文件大小上限（10MB）
pub const DEFAULT_MAX_FILE_SIZE: u64 = 10 * 1024 * 1024;

/// 默认单批最多文件数
pub const DEFAULT_MAX_FILES: usize = 10;

/// 上传队列配置
#[derive(Debug, Clone)]
pub struct UploadConfig {
    /// 单个文件大小上限（字节）
    pub max_file_size: u64,

    /// 单批最多文件数
    pub max_files: usize,

    /// 接受后是否自动开始上传
    pub auto_upload: bool,

    /// 进度估算的更新间隔
    pub progress_interval: Duration,

    /// 进度估算按这个时长推进到上限
    pub estimated_duration: Duration,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            max_files: DEFAULT_MAX_FILES,
            auto_upload: true,
            progress_interval: Duration::from_millis(100),
            estimated_duration: Duration::from_secs(3),
        }
    }
}

/// 持久化的配置子集（TOML 文件或远端配置记录）
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct PersistedConfig {
    pub max_file_size: Option<u64>,
    pub max_files: Option<usize>,
    pub auto_upload: Option<bool>,
}

/// 远端配置记录来源
#[async_trait]
pub trait ConfigSource: Send + Sync {
    /// 没有配置记录时返回 `Ok(None)`
    async fn fetch_config(&self) -> anyhow::Result<Option<PersistedConfig>>;
}

impl UploadConfig {
    /// 逐字段套用持久化配置，缺失的字段保持原值
    pub fn apply(mut self, persisted: PersistedConfig) -> Self {
        if let Some(max_file_size) = persisted.max_file_size {
            self.max_file_size = max_file_size;
        }

        if let Some(max_files) = persisted.max_files {
            self.max_files = max_files;
        }

        if let Some(auto_upload) = persisted.auto_upload {
            self.auto_upload = auto_upload;
        }

        self
    }

    /// 从 TOML 文件加载，文件缺失或解析失败时回退默认值
    pub fn from_file(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();

        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(err) => {
                tracing::warn!(path = %path.display(), %err, "config file not readable, using defaults");
                return Self::default();
            }
        };

        match toml::from_str::<PersistedConfig>(&content) {
            Ok(persisted) => Self::default().apply(persisted),
            Err(err) => {
                tracing::warn!(path = %path.display(), %err, "invalid config file, using defaults");
                Self::default()
            }
        }
    }

    /// 从远端配置记录加载，没有记录或请求失败时回退默认值
    pub async fn from_source(source: &dyn ConfigSource) -> Self {
        match source.fetch_config().await {
            Ok(Some(persisted)) => Self::default().apply(persisted),
            Ok(None) => {
                tracing::warn!("no remote config record, using defaults");
                Self::default()
            }
            Err(err) => {
                tracing::warn!(%err, "failed to fetch remote config, using defaults");
                Self::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct StaticSource(Option<PersistedConfig>);

    #[async_trait]
    impl ConfigSource for StaticSource {
        async fn fetch_config(&self) -> anyhow::Result<Option<PersistedConfig>> {
            Ok(self.0.clone())
        }
    }

    struct BrokenSource;

    #[async_trait]
    impl ConfigSource for BrokenSource {
        async fn fetch_config(&self) -> anyhow::Result<Option<PersistedConfig>> {
            Err(anyhow::anyhow!("connection refused"))
        }
    }

    #[test]
    fn test_defaults() {
        let config = UploadConfig::default();

        assert_eq!(config.max_file_size, 10 * 1024 * 1024);
        assert_eq!(config.max_files, 10);
        assert!(config.auto_upload);
    }

    #[test]
    fn test_apply_is_per_field() {
        let persisted: PersistedConfig = toml::from_str("max_files = 3").unwrap();
        let config = UploadConfig::default().apply(persisted);

        assert_eq!(config.max_files, 3);
        // 未给出的字段保持默认
        assert_eq!(config.max_file_size, DEFAULT_MAX_FILE_SIZE);
        assert!(config.auto_upload);
    }

    #[test]
    fn test_from_file_missing_falls_back() {
        let path = std::env::temp_dir().join(format!("chute-missing-{}.toml", uuid::Uuid::new_v4()));
        let config = UploadConfig::from_file(&path);

        assert_eq!(config.max_files, DEFAULT_MAX_FILES);
    }

    #[test]
    fn test_from_file_reads_overrides() {
        let path = std::env::temp_dir().join(format!("chute-config-{}.toml", uuid::Uuid::new_v4()));
        std::fs::write(&path, "max_file_size = 1024\nauto_upload = false\n").unwrap();

        let config = UploadConfig::from_file(&path);
        assert_eq!(config.max_file_size, 1024);
        assert!(!config.auto_upload);
        assert_eq!(config.max_files, DEFAULT_MAX_FILES);

        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_from_file_invalid_falls_back() {
        let path = std::env::temp_dir().join(format!("chute-broken-{}.toml", uuid::Uuid::new_v4()));
        std::fs::write(&path, "max_file_size = \"not a number\"").unwrap();

        let config = UploadConfig::from_file(&path);
        assert_eq!(config.max_file_size, DEFAULT_MAX_FILE_SIZE);

        std::fs::remove_file(&path).unwrap();
    }

    #[tokio::test]
    async fn test_from_source_applies_record() {
        let source = StaticSource(Some(PersistedConfig {
            max_files: Some(5),
            ..Default::default()
        }));

        let config = UploadConfig::from_source(&source).await;
        assert_eq!(config.max_files, 5);
    }

    #[tokio::test]
    async fn test_from_source_missing_record_falls_back() {
        let config = UploadConfig::from_source(&StaticSource(None)).await;
        assert_eq!(config.max_files, DEFAULT_MAX_FILES);
    }

    #[tokio::test]
    async fn test_from_source_error_falls_back() {
        let config = UploadConfig::from_source(&BrokenSource).await;
        assert_eq!(config.max_file_size, DEFAULT_MAX_FILE_SIZE);
        assert!(config.auto_upload);
    }
}
