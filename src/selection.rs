use std::fmt;
use std::path::PathBuf;
use bytes::Bytes;
use crate::config::{UploadConfig, DEFAULT_MAX_FILES, DEFAULT_MAX_FILE_SIZE};
use crate::errors::{QueueError, Result};
use crate::utils::format_bytes;

/// 文件内容的不透明句柄，队列只保存引用，不复制也不修改内容
#[derive(Debug, Clone)]
pub enum SourceHandle {
    /// 磁盘文件
    Path(PathBuf),
    /// 内存中的内容（拖拽、剪贴板等来源）
    Memory(Bytes),
}

/// 待上传的候选文件，由选择端提供
#[derive(Debug, Clone)]
pub struct SelectedFile {
    pub name: String,
    pub size: u64,
    pub mime_type: String,
    pub source: SourceHandle,
    /// 预览图数据，仅图片类型在创建时附带
    pub preview: Option<Bytes>,
}

impl SelectedFile {
    pub fn from_bytes(
        name: impl Into<String>,
        mime_type: impl Into<String>,
        data: impl Into<Bytes>,
    ) -> Self {
        let data = data.into();

        Self {
            name: name.into(),
            size: data.len() as u64,
            mime_type: mime_type.into(),
            source: SourceHandle::Memory(data),
            preview: None,
        }
    }

    /// Build a candidate from a file on disk
    pub async fn from_path(path: impl Into<PathBuf>, mime_type: impl Into<String>) -> Result<Self> {
        let path = path.into();

        // Verify file
        let metadata = tokio::fs::metadata(&path).await?;
        if !metadata.is_file() {
            return Err(QueueError::param_error("Not a file"));
        }

        let name = path
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| QueueError::param_error("Can't be read filename"))?
            .to_string();

        Ok(Self {
            name,
            size: metadata.len(),
            mime_type: mime_type.into(),
            source: SourceHandle::Path(path),
            preview: None,
        })
    }

    /// 只有图片类型会保留预览，其余类型忽略
    pub fn with_preview(mut self, data: impl Into<Bytes>) -> Self {
        if self.is_image() {
            self.preview = Some(data.into());
        }

        self
    }

    pub fn is_image(&self) -> bool {
        self.mime_type.starts_with("image/")
    }
}

/// 入队校验约束，由选择端随每批文件一起传入
#[derive(Debug, Clone)]
pub struct Constraints {
    /// 单个文件大小上限（字节）
    pub max_file_size: u64,

    /// 允许的 MIME 类型，空表示不限制
    ///
    /// 支持精确匹配（"application/pdf"）和通配（"image/*"）
    pub allowed_types: Vec<String>,

    /// 单批最多文件数
    pub max_files: usize,
}

impl Default for Constraints {
    fn default() -> Self {
        Self {
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            allowed_types: Vec::new(),
            max_files: DEFAULT_MAX_FILES,
        }
    }
}

impl Constraints {
    /// 尺寸和数量上限取自配置；允许的类型由选择端决定
    pub fn from_config(config: &UploadConfig) -> Self {
        Self {
            max_file_size: config.max_file_size,
            allowed_types: Vec::new(),
            max_files: config.max_files,
        }
    }

    pub fn allow_types<I, S>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_types = types.into_iter().map(Into::into).collect();
        self
    }

    pub fn max_file_size(mut self, bytes: u64) -> Self {
        self.max_file_size = bytes;
        self
    }

    pub fn max_files(mut self, count: usize) -> Self {
        self.max_files = count;
        self
    }

    /// Check a single candidate against the constraints
    pub fn check(&self, file: &SelectedFile) -> Result<(), RejectReason> {
        if file.size > self.max_file_size {
            return Err(RejectReason::TooLarge {
                size: file.size,
                limit: self.max_file_size,
            });
        }

        if !self.allowed_types.is_empty()
            && !self
                .allowed_types
                .iter()
                .any(|pattern| mime_matches(pattern, &file.mime_type))
        {
            return Err(RejectReason::UnsupportedType {
                mime_type: file.mime_type.clone(),
            });
        }

        Ok(())
    }
}

/// MIME 匹配，"image/*" 匹配整个大类，其余按完整类型比较
pub fn mime_matches(pattern: &str, mime_type: &str) -> bool {
    if pattern.ends_with("/*") {
        // 去掉 '*'，保留斜杠，如 "image/"
        let prefix = &pattern[..pattern.len() - 1];
        mime_type.starts_with(prefix)
    } else {
        pattern == mime_type
    }
}

/// 单个文件被拒绝的原因
#[derive(Debug, Clone, PartialEq)]
pub enum RejectReason {
    TooLarge { size: u64, limit: u64 },
    UnsupportedType { mime_type: String },
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TooLarge { limit, .. } => {
                write!(f, "is too large. Maximum size is {}", format_bytes(*limit))
            }
            Self::UnsupportedType { mime_type } => {
                write!(f, "type \"{}\" is not allowed", mime_type)
            }
        }
    }
}

/// 入队时被拒绝的文件
#[derive(Debug, Clone)]
pub struct RejectedFile {
    pub name: String,
    pub reason: RejectReason,
}

impl fmt::Display for RejectedFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "File \"{}\" {}", self.name, self.reason)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mime_matches_wildcard() {
        assert!(mime_matches("image/*", "image/png"));
        assert!(mime_matches("image/*", "image/jpeg"));
        assert!(!mime_matches("image/*", "application/zip"));
        // 前缀必须带斜杠整段匹配
        assert!(!mime_matches("image/*", "imagefake/png"));
    }

    #[test]
    fn test_mime_matches_exact() {
        assert!(mime_matches("application/pdf", "application/pdf"));
        assert!(!mime_matches("application/pdf", "application/zip"));
        assert!(!mime_matches("text/plain", "text/html"));
    }

    #[test]
    fn test_check_size_limit() {
        let constraints = Constraints::default().max_file_size(100);

        let small = SelectedFile::from_bytes("small.bin", "application/octet-stream", vec![0u8; 100]);
        assert!(constraints.check(&small).is_ok());

        let big = SelectedFile::from_bytes("big.bin", "application/octet-stream", vec![0u8; 101]);
        assert_eq!(
            constraints.check(&big),
            Err(RejectReason::TooLarge { size: 101, limit: 100 })
        );
    }

    #[test]
    fn test_check_allowed_types() {
        let constraints = Constraints::default().allow_types(["image/*", "application/pdf"]);

        let png = SelectedFile::from_bytes("photo.png", "image/png", vec![0u8; 8]);
        assert!(constraints.check(&png).is_ok());

        let pdf = SelectedFile::from_bytes("doc.pdf", "application/pdf", vec![0u8; 8]);
        assert!(constraints.check(&pdf).is_ok());

        let zip = SelectedFile::from_bytes("archive.zip", "application/zip", vec![0u8; 8]);
        assert_eq!(
            constraints.check(&zip),
            Err(RejectReason::UnsupportedType {
                mime_type: "application/zip".to_string()
            })
        );
    }

    #[test]
    fn test_empty_allowed_types_accepts_everything() {
        let constraints = Constraints::default();

        let zip = SelectedFile::from_bytes("archive.zip", "application/zip", vec![0u8; 8]);
        assert!(constraints.check(&zip).is_ok());
    }

    #[test]
    fn test_preview_only_for_images() {
        let image = SelectedFile::from_bytes("photo.png", "image/png", vec![0u8; 8])
            .with_preview(vec![1u8, 2, 3]);
        assert!(image.preview.is_some());

        let pdf = SelectedFile::from_bytes("doc.pdf", "application/pdf", vec![0u8; 8])
            .with_preview(vec![1u8, 2, 3]);
        assert!(pdf.preview.is_none());
    }

    #[test]
    fn test_reject_messages() {
        let rejected = RejectedFile {
            name: "big.bin".to_string(),
            reason: RejectReason::TooLarge {
                size: 11 * 1024 * 1024,
                limit: 10 * 1024 * 1024,
            },
        };
        assert_eq!(
            rejected.to_string(),
            "File \"big.bin\" is too large. Maximum size is 10.00 MB"
        );

        let rejected = RejectedFile {
            name: "archive.zip".to_string(),
            reason: RejectReason::UnsupportedType {
                mime_type: "application/zip".to_string(),
            },
        };
        assert_eq!(
            rejected.to_string(),
            "File \"archive.zip\" type \"application/zip\" is not allowed"
        );
    }
}
