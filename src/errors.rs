use thiserror::Error;

/// 队列操作错误
#[derive(Error, Debug)]
pub enum QueueError {
    #[error("Maximum {limit} files allowed, got {given}")]
    TooManyFiles {
        given: usize,
        limit: usize,
    },

    #[error("Transfer backend is not available")]
    BackendUnavailable,

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Param error: {0}")]
    ParamError(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

impl QueueError {
    pub fn param_error(message: impl Into<String>) -> Self {
        Self::ParamError(message.into())
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::InternalError(message.into())
    }
}

/// 传输失败（面向用户的描述，会原样写进任务的 error 字段）
#[derive(Error, Debug)]
pub enum TransferError {
    #[error("{0}")]
    Rejected(String),

    #[error("HTTP Request error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Server error: status code {status_code}, message: {message}")]
    ServerError {
        status_code: u16,
        message: String,
    },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Invalid header value: {0}")]
    InvalidHeaderValue(#[from] reqwest::header::InvalidHeaderValue),
}

impl TransferError {
    pub fn rejected(message: impl Into<String>) -> Self {
        Self::Rejected(message.into())
    }

    pub fn server_error(status_code: u16, message: impl Into<String>) -> Self {
        Self::ServerError {
            status_code,
            message: message.into(),
        }
    }
}

/// Error alias
pub type Result<T, E = QueueError> = std::result::Result<T, E>;
