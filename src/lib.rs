pub mod acquire;
pub mod backend;
pub mod config;
pub mod errors;
pub mod history;
pub mod notify;
pub mod queue;
pub mod selection;
pub mod utils;

// 重新导出核心类型
pub use queue::{
    ClearConfirmation,
    EnqueueReport,
    FilteredEventReceiver,
    QueueStats,
    UploadEvent,
    UploadId,
    UploadManager,
    UploadManagerBuilder,
    UploadManagerHandle,
    UploadState,
    UploadTask,
};

pub use backend::{
    RemoteBackend,
    SimulatedBackend,
    SimulatedOutcome,
    TransferBackend,
    TransferReceipt,
};

pub use acquire::{AcquireConfig, AcquireError, AcquirePhase, Dependency};
pub use config::{ConfigSource, PersistedConfig, UploadConfig};
pub use errors::{QueueError, Result, TransferError};
pub use history::{HistoryStore, MemoryHistory, UploadRecord};
pub use notify::{LogSink, NoticeKind, NotificationSink};
pub use selection::{Constraints, RejectReason, RejectedFile, SelectedFile, SourceHandle};
