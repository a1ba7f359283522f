mod manager;
mod task;
pub mod types;
mod worker;

pub use manager::{FilteredEventReceiver, UploadManager, UploadManagerBuilder, UploadManagerHandle};
pub use task::UploadTask;
pub use types::{
    ClearConfirmation, EnqueueReport, QueueStats, UploadEvent, UploadId, UploadState,
};
