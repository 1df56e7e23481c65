// thumbgen - 批量缩略图生成工具
// 主入口模块，导出任务控制器、事件通道和各个组件

pub mod codec;
pub mod config;
pub mod controller;
pub mod error;
pub mod events;
pub mod file_ops;
pub mod job;
pub mod models;
pub mod scanner;

pub use codec::{ImageThumbnailCodec, ThumbnailCodec};
pub use config::ThumbnailerConfig;
pub use controller::{JobController, JobHandle};
pub use error::{ConfigError, ProcessingError, ThumbnailError};
pub use events::{Event, EventReceiver};
pub use job::CancelToken;
pub use models::{
    ImageTask, JobReport, JobState, LogEvent, LogKind, ProgressEvent, ThumbnailOutcome,
};
pub use scanner::FileScanner;
