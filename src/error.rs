// 错误类型定义
// 区分任务级错误（阻止任务开始或使任务失败）与单文件处理错误（只记录，不中断批处理）

use std::io;
use std::path::PathBuf;

use thiserror::Error;
use uuid::Uuid;

use crate::models::JobState;

/// 任务级错误
#[derive(Debug, Error)]
pub enum ThumbnailError {
    /// 输入目录不存在、不是目录或无法列出
    #[error("无法读取目录 {}: {source}", path.display())]
    DirectoryUnreadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// 输出目录创建失败（已存在的目录不算失败）
    ///
    /// 由 [`crate::file_ops::ensure_output_dir`] 返回。任务中出现时任务进入 Failed，
    /// 这个错误的文本写入 [`crate::models::JobReport::error`]，不会从 `wait` 返回。
    #[error("无法创建输出目录 {}: {source}", path.display())]
    OutputDirectoryCreationFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// 已有任务在运行
    #[error("任务 {job_id} 仍在运行")]
    JobAlreadyRunning { job_id: Uuid },

    /// 非法的状态迁移，例如重复启动同一个任务
    #[error("非法的任务状态迁移 {from:?} -> {to:?}")]
    InvalidTransition { from: JobState, to: JobState },

    /// 当前线程不在 tokio 运行时中，无法派发后台任务
    #[error("当前线程没有可用的 tokio 运行时")]
    NoRuntime,

    /// 后台线程 panic 或被取消
    #[error("后台任务异常终止: {0}")]
    WorkerPanicked(String),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// 单个文件的处理错误，只计入失败统计
#[derive(Debug, Error)]
pub enum ProcessingError {
    #[error("无法打开图片 {}: {source}", path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("无法编码缩略图 {}: {source}", path.display())]
    Encode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("读写文件失败 {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{} 没有文件名", path.display())]
    InvalidPath { path: PathBuf },
}

/// 配置文件错误
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("无法读取配置文件 {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("配置文件语法错误: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("配置值无效: {0}")]
    Invalid(String),
}
