// 数据模型定义
// 定义批处理任务、进度事件、日志事件等核心数据结构

use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 一次批处理的输入：按扫描顺序排列的文件列表 + 输出目录
/// 创建后不可修改
#[derive(Debug, Clone)]
pub struct ImageTask {
    files: Vec<PathBuf>,
    output_dir: PathBuf,
}

impl ImageTask {
    pub fn new(files: Vec<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            files,
            output_dir: output_dir.into(),
        }
    }

    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

/// 任务状态
///
/// 状态只能单向迁移：
/// Pending → Running → (Cancelling →) Completed | Cancelled | Failed
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    /// 已创建，尚未开始
    Pending,
    /// 正在逐个处理文件
    Running,
    /// 已观察到取消请求，正在收尾
    Cancelling,
    /// 所有文件都已访问
    Completed,
    /// 在访问完所有文件之前被取消
    Cancelled,
    /// 任务级失败（例如输出目录无法创建）
    Failed,
}

impl JobState {
    /// 是否为终止状态
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled | Self::Failed)
    }

    pub fn can_transition_to(self, next: JobState) -> bool {
        use JobState::*;
        matches!(
            (self, next),
            (Pending, Running)
                | (Pending, Failed)
                | (Running, Cancelling)
                | (Running, Completed)
                | (Running, Cancelled)
                | (Cancelling, Cancelled)
        )
    }
}

/// 进度事件，百分比向下取整，total 为 0 时为 0
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProgressEvent {
    /// 已访问的文件数（成功和失败都算）
    pub processed: usize,
    /// 文件总数
    pub total: usize,
    /// 0..=100
    pub percent: u8,
}

impl ProgressEvent {
    pub fn new(processed: usize, total: usize) -> Self {
        let percent = if total == 0 {
            0
        } else {
            (processed.min(total) * 100 / total) as u8
        };
        Self {
            processed,
            total,
            percent,
        }
    }
}

/// 日志行的类别，方便消费者区分展示方式
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LogKind {
    /// 单个文件处理成功
    FileProcessed,
    /// 单个文件处理失败
    FileFailed,
    /// 取消提示
    Cancelled,
    /// 任务级失败
    Failure,
    /// 最终汇总
    Summary,
}

/// 一行有序的可读日志
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LogEvent {
    pub kind: LogKind,
    pub message: String,
}

impl LogEvent {
    pub fn new(kind: LogKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn file_processed(source: &Path) -> Self {
        Self::new(
            LogKind::FileProcessed,
            format!("Processed {}", display_name(source)),
        )
    }

    pub fn file_failed(source: &Path, cause: &str) -> Self {
        Self::new(
            LogKind::FileFailed,
            format!("Failed to process {}: {}", display_name(source), cause),
        )
    }

    pub fn cancelled(processed: usize, total: usize) -> Self {
        Self::new(
            LogKind::Cancelled,
            format!(
                "Thumbnail generation cancelled after {} of {} images.",
                processed, total
            ),
        )
    }

    pub fn failure(cause: &str) -> Self {
        Self::new(
            LogKind::Failure,
            format!("Thumbnail generation failed: {}", cause),
        )
    }

    pub fn summary(processed: usize, total: usize) -> Self {
        Self::new(
            LogKind::Summary,
            format!(
                "Processed {} out of {} images in this directory.",
                processed, total
            ),
        )
    }
}

/// 单个文件的处理结果（只用于生成日志和统计，不持久化）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThumbnailOutcome {
    pub source: PathBuf,
    pub succeeded: bool,
    pub error_detail: Option<String>,
}

impl ThumbnailOutcome {
    pub fn success(source: &Path) -> Self {
        Self {
            source: source.to_path_buf(),
            succeeded: true,
            error_detail: None,
        }
    }

    pub fn failure(source: &Path, detail: impl Into<String>) -> Self {
        Self {
            source: source.to_path_buf(),
            succeeded: false,
            error_detail: Some(detail.into()),
        }
    }
}

/// 任务最终报告，随终止事件推送，也由 `JobHandle::wait` 返回
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JobReport {
    pub job_id: Uuid,
    pub state: JobState,
    pub total: usize,
    pub processed: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// 任务级失败原因（Failed 时为 `ThumbnailError` 的文本）
    pub error: Option<String>,
    pub started_at: DateTime<Local>,
    pub finished_at: DateTime<Local>,
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .unwrap_or(path.as_os_str())
        .to_string_lossy()
        .to_string()
}
