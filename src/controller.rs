// 任务控制模块
// 对外入口：扫描目录、在后台线程启动批处理任务、转发取消请求，
// 并保证同一时刻最多只有一个活动任务

use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::codec::{ImageThumbnailCodec, ThumbnailCodec};
use crate::config::ThumbnailerConfig;
use crate::error::ThumbnailError;
use crate::events::{self, EventReceiver};
use crate::job::{BatchJob, CancelToken};
use crate::models::{ImageTask, JobReport};
use crate::scanner::FileScanner;

type ActiveJob = Arc<Mutex<Option<Uuid>>>;

/// 活动任务槽位，drop 时释放（包括后台线程 panic 的情况）
#[derive(Debug)]
pub(crate) struct ActiveSlot {
    active: ActiveJob,
    job_id: Uuid,
}

impl ActiveSlot {
    fn acquire(active: &ActiveJob, job_id: Uuid) -> Result<Self, ThumbnailError> {
        let mut current = active.lock();
        if let Some(running) = *current {
            return Err(ThumbnailError::JobAlreadyRunning { job_id: running });
        }
        *current = Some(job_id);
        Ok(Self {
            active: Arc::clone(active),
            job_id,
        })
    }
}

impl Drop for ActiveSlot {
    fn drop(&mut self) {
        let mut current = self.active.lock();
        if *current == Some(self.job_id) {
            *current = None;
        }
    }
}

/// 任务控制器
pub struct JobController {
    config: ThumbnailerConfig,
    codec: Arc<dyn ThumbnailCodec>,
    active: ActiveJob,
}

impl JobController {
    pub fn new(config: ThumbnailerConfig) -> Self {
        let codec = Arc::new(ImageThumbnailCodec::from_config(&config.thumbnail));
        Self::with_codec(config, codec)
    }

    /// 使用自定义编解码器
    pub fn with_codec(config: ThumbnailerConfig, codec: Arc<dyn ThumbnailCodec>) -> Self {
        Self {
            config,
            codec,
            active: Arc::new(Mutex::new(None)),
        }
    }

    pub fn config(&self) -> &ThumbnailerConfig {
        &self.config
    }

    /// 当前活动任务的 id
    pub fn active_job(&self) -> Option<Uuid> {
        *self.active.lock()
    }

    pub fn is_busy(&self) -> bool {
        self.active_job().is_some()
    }

    /// 为目录启动一个任务
    ///
    /// 已有任务未结束时返回 `JobAlreadyRunning`，不影响正在运行的任务；
    /// 目录无法读取时返回 `DirectoryUnreadable`，任务不会开始。
    /// 必须在 tokio 运行时中调用。
    pub fn start_job(&self, directory: impl AsRef<Path>) -> Result<JobHandle, ThumbnailError> {
        let runtime = Handle::try_current().map_err(|_| ThumbnailError::NoRuntime)?;

        let job_id = Uuid::new_v4();
        // 先占位再扫描，扫描失败时槽位随 slot drop 释放
        let slot = ActiveSlot::acquire(&self.active, job_id)?;

        let directory = directory.as_ref();
        let root = directory
            .canonicalize()
            .map_err(|source| ThumbnailError::DirectoryUnreadable {
                path: directory.to_path_buf(),
                source,
            })?;

        let scanner = FileScanner::new(self.config.scan.extension.as_str());
        let files = scanner.scan(&root)?;
        let output_dir = root.join(&self.config.output.dir_name);
        let task = ImageTask::new(files, &output_dir);
        let total = task.len();

        log::info!("找到 {} 个图片文件，开始生成缩略图...", total);

        let (sender, receiver) = events::channel(total, self.config.events.log_capacity);
        let cancel = CancelToken::new();
        let mut job = BatchJob::new(job_id, task, Arc::clone(&self.codec), sender, cancel.clone())
            .with_slot(slot);

        // 在后台线程中执行
        let worker = runtime.spawn_blocking(move || job.run());

        Ok(JobHandle {
            id: job_id,
            directory: root,
            output_dir,
            total,
            cancel,
            events: receiver,
            worker,
        })
    }

    /// 请求取消任务，返回是否为首次请求；任务已结束时无效果
    pub fn cancel(&self, handle: &JobHandle) -> bool {
        handle.cancel()
    }
}

/// 已启动任务的句柄
#[derive(Debug)]
pub struct JobHandle {
    id: Uuid,
    directory: PathBuf,
    output_dir: PathBuf,
    total: usize,
    cancel: CancelToken,
    events: EventReceiver,
    worker: JoinHandle<Result<JobReport, ThumbnailError>>,
}

impl JobHandle {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn total(&self) -> usize {
        self.total
    }

    /// 事件接收端
    pub fn events(&mut self) -> &mut EventReceiver {
        &mut self.events
    }

    pub fn cancel(&self) -> bool {
        let first = self.cancel.cancel();
        if first {
            log::info!("收到取消请求: 任务 {}", self.id);
        }
        first
    }

    /// 可以交给其他任务（例如 Ctrl-C 处理）使用的取消标志
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.worker.is_finished()
    }

    /// 等待任务结束
    ///
    /// 未读取的事件会被丢弃，后台线程不会因日志队列已满而阻塞。
    pub async fn wait(self) -> Result<JobReport, ThumbnailError> {
        let Self { worker, events, .. } = self;
        drop(events);
        worker
            .await
            .map_err(|e| ThumbnailError::WorkerPanicked(e.to_string()))?
    }
}
