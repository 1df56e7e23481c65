// 批处理任务模块
// 单个任务的状态机：逐个文件生成缩略图，推送进度和日志，只在文件边界检查取消

use std::path::Path;
use std::sync::{
    atomic::{AtomicU8, Ordering},
    Arc,
};

use chrono::{DateTime, Local};
use uuid::Uuid;

use crate::codec::ThumbnailCodec;
use crate::controller::ActiveSlot;
use crate::error::{ProcessingError, ThumbnailError};
use crate::events::EventSender;
use crate::file_ops;
use crate::models::{ImageTask, JobReport, JobState, LogEvent, ProgressEvent, ThumbnailOutcome};

const CANCELLED: u8 = 0b01;
const FINISHED: u8 = 0b10;

/// 取消标志位（原子操作，跨线程安全，无需 Mutex）
///
/// 同一个原子变量里还记录任务是否已进入终止状态，结束后的取消请求无效。
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicU8>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// 请求取消，只有任务未结束时的第一次调用返回 true
    pub fn cancel(&self) -> bool {
        self.0
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |flags| {
                (flags == 0).then_some(CANCELLED)
            })
            .is_ok()
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire) & CANCELLED != 0
    }

    /// 任务是否已进入终止状态
    pub fn is_finished(&self) -> bool {
        self.0.load(Ordering::Acquire) & FINISHED != 0
    }

    /// 由后台线程在推送终止事件之前调用
    pub(crate) fn mark_finished(&self) {
        self.0.fetch_or(FINISHED, Ordering::AcqRel);
    }
}

/// 一次批处理的运行状态，由后台线程独占
///
/// 只能由 `JobController` 在 `spawn_blocking` 线程中运行：日志推送会阻塞等待，
/// 不能在异步运行时的工作线程上调用。
pub(crate) struct BatchJob {
    id: Uuid,
    task: ImageTask,
    state: JobState,
    processed: usize,
    succeeded: usize,
    failed: usize,
    cancel: CancelToken,
    codec: Arc<dyn ThumbnailCodec>,
    events: EventSender,
    slot: Option<ActiveSlot>,
}

impl BatchJob {
    pub(crate) fn new(
        id: Uuid,
        task: ImageTask,
        codec: Arc<dyn ThumbnailCodec>,
        events: EventSender,
        cancel: CancelToken,
    ) -> Self {
        Self {
            id,
            task,
            state: JobState::Pending,
            processed: 0,
            succeeded: 0,
            failed: 0,
            cancel,
            codec,
            events,
            slot: None,
        }
    }

    /// 绑定控制器的活动任务槽位，任务结束时释放
    pub(crate) fn with_slot(mut self, slot: ActiveSlot) -> Self {
        self.slot = Some(slot);
        self
    }

    fn total(&self) -> usize {
        self.task.len()
    }

    /// 执行任务直到终止状态，阻塞调用线程
    ///
    /// 只允许从 Pending 开始；单个文件的失败不会中断任务。
    pub(crate) fn run(&mut self) -> Result<JobReport, ThumbnailError> {
        if self.state != JobState::Pending {
            return Err(ThumbnailError::InvalidTransition {
                from: self.state,
                to: JobState::Running,
            });
        }
        let started_at = Local::now();

        if let Err(e) = file_ops::ensure_output_dir(self.task.output_dir()) {
            log::error!("任务 {} 无法创建输出目录: {}", self.id, e);
            self.transition(JobState::Failed);
            let cause = e.to_string();
            self.events.log(LogEvent::failure(&cause));
            self.events.progress(self.progress());
            return Ok(self.finish(started_at, Some(cause)));
        }

        self.transition(JobState::Running);
        log::info!(
            "任务 {} 开始处理 {} 个文件，输出到 {}",
            self.id,
            self.total(),
            self.task.output_dir().display()
        );
        self.events.progress(self.progress());

        for index in 0..self.total() {
            // 只在文件之间检查取消标志
            if self.cancel.is_cancelled() {
                self.transition(JobState::Cancelling);
                break;
            }

            let source = self.task.files()[index].clone();
            let outcome = self.process_file(&source);
            if outcome.succeeded {
                self.succeeded += 1;
                self.events.log(LogEvent::file_processed(&source));
            } else {
                self.failed += 1;
                let detail = outcome.error_detail.as_deref().unwrap_or("unknown error");
                log::warn!("处理图片失败: {}", detail);
                self.events.log(LogEvent::file_failed(&source, detail));
            }

            self.processed += 1;
            self.events.progress(self.progress());
        }

        if self.state == JobState::Cancelling {
            log::info!(
                "任务 {} 被用户取消，已处理 {}/{} 张",
                self.id,
                self.processed,
                self.total()
            );
            self.events
                .log(LogEvent::cancelled(self.processed, self.total()));
            self.events.progress(self.progress());
            self.transition(JobState::Cancelled);
        } else {
            self.transition(JobState::Completed);
        }

        self.events
            .log(LogEvent::summary(self.processed, self.total()));
        Ok(self.finish(started_at, None))
    }

    fn process_file(&self, source: &Path) -> ThumbnailOutcome {
        let result = file_ops::thumbnail_path(self.task.output_dir(), source)
            .ok_or_else(|| ProcessingError::InvalidPath {
                path: source.to_path_buf(),
            })
            .and_then(|destination| self.codec.create_thumbnail(source, &destination));

        match result {
            Ok(()) => ThumbnailOutcome::success(source),
            Err(e) => ThumbnailOutcome::failure(source, e.to_string()),
        }
    }

    fn progress(&self) -> ProgressEvent {
        ProgressEvent::new(self.processed, self.total())
    }

    fn transition(&mut self, next: JobState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "illegal transition {:?} -> {:?}",
            self.state,
            next
        );
        log::debug!("任务 {} 状态 {:?} -> {:?}", self.id, self.state, next);
        self.state = next;
    }

    /// 生成报告、释放活动槽位，最后推送终止事件
    fn finish(&mut self, started_at: DateTime<Local>, error: Option<String>) -> JobReport {
        let report = JobReport {
            job_id: self.id,
            state: self.state,
            total: self.total(),
            processed: self.processed,
            succeeded: self.succeeded,
            failed: self.failed,
            error,
            started_at,
            finished_at: Local::now(),
        };

        log::info!(
            "任务 {} 结束: {:?}，成功 {}，失败 {}",
            self.id,
            report.state,
            report.succeeded,
            report.failed
        );

        // 先标记结束并释放槽位，消费者收到终止事件后取消无效、可以立即开始新任务
        self.cancel.mark_finished();
        self.slot.take();
        self.events.finish(report.clone());
        report
    }
}
