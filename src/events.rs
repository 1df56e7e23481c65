// 事件通道模块
// 后台任务（生产者）与消费者之间的有序通道：
// 日志行和终止事件走有界队列，不丢弃、保持顺序，队列满时生产者阻塞；
// 进度走 watch 通道，只保留最新值

use serde::Serialize;
use tokio::sync::{mpsc, watch};

use crate::models::{JobReport, LogEvent, ProgressEvent};

/// 消费者看到的事件
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    Progress(ProgressEvent),
    Log(LogEvent),
    /// 终止事件，每个任务恰好一次
    Finished(JobReport),
}

/// 有序队列中的消息
#[derive(Debug)]
enum Envelope {
    Log(LogEvent),
    Finished(JobReport),
}

/// 创建一对事件通道端点
pub(crate) fn channel(total: usize, log_capacity: usize) -> (EventSender, EventReceiver) {
    let (log_tx, log_rx) = mpsc::channel(log_capacity.max(1));
    let (progress_tx, progress_rx) = watch::channel(ProgressEvent::new(0, total));

    let sender = EventSender {
        logs: log_tx,
        progress: progress_tx,
    };
    let receiver = EventReceiver {
        logs: log_rx,
        progress: progress_rx,
        last_progress: None,
        pending: None,
    };
    (sender, receiver)
}

/// 生产者端，只在阻塞线程中使用
#[derive(Debug)]
pub(crate) struct EventSender {
    logs: mpsc::Sender<Envelope>,
    progress: watch::Sender<ProgressEvent>,
}

impl EventSender {
    /// 推送一行日志，队列满时阻塞直到消费者取走
    pub fn log(&self, event: LogEvent) {
        if self.logs.blocking_send(Envelope::Log(event)).is_err() {
            log::debug!("事件接收端已关闭，丢弃日志");
        }
    }

    /// 更新进度（覆盖旧值，不阻塞）
    pub fn progress(&self, event: ProgressEvent) {
        self.progress.send_replace(event);
    }

    /// 推送终止事件
    pub fn finish(&self, report: JobReport) {
        if self.logs.blocking_send(Envelope::Finished(report)).is_err() {
            log::debug!("事件接收端已关闭，丢弃终止事件");
        }
    }
}

/// 消费者端
#[derive(Debug)]
pub struct EventReceiver {
    logs: mpsc::Receiver<Envelope>,
    progress: watch::Receiver<ProgressEvent>,
    last_progress: Option<ProgressEvent>,
    pending: Option<Event>,
}

impl EventReceiver {
    /// 等待下一个事件，通道关闭且没有剩余事件时返回 `None`
    ///
    /// 日志优先；进度只在有新值时返回。终止事件之前总会先返回尚未
    /// 观察到的最新进度。
    pub async fn recv(&mut self) -> Option<Event> {
        loop {
            if let Some(event) = self.pending.take() {
                return Some(event);
            }

            tokio::select! {
                biased;
                envelope = self.logs.recv() => {
                    return match envelope {
                        Some(envelope) => Some(self.deliver(envelope)),
                        None => self.fresh_progress(),
                    };
                }
                Ok(()) = self.progress.changed() => {
                    if let Some(event) = self.fresh_progress() {
                        return Some(event);
                    }
                }
            }
        }
    }

    /// 非阻塞地取下一个已就绪的事件
    pub fn try_recv(&mut self) -> Option<Event> {
        if let Some(event) = self.pending.take() {
            return Some(event);
        }

        match self.logs.try_recv() {
            Ok(envelope) => Some(self.deliver(envelope)),
            Err(_) => self.fresh_progress(),
        }
    }

    /// 当前最新进度（不影响 `recv` 的去重）
    pub fn latest_progress(&self) -> ProgressEvent {
        *self.progress.borrow()
    }

    fn deliver(&mut self, envelope: Envelope) -> Event {
        match envelope {
            Envelope::Log(event) => Event::Log(event),
            Envelope::Finished(report) => match self.fresh_progress() {
                Some(progress) => {
                    self.pending = Some(Event::Finished(report));
                    progress
                }
                None => Event::Finished(report),
            },
        }
    }

    /// 与上次交付的进度不同时才返回。sender 关闭后 watch 仍保留最后的值
    fn fresh_progress(&mut self) -> Option<Event> {
        let current = *self.progress.borrow_and_update();
        if self.last_progress == Some(current) {
            return None;
        }
        self.last_progress = Some(current);
        Some(Event::Progress(current))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{JobState, LogKind};
    use chrono::Local;
    use uuid::Uuid;

    fn report(processed: usize, total: usize) -> JobReport {
        let now = Local::now();
        JobReport {
            job_id: Uuid::new_v4(),
            state: JobState::Completed,
            total,
            processed,
            succeeded: processed,
            failed: 0,
            error: None,
            started_at: now,
            finished_at: now,
        }
    }

    fn drain(receiver: &mut EventReceiver) -> Vec<Event> {
        std::iter::from_fn(|| receiver.try_recv()).collect()
    }

    #[test]
    fn logs_keep_order() {
        let (sender, mut receiver) = channel(0, 16);
        for i in 0..5 {
            sender.log(LogEvent::new(LogKind::FileProcessed, format!("line {i}")));
        }
        drop(sender);

        let lines: Vec<String> = drain(&mut receiver)
            .into_iter()
            .filter_map(|e| match e {
                Event::Log(l) => Some(l.message),
                _ => None,
            })
            .collect();
        assert_eq!(lines, vec!["line 0", "line 1", "line 2", "line 3", "line 4"]);
    }

    #[test]
    fn progress_is_coalesced() {
        let (sender, mut receiver) = channel(3, 16);
        sender.progress(ProgressEvent::new(1, 3));
        sender.progress(ProgressEvent::new(2, 3));
        sender.progress(ProgressEvent::new(3, 3));

        let events = drain(&mut receiver);
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], Event::Progress(p) if p.processed == 3 && p.percent == 100));
        assert!(receiver.try_recv().is_none());
    }

    #[test]
    fn final_progress_precedes_finished() {
        let (sender, mut receiver) = channel(2, 16);
        sender.progress(ProgressEvent::new(2, 2));
        sender.finish(report(2, 2));
        drop(sender);

        let events = drain(&mut receiver);
        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], Event::Progress(p) if p.processed == 2));
        assert!(matches!(events[1], Event::Finished(ref r) if r.processed == 2));
    }

    #[test]
    fn initial_progress_is_delivered_once() {
        let (sender, mut receiver) = channel(4, 16);
        assert!(matches!(receiver.try_recv(), Some(Event::Progress(p)) if p.processed == 0));
        assert!(receiver.try_recv().is_none());
        drop(sender);
        assert!(receiver.try_recv().is_none());
    }

    #[test]
    fn sending_after_receiver_dropped_is_harmless() {
        let (sender, receiver) = channel(1, 1);
        drop(receiver);
        sender.log(LogEvent::summary(0, 1));
        sender.progress(ProgressEvent::new(1, 1));
        sender.finish(report(1, 1));
    }

    #[tokio::test]
    async fn async_consumer_sees_everything_in_order() {
        let (sender, mut receiver) = channel(3, 2);

        let producer = tokio::task::spawn_blocking(move || {
            for i in 1..=3 {
                sender.log(LogEvent::new(LogKind::FileProcessed, format!("file {i}")));
                sender.progress(ProgressEvent::new(i, 3));
            }
            sender.log(LogEvent::summary(3, 3));
            sender.finish(report(3, 3));
        });

        let mut events = Vec::new();
        while let Some(event) = receiver.recv().await {
            events.push(event);
        }
        producer.await.unwrap();

        let lines: Vec<&str> = events
            .iter()
            .filter_map(|e| match e {
                Event::Log(l) => Some(l.message.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(
            lines,
            vec![
                "file 1",
                "file 2",
                "file 3",
                "Processed 3 out of 3 images in this directory."
            ]
        );

        let progress: Vec<usize> = events
            .iter()
            .filter_map(|e| match e {
                Event::Progress(p) => Some(p.processed),
                _ => None,
            })
            .collect();
        assert!(progress.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(progress.last(), Some(&3));

        assert!(matches!(events.last(), Some(Event::Finished(_))));
        assert_eq!(
            events
                .iter()
                .filter(|e| matches!(e, Event::Finished(_)))
                .count(),
            1
        );
    }
}
