//! 工作者事件
//!
//! 工作者 → 展示层的单向通道。发送永不阻塞；展示层关闭后事件直接丢弃。

use tokio::sync::mpsc;

use crate::workflow::checkpoint::Checkpoint;

/// 工作者对外报告的状态变化
#[derive(Debug, Clone, PartialEq)]
pub enum WorkerEvent {
    /// 运行状态切换（展示层据此启用/禁用按钮）
    Running(bool),
    DocumentStarted {
        document: usize,
        name: String,
        batches: usize,
    },
    /// 文档被跳过（转换失败或没有启用的页面）
    DocumentSkipped {
        document: usize,
        name: String,
        reason: String,
    },
    BatchStarted {
        document: usize,
        batch: usize,
        total: usize,
        pages: Vec<usize>,
    },
    BatchSucceeded {
        document: usize,
        batch: usize,
        reply: String,
    },
    /// 重试耗尽，批次被跳过
    BatchFailed {
        document: usize,
        batch: usize,
        attempts: u32,
    },
    Retrying {
        attempt: u32,
        max_retries: u32,
        reason: String,
    },
    NewConversation,
    /// 进度百分比 [0, 100]
    Progress(f64),
    Paused {
        remaining_secs: Option<u64>,
        reason: String,
    },
    PauseCountdown {
        remaining_secs: u64,
    },
    Resumed,
    CheckpointSaved(Checkpoint),
    Stopped(Checkpoint),
    SessionClosed(Checkpoint),
    Completed,
}

/// 事件发送端
#[derive(Debug, Clone)]
pub struct EventSink {
    tx: Option<mpsc::UnboundedSender<WorkerEvent>>,
}

impl EventSink {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<WorkerEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx: Some(tx) }, rx)
    }

    /// 不接收任何事件
    pub fn disabled() -> Self {
        Self { tx: None }
    }

    pub fn emit(&self, event: WorkerEvent) {
        if let Some(tx) = &self.tx {
            let _ = tx.send(event);
        }
    }
}

/// 进度百分比：`(文档序号 + (批次序号 + 1) / 批次数) / 文档数 * 100`
pub fn progress_percent(document: usize, documents: usize, batch: usize, batches: usize) -> f64 {
    if documents == 0 {
        return 100.0;
    }
    let within = if batches == 0 {
        1.0
    } else {
        (batch + 1) as f64 / batches as f64
    };
    ((document as f64 + within) / documents as f64 * 100.0).clamp(0.0, 100.0)
}
