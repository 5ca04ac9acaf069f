//! 队列编排器
//!
//! 职责：
//! - 按断点顺序处理队列中的文档（单个文档的批次循环见 `document_processor`）
//! - 独占驱动和断点，其他组件只能通过事件观察
//! - 处理限流暂停、停止请求和会话关闭

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::config::RunOptions;
use crate::driver::AssistantDriver;
use crate::error::DriverError;
use crate::models::{BatchPlan, SharedQueue};
use crate::services::pause::{format_remaining, Tick};
use crate::services::{PauseController, Rasterizer, TranscriptWriter};
use crate::workflow::{
    Checkpoint, ControlInbox, EventSink, Halt, RetryEngine, RetryPolicy, WorkerEvent,
};

/// 一次运行的结束方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// 队列全部处理完，断点已回到起点
    Completed,
    /// 收到停止请求，断点保留
    Stopped,
    /// 浏览器会话关闭，断点保留，需要重新打开会话
    SessionClosed,
}

/// 运行统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunStats {
    pub batches_succeeded: usize,
    pub batches_failed: usize,
    pub batches_skipped: usize,
    pub documents_skipped: usize,
}

impl RunStats {
    pub fn total_batches(&self) -> usize {
        self.batches_succeeded + self.batches_failed
    }
}

/// 已开始处理的文档的批次计划
///
/// 断点里只有批次序号，续传时必须沿用同一份计划，否则序号会错位。
pub(super) struct ActivePlan {
    pub(super) document_index: usize,
    pub(super) path: PathBuf,
    pub(super) plan: BatchPlan,
}

/// 队列编排器
pub struct Orchestrator {
    pub(super) driver: Box<dyn AssistantDriver>,
    pub(super) rasterizer: Arc<dyn Rasterizer>,
    pub(super) queue: SharedQueue,
    pub(super) checkpoint: Checkpoint,
    pub(super) pause: PauseController,
    pub(super) engine: RetryEngine,
    pub(super) options: RunOptions,
    pub(super) events: EventSink,
    pub(super) transcript: Option<TranscriptWriter>,
    pub(super) stats: RunStats,
    pub(super) active_plan: Option<ActivePlan>,
}

impl Orchestrator {
    pub fn new(
        driver: Box<dyn AssistantDriver>,
        rasterizer: Arc<dyn Rasterizer>,
        queue: SharedQueue,
        options: RunOptions,
    ) -> Self {
        let engine = RetryEngine::new(
            RetryPolicy {
                max_retries: options.max_retries,
                retry_delay: options.retry_delay,
            },
            options.reply_timeout,
        );
        Self {
            driver,
            rasterizer,
            queue,
            checkpoint: Checkpoint::new(),
            pause: PauseController::new(),
            engine,
            options,
            events: EventSink::disabled(),
            transcript: None,
            stats: RunStats::default(),
            active_plan: None,
        }
    }

    pub fn with_events(mut self, events: EventSink) -> Self {
        self.events = events;
        self
    }

    pub fn with_transcript(mut self, transcript: TranscriptWriter) -> Self {
        self.transcript = Some(transcript);
        self
    }

    pub fn checkpoint(&self) -> &Checkpoint {
        &self.checkpoint
    }

    /// 从指定断点开始（下一次 [`run`](Self::run) 生效）
    pub fn set_checkpoint(&mut self, checkpoint: Checkpoint) {
        self.pause.resume();
        self.active_plan = None;
        self.checkpoint = checkpoint;
    }

    pub fn stats(&self) -> RunStats {
        self.stats
    }

    /// 会话重新打开后换上新的驱动
    pub fn replace_driver(&mut self, driver: Box<dyn AssistantDriver>) {
        info!("🔄 已切换到新的驱动: {}", driver.provider_name());
        self.driver = driver;
    }

    /// 从断点开始处理整个队列
    ///
    /// 只在挂起点响应停止请求和会话关闭；返回时断点停在尚未完成的批次上。
    pub async fn run(&mut self, inbox: &mut ControlInbox) -> RunOutcome {
        self.events.emit(WorkerEvent::Running(true));
        info!(
            "🚀 开始处理: 从 [文档 {}] [批次 {}] 继续",
            self.checkpoint.document_index + 1,
            self.checkpoint.batch_index + 1
        );

        // 上一轮停在暂停中：再次开始本身就是手动恢复
        if self.checkpoint.paused {
            self.finish_pause("手动开始，结束暂停");
        }

        loop {
            let total = self.queue.read().await.len();
            let document_index = self.checkpoint.document_index;
            if document_index >= total {
                break;
            }

            if let Err(halt) = self.process_document(document_index, total, inbox).await {
                return self.halt(halt);
            }

            self.checkpoint.advance_document();
            self.active_plan = None;
            self.events
                .emit(WorkerEvent::CheckpointSaved(self.checkpoint.clone()));

            let has_next = self.checkpoint.document_index < self.queue.read().await.len();
            if has_next && !self.options.document_delay.is_zero() {
                info!(
                    "⏳ 等待 {:.1} 秒后处理下一个文档",
                    self.options.document_delay.as_secs_f64()
                );
                if let Some(halt) = inbox.sleep(self.options.document_delay).await {
                    return self.halt(halt);
                }
            }
        }

        self.checkpoint.reset();
        self.active_plan = None;
        self.events
            .emit(WorkerEvent::CheckpointSaved(self.checkpoint.clone()));
        self.events.emit(WorkerEvent::Progress(100.0));
        self.events.emit(WorkerEvent::Completed);
        self.events.emit(WorkerEvent::Running(false));
        info!("✅ 队列处理完成");
        RunOutcome::Completed
    }

    /// 限流：进入暂停，倒计时结束或手动恢复后返回
    ///
    /// 断点停留在失败的批次上，返回 `Ok` 后重发同一批次。
    pub(super) async fn pause_for_rate_limit(
        &mut self,
        reason: &DriverError,
        inbox: &mut ControlInbox,
    ) -> Result<(), Halt> {
        inbox.clear_resume();
        self.pause.enter(self.options.pause_duration);
        let remaining = self.pause.remaining_secs();
        self.checkpoint.set_paused(remaining);

        match remaining {
            Some(secs) => warn!(
                "⏸️ 检测到限流，暂停 {} 后自动继续: {}",
                format_remaining(secs),
                reason
            ),
            None => warn!("⏸️ 检测到限流，已暂停，输入 resume 继续: {}", reason),
        }
        self.events.emit(WorkerEvent::Paused {
            remaining_secs: remaining,
            reason: reason.to_string(),
        });
        self.events
            .emit(WorkerEvent::CheckpointSaved(self.checkpoint.clone()));

        self.wait_out_pause(inbox).await
    }

    async fn wait_out_pause(&mut self, inbox: &mut ControlInbox) -> Result<(), Halt> {
        if self.pause.remaining_secs().is_none() {
            inbox.wait_resume().await?;
            self.finish_pause("手动恢复");
            return Ok(());
        }

        loop {
            if let Some(halt) = inbox.sleep(Duration::from_secs(1)).await {
                return Err(halt);
            }
            if inbox.take_resume() {
                self.finish_pause("手动恢复");
                return Ok(());
            }

            match self.pause.tick() {
                Tick::Continue {
                    remaining_secs,
                    report,
                } => {
                    self.checkpoint.pause_remaining_secs = Some(remaining_secs);
                    if report {
                        info!("⏸️ 暂停中，剩余 {}", format_remaining(remaining_secs));
                        self.events
                            .emit(WorkerEvent::PauseCountdown { remaining_secs });
                    }
                }
                Tick::Resume | Tick::NotPaused | Tick::Indefinite => {
                    // 倒计时结束后再确认一次没有新的停止或会话关闭
                    if let Some(halt) = inbox.check() {
                        return Err(halt);
                    }
                    self.finish_pause("暂停结束，自动继续");
                    return Ok(());
                }
            }
        }
    }

    fn finish_pause(&mut self, message: &str) {
        self.pause.resume();
        self.checkpoint.clear_pause();
        info!("▶️ {}", message);
        self.events.emit(WorkerEvent::Resumed);
    }

    /// 新建对话；失败只记录，不影响后续批次
    pub(super) async fn start_new_conversation(&mut self, context: &str) {
        info!("{} 🆕 新建对话", context);
        match self.driver.start_new_conversation().await {
            Ok(()) => self.events.emit(WorkerEvent::NewConversation),
            Err(e) => warn!("{} ⚠️ 新建对话失败: {}", context, e),
        }
        self.checkpoint.reset_conversation_counter();
    }

    fn halt(&mut self, halt: Halt) -> RunOutcome {
        let checkpoint = self.checkpoint.clone();
        let outcome = match halt {
            Halt::Stop => {
                info!(
                    "⏹️ 已停止，断点: [文档 {}] [批次 {}]",
                    checkpoint.document_index + 1,
                    checkpoint.batch_index + 1
                );
                self.events.emit(WorkerEvent::Stopped(checkpoint));
                RunOutcome::Stopped
            }
            Halt::SessionClosed => {
                warn!(
                    "❌ 浏览器会话已关闭，断点: [文档 {}] [批次 {}]",
                    checkpoint.document_index + 1,
                    checkpoint.batch_index + 1
                );
                self.events.emit(WorkerEvent::SessionClosed(checkpoint));
                RunOutcome::SessionClosed
            }
        };
        self.events.emit(WorkerEvent::Running(false));
        outcome
    }
}
