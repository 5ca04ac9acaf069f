//! 控制请求
//!
//! 展示层 → 工作者的请求通道。工作者只在挂起点（发送前、各类等待中）检查，
//! 正在进行的页面操作不会被打断。

use std::mem;
use std::time::Duration;

use tokio::sync::mpsc::error::TryRecvError;
use tokio::sync::{mpsc, watch};
use tokio::time::{sleep_until, Instant};

/// 展示层发出的请求
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlRequest {
    /// 开始（或从断点继续）处理
    Start,
    /// 在下一个批次边界停止，保留断点
    Stop,
    /// 结束限流暂停
    Resume,
}

/// 中止运行的原因
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Halt {
    Stop,
    SessionClosed,
}

pub type ControlSender = mpsc::UnboundedSender<ControlRequest>;

enum Wake {
    Elapsed,
    Request(Option<ControlRequest>),
    SessionEnded,
}

/// 工作者侧的请求收件箱
pub struct ControlInbox {
    rx: mpsc::UnboundedReceiver<ControlRequest>,
    rx_open: bool,
    session: Option<watch::Receiver<bool>>,
    session_lost: bool,
    stop_requested: bool,
    resume_requested: bool,
    start_requested: bool,
}

impl ControlInbox {
    pub fn channel() -> (ControlSender, Self) {
        let (tx, rx) = mpsc::unbounded_channel();
        let inbox = Self {
            rx,
            rx_open: true,
            session: None,
            session_lost: false,
            stop_requested: false,
            resume_requested: false,
            start_requested: false,
        };
        (tx, inbox)
    }

    /// 订阅新会话的关闭通知（重新打开会话后调用）
    pub fn attach_session(&mut self, closed: watch::Receiver<bool>) {
        self.session = Some(closed);
        self.session_lost = false;
    }

    pub fn session_closed(&self) -> bool {
        self.session_lost || self.session.as_ref().is_some_and(|rx| *rx.borrow())
    }

    /// 新一轮运行开始前清掉过期的请求
    pub fn begin_run(&mut self) {
        self.drain();
        self.stop_requested = false;
        self.resume_requested = false;
        self.start_requested = false;
    }

    /// 非阻塞检查：会话关闭优先于停止请求
    pub fn check(&mut self) -> Option<Halt> {
        self.drain();
        if self.session_closed() {
            Some(Halt::SessionClosed)
        } else if self.stop_requested {
            Some(Halt::Stop)
        } else {
            None
        }
    }

    /// 取走一次恢复请求
    pub fn take_resume(&mut self) -> bool {
        self.drain();
        mem::take(&mut self.resume_requested)
    }

    /// 暂停开始前丢弃已有的恢复请求
    pub fn clear_resume(&mut self) {
        self.drain();
        self.resume_requested = false;
    }

    /// 可被停止请求和会话关闭打断的等待
    pub async fn sleep(&mut self, duration: Duration) -> Option<Halt> {
        let deadline = Instant::now() + duration;
        loop {
            if let Some(halt) = self.check() {
                return Some(halt);
            }
            if Instant::now() >= deadline {
                return None;
            }
            if let Wake::Elapsed = self.wait(Some(deadline), true).await {
                return self.check();
            }
        }
    }

    /// 无限期暂停：等待恢复请求
    ///
    /// 请求通道已关闭时再也等不到恢复，按停止处理。
    pub async fn wait_resume(&mut self) -> Result<(), Halt> {
        loop {
            if let Some(halt) = self.check() {
                return Err(halt);
            }
            if self.take_resume() {
                return Ok(());
            }
            if !self.rx_open {
                return Err(Halt::Stop);
            }
            self.wait(None, true).await;
        }
    }

    /// 空闲时等待开始（或恢复）请求；请求通道关闭时返回 false
    pub async fn wait_for_start(&mut self) -> bool {
        loop {
            self.drain();
            let start = mem::take(&mut self.start_requested);
            let resume = mem::take(&mut self.resume_requested);
            if start || resume {
                self.stop_requested = false;
                return true;
            }
            if !self.rx_open {
                return false;
            }
            self.wait(None, false).await;
        }
    }

    fn record(&mut self, request: ControlRequest) {
        match request {
            ControlRequest::Start => self.start_requested = true,
            ControlRequest::Stop => {
                self.stop_requested = true;
                self.start_requested = false;
            }
            ControlRequest::Resume => self.resume_requested = true,
        }
    }

    fn drain(&mut self) {
        loop {
            match self.rx.try_recv() {
                Ok(request) => self.record(request),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    self.rx_open = false;
                    break;
                }
            }
        }
    }

    async fn wait(&mut self, deadline: Option<Instant>, watch_session: bool) -> Wake {
        let rx_open = self.rx_open;
        let session = if watch_session {
            self.session.as_mut()
        } else {
            None
        };

        let wake = tokio::select! {
            _ = sleep_until_opt(deadline) => Wake::Elapsed,
            request = recv_opt(&mut self.rx, rx_open) => Wake::Request(request),
            _ = wait_closed(session) => Wake::SessionEnded,
        };

        match wake {
            Wake::Request(Some(request)) => self.record(request),
            Wake::Request(None) => self.rx_open = false,
            Wake::SessionEnded => self.session_lost = true,
            Wake::Elapsed => {}
        }
        wake
    }
}

async fn sleep_until_opt(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

async fn recv_opt(
    rx: &mut mpsc::UnboundedReceiver<ControlRequest>,
    open: bool,
) -> Option<ControlRequest> {
    if open {
        rx.recv().await
    } else {
        std::future::pending().await
    }
}

/// 关闭标志变为 true，或发送端消失
async fn wait_closed(session: Option<&mut watch::Receiver<bool>>) {
    match session {
        Some(rx) => {
            let _ = rx.wait_for(|closed| *closed).await;
        }
        None => std::future::pending().await,
    }
}
