//! 暂停 / 恢复控制 - 业务能力层
//!
//! 只负责倒计时状态，不负责等待：编排器每秒调用一次 [`PauseController::tick`]，
//! 由返回值决定继续等待还是恢复。

use crate::config::PauseDuration;

/// 每隔多少秒报告一次倒计时进度
pub const PROGRESS_INTERVAL_SECS: u64 = 10;

/// 控制器状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PauseState {
    Running,
    /// `None` 表示无限期暂停
    Paused { remaining_secs: Option<u64> },
}

/// 一次 tick 的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tick {
    /// 仍在倒计时；`report` 为 true 时应当对外报告进度
    Continue { remaining_secs: u64, report: bool },
    /// 倒计时结束，应当恢复（只会出现一次）
    Resume,
    /// 无限期暂停，只能手动恢复
    Indefinite,
    /// 当前未暂停
    NotPaused,
}

#[derive(Debug, Clone)]
pub struct PauseController {
    state: PauseState,
}

impl PauseController {
    pub fn new() -> Self {
        Self {
            state: PauseState::Running,
        }
    }

    pub fn state(&self) -> PauseState {
        self.state
    }

    pub fn is_paused(&self) -> bool {
        matches!(self.state, PauseState::Paused { .. })
    }

    /// 剩余秒数；未暂停或无限期暂停时为 None
    pub fn remaining_secs(&self) -> Option<u64> {
        match self.state {
            PauseState::Paused { remaining_secs } => remaining_secs,
            PauseState::Running => None,
        }
    }

    /// 进入暂停；无限期暂停不启动倒计时
    pub fn enter(&mut self, duration: PauseDuration) -> PauseState {
        self.state = PauseState::Paused {
            remaining_secs: duration.seconds(),
        };
        self.state
    }

    /// 倒计时前进一秒
    pub fn tick(&mut self) -> Tick {
        match self.state {
            PauseState::Running => Tick::NotPaused,
            PauseState::Paused {
                remaining_secs: None,
            } => Tick::Indefinite,
            PauseState::Paused {
                remaining_secs: Some(remaining),
            } => {
                let remaining = remaining.saturating_sub(1);
                if remaining == 0 {
                    self.state = PauseState::Running;
                    Tick::Resume
                } else {
                    self.state = PauseState::Paused {
                        remaining_secs: Some(remaining),
                    };
                    Tick::Continue {
                        remaining_secs: remaining,
                        report: remaining % PROGRESS_INTERVAL_SECS == 0,
                    }
                }
            }
        }
    }

    /// 手动恢复；返回此前是否处于暂停状态
    pub fn resume(&mut self) -> bool {
        let was_paused = self.is_paused();
        self.state = PauseState::Running;
        was_paused
    }
}

impl Default for PauseController {
    fn default() -> Self {
        Self::new()
    }
}

/// 将秒数格式化为 mm:ss
pub fn format_remaining(secs: u64) -> String {
    format!("{:02}:{:02}", secs / 60, secs % 60)
}
