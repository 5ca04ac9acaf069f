//! 内容稳定检测
//!
//! 平台没有"生成中"标识时的兜底：定时读取最后一条回复，
//! 非空且连续保持不变达到稳定窗口即视为完成。

use std::time::Duration;

/// 稳定检测参数
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StabilitySettings {
    /// 内容保持不变多久视为完成
    pub window: Duration,
    /// 轮询间隔
    pub poll_interval: Duration,
}

impl Default for StabilitySettings {
    fn default() -> Self {
        Self {
            window: Duration::from_secs(5),
            poll_interval: Duration::from_secs(2),
        }
    }
}

/// 稳定性追踪器：每次轮询喂入一次观测值
#[derive(Debug, Clone)]
pub struct StabilityTracker {
    settings: StabilitySettings,
    last: Option<String>,
    stable_for: Duration,
}

impl StabilityTracker {
    pub fn new(settings: StabilitySettings) -> Self {
        Self {
            settings,
            last: None,
            stable_for: Duration::ZERO,
        }
    }

    pub fn poll_interval(&self) -> Duration {
        self.settings.poll_interval
    }

    /// 记录一次观测，返回内容是否已稳定
    ///
    /// 空内容永远不算稳定（回复可能尚未出现）。
    pub fn observe(&mut self, content: &str) -> bool {
        let unchanged = !content.is_empty() && self.last.as_deref() == Some(content);
        if unchanged {
            self.stable_for += self.settings.poll_interval;
        } else {
            self.last = Some(content.to_string());
            self.stable_for = Duration::ZERO;
        }
        self.is_stable()
    }

    pub fn is_stable(&self) -> bool {
        self.stable_for >= self.settings.window
    }

    pub fn stable_for(&self) -> Duration {
        self.stable_for
    }

    /// 最近一次观测到的内容
    pub fn last_content(&self) -> &str {
        self.last.as_deref().unwrap_or_default()
    }
}
