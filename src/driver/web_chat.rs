//! 网页聊天驱动
//!
//! 由 [`ProviderProfile`] 驱动的通用实现：上传 → 输入 → 发送 → 等待完成。

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;
use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::driver::profiles::ProviderProfile;
use crate::driver::stability::{StabilitySettings, StabilityTracker};
use crate::driver::AssistantDriver;
use crate::error::DriverError;
use crate::infrastructure::JsExecutor;

/// 等待"生成中"标识消失时的轮询间隔
const INDICATOR_POLL: Duration = Duration::from_millis(500);
/// 发送按钮可能在图片处理完之前保持禁用
const SEND_ATTEMPTS: u32 = 10;

pub struct WebChatDriver {
    executor: JsExecutor,
    profile: &'static ProviderProfile,
    url: String,
    stability: StabilitySettings,
    indicator_grace: Duration,
    closed: Option<watch::Receiver<bool>>,
    /// 发送前的回复条数，用于判断是否真的收到了新回复
    replies_before: Option<usize>,
}

impl WebChatDriver {
    pub fn new(executor: JsExecutor, profile: &'static ProviderProfile) -> Self {
        Self {
            executor,
            profile,
            url: profile.url.to_string(),
            stability: StabilitySettings::default(),
            indicator_grace: Duration::from_secs(5),
            closed: None,
            replies_before: None,
        }
    }

    /// 按配置创建
    pub fn from_config(
        executor: JsExecutor,
        profile: &'static ProviderProfile,
        config: &Config,
    ) -> Self {
        let mut driver = Self::new(executor, profile)
            .with_stability(StabilitySettings {
                window: Duration::from_secs(config.stability_window_secs),
                poll_interval: Duration::from_secs(config.stability_poll_secs.max(1)),
            })
            .with_indicator_grace(Duration::from_secs(config.indicator_grace_secs));
        if let Some(url) = &config.provider_url {
            driver = driver.with_url(url.clone());
        }
        driver
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    pub fn with_stability(mut self, stability: StabilitySettings) -> Self {
        self.stability = stability;
        self
    }

    pub fn with_indicator_grace(mut self, grace: Duration) -> Self {
        self.indicator_grace = grace;
        self
    }

    /// 订阅会话关闭通知
    pub fn with_session_closed(mut self, closed: watch::Receiver<bool>) -> Self {
        self.closed = Some(closed);
        self
    }

    pub fn profile(&self) -> &'static ProviderProfile {
        self.profile
    }

    fn session_closed(&self) -> bool {
        self.closed.as_ref().is_some_and(|rx| *rx.borrow())
    }

    fn ensure_open(&self) -> Result<(), DriverError> {
        if self.session_closed() {
            Err(DriverError::SessionClosed)
        } else {
            Ok(())
        }
    }

    /// 会话已关闭时，任何页面错误都归为 SessionClosed
    fn classify_err(&self, err: DriverError) -> DriverError {
        if self.session_closed() {
            DriverError::SessionClosed
        } else {
            err
        }
    }

    async fn upload_images(&self, images: &[PathBuf]) -> Result<(), DriverError> {
        let p = self.profile;
        let first_try = self.executor.upload_files(&p.file_input, images).await;
        let selector = match first_try {
            Ok(selector) => selector,
            Err(DriverError::LocatorNotFound { .. }) if !p.attach_button.is_empty() => {
                debug!("[{}] 未找到文件输入框，尝试点击附件按钮", p.name);
                if let Err(e) = self.executor.click_first(&p.attach_button).await {
                    debug!("[{}] 点击附件按钮失败: {}", p.name, e);
                }
                sleep(Duration::from_millis(500)).await;
                self.executor
                    .upload_files(&p.file_input, images)
                    .await
                    .map_err(|e| match e {
                        DriverError::LocatorNotFound { .. } => {
                            DriverError::upload("找不到文件上传入口")
                        }
                        other => other,
                    })?
            }
            Err(DriverError::LocatorNotFound { .. }) => {
                return Err(DriverError::upload("找不到文件上传入口"));
            }
            Err(e) => return Err(e),
        };
        debug!("[{}] 已通过 {} 上传 {} 张图片", p.name, selector, images.len());

        // 等待平台处理图片
        let settle = Duration::from_millis(1000 + 500 * images.len() as u64);
        sleep(settle).await;
        Ok(())
    }

    async fn click_send(&self) -> Result<(), DriverError> {
        let p = self.profile;
        let mut last_err = None;
        for attempt in 1..=SEND_ATTEMPTS {
            match self.executor.click_first(&p.send_button).await {
                Ok(selector) => {
                    debug!("[{}] 已点击发送按钮 ({})", p.name, selector);
                    return Ok(());
                }
                Err(e) => {
                    debug!("[{}] 发送按钮暂不可用 ({}/{})", p.name, attempt, SEND_ATTEMPTS);
                    last_err = Some(e);
                    self.ensure_open()?;
                    sleep(Duration::from_secs(1)).await;
                }
            }
        }
        Err(DriverError::upload(format!(
            "无法发送: {}",
            last_err.map(|e| e.to_string()).unwrap_or_default()
        )))
    }

    /// 可见的平台提示横幅
    async fn check_banner(&self) -> Result<(), DriverError> {
        if let Some(text) = self.executor.visible_text(&self.profile.rate_limit_banner).await? {
            let text = text.trim();
            if !text.is_empty() {
                warn!("[{}] 平台提示: {}", self.profile.name, text);
                return Err(DriverError::provider(text));
            }
        }
        Ok(())
    }

    /// 在宽限期内等待"生成中"标识出现
    async fn indicator_appeared(&self) -> Result<bool, DriverError> {
        let indicator = &self.profile.generating_indicator;
        if indicator.is_empty() {
            return Ok(false);
        }
        let grace_end = Instant::now() + self.indicator_grace;
        loop {
            self.ensure_open()?;
            if self.executor.first_present(indicator, true).await?.is_some() {
                return Ok(true);
            }
            if Instant::now() >= grace_end {
                return Ok(false);
            }
            sleep(INDICATOR_POLL).await;
        }
    }

    async fn wait_indicator_gone(&self, deadline: Instant, timeout: Duration) -> Result<(), DriverError> {
        let indicator = &self.profile.generating_indicator;
        while self.executor.first_present(indicator, true).await?.is_some() {
            self.ensure_open()?;
            if Instant::now() >= deadline {
                return Err(DriverError::Timeout {
                    waited_ms: timeout.as_millis() as u64,
                });
            }
            sleep(INDICATOR_POLL).await;
        }
        Ok(())
    }

    async fn wait_content_stable(&self, deadline: Instant) -> Result<(), DriverError> {
        let mut tracker = StabilityTracker::new(self.stability);
        loop {
            self.ensure_open()?;
            let content = self
                .executor
                .last_text(&self.profile.reply_container)
                .await?
                .unwrap_or_default();
            if tracker.observe(&content) {
                debug!("[{}] 内容已稳定 {:?}", self.profile.name, tracker.stable_for());
                return Ok(());
            }
            if Instant::now() >= deadline {
                warn!("[{}] 内容稳定检测达到最长等待时间", self.profile.name);
                return Ok(());
            }
            sleep(tracker.poll_interval()).await;
        }
    }

    async fn read_reply(&self) -> Result<String, DriverError> {
        Ok(self
            .executor
            .last_text(&self.profile.reply_container)
            .await?
            .unwrap_or_default())
    }
}

#[async_trait]
impl AssistantDriver for WebChatDriver {
    fn provider_name(&self) -> &str {
        self.profile.name
    }

    async fn submit(&mut self, images: &[PathBuf], prompt: &str) -> Result<(), DriverError> {
        self.ensure_open()?;
        let p = self.profile;

        let result = async {
            let before = self.executor.count(&p.reply_container).await?;
            debug!("[{}] 发送前回复数量: {}", p.name, before);

            if !images.is_empty() {
                self.upload_images(images).await?;
            }

            self.executor
                .fill_text(&p.input_box, prompt)
                .await
                .map_err(|e| match e {
                    DriverError::LocatorNotFound { .. } => DriverError::upload("找不到输入框"),
                    other => other,
                })?;
            sleep(Duration::from_millis(500)).await;

            self.click_send().await?;
            self.check_banner().await?;
            Ok::<usize, DriverError>(before)
        }
        .await;

        match result {
            Ok(before) => {
                self.replies_before = Some(before);
                info!("[{}] ✓ 已发送 {} 张图片", p.name, images.len());
                Ok(())
            }
            Err(e) => Err(self.classify_err(e)),
        }
    }

    async fn await_completion(&mut self, timeout: Duration) -> Result<String, DriverError> {
        self.ensure_open()?;
        let deadline = Instant::now() + timeout;

        let result = async {
            if self.indicator_appeared().await? {
                debug!("[{}] 检测到生成中标识，等待其消失", self.profile.name);
                self.wait_indicator_gone(deadline, timeout).await?;
                // 标识消失后内容可能仍在落盘
                sleep(Duration::from_secs(1)).await;
            } else {
                debug!("[{}] 未检测到生成中标识，改用内容稳定检测", self.profile.name);
                self.wait_content_stable(deadline).await?;
            }
            self.check_banner().await?;
            self.read_reply().await
        }
        .await;

        result.map_err(|e| self.classify_err(e))
    }

    async fn start_new_conversation(&mut self) -> Result<(), DriverError> {
        self.ensure_open()?;
        self.replies_before = None;
        let p = self.profile;

        match self.executor.click_first(&p.new_chat).await {
            Ok(_) => info!("[{}] ✓ 已新建对话", p.name),
            Err(e) => {
                debug!("[{}] 新对话按钮不可用 ({})，直接打开首页", p.name, e);
                self.executor
                    .page()
                    .goto(self.url.as_str())
                    .await
                    .map_err(|e| self.classify_err(e.into()))?;
                info!("[{}] ✓ 已打开新对话: {}", p.name, self.url);
            }
        }
        sleep(Duration::from_secs(2)).await;
        Ok(())
    }

    async fn is_empty_reply(&mut self, reply: &str) -> bool {
        if reply.trim().is_empty() {
            warn!("[{}] 检测到空白回复", self.profile.name);
            return true;
        }
        let Some(before) = self.replies_before else {
            return false;
        };
        match self.executor.count(&self.profile.reply_container).await {
            Ok(after) if after <= before => {
                warn!(
                    "[{}] 没有检测到新回复 (发送前 {} 条, 现在 {} 条)",
                    self.profile.name, before, after
                );
                true
            }
            Ok(_) => false,
            Err(e) => {
                debug!("[{}] 统计回复数量失败: {}", self.profile.name, e);
                false
            }
        }
    }
}
