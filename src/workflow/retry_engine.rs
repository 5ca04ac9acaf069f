//! 批次提交流程 - 流程层
//!
//! 核心职责：把"一个批次"完整地送到助手并拿回回复
//!
//! 流程顺序：
//! 1. 检查停止请求 / 会话状态
//! 2. 上传并发送 → 等待回复
//! 3. 空白回复或普通失败 → 等待后重发整个批次
//! 4. 限流 → 不消耗重试次数，立即交还编排器

use std::path::PathBuf;
use std::time::Duration;

use tracing::{error, info, warn};

use crate::driver::AssistantDriver;
use crate::error::DriverError;
use crate::services::rate_limit;
use crate::workflow::batch_ctx::BatchCtx;
use crate::workflow::control::{ControlInbox, Halt};
use crate::workflow::events::{EventSink, WorkerEvent};

/// 重试策略
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// 首次尝试之外的最大重试次数
    pub max_retries: u32,
    pub retry_delay: Duration,
}

/// 批次结果
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Success(String),
    /// 重试耗尽，批次放弃
    ExhaustedRetries,
    /// 平台限流，由编排器进入暂停
    RateLimited(DriverError),
    /// 停止请求或会话关闭
    Halted(Halt),
}

/// 一次执行的结果与计数
#[derive(Debug, Clone, PartialEq)]
pub struct Execution {
    pub outcome: Outcome,
    /// 实际发送次数
    pub attempts: u32,
    /// 消耗的重试次数
    pub retries: u32,
}

/// 批次提交流程
///
/// - 每次重发都是整个批次，不做部分重发
/// - 不持有驱动，只借用
/// - 不修改断点
pub struct RetryEngine {
    policy: RetryPolicy,
    reply_timeout: Duration,
}

impl RetryEngine {
    pub fn new(policy: RetryPolicy, reply_timeout: Duration) -> Self {
        Self {
            policy,
            reply_timeout,
        }
    }

    pub async fn execute(
        &self,
        driver: &mut dyn AssistantDriver,
        images: &[PathBuf],
        prompt: &str,
        ctx: &BatchCtx,
        inbox: &mut ControlInbox,
        events: &EventSink,
    ) -> Execution {
        let max_retries = self.policy.max_retries;
        let mut attempts = 0;
        let mut retries = 0;

        let finish = |outcome, attempts, retries| Execution {
            outcome,
            attempts,
            retries,
        };

        loop {
            if let Some(halt) = inbox.check() {
                return finish(Outcome::Halted(halt), attempts, retries);
            }

            attempts += 1;
            info!(
                "{} 📤 发送 {} ({} 张图片, 第 {}/{} 次)",
                ctx,
                ctx.label,
                images.len(),
                attempts,
                max_retries + 1
            );

            let failure = match self.attempt(driver, images, prompt).await {
                Ok(reply) => {
                    if !driver.is_empty_reply(&reply).await {
                        info!("{} ✓ 收到回复 ({} 字符)", ctx, reply.chars().count());
                        return finish(Outcome::Success(reply), attempts, retries);
                    }
                    "空白回复".to_string()
                }
                Err(DriverError::SessionClosed) => {
                    warn!("{} 浏览器会话已关闭", ctx);
                    return finish(Outcome::Halted(Halt::SessionClosed), attempts, retries);
                }
                Err(e) if rate_limit::is_rate_limited(&e) => {
                    warn!("{} ⏸️ 检测到平台限流: {}", ctx, e);
                    return finish(Outcome::RateLimited(e), attempts, retries);
                }
                Err(e) => e.to_string(),
            };

            if retries >= max_retries {
                error!(
                    "{} ❌ {}，已重试 {} 次，跳过该批次",
                    ctx, failure, retries
                );
                return finish(Outcome::ExhaustedRetries, attempts, retries);
            }

            retries += 1;
            warn!(
                "{} ⚠️ {}，{:.1} 秒后重试 ({}/{})",
                ctx,
                failure,
                self.policy.retry_delay.as_secs_f64(),
                retries,
                max_retries
            );
            events.emit(WorkerEvent::Retrying {
                attempt: retries,
                max_retries,
                reason: failure,
            });

            if let Some(halt) = inbox.sleep(self.policy.retry_delay).await {
                return finish(Outcome::Halted(halt), attempts, retries);
            }
        }
    }

    async fn attempt(
        &self,
        driver: &mut dyn AssistantDriver,
        images: &[PathBuf],
        prompt: &str,
    ) -> Result<String, DriverError> {
        driver.submit(images, prompt).await?;
        driver.await_completion(self.reply_timeout).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::VecDeque;

    /// 按脚本依次返回结果的驱动
    struct ScriptedDriver {
        replies: VecDeque<Result<String, DriverError>>,
        submits: u32,
    }

    impl ScriptedDriver {
        fn new(replies: Vec<Result<String, DriverError>>) -> Self {
            Self {
                replies: replies.into(),
                submits: 0,
            }
        }
    }

    #[async_trait]
    impl AssistantDriver for ScriptedDriver {
        fn provider_name(&self) -> &str {
            "scripted"
        }

        async fn submit(&mut self, _images: &[PathBuf], _prompt: &str) -> Result<(), DriverError> {
            self.submits += 1;
            Ok(())
        }

        async fn await_completion(&mut self, _timeout: Duration) -> Result<String, DriverError> {
            self.replies.pop_front().unwrap_or_else(|| Ok(String::new()))
        }

        async fn start_new_conversation(&mut self) -> Result<(), DriverError> {
            Ok(())
        }
    }

    fn engine(max_retries: u32) -> RetryEngine {
        RetryEngine::new(
            RetryPolicy {
                max_retries,
                retry_delay: Duration::from_secs(5),
            },
            Duration::from_secs(120),
        )
    }

    fn ctx() -> BatchCtx {
        BatchCtx::new(0, "a.pdf", 0, 1, "第 1 页")
    }

    #[tokio::test(start_paused = true)]
    async fn test_always_empty_makes_exactly_four_attempts() {
        let mut driver = ScriptedDriver::new(vec![]);
        let (_tx, mut inbox) = ControlInbox::channel();
        let (events, mut rx) = EventSink::channel();

        let execution = engine(3)
            .execute(&mut driver, &[], "p", &ctx(), &mut inbox, &events)
            .await;

        assert_eq!(execution.outcome, Outcome::ExhaustedRetries);
        assert_eq!(execution.attempts, 4);
        assert_eq!(execution.retries, 3);
        assert_eq!(driver.submits, 4);

        let mut retry_events = 0;
        while let Ok(event) = rx.try_recv() {
            if matches!(event, WorkerEvent::Retrying { .. }) {
                retry_events += 1;
            }
        }
        assert_eq!(retry_events, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limit_does_not_consume_retries() {
        let mut driver = ScriptedDriver::new(vec![Err(DriverError::provider(
            "You have hit the rate limit",
        ))]);
        let (_tx, mut inbox) = ControlInbox::channel();

        let execution = engine(3)
            .execute(&mut driver, &[], "p", &ctx(), &mut inbox, &EventSink::disabled())
            .await;

        assert!(matches!(execution.outcome, Outcome::RateLimited(_)));
        assert_eq!(execution.retries, 0);
        assert_eq!(execution.attempts, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_recovers_after_empty_and_failure() {
        let mut driver = ScriptedDriver::new(vec![
            Ok("   ".to_string()),
            Err(DriverError::upload("找不到文件上传入口")),
            Ok("答案".to_string()),
        ]);
        let (_tx, mut inbox) = ControlInbox::channel();

        let execution = engine(3)
            .execute(&mut driver, &[], "p", &ctx(), &mut inbox, &EventSink::disabled())
            .await;

        assert_eq!(execution.outcome, Outcome::Success("答案".to_string()));
        assert_eq!(execution.attempts, 3);
        assert_eq!(execution.retries, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_retries_gives_up_after_first_attempt() {
        let mut driver = ScriptedDriver::new(vec![]);
        let (_tx, mut inbox) = ControlInbox::channel();

        let execution = engine(0)
            .execute(&mut driver, &[], "p", &ctx(), &mut inbox, &EventSink::disabled())
            .await;

        assert_eq!(execution.outcome, Outcome::ExhaustedRetries);
        assert_eq!(execution.attempts, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_session_closed_halts() {
        let mut driver = ScriptedDriver::new(vec![Err(DriverError::SessionClosed)]);
        let (_tx, mut inbox) = ControlInbox::channel();

        let execution = engine(3)
            .execute(&mut driver, &[], "p", &ctx(), &mut inbox, &EventSink::disabled())
            .await;

        assert_eq!(execution.outcome, Outcome::Halted(Halt::SessionClosed));
        assert_eq!(execution.retries, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_before_send_makes_no_attempt() {
        let mut driver = ScriptedDriver::new(vec![Ok("x".to_string())]);
        let (tx, mut inbox) = ControlInbox::channel();
        tx.send(crate::workflow::control::ControlRequest::Stop).unwrap();

        let execution = engine(3)
            .execute(&mut driver, &[], "p", &ctx(), &mut inbox, &EventSink::disabled())
            .await;

        assert_eq!(execution.outcome, Outcome::Halted(Halt::Stop));
        assert_eq!(driver.submits, 0);
    }
}
