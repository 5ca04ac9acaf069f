//! 应用入口 - 编排层
//!
//! ## 职责
//!
//! 1. **应用初始化**：打开浏览器会话、创建驱动和渲染器
//! 2. **队列装载**：把命令行给出的文档放入队列
//! 3. **生命周期**：等待开始 → 运行 → 停止后等待继续 → 会话关闭后重新打开
//! 4. **全局统计**：运行结束后输出汇总
//!
//! ## 设计特点
//!
//! - **资源所有者**：唯一持有浏览器会话的模块
//! - **向下委托**：队列和批次的处理全部交给 [`Orchestrator`]

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, Result};
use tracing::{info, warn};

use crate::browser::{self, SessionHandle};
use crate::config::Config;
use crate::driver::registry;
use crate::driver::AssistantDriver;
use crate::infrastructure::JsExecutor;
use crate::models::{Document, DocumentQueue, SharedQueue};
use crate::orchestrator::queue_runner::{Orchestrator, RunOutcome, RunStats};
use crate::services::{PdftoppmRasterizer, TranscriptWriter};
use crate::workflow::{ControlInbox, EventSink};

/// 应用主结构
pub struct App {
    config: Config,
    session: Option<SessionHandle>,
    queue: SharedQueue,
    orchestrator: Orchestrator,
}

impl App {
    /// 初始化应用
    pub async fn initialize(
        config: Config,
        documents: Vec<PathBuf>,
        events: EventSink,
    ) -> Result<Self> {
        log_startup(&config, documents.len());

        let mut queue = DocumentQueue::new();
        for path in documents {
            queue.push(Document::new(path, config.default_mode, config.chunk_size));
        }
        let queue = queue.into_shared();

        let session = open_session(&config).await?;
        let driver = create_driver(&config, &session)?;

        let rasterizer = Arc::new(PdftoppmRasterizer::new(&config.output_dir));
        let orchestrator = Orchestrator::new(driver, rasterizer, queue.clone(), config.run_options())
            .with_events(events)
            .with_transcript(TranscriptWriter::with_path(&config.transcript_file));

        Ok(Self {
            config,
            session: Some(session),
            queue,
            orchestrator,
        })
    }

    /// 共享的文档队列（运行期间可以修改页面启用状态等）
    pub fn queue(&self) -> SharedQueue {
        self.queue.clone()
    }

    /// 运行应用主逻辑，直到队列完成或请求通道关闭
    pub async fn run(mut self, mut inbox: ControlInbox) -> Result<()> {
        if self.queue.read().await.is_empty() {
            warn!("⚠️ 队列中没有文档，程序结束");
            self.shutdown().await;
            return Ok(());
        }

        if let Some(session) = &self.session {
            inbox.attach_session(session.closed());
        }

        info!("💡 请在浏览器中登录后按回车（或输入 start）开始处理");
        if !inbox.wait_for_start().await {
            self.shutdown().await;
            return Ok(());
        }

        loop {
            inbox.begin_run();
            match self.orchestrator.run(&mut inbox).await {
                RunOutcome::Completed => {
                    print_final_stats(&self.orchestrator.stats(), &self.config);
                    break;
                }
                RunOutcome::Stopped => {
                    info!("⏹️ 已停止，输入 start 从断点继续");
                    if !inbox.wait_for_start().await {
                        break;
                    }
                }
                RunOutcome::SessionClosed => {
                    warn!("⚠️ 浏览器会话已关闭，输入 start 重新打开浏览器并从断点继续");
                    if !inbox.wait_for_start().await {
                        break;
                    }
                    self.relaunch(&mut inbox).await?;
                }
            }
        }

        self.shutdown().await;
        Ok(())
    }

    /// 重新打开会话并换上新驱动
    async fn relaunch(&mut self, inbox: &mut ControlInbox) -> Result<()> {
        if let Some(old) = self.session.take() {
            old.close().await;
        }
        let session = open_session(&self.config).await?;
        inbox.attach_session(session.closed());
        self.orchestrator
            .replace_driver(create_driver(&self.config, &session)?);
        self.session = Some(session);
        Ok(())
    }

    async fn shutdown(&mut self) {
        if let Some(session) = self.session.take() {
            session.close().await;
        }
    }
}

async fn open_session(config: &Config) -> Result<SessionHandle> {
    let url = registry::target_url(config)
        .ok_or_else(|| anyhow!("不支持的平台: {}", config.provider))?;
    info!("🌐 正在打开 {}", url);
    let session = browser::open_session(config, &url).await?;
    Ok(session)
}

fn create_driver(config: &Config, session: &SessionHandle) -> Result<Box<dyn AssistantDriver>> {
    let executor = JsExecutor::new(session.page.clone());
    let driver = registry::create_driver(config, executor, session.closed())?;
    Ok(driver)
}

fn log_startup(config: &Config, documents: usize) {
    info!("{}", "=".repeat(60));
    info!("🚀 程序启动 - 批量提交模式");
    info!("🤖 平台: {}", config.provider);
    info!("📄 待处理文档: {} 个", documents);
    info!(
        "🔁 空白回复重试: 最多 {} 次，间隔 {:.1} 秒",
        config.empty_reply_max_retries, config.empty_reply_retry_delay_secs
    );
    if config.auto_pause_on_rate_limit {
        match config.pause_duration().seconds() {
            Some(secs) => info!("⏸️ 限流时自动暂停 {} 分钟", secs / 60),
            None => info!("⏸️ 限流时暂停，需手动恢复"),
        }
    }
    info!("{}", "=".repeat(60));
}

fn print_final_stats(stats: &RunStats, config: &Config) {
    info!("\n{}", "=".repeat(60));
    info!("📊 全部处理完成统计");
    info!(
        "完成时间: {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    info!("{}", "=".repeat(60));
    info!("✅ 成功批次: {}/{}", stats.batches_succeeded, stats.total_batches());
    info!("❌ 失败批次: {}", stats.batches_failed);
    if stats.batches_skipped > 0 {
        info!("⏭️ 页面已禁用而跳过的批次: {}", stats.batches_skipped);
    }
    if stats.documents_skipped > 0 {
        info!("⚠️ 跳过的文档: {}", stats.documents_skipped);
    }
    info!("{}", "=".repeat(60));
    info!("\n回复已保存至: {}", config.transcript_file);
    info!("日志已保存至: {}", config.output_log_file);
}
