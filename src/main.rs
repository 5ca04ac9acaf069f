use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::Parser;
use page_relay::config::Config;
use page_relay::models::PlanMode;
use page_relay::orchestrator::App;
use page_relay::utils::{logging, truncate_text};
use page_relay::workflow::{ControlInbox, ControlRequest, ControlSender, EventSink, WorkerEvent};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

fn parse_plan_mode(s: &str) -> Result<PlanMode, String> {
    match s.to_lowercase().as_str() {
        "single" => Ok(PlanMode::Single),
        "fixed" | "fixed_n" | "chunk" => Ok(PlanMode::FixedN),
        "custom" => Ok(PlanMode::Custom),
        _ => Err(format!(
            "无效的分批模式 '{}'，可选: single, fixed, custom",
            s
        )),
    }
}

#[derive(Parser)]
#[command(name = "page-relay")]
#[command(version, about = "把文档逐页（或按批）发送给网页版 AI 助手并收集回复")]
struct Cli {
    /// 待处理的文档（PDF 或图片）
    documents: Vec<PathBuf>,

    /// TOML 配置文件
    #[arg(long, short)]
    config: Option<PathBuf>,

    /// 平台标识 (chatgpt, gemini, claude, deepseek)
    #[arg(long)]
    provider: Option<String>,

    /// 分批模式 (single, fixed, custom)
    #[arg(long, value_parser = parse_plan_mode)]
    mode: Option<PlanMode>,

    /// 固定分批时每批页数
    #[arg(long)]
    chunk_size: Option<usize>,

    /// 随每个批次发送的提示词
    #[arg(long)]
    prompt: Option<String>,

    #[arg(long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => Config::from_toml_file(path)?,
        None => Config::from_env()?,
    };
    if let Some(provider) = cli.provider {
        config.provider = provider;
    }
    if let Some(mode) = cli.mode {
        config.default_mode = mode;
    }
    if let Some(chunk_size) = cli.chunk_size {
        config.chunk_size = chunk_size;
    }
    if let Some(prompt) = cli.prompt {
        config.prompt = prompt;
    }
    config.verbose_logging |= cli.verbose;
    config.validate()?;

    logging::init_log_file(&config.output_log_file)?;
    logging::init(
        config.verbose_logging,
        Some(Path::new(&config.output_log_file)),
    )?;

    let (events, event_rx) = EventSink::channel();
    let (control, inbox) = ControlInbox::channel();
    tokio::spawn(render_events(event_rx));
    tokio::spawn(read_commands(control));

    App::initialize(config, cli.documents, events)
        .await?
        .run(inbox)
        .await
}

/// 把控制台输入转换成控制请求
///
/// 回车或 `start` 开始/继续，`stop` 停止，`resume` 结束暂停，`quit` 退出。
async fn read_commands(control: ControlSender) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                warn!("读取输入失败: {}", e);
                break;
            }
        };

        let request = match line.trim().to_lowercase().as_str() {
            "" | "start" => ControlRequest::Start,
            "stop" => ControlRequest::Stop,
            "resume" => ControlRequest::Resume,
            "quit" | "exit" => {
                let _ = control.send(ControlRequest::Stop);
                break;
            }
            other => {
                warn!("未知命令: {} (可用: start, stop, resume, quit)", other);
                continue;
            }
        };
        if control.send(request).is_err() {
            break;
        }
    }
}

/// 展示工作者事件（状态变化本身已由工作者记录日志）
async fn render_events(mut event_rx: mpsc::UnboundedReceiver<WorkerEvent>) {
    while let Some(event) = event_rx.recv().await {
        match event {
            WorkerEvent::Progress(percent) => info!("📈 进度: {:.1}%", percent),
            WorkerEvent::BatchSucceeded { reply, .. } => {
                info!("💬 {}", truncate_text(reply.trim(), 80))
            }
            WorkerEvent::Stopped(_) | WorkerEvent::SessionClosed(_) => {
                info!("💡 输入 start 从断点继续，输入 quit 退出")
            }
            WorkerEvent::Paused {
                remaining_secs: None,
                ..
            } => info!("💡 输入 resume 结束暂停"),
            other => debug!("事件: {:?}", other),
        }
    }
}
