use std::collections::{HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use page_relay::config::{Config, PauseDuration, RunOptions};
use page_relay::driver::AssistantDriver;
use page_relay::error::{ConversionError, DriverError};
use page_relay::models::{Document, DocumentQueue, Group, PlanMode, SharedQueue};
use page_relay::orchestrator::{Orchestrator, RunOutcome};
use page_relay::services::Rasterizer;
use page_relay::workflow::{
    Checkpoint, ControlInbox, ControlRequest, ControlSender, EventSink, WorkerEvent,
};
use tokio::sync::{mpsc, watch};

// ========== 测试替身 ==========

/// 记录驱动收到的调用
#[derive(Clone, Default)]
struct Record {
    submits: Arc<Mutex<Vec<Vec<String>>>>,
    new_conversations: Arc<AtomicUsize>,
}

impl Record {
    fn submits(&self) -> Vec<Vec<String>> {
        self.submits.lock().unwrap().clone()
    }

    fn new_conversations(&self) -> usize {
        self.new_conversations.load(Ordering::SeqCst)
    }
}

struct StubDriver {
    record: Record,
    script: VecDeque<Result<String, DriverError>>,
    /// 第 N 次提交时发出停止请求
    stop_on_submit: Option<(usize, ControlSender)>,
}

impl StubDriver {
    fn new(record: &Record) -> Self {
        Self {
            record: record.clone(),
            script: VecDeque::new(),
            stop_on_submit: None,
        }
    }

    fn with_script(mut self, script: Vec<Result<String, DriverError>>) -> Self {
        self.script = script.into();
        self
    }

    fn stop_on_submit(mut self, n: usize, control: ControlSender) -> Self {
        self.stop_on_submit = Some((n, control));
        self
    }
}

#[async_trait]
impl AssistantDriver for StubDriver {
    fn provider_name(&self) -> &str {
        "stub"
    }

    async fn submit(&mut self, images: &[PathBuf], _prompt: &str) -> Result<(), DriverError> {
        let names: Vec<String> = images
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        let count = {
            let mut submits = self.record.submits.lock().unwrap();
            submits.push(names);
            submits.len()
        };
        if let Some((n, control)) = &self.stop_on_submit {
            if count == *n {
                control.send(ControlRequest::Stop).unwrap();
            }
        }
        Ok(())
    }

    async fn await_completion(&mut self, _timeout: Duration) -> Result<String, DriverError> {
        self.script
            .pop_front()
            .unwrap_or_else(|| Ok("这是回复".to_string()))
    }

    async fn start_new_conversation(&mut self) -> Result<(), DriverError> {
        self.record.new_conversations.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// 按文档名生成 `<stem>-<i>.png`
struct StubRasterizer {
    pages: usize,
    failing: HashSet<PathBuf>,
    calls: AtomicUsize,
}

impl StubRasterizer {
    fn new(pages: usize) -> Self {
        Self {
            pages,
            failing: HashSet::new(),
            calls: AtomicUsize::new(0),
        }
    }

    fn failing(mut self, path: &str) -> Self {
        self.failing.insert(PathBuf::from(path));
        self
    }
}

#[async_trait]
impl Rasterizer for StubRasterizer {
    async fn rasterize(&self, document: &Path, _dpi: u32) -> Result<Vec<PathBuf>, ConversionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.contains(document) {
            return Err(ConversionError::ToolFailed {
                path: document.to_path_buf(),
                message: "damaged file".to_string(),
            });
        }
        Ok(images(document, self.pages))
    }
}

fn images(document: &Path, pages: usize) -> Vec<PathBuf> {
    let stem = document.file_stem().unwrap().to_string_lossy().into_owned();
    (0..pages)
        .map(|i| PathBuf::from(format!("{stem}-{i}.png")))
        .collect()
}

fn options() -> RunOptions {
    RunOptions {
        batch_delay: Duration::from_secs(2),
        document_delay: Duration::from_secs(5),
        retry_delay: Duration::from_secs(5),
        new_conversation_per_document: false,
        new_conversation_page_threshold: None,
        ..Config::default().run_options()
    }
}

fn single_queue(names: &[&str]) -> SharedQueue {
    let mut queue = DocumentQueue::new();
    for name in names {
        queue.push(Document::new(*name, PlanMode::Single, 1));
    }
    queue.into_shared()
}

fn names(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

fn drain(rx: &mut mpsc::UnboundedReceiver<WorkerEvent>) -> Vec<WorkerEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

// ========== 场景测试 ==========

#[tokio::test(start_paused = true)]
async fn test_end_to_end_two_documents() {
    let mut queue = DocumentQueue::new();
    queue.push(Document::new("a.pdf", PlanMode::Single, 1));

    let mut doc_b = Document::new("b.pdf", PlanMode::Custom, 1);
    doc_b.set_rasterized_pages(images(Path::new("b.pdf"), 4));
    doc_b.set_page_enabled(1, false);
    doc_b.add_group(Group::new(vec![0, 2]));
    queue.push(doc_b);

    let record = Record::default();
    let rasterizer = Arc::new(StubRasterizer::new(3));
    let (events, mut rx) = EventSink::channel();
    let mut orchestrator = Orchestrator::new(
        Box::new(StubDriver::new(&record)),
        rasterizer.clone(),
        queue.into_shared(),
        options(),
    )
    .with_events(events);
    let (_control, mut inbox) = ControlInbox::channel();

    let outcome = orchestrator.run(&mut inbox).await;

    assert_eq!(outcome, RunOutcome::Completed);
    assert_eq!(
        record.submits(),
        vec![
            names(&["a-0.png"]),
            names(&["a-1.png"]),
            names(&["a-2.png"]),
            names(&["b-0.png", "b-2.png"]),
            names(&["b-3.png"]),
        ]
    );
    // b.pdf 已有缓存，不再渲染
    assert_eq!(rasterizer.calls.load(Ordering::SeqCst), 1);
    assert_eq!(orchestrator.checkpoint(), &Checkpoint::new());
    assert_eq!(orchestrator.stats().batches_succeeded, 5);

    let events = drain(&mut rx);
    let succeeded = events
        .iter()
        .filter(|e| matches!(e, WorkerEvent::BatchSucceeded { .. }))
        .count();
    assert_eq!(succeeded, 5);
    assert!(matches!(events.last(), Some(WorkerEvent::Running(false))));
    assert!(events.contains(&WorkerEvent::Completed));

    let last_progress = events
        .iter()
        .rev()
        .find_map(|e| match e {
            WorkerEvent::Progress(p) => Some(*p),
            _ => None,
        })
        .unwrap();
    assert!((last_progress - 100.0).abs() < f64::EPSILON);
}

#[tokio::test(start_paused = true)]
async fn test_resume_from_checkpoint_skips_finished_work() {
    let record = Record::default();
    let mut orchestrator = Orchestrator::new(
        Box::new(StubDriver::new(&record)),
        Arc::new(StubRasterizer::new(4)),
        single_queue(&["a.pdf", "b.pdf", "c.pdf"]),
        options(),
    );
    orchestrator.set_checkpoint(Checkpoint::at(1, 2));
    let (_control, mut inbox) = ControlInbox::channel();

    assert_eq!(orchestrator.run(&mut inbox).await, RunOutcome::Completed);

    assert_eq!(
        record.submits(),
        vec![
            names(&["b-2.png"]),
            names(&["b-3.png"]),
            names(&["c-0.png"]),
            names(&["c-1.png"]),
            names(&["c-2.png"]),
            names(&["c-3.png"]),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_stop_keeps_checkpoint_and_resumes_there() {
    let record = Record::default();
    let (control, mut inbox) = ControlInbox::channel();
    let driver = StubDriver::new(&record).stop_on_submit(2, control.clone());
    let (events, mut rx) = EventSink::channel();
    let mut orchestrator = Orchestrator::new(
        Box::new(driver),
        Arc::new(StubRasterizer::new(4)),
        single_queue(&["a.pdf"]),
        options(),
    )
    .with_events(events);

    // 进行中的批次会完成，之后在批次边界停止
    assert_eq!(orchestrator.run(&mut inbox).await, RunOutcome::Stopped);
    assert_eq!(record.submits().len(), 2);
    let checkpoint = orchestrator.checkpoint();
    assert_eq!((checkpoint.document_index, checkpoint.batch_index), (0, 2));
    assert_eq!(checkpoint.pages_since_new_conversation, 2);
    assert!(drain(&mut rx)
        .iter()
        .any(|e| matches!(e, WorkerEvent::Stopped(cp) if cp.batch_index == 2)));

    inbox.begin_run();
    assert_eq!(orchestrator.run(&mut inbox).await, RunOutcome::Completed);
    assert_eq!(
        record.submits(),
        vec![
            names(&["a-0.png"]),
            names(&["a-1.png"]),
            names(&["a-2.png"]),
            names(&["a-3.png"]),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_rate_limit_pauses_then_resends_same_batch() {
    let record = Record::default();
    let driver = StubDriver::new(&record).with_script(vec![
        Ok("第一页".to_string()),
        Err(DriverError::provider("You've reached our rate limit. Please try again later.")),
    ]);
    let (events, mut rx) = EventSink::channel();
    let mut orchestrator = Orchestrator::new(
        Box::new(driver),
        Arc::new(StubRasterizer::new(3)),
        single_queue(&["a.pdf"]),
        RunOptions {
            auto_pause: true,
            pause_duration: PauseDuration::Custom(1),
            ..options()
        },
    )
    .with_events(events);
    let (_control, mut inbox) = ControlInbox::channel();

    let started = tokio::time::Instant::now();
    assert_eq!(orchestrator.run(&mut inbox).await, RunOutcome::Completed);
    assert!(started.elapsed() >= Duration::from_secs(60));

    assert_eq!(
        record.submits(),
        vec![
            names(&["a-0.png"]),
            names(&["a-1.png"]),
            names(&["a-1.png"]),
            names(&["a-2.png"]),
        ]
    );
    assert_eq!(orchestrator.stats().batches_failed, 0);

    let events = drain(&mut rx);
    assert!(events.iter().any(|e| matches!(
        e,
        WorkerEvent::Paused {
            remaining_secs: Some(60),
            ..
        }
    )));
    let countdowns: Vec<u64> = events
        .iter()
        .filter_map(|e| match e {
            WorkerEvent::PauseCountdown { remaining_secs } => Some(*remaining_secs),
            _ => None,
        })
        .collect();
    assert_eq!(countdowns, vec![50, 40, 30, 20, 10]);
    assert_eq!(
        events.iter().filter(|e| **e == WorkerEvent::Resumed).count(),
        1
    );
    // 限流不消耗重试次数
    assert!(!events
        .iter()
        .any(|e| matches!(e, WorkerEvent::Retrying { .. })));
}

#[tokio::test(start_paused = true)]
async fn test_indefinite_pause_waits_for_resume_request() {
    let record = Record::default();
    let driver = StubDriver::new(&record)
        .with_script(vec![Err(DriverError::provider("Too many requests"))]);
    let mut orchestrator = Orchestrator::new(
        Box::new(driver),
        Arc::new(StubRasterizer::new(1)),
        single_queue(&["a.pdf"]),
        RunOptions {
            auto_pause: true,
            pause_duration: PauseDuration::Indefinite,
            ..options()
        },
    );
    let (control, mut inbox) = ControlInbox::channel();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(3 * 3600)).await;
        control.send(ControlRequest::Resume).unwrap();
        tokio::time::sleep(Duration::from_secs(3600)).await;
    });

    let started = tokio::time::Instant::now();
    assert_eq!(orchestrator.run(&mut inbox).await, RunOutcome::Completed);
    assert!(started.elapsed() >= Duration::from_secs(3 * 3600));
    assert_eq!(record.submits().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_rate_limit_without_auto_pause_stops_at_failed_batch() {
    let record = Record::default();
    let driver = StubDriver::new(&record).with_script(vec![
        Ok("第一页".to_string()),
        Err(DriverError::provider("请求过于频繁，请稍后再试")),
    ]);
    let mut orchestrator = Orchestrator::new(
        Box::new(driver),
        Arc::new(StubRasterizer::new(3)),
        single_queue(&["a.pdf"]),
        RunOptions {
            auto_pause: false,
            ..options()
        },
    );
    let (_control, mut inbox) = ControlInbox::channel();

    assert_eq!(orchestrator.run(&mut inbox).await, RunOutcome::Stopped);
    assert_eq!(orchestrator.checkpoint().batch_index, 1);
    assert!(!orchestrator.checkpoint().paused);
}

#[tokio::test(start_paused = true)]
async fn test_exhausted_retries_skip_batch_and_continue() {
    let record = Record::default();
    let driver = StubDriver::new(&record).with_script(vec![
        Ok(String::new()),
        Ok("   ".to_string()),
        Err(DriverError::upload("找不到文件上传入口")),
    ]);
    let (events, mut rx) = EventSink::channel();
    let mut orchestrator = Orchestrator::new(
        Box::new(driver),
        Arc::new(StubRasterizer::new(2)),
        single_queue(&["a.pdf"]),
        RunOptions {
            max_retries: 2,
            ..options()
        },
    )
    .with_events(events);
    let (_control, mut inbox) = ControlInbox::channel();

    assert_eq!(orchestrator.run(&mut inbox).await, RunOutcome::Completed);
    assert_eq!(record.submits().len(), 4);
    assert_eq!(orchestrator.stats().batches_failed, 1);
    assert_eq!(orchestrator.stats().batches_succeeded, 1);
    assert!(drain(&mut rx).contains(&WorkerEvent::BatchFailed {
        document: 0,
        batch: 0,
        attempts: 3,
    }));
}

#[tokio::test(start_paused = true)]
async fn test_session_closed_halts_and_new_driver_continues() {
    let record = Record::default();
    let driver = StubDriver::new(&record).with_script(vec![
        Ok("第一页".to_string()),
        Err(DriverError::SessionClosed),
    ]);
    let mut orchestrator = Orchestrator::new(
        Box::new(driver),
        Arc::new(StubRasterizer::new(3)),
        single_queue(&["a.pdf"]),
        options(),
    );
    let (_control, mut inbox) = ControlInbox::channel();

    assert_eq!(orchestrator.run(&mut inbox).await, RunOutcome::SessionClosed);
    assert_eq!(orchestrator.checkpoint().batch_index, 1);

    orchestrator.replace_driver(Box::new(StubDriver::new(&record)));
    inbox.begin_run();
    assert_eq!(orchestrator.run(&mut inbox).await, RunOutcome::Completed);
    assert_eq!(
        record.submits(),
        vec![
            names(&["a-0.png"]),
            names(&["a-1.png"]),
            names(&["a-1.png"]),
            names(&["a-2.png"]),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_conversion_error_skips_document() {
    let record = Record::default();
    let (events, mut rx) = EventSink::channel();
    let mut orchestrator = Orchestrator::new(
        Box::new(StubDriver::new(&record)),
        Arc::new(StubRasterizer::new(1).failing("broken.pdf")),
        single_queue(&["broken.pdf", "b.pdf"]),
        options(),
    )
    .with_events(events);
    let (_control, mut inbox) = ControlInbox::channel();

    assert_eq!(orchestrator.run(&mut inbox).await, RunOutcome::Completed);
    assert_eq!(record.submits(), vec![names(&["b-0.png"])]);
    assert_eq!(orchestrator.stats().documents_skipped, 1);
    assert!(drain(&mut rx).iter().any(|e| matches!(
        e,
        WorkerEvent::DocumentSkipped { document: 0, .. }
    )));
}

#[tokio::test(start_paused = true)]
async fn test_new_conversation_per_document_skips_first_document() {
    let record = Record::default();
    let mut orchestrator = Orchestrator::new(
        Box::new(StubDriver::new(&record)),
        Arc::new(StubRasterizer::new(2)),
        single_queue(&["a.pdf", "b.pdf", "c.pdf"]),
        RunOptions {
            new_conversation_per_document: true,
            ..options()
        },
    );
    let (_control, mut inbox) = ControlInbox::channel();

    assert_eq!(orchestrator.run(&mut inbox).await, RunOutcome::Completed);
    assert_eq!(record.new_conversations(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_page_threshold_not_applied_after_final_batch() {
    let record = Record::default();
    let mut orchestrator = Orchestrator::new(
        Box::new(StubDriver::new(&record)),
        Arc::new(StubRasterizer::new(4)),
        single_queue(&["a.pdf"]),
        RunOptions {
            new_conversation_page_threshold: Some(2),
            ..options()
        },
    );
    let (_control, mut inbox) = ControlInbox::channel();

    assert_eq!(orchestrator.run(&mut inbox).await, RunOutcome::Completed);
    // 第 2 批后达到阈值；第 4 批后虽然也达到，但已是最后一批
    assert_eq!(record.new_conversations(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_page_disabled_while_stopped_is_not_sent() {
    let queue = {
        let mut queue = DocumentQueue::new();
        queue.push(Document::new("a.pdf", PlanMode::FixedN, 2));
        queue.into_shared()
    };
    let record = Record::default();
    let (control, mut inbox) = ControlInbox::channel();
    let mut orchestrator = Orchestrator::new(
        Box::new(StubDriver::new(&record).stop_on_submit(1, control)),
        Arc::new(StubRasterizer::new(4)),
        queue.clone(),
        options(),
    );

    assert_eq!(orchestrator.run(&mut inbox).await, RunOutcome::Stopped);
    queue.write().await.get_mut(0).unwrap().set_page_enabled(3, false);

    inbox.begin_run();
    assert_eq!(orchestrator.run(&mut inbox).await, RunOutcome::Completed);
    assert_eq!(
        record.submits(),
        vec![names(&["a-0.png", "a-1.png"]), names(&["a-2.png"])]
    );
}

#[tokio::test(start_paused = true)]
async fn test_page_disabled_before_checkpoint_keeps_batch_positions() {
    let queue = single_queue(&["a.pdf"]);
    let record = Record::default();
    let (control, mut inbox) = ControlInbox::channel();
    let mut orchestrator = Orchestrator::new(
        Box::new(StubDriver::new(&record).stop_on_submit(2, control)),
        Arc::new(StubRasterizer::new(4)),
        queue.clone(),
        options(),
    );

    assert_eq!(orchestrator.run(&mut inbox).await, RunOutcome::Stopped);
    assert_eq!(orchestrator.checkpoint().batch_index, 2);
    // 已发送过的页被禁用，剩余批次的位置不能左移
    queue.write().await.get_mut(0).unwrap().set_page_enabled(0, false);

    inbox.begin_run();
    assert_eq!(orchestrator.run(&mut inbox).await, RunOutcome::Completed);
    assert_eq!(
        record.submits(),
        vec![
            names(&["a-0.png"]),
            names(&["a-1.png"]),
            names(&["a-2.png"]),
            names(&["a-3.png"]),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_chunk_crossing_page_threshold_renews_once() {
    let queue = {
        let mut queue = DocumentQueue::new();
        queue.push(Document::new("a.pdf", PlanMode::FixedN, 3));
        queue.into_shared()
    };
    let record = Record::default();
    let (control, mut inbox) = ControlInbox::channel();
    let mut orchestrator = Orchestrator::new(
        Box::new(StubDriver::new(&record).stop_on_submit(3, control)),
        Arc::new(StubRasterizer::new(12)),
        queue,
        RunOptions {
            new_conversation_page_threshold: Some(4),
            ..options()
        },
    );

    // 3 → 6 页越过阈值 4：第 2 批之后新建对话，计数从 0 开始
    assert_eq!(orchestrator.run(&mut inbox).await, RunOutcome::Stopped);
    assert_eq!(record.new_conversations(), 1);
    let checkpoint = orchestrator.checkpoint();
    assert_eq!(checkpoint.batch_index, 3);
    assert_eq!(checkpoint.pages_since_new_conversation, 3);

    // 最后一批再次越过阈值，但之后没有批次了
    inbox.begin_run();
    assert_eq!(orchestrator.run(&mut inbox).await, RunOutcome::Completed);
    assert_eq!(record.submits().len(), 4);
    assert!(record.submits().iter().all(|batch| batch.len() == 3));
    assert_eq!(record.new_conversations(), 1);
}

/// 第 2 批触发限流、暂停 1 分钟的编排器
fn rate_limited_orchestrator(
    record: &Record,
) -> (Orchestrator, mpsc::UnboundedReceiver<WorkerEvent>) {
    let driver = StubDriver::new(record).with_script(vec![
        Ok("第一页".to_string()),
        Err(DriverError::provider("Too many requests")),
    ]);
    let (events, rx) = EventSink::channel();
    let orchestrator = Orchestrator::new(
        Box::new(driver),
        Arc::new(StubRasterizer::new(3)),
        single_queue(&["a.pdf"]),
        RunOptions {
            auto_pause: true,
            pause_duration: PauseDuration::Custom(1),
            ..options()
        },
    )
    .with_events(events);
    (orchestrator, rx)
}

#[tokio::test(start_paused = true)]
async fn test_stop_during_countdown_keeps_pause_in_checkpoint() {
    let record = Record::default();
    let (mut orchestrator, mut rx) = rate_limited_orchestrator(&record);
    let (control, mut inbox) = ControlInbox::channel();
    tokio::spawn(async move {
        // 第 2 批在 2 秒时被限流，倒计时进行到一半时停止
        tokio::time::sleep(Duration::from_millis(32_500)).await;
        control.send(ControlRequest::Stop).unwrap();
        tokio::time::sleep(Duration::from_secs(3600)).await;
    });

    assert_eq!(orchestrator.run(&mut inbox).await, RunOutcome::Stopped);
    let checkpoint = orchestrator.checkpoint().clone();
    assert_eq!(checkpoint.batch_index, 1);
    assert!(checkpoint.paused);
    let remaining = checkpoint.pause_remaining_secs.unwrap();
    assert!((25..=35).contains(&remaining), "remaining = {remaining}");
    assert!(drain(&mut rx)
        .iter()
        .any(|e| matches!(e, WorkerEvent::Stopped(cp) if cp.paused)));

    // 再次开始即手动恢复，不再等待剩余倒计时
    inbox.begin_run();
    let started = tokio::time::Instant::now();
    assert_eq!(orchestrator.run(&mut inbox).await, RunOutcome::Completed);
    assert!(started.elapsed() < Duration::from_secs(remaining));

    assert_eq!(
        record.submits(),
        vec![
            names(&["a-0.png"]),
            names(&["a-1.png"]),
            names(&["a-1.png"]),
            names(&["a-2.png"]),
        ]
    );
    assert!(!orchestrator.checkpoint().paused);
    let events = drain(&mut rx);
    assert_eq!(
        events.iter().filter(|e| **e == WorkerEvent::Resumed).count(),
        1
    );
    assert!(!events
        .iter()
        .any(|e| matches!(e, WorkerEvent::Paused { .. })));
}

#[tokio::test(start_paused = true)]
async fn test_session_closed_during_countdown_keeps_pause_in_checkpoint() {
    let record = Record::default();
    let (mut orchestrator, mut rx) = rate_limited_orchestrator(&record);
    let (_control, mut inbox) = ControlInbox::channel();
    let (closed_tx, closed_rx) = watch::channel(false);
    inbox.attach_session(closed_rx);
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20_500)).await;
        closed_tx.send(true).unwrap();
        tokio::time::sleep(Duration::from_secs(3600)).await;
    });

    assert_eq!(orchestrator.run(&mut inbox).await, RunOutcome::SessionClosed);
    assert!(orchestrator.checkpoint().paused);
    assert_eq!(orchestrator.checkpoint().batch_index, 1);
    assert!(drain(&mut rx)
        .iter()
        .any(|e| matches!(e, WorkerEvent::SessionClosed(cp) if cp.paused)));

    let (_new_tx, new_rx) = watch::channel(false);
    inbox.attach_session(new_rx);
    orchestrator.replace_driver(Box::new(StubDriver::new(&record)));
    inbox.begin_run();
    assert_eq!(orchestrator.run(&mut inbox).await, RunOutcome::Completed);
    assert_eq!(record.submits().len(), 4);
    assert_eq!(record.submits()[2], names(&["a-1.png"]));
    assert!(!orchestrator.checkpoint().paused);
}

// ========== 真实浏览器（手动运行）==========

#[tokio::test]
#[ignore] // 默认忽略，需要手动运行：cargo test -- --ignored
async fn test_browser_connection() {
    let config = Config::from_env().expect("读取配置失败");
    let url = page_relay::driver::registry::target_url(&config).expect("未知平台");

    let result = page_relay::browser::connect_to_browser_and_page(config.browser_debug_port, &url)
        .await;

    assert!(result.is_ok(), "应该能够成功连接浏览器");
}

#[tokio::test]
#[ignore]
async fn test_submit_single_image() {
    let config = Config::from_env().expect("读取配置失败");
    let url = page_relay::driver::registry::target_url(&config).expect("未知平台");
    let session = page_relay::browser::open_session(&config, &url)
        .await
        .expect("打开浏览器失败");

    let executor = page_relay::infrastructure::JsExecutor::new(session.page.clone());
    let mut driver = page_relay::driver::registry::create_driver(&config, executor, session.closed())
        .expect("创建驱动失败");

    // 注意：请根据实际情况修改图片路径
    let image = PathBuf::from("demo/page-1.png");
    driver
        .submit(&[image], &config.prompt)
        .await
        .expect("提交失败");
    let reply = driver
        .await_completion(Duration::from_millis(config.wait_timeout_ms))
        .await
        .expect("等待回复失败");
    assert!(!reply.trim().is_empty());

    session.close().await;
}
