//! # Page Relay
//!
//! 把文档逐页（或按批）发送给网页版 AI 助手，并对失败、空白回复和平台限流做自动处理
//!
//! ## 架构设计
//!
//! ### ① 基础设施层（Infrastructure）
//! - `infrastructure/` - 持有稀缺资源（Page），只暴露能力
//! - `JsExecutor` - 唯一的 page owner，提供 eval()、候选定位器探测和文件上传
//! - `LocatorList` - 按优先级排列的候选选择器
//!
//! ### ② 会话与驱动（Browser / Driver）
//! - `browser/` - 打开/连接浏览器，提供会话关闭通知
//! - `driver/` - `AssistantDriver` 能力接口，每个平台一份声明式配置
//!
//! ### ③ 业务能力层（Services）
//! - `services/` - 描述"我能做什么"，不关心流程
//! - `batch_planner` - 页面 → 批次计划
//! - `rate_limit` - 限流判断
//! - `pause` - 暂停倒计时
//! - `rasterizer` - 文档转图片
//! - `TranscriptWriter` - 写回复记录
//!
//! ### ④ 流程层（Workflow）
//! - `workflow/` - 定义"一个批次"的完整处理流程
//! - `RetryEngine` - 发送 → 等待 → 空白/失败重试 → 限流交还
//! - `Checkpoint` - 断点
//! - `ControlInbox` / `EventSink` - 与展示层之间的双向单工通道
//!
//! ### ⑤ 编排层（Orchestration）
//! - `orchestrator/batch_processor` - 应用入口，管理会话生命周期
//! - `orchestrator/queue_runner` - 队列编排器，遍历文档、处理暂停
//!
//! ## 模块结构

pub mod browser;
pub mod config;
pub mod driver;
pub mod error;
pub mod infrastructure;

pub mod models;
pub mod orchestrator;
pub mod services;
pub mod utils;
pub mod workflow;

// 重新导出常用类型
pub use browser::{open_session, SessionHandle};
pub use config::{Config, RunOptions};
pub use driver::AssistantDriver;
pub use error::{AppError, AppResult};
pub use infrastructure::JsExecutor;
pub use models::{Batch, BatchPlan, Document, DocumentQueue, PlanMode};
pub use orchestrator::{App, Orchestrator, RunOutcome};
pub use workflow::{Checkpoint, ControlInbox, ControlRequest, EventSink, WorkerEvent};
