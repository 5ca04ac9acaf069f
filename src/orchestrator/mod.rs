//! 编排层（Orchestration Layer）
//!
//! ## 职责
//!
//! 本层负责队列调度和运行控制，是整个系统的"指挥中心"。
//!
//! ## 模块划分
//!
//! ### `batch_processor` - 应用入口
//! - 管理应用生命周期（初始化、运行、停止后继续、会话关闭后重新打开）
//! - 管理浏览器资源（SessionHandle）
//! - 输出全局统计信息
//!
//! ### `queue_runner` - 队列编排器
//! - 按断点遍历队列中的文档
//! - 独占驱动和断点
//! - 限流暂停与恢复
//!
//! ### `document_processor` - 单个文档处理器
//! - 渲染文档、生成批次计划
//! - 逐批交给重试引擎，处理新建对话规则
//! - 写入回复记录
//!
//! ## 层次关系
//!
//! ```text
//! batch_processor (App：会话生命周期)
//!     ↓
//! queue_runner (处理 DocumentQueue)
//!     ↓
//! document_processor (处理 BatchPlan)
//!     ↓
//! workflow::RetryEngine (处理单个 Batch)
//!     ↓
//! driver (AssistantDriver：上传 / 等待 / 新建对话)
//!     ↓
//! infrastructure (基础设施：JsExecutor)
//! ```
//!
//! ## 设计原则
//!
//! 1. **单一职责**：batch_processor 管会话，queue_runner 管队列，document_processor 管批次
//! 2. **资源隔离**：只有编排层持有会话、驱动和断点
//! 3. **向下依赖**：编排层 → workflow → driver / services → infrastructure
//! 4. **顺序执行**：同一时间只有一个批次在途

pub mod batch_processor;
mod document_processor;
pub mod queue_runner;

// 重新导出主要类型
pub use batch_processor::App;
pub use queue_runner::{Orchestrator, RunOutcome, RunStats};
