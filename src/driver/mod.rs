//! 助手驱动 - 平台适配层
//!
//! 每个平台一份声明式配置（[`profiles`]），由同一个 [`WebChatDriver`] 执行；
//! 编排器只依赖 [`AssistantDriver`] 能力集，不关心页面细节。

pub mod profiles;
pub mod registry;
pub mod stability;
pub mod web_chat;

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::DriverError;

pub use profiles::ProviderProfile;
pub use stability::{StabilitySettings, StabilityTracker};
pub use web_chat::WebChatDriver;

/// 助手驱动能力集
#[async_trait]
pub trait AssistantDriver: Send {
    /// 平台名称（用于日志）
    fn provider_name(&self) -> &str;

    /// 上传图片并发送提示词
    async fn submit(&mut self, images: &[PathBuf], prompt: &str) -> Result<(), DriverError>;

    /// 等待回复完成并返回回复文本（可能为空）
    async fn await_completion(&mut self, timeout: Duration) -> Result<String, DriverError>;

    /// 新建对话；失败由调用方记录，不影响流程
    async fn start_new_conversation(&mut self) -> Result<(), DriverError>;

    /// 判断回复是否为空
    ///
    /// 默认只检查去除空白后的文本；驱动可以用更精确的方式（如比较回复条数）覆盖。
    async fn is_empty_reply(&mut self, reply: &str) -> bool {
        reply.trim().is_empty()
    }
}
