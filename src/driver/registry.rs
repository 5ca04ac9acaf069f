//! 平台注册表：平台标识 → 平台配置

use phf::phf_map;
use tokio::sync::watch;

use crate::config::Config;
use crate::driver::profiles::{self, ProviderProfile};
use crate::driver::{AssistantDriver, WebChatDriver};
use crate::error::ConfigError;
use crate::infrastructure::JsExecutor;

pub const DEFAULT_PROVIDER: &str = "chatgpt";

static PROVIDERS: phf::Map<&'static str, &'static ProviderProfile> = phf_map! {
    "chatgpt" => &profiles::CHATGPT,
    "gemini" => &profiles::GEMINI,
    "claude" => &profiles::CLAUDE,
    "deepseek" => &profiles::DEEPSEEK,
};

/// 按标识查找平台（不区分大小写）
pub fn lookup(id: &str) -> Option<&'static ProviderProfile> {
    PROVIDERS.get(id.trim().to_lowercase().as_str()).copied()
}

/// 所有已注册的平台标识（排序后）
pub fn provider_ids() -> Vec<&'static str> {
    let mut ids: Vec<&'static str> = PROVIDERS.keys().copied().collect();
    ids.sort_unstable();
    ids
}

/// 打开会话时的目标地址，配置中的覆盖地址优先
pub fn target_url(config: &Config) -> Option<String> {
    config
        .provider_url
        .clone()
        .or_else(|| lookup(&config.provider).map(|p| p.url.to_string()))
}

/// 为配置中的平台创建驱动
pub fn create_driver(
    config: &Config,
    executor: JsExecutor,
    closed: watch::Receiver<bool>,
) -> Result<Box<dyn AssistantDriver>, ConfigError> {
    let profile = lookup(&config.provider).ok_or_else(|| {
        ConfigError::Invalid(format!(
            "不支持的平台: {}。可用平台: {}",
            config.provider,
            provider_ids().join(", ")
        ))
    })?;
    let driver = WebChatDriver::from_config(executor, profile, config).with_session_closed(closed);
    Ok(Box::new(driver))
}
