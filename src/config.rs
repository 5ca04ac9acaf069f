use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;

use crate::driver::registry;
use crate::error::ConfigError;
use crate::models::PlanMode;

/// 限流暂停时长
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PauseDuration {
    /// 30 分钟
    ThirtyMinutes,
    /// 60 分钟
    SixtyMinutes,
    /// 自定义分钟数，范围 [1, 1440]
    Custom(u32),
    /// 无限期暂停，只能手动继续
    Indefinite,
}

impl PauseDuration {
    pub const MAX_CUSTOM_MINUTES: u32 = 1440;

    /// 从分钟数解析：0 表示无限期，30/60 为预设，其余按自定义值截断到 [1, 1440]
    pub fn from_minutes(minutes: u32) -> Self {
        match minutes {
            0 => PauseDuration::Indefinite,
            30 => PauseDuration::ThirtyMinutes,
            60 => PauseDuration::SixtyMinutes,
            m => PauseDuration::Custom(m.clamp(1, Self::MAX_CUSTOM_MINUTES)),
        }
    }

    /// 倒计时秒数；无限期暂停返回 None
    pub fn seconds(self) -> Option<u64> {
        match self {
            PauseDuration::ThirtyMinutes => Some(30 * 60),
            PauseDuration::SixtyMinutes => Some(60 * 60),
            PauseDuration::Custom(m) => Some(u64::from(m) * 60),
            PauseDuration::Indefinite => None,
        }
    }
}

impl Default for PauseDuration {
    fn default() -> Self {
        PauseDuration::ThirtyMinutes
    }
}

/// 程序配置文件
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    // --- 平台与浏览器 ---
    /// 平台标识 (chatgpt / gemini / claude / deepseek)
    pub provider: String,
    /// 覆盖平台默认地址
    pub provider_url: Option<String>,
    /// 为 true 时连接已运行的浏览器，否则自行启动
    pub connect_existing_browser: bool,
    /// 浏览器调试端口
    pub browser_debug_port: u16,
    /// 浏览器用户数据目录（用于保持登录状态）
    pub browser_data_dir: String,
    /// 浏览器可执行文件路径，留空则自动查找
    pub browser_executable: Option<String>,

    // --- 文档转换 ---
    /// PDF 转图片的 DPI
    pub pdf_dpi: u32,
    /// 图片输出目录
    pub output_dir: String,
    /// 默认分批模式
    pub default_mode: PlanMode,
    /// FixedN 模式下每批页数
    pub chunk_size: usize,

    // --- 发送与等待 ---
    /// 提示词
    pub prompt: String,
    /// 等待回复超时时间（毫秒）
    pub wait_timeout_ms: u64,
    /// 未观察到"生成中"标识时，切换到内容稳定检测前的等待秒数
    pub indicator_grace_secs: u64,
    /// 内容保持不变多少秒视为回复完成
    pub stability_window_secs: u64,
    /// 内容稳定检测的轮询间隔（秒）
    pub stability_poll_secs: u64,
    /// 每批发送后的等待时间（秒）
    pub delay_between_batches_secs: f64,
    /// 每个文档之间的等待时间（秒）
    pub delay_between_documents_secs: f64,

    // --- 重试 ---
    /// 空白回复/发送失败的最大重试次数
    pub empty_reply_max_retries: u32,
    /// 重试前的等待时间（秒）
    pub empty_reply_retry_delay_secs: f64,

    // --- 新对话 ---
    /// 每个文档开始时新建对话
    pub new_conversation_per_document: bool,
    /// 每发送 N 页新建对话
    pub new_conversation_every_n_pages: bool,
    /// N 的取值
    pub new_conversation_page_threshold: u32,

    // --- 限流暂停 ---
    /// 检测到限流时自动暂停
    pub auto_pause_on_rate_limit: bool,
    /// 暂停分钟数，0 表示无限期
    pub pause_minutes: u32,

    // --- 日志 ---
    /// 是否显示详细日志
    pub verbose_logging: bool,
    /// 输出日志文件
    pub output_log_file: String,
    /// 回复记录文件
    pub transcript_file: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            provider: registry::DEFAULT_PROVIDER.to_string(),
            provider_url: None,
            connect_existing_browser: false,
            browser_debug_port: 9222,
            browser_data_dir: "browser_data".to_string(),
            browser_executable: None,
            pdf_dpi: 200,
            output_dir: "output".to_string(),
            default_mode: PlanMode::Single,
            chunk_size: 5,
            prompt: "请用中文详细解释一下这张图片的内容。".to_string(),
            wait_timeout_ms: 120_000,
            indicator_grace_secs: 5,
            stability_window_secs: 5,
            stability_poll_secs: 2,
            delay_between_batches_secs: 3.0,
            delay_between_documents_secs: 5.0,
            empty_reply_max_retries: 3,
            empty_reply_retry_delay_secs: 5.0,
            new_conversation_per_document: false,
            new_conversation_every_n_pages: false,
            new_conversation_page_threshold: 30,
            auto_pause_on_rate_limit: true,
            pause_minutes: 30,
            verbose_logging: false,
            output_log_file: "output.txt".to_string(),
            transcript_file: "transcript.md".to_string(),
        }
    }
}

impl Config {
    /// 默认值 + 环境变量
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        config.apply_env()?;
        Ok(config)
    }

    /// 从 TOML 文件加载，缺省字段使用默认值，再叠加环境变量
    pub fn from_toml_file(path: &Path) -> Result<Self, ConfigError> {
        let content =
            std::fs::read_to_string(path).map_err(|source| ConfigError::FileReadFailed {
                path: path.display().to_string(),
                source,
            })?;
        let mut config = Self::from_toml_str(&content).map_err(|source| {
            ConfigError::TomlParseFailed {
                path: path.display().to_string(),
                source,
            }
        })?;
        config.apply_env()?;
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// 用环境变量覆盖已有配置
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        if let Ok(v) = std::env::var("PAGE_RELAY_PROVIDER") {
            self.provider = v;
        }
        if let Ok(v) = std::env::var("PROVIDER_URL") {
            self.provider_url = Some(v);
        }
        if let Some(v) = env_parse("CONNECT_EXISTING_BROWSER")? {
            self.connect_existing_browser = v;
        }
        if let Some(v) = env_parse("BROWSER_DEBUG_PORT")? {
            self.browser_debug_port = v;
        }
        if let Ok(v) = std::env::var("BROWSER_DATA_DIR") {
            self.browser_data_dir = v;
        }
        if let Ok(v) = std::env::var("BROWSER_EXECUTABLE") {
            self.browser_executable = Some(v);
        }
        if let Some(v) = env_parse("PDF_DPI")? {
            self.pdf_dpi = v;
        }
        if let Ok(v) = std::env::var("OUTPUT_DIR") {
            self.output_dir = v;
        }
        if let Some(v) = env_parse("CHUNK_SIZE")? {
            self.chunk_size = v;
        }
        if let Ok(v) = std::env::var("PROMPT_TEXT") {
            self.prompt = v;
        }
        if let Some(v) = env_parse("WAIT_TIMEOUT_MS")? {
            self.wait_timeout_ms = v;
        }
        if let Some(v) = env_parse("DELAY_BETWEEN_BATCHES")? {
            self.delay_between_batches_secs = v;
        }
        if let Some(v) = env_parse("EMPTY_REPLY_MAX_RETRIES")? {
            self.empty_reply_max_retries = v;
        }
        if let Some(v) = env_parse("EMPTY_REPLY_RETRY_DELAY")? {
            self.empty_reply_retry_delay_secs = v;
        }
        if let Some(v) = env_parse("NEW_CONVERSATION_PER_DOCUMENT")? {
            self.new_conversation_per_document = v;
        }
        if let Some(v) = env_parse::<u32>("NEW_CONVERSATION_EVERY_N_PAGES")? {
            self.new_conversation_every_n_pages = v > 0;
            if v > 0 {
                self.new_conversation_page_threshold = v;
            }
        }
        if let Some(v) = env_parse("AUTO_PAUSE_ON_RATE_LIMIT")? {
            self.auto_pause_on_rate_limit = v;
        }
        if let Some(v) = env_parse("PAUSE_MINUTES")? {
            self.pause_minutes = v;
        }
        if let Some(v) = env_parse("VERBOSE_LOGGING")? {
            self.verbose_logging = v;
        }
        if let Ok(v) = std::env::var("OUTPUT_LOG_FILE") {
            self.output_log_file = v;
        }
        if let Ok(v) = std::env::var("TRANSCRIPT_FILE") {
            self.transcript_file = v;
        }
        Ok(())
    }

    /// 校验配置
    pub fn validate(&self) -> Result<(), ConfigError> {
        if registry::lookup(&self.provider).is_none() {
            return Err(ConfigError::Invalid(format!(
                "不支持的平台: {}。可用平台: {}",
                self.provider,
                registry::provider_ids().join(", ")
            )));
        }
        if self.pdf_dpi == 0 {
            return Err(ConfigError::Invalid("pdf_dpi 必须大于 0".to_string()));
        }
        if self.chunk_size == 0 {
            return Err(ConfigError::Invalid("chunk_size 必须大于 0".to_string()));
        }
        if self.stability_poll_secs == 0 {
            return Err(ConfigError::Invalid(
                "stability_poll_secs 必须大于 0".to_string(),
            ));
        }
        if self.delay_between_batches_secs < 0.0
            || self.delay_between_documents_secs < 0.0
            || self.empty_reply_retry_delay_secs < 0.0
        {
            return Err(ConfigError::Invalid("等待时间不能为负数".to_string()));
        }
        Ok(())
    }

    pub fn pause_duration(&self) -> PauseDuration {
        PauseDuration::from_minutes(self.pause_minutes)
    }

    /// 编排器使用的运行参数
    pub fn run_options(&self) -> RunOptions {
        RunOptions {
            prompt: self.prompt.clone(),
            reply_timeout: Duration::from_millis(self.wait_timeout_ms),
            batch_delay: secs_f64(self.delay_between_batches_secs),
            document_delay: secs_f64(self.delay_between_documents_secs),
            max_retries: self.empty_reply_max_retries,
            retry_delay: secs_f64(self.empty_reply_retry_delay_secs),
            new_conversation_per_document: self.new_conversation_per_document,
            new_conversation_page_threshold: if self.new_conversation_every_n_pages {
                Some(self.new_conversation_page_threshold).filter(|n| *n > 0)
            } else {
                None
            },
            auto_pause: self.auto_pause_on_rate_limit,
            pause_duration: self.pause_duration(),
            pdf_dpi: self.pdf_dpi,
        }
    }
}

/// 编排器运行参数（由 [`Config`] 派生，核心只读取不持有配置）
#[derive(Clone, Debug)]
pub struct RunOptions {
    pub prompt: String,
    pub reply_timeout: Duration,
    pub batch_delay: Duration,
    pub document_delay: Duration,
    pub max_retries: u32,
    pub retry_delay: Duration,
    pub new_conversation_per_document: bool,
    /// None 表示不按页数新建对话
    pub new_conversation_page_threshold: Option<u32>,
    pub auto_pause: bool,
    pub pause_duration: PauseDuration,
    pub pdf_dpi: u32,
}

impl Default for RunOptions {
    fn default() -> Self {
        Config::default().run_options()
    }
}

fn secs_f64(secs: f64) -> Duration {
    Duration::try_from_secs_f64(secs).unwrap_or(Duration::ZERO)
}

fn env_parse<T: FromStr>(var_name: &str) -> Result<Option<T>, ConfigError> {
    match std::env::var(var_name) {
        Ok(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::EnvVarParseFailed {
                var_name: var_name.to_string(),
                value,
                expected_type: std::any::type_name::<T>().to_string(),
            }),
        Err(_) => Ok(None),
    }
}
