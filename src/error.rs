use std::path::PathBuf;

use thiserror::Error;

/// 应用程序错误类型
#[derive(Debug, Error)]
pub enum AppError {
    /// 浏览器相关错误
    #[error("浏览器错误: {0}")]
    Browser(#[from] BrowserError),
    /// 助手驱动错误
    #[error("驱动错误: {0}")]
    Driver(#[from] DriverError),
    /// 文档转换错误
    #[error("转换错误: {0}")]
    Conversion(#[from] ConversionError),
    /// 文件操作错误
    #[error("文件错误: {0}")]
    File(#[from] FileError),
    /// 配置错误
    #[error("配置错误: {0}")]
    Config(#[from] ConfigError),
    /// 其他错误（用于包装第三方库错误）
    #[error("错误: {0}")]
    Other(String),
}

/// 浏览器相关错误（会话传输层）
#[derive(Debug, Error)]
pub enum BrowserError {
    /// 连接浏览器失败
    #[error("无法连接到浏览器 (端口: {port}): {source}")]
    ConnectionFailed {
        port: u16,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// 启动浏览器失败
    #[error("启动浏览器失败: {source}")]
    LaunchFailed {
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// 导航失败
    #[error("导航到 {url} 失败: {source}")]
    NavigationFailed {
        url: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// 浏览器配置失败
    #[error("浏览器配置失败: {message}")]
    ConfigurationFailed { message: String },
}

/// 助手驱动错误
///
/// 除 `SessionClosed` 外都视为瞬时故障，由重试引擎决定是否重发；
/// 是否属于限流由 [`crate::services::rate_limit`] 根据消息文本判断。
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DriverError {
    /// 上传图片失败（找不到上传入口或触发了单会话附件上限）
    #[error("上传失败: {message}")]
    Upload { message: String },
    /// 所有候选定位器都未命中
    #[error("找不到{capability} (已尝试 {tried} 个定位器)")]
    LocatorNotFound { capability: String, tried: usize },
    /// 执行页面脚本失败
    #[error("执行脚本失败: {message}")]
    Script { message: String },
    /// 等待回复超时
    #[error("等待回复超时 ({waited_ms}ms)")]
    Timeout { waited_ms: u64 },
    /// 平台返回的提示信息（如限流横幅）
    #[error("平台提示: {message}")]
    Provider { message: String },
    /// 浏览器会话已关闭
    #[error("浏览器会话已关闭")]
    SessionClosed,
}

impl DriverError {
    pub fn upload(message: impl Into<String>) -> Self {
        DriverError::Upload {
            message: message.into(),
        }
    }

    pub fn script(message: impl Into<String>) -> Self {
        DriverError::Script {
            message: message.into(),
        }
    }

    pub fn provider(message: impl Into<String>) -> Self {
        DriverError::Provider {
            message: message.into(),
        }
    }

    pub fn is_session_closed(&self) -> bool {
        matches!(self, DriverError::SessionClosed)
    }
}

impl From<chromiumoxide::error::CdpError> for DriverError {
    fn from(err: chromiumoxide::error::CdpError) -> Self {
        DriverError::Script {
            message: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for DriverError {
    fn from(err: serde_json::Error) -> Self {
        DriverError::Script {
            message: format!("JSON解析失败: {}", err),
        }
    }
}

/// 文档转换错误：跳过该文档，队列继续
#[derive(Debug, Error)]
pub enum ConversionError {
    /// 文档不存在
    #[error("文档不存在: {}", .path.display())]
    NotFound { path: PathBuf },
    /// 外部转换工具执行失败
    #[error("转换工具执行失败 ({}): {message}", .path.display())]
    ToolFailed { path: PathBuf, message: String },
    /// 未提取到任何页面
    #[error("未提取到图片: {}", .path.display())]
    NoPages { path: PathBuf },
    /// 读写输出目录失败
    #[error("读写失败 ({}): {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// 文件操作错误
#[derive(Debug, Error)]
pub enum FileError {
    /// 写入文件失败
    #[error("写入文件失败 ({path}): {source}")]
    WriteFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// 配置错误
#[derive(Debug, Error)]
pub enum ConfigError {
    /// 环境变量解析失败
    #[error("环境变量 {var_name} 解析失败: 值 '{value}' 无法转换为 {expected_type}")]
    EnvVarParseFailed {
        var_name: String,
        value: String,
        expected_type: String,
    },
    /// 读取配置文件失败
    #[error("读取配置文件失败 ({path}): {source}")]
    FileReadFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },
    /// TOML 解析失败
    #[error("TOML解析失败 ({path}): {source}")]
    TomlParseFailed {
        path: String,
        #[source]
        source: toml::de::Error,
    },
    /// 配置值不合法
    #[error("{0}")]
    Invalid(String),
}

// ========== 从常见错误类型转换 ==========

impl From<chromiumoxide::error::CdpError> for AppError {
    fn from(err: chromiumoxide::error::CdpError) -> Self {
        AppError::Driver(err.into())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Driver(err.into())
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Other(err.to_string())
    }
}

// ========== 便捷构造函数 ==========

impl AppError {
    /// 创建浏览器连接错误
    pub fn browser_connection_failed(
        port: u16,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        AppError::Browser(BrowserError::ConnectionFailed {
            port,
            source: Box::new(source),
        })
    }

    /// 创建导航失败错误
    pub fn navigation_failed(
        url: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        AppError::Browser(BrowserError::NavigationFailed {
            url: url.into(),
            source: Box::new(source),
        })
    }

    /// 创建文件写入错误
    pub fn file_write_failed(path: impl Into<String>, source: std::io::Error) -> Self {
        AppError::File(FileError::WriteFailed {
            path: path.into(),
            source,
        })
    }

    /// 创建配置值不合法错误
    pub fn invalid_config(message: impl Into<String>) -> Self {
        AppError::Config(ConfigError::Invalid(message.into()))
    }
}

// ========== Result 类型别名 ==========

/// 应用程序结果类型
pub type AppResult<T> = Result<T, AppError>;
