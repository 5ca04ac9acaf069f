use std::path::Path;

use chromiumoxide::{Browser, BrowserConfig, Page};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, error, info};

use crate::browser::connection::{open_page, spawn_handler};
use crate::error::BrowserError;

/// 启动带界面的浏览器并导航到指定 URL
///
/// 使用持久化的用户数据目录，登录状态在多次运行之间保留。
pub async fn launch_browser(
    url: &str,
    user_data_dir: &Path,
    executable: Option<&Path>,
) -> Result<(Browser, Page, watch::Receiver<bool>, JoinHandle<()>), BrowserError> {
    info!("🚀 启动浏览器...");
    debug!("目标 URL: {}, 用户数据目录: {}", url, user_data_dir.display());

    std::fs::create_dir_all(user_data_dir).map_err(|e| BrowserError::ConfigurationFailed {
        message: format!("无法创建用户数据目录 {}: {}", user_data_dir.display(), e),
    })?;

    let mut builder = BrowserConfig::builder()
        .with_head()
        .viewport(None)
        .user_data_dir(user_data_dir)
        .args(vec![
            "--disable-blink-features=AutomationControlled", // 降低被识别为自动化的概率
            "--no-first-run",
            "--no-default-browser-check",
        ]);
    if let Some(path) = executable {
        builder = builder.chrome_executable(path);
    }
    let config = builder.build().map_err(|e| {
        error!("配置浏览器失败: {}", e);
        BrowserError::ConfigurationFailed { message: e }
    })?;

    let (browser, handler) = Browser::launch(config).await.map_err(|e| {
        error!("启动浏览器失败: {}", e);
        BrowserError::LaunchFailed {
            source: Box::new(e),
        }
    })?;
    debug!("浏览器启动成功");

    let (closed, handler_task) = spawn_handler(handler);

    // 添加短暂延迟以等待浏览器状态同步
    sleep(tokio::time::Duration::from_millis(300)).await;

    let page = open_page(&browser, url).await?;
    info!("✅ 浏览器已导航到: {}", url);

    Ok((browser, page, closed, handler_task))
}
