//! 浏览器会话 - 传输层
//!
//! 负责打开/关闭会话，对上层只暴露 [`SessionHandle`] 和关闭通知。

pub mod connection;
pub mod launcher;

use std::path::Path;

use chromiumoxide::{Browser, Page};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::config::Config;
use crate::error::BrowserError;

pub use connection::connect_to_browser_and_page;
pub use launcher::launch_browser;

/// 一个打开的浏览器会话
pub struct SessionHandle {
    pub browser: Browser,
    pub page: Page,
    closed: watch::Receiver<bool>,
    handler_task: JoinHandle<()>,
    /// 浏览器是否由本程序启动（连接的浏览器不负责关闭）
    owned: bool,
}

impl SessionHandle {
    /// 订阅关闭通知
    pub fn closed(&self) -> watch::Receiver<bool> {
        self.closed.clone()
    }

    pub fn is_closed(&self) -> bool {
        *self.closed.borrow()
    }

    /// 关闭会话
    pub async fn close(mut self) {
        if self.owned && !self.is_closed() {
            if let Err(e) = self.browser.close().await {
                warn!("关闭浏览器失败: {}", e);
            }
            let _ = self.browser.wait().await;
        }
        self.handler_task.abort();
        info!("浏览器会话已关闭");
    }
}

/// 打开会话：按配置连接已有浏览器或自行启动
pub async fn open_session(config: &Config, url: &str) -> Result<SessionHandle, BrowserError> {
    let (browser, page, closed, handler_task, owned) = if config.connect_existing_browser {
        let (browser, page, closed, task) =
            connect_to_browser_and_page(config.browser_debug_port, url).await?;
        (browser, page, closed, task, false)
    } else {
        let (browser, page, closed, task) = launch_browser(
            url,
            Path::new(&config.browser_data_dir),
            config.browser_executable.as_deref().map(Path::new),
        )
        .await?;
        (browser, page, closed, task, true)
    };

    Ok(SessionHandle {
        browser,
        page,
        closed,
        handler_task,
        owned,
    })
}
