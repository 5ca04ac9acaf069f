use chromiumoxide::error::CdpError;
use chromiumoxide::handler::Handler;
use chromiumoxide::{Browser, Page};
use futures::StreamExt;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use crate::error::BrowserError;

/// 连接到已运行的浏览器并获取页面
///
/// 优先复用地址以 `target_url` 开头的标签页，找不到时新开一个。
pub async fn connect_to_browser_and_page(
    port: u16,
    target_url: &str,
) -> Result<(Browser, Page, watch::Receiver<bool>, JoinHandle<()>), BrowserError> {
    let browser_url = format!("http://localhost:{}", port);
    info!("正在连接到浏览器: {}", browser_url);
    debug!("目标 URL: {}", target_url);

    let (browser, handler) = Browser::connect(&browser_url).await.map_err(|e| {
        error!("连接浏览器失败: {}", e);
        BrowserError::ConnectionFailed {
            port,
            source: Box::new(e),
        }
    })?;
    debug!("浏览器连接成功");

    let (closed, handler_task) = spawn_handler(handler);

    // 添加短暂延迟以等待浏览器状态同步
    sleep(tokio::time::Duration::from_millis(300)).await;

    let pages = browser.pages().await.map_err(|e| BrowserError::ConnectionFailed {
        port,
        source: Box::new(e),
    })?;
    debug!("获取到 {} 个页面", pages.len());

    for p in pages.iter() {
        if let Ok(Some(url)) = p.url().await {
            debug!("检查页面: {}", url);
            if url.starts_with(target_url) {
                info!("✓ 找到目标页面: {}", url);
                return Ok((browser, p.clone(), closed, handler_task));
            }
        }
    }
    debug!("未找到匹配的页面，将创建新页面");

    let page = open_page(&browser, target_url).await?;
    Ok((browser, page, closed, handler_task))
}

/// 新建标签页并导航
pub(crate) async fn open_page(browser: &Browser, url: &str) -> Result<Page, BrowserError> {
    debug!("创建新页面并导航到: {}", url);
    let page = browser.new_page(url).await.map_err(|e| {
        error!("导航到 {} 失败: {}", url, e);
        BrowserError::NavigationFailed {
            url: url.to_string(),
            source: Box::new(e),
        }
    })?;
    info!("已导航到: {}", url);
    Ok(page)
}

/// 在后台处理浏览器事件；事件流结束即视为会话关闭
pub(crate) fn spawn_handler(mut handler: Handler) -> (watch::Receiver<bool>, JoinHandle<()>) {
    let (tx, rx) = watch::channel(false);
    let task = tokio::spawn(async move {
        while let Some(h) = handler.next().await {
            match h {
                Ok(()) => {}
                Err(CdpError::Ws(e)) => {
                    warn!("浏览器连接中断: {}", e);
                    break;
                }
                Err(e) => debug!("浏览器事件处理出错: {}", e),
            }
        }
        info!("浏览器会话已结束");
        let _ = tx.send(true);
    });
    (rx, task)
}
