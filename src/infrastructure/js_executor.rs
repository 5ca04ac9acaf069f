//! JS 执行器 - 基础设施层
//!
//! 持有唯一的 page 资源，只暴露"执行 JS"和"按候选定位器操作页面"的能力

use std::path::PathBuf;

use chromiumoxide::cdp::browser_protocol::dom::SetFileInputFilesParams;
use chromiumoxide::Page;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value as JsonValue;
use tracing::debug;

use crate::error::DriverError;
use crate::infrastructure::locator::LocatorList;

/// 文本探测结果（脚本直接返回 null 时取不到值）
#[derive(Deserialize)]
struct TextProbe {
    text: Option<String>,
}

/// JS 执行器
///
/// 职责：
/// - 持有唯一的 Page 资源
/// - 暴露 eval() 能力
/// - 按候选定位器依次尝试，首个命中者生效
/// - 不认识 Batch / Document
/// - 不处理业务流程
pub struct JsExecutor {
    page: Page,
}

impl JsExecutor {
    /// 创建新的 JS 执行器
    pub fn new(page: Page) -> Self {
        Self { page }
    }

    /// 获取 page 的引用（用于其他操作）
    pub fn page(&self) -> &Page {
        &self.page
    }

    /// 执行 JS 代码并返回 JSON 结果
    pub async fn eval(&self, js_code: impl Into<String>) -> Result<JsonValue, DriverError> {
        let result = self.page.evaluate(js_code.into()).await?;
        let json_value = result.into_value()?;
        Ok(json_value)
    }

    /// 执行 JS 代码并反序列化为指定类型
    pub async fn eval_as<T: DeserializeOwned>(
        &self,
        js_code: impl Into<String>,
    ) -> Result<T, DriverError> {
        let json_value = self.eval(js_code).await?;
        let typed_value = serde_json::from_value(json_value)?;
        Ok(typed_value)
    }

    /// 首个有元素命中的选择器对应的元素数量；都未命中时为 0
    pub async fn count(&self, locators: &LocatorList) -> Result<usize, DriverError> {
        if locators.is_empty() {
            return Ok(0);
        }
        let js_code = format!(
            r#"
            (() => {{
                for (const sel of {}) {{
                    let n = 0;
                    try {{ n = document.querySelectorAll(sel).length; }} catch (e) {{}}
                    if (n > 0) return n;
                }}
                return 0;
            }})()
            "#,
            locators.to_js_array()?
        );
        self.eval_as(js_code).await
    }

    /// 首个命中的选择器
    ///
    /// `visible_only` 为 true 时只接受可见元素（用于"生成中"标识、限流横幅）。
    pub async fn first_present(
        &self,
        locators: &LocatorList,
        visible_only: bool,
    ) -> Result<Option<&'static str>, DriverError> {
        if locators.is_empty() {
            return Ok(None);
        }
        let js_code = format!(
            r#"
            (() => {{
                const sels = {};
                const visibleOnly = {};
                for (let i = 0; i < sels.length; i++) {{
                    let els = [];
                    try {{ els = Array.from(document.querySelectorAll(sels[i])); }} catch (e) {{ continue; }}
                    const hit = els.some(el => !visibleOnly || (el.offsetParent !== null || el.getClientRects().length > 0));
                    if (hit) return i;
                }}
                return -1;
            }})()
            "#,
            locators.to_js_array()?,
            visible_only
        );
        let index: i64 = self.eval_as(js_code).await?;
        Ok(usize::try_from(index)
            .ok()
            .and_then(|i| locators.candidates().get(i).copied()))
    }

    /// 点击首个可用（可见且未禁用）的元素，返回命中的选择器
    pub async fn click_first(&self, locators: &LocatorList) -> Result<&'static str, DriverError> {
        let js_code = format!(
            r#"
            (() => {{
                const sels = {};
                for (let i = 0; i < sels.length; i++) {{
                    let els = [];
                    try {{ els = Array.from(document.querySelectorAll(sels[i])); }} catch (e) {{ continue; }}
                    const el = els.find(e => !e.disabled && (e.offsetParent !== null || e.getClientRects().length > 0));
                    if (el) {{ el.click(); return i; }}
                }}
                return -1;
            }})()
            "#,
            locators.to_js_array()?
        );
        let index: i64 = self.eval_as(js_code).await?;
        let hit = usize::try_from(index)
            .ok()
            .and_then(|i| locators.candidates().get(i).copied())
            .ok_or_else(|| locators.not_found())?;
        debug!("点击 {}: {}", locators.capability(), hit);
        Ok(hit)
    }

    /// 首个命中选择器的最后一个元素的文本；都未命中时为 None
    pub async fn last_text(&self, locators: &LocatorList) -> Result<Option<String>, DriverError> {
        self.text_of(locators, "els[els.length - 1]").await
    }

    /// 首个可见元素的文本（用于读取平台提示横幅）
    pub async fn visible_text(
        &self,
        locators: &LocatorList,
    ) -> Result<Option<String>, DriverError> {
        self.text_of(
            locators,
            "els.find(e => e.offsetParent !== null || e.getClientRects().length > 0)",
        )
        .await
    }

    async fn text_of(
        &self,
        locators: &LocatorList,
        pick: &str,
    ) -> Result<Option<String>, DriverError> {
        if locators.is_empty() {
            return Ok(None);
        }
        let js_code = format!(
            r#"
            (() => {{
                for (const sel of {}) {{
                    let els = [];
                    try {{ els = Array.from(document.querySelectorAll(sel)); }} catch (e) {{ continue; }}
                    if (els.length === 0) continue;
                    const el = {};
                    if (el) return {{ text: el.innerText || el.textContent || "" }};
                }}
                return {{ text: null }};
            }})()
            "#,
            locators.to_js_array()?,
            pick
        );
        let probe: TextProbe = self.eval_as(js_code).await?;
        Ok(probe.text)
    }

    /// 向首个可用输入框写入文本（兼容 textarea 和 contenteditable）
    pub async fn fill_text(
        &self,
        locators: &LocatorList,
        text: &str,
    ) -> Result<&'static str, DriverError> {
        let js_code = format!(
            r#"
            (() => {{
                const sels = {};
                const text = {};
                for (let i = 0; i < sels.length; i++) {{
                    let el = null;
                    try {{ el = document.querySelector(sels[i]); }} catch (e) {{ continue; }}
                    if (!el) continue;
                    el.focus();
                    if (el.tagName === "TEXTAREA" || el.tagName === "INPUT") {{
                        const proto = el.tagName === "TEXTAREA" ? HTMLTextAreaElement.prototype : HTMLInputElement.prototype;
                        const setter = Object.getOwnPropertyDescriptor(proto, "value").set;
                        setter.call(el, text);
                    }} else {{
                        document.execCommand("selectAll", false, null);
                        document.execCommand("insertText", false, text);
                    }}
                    el.dispatchEvent(new Event("input", {{ bubbles: true }}));
                    return i;
                }}
                return -1;
            }})()
            "#,
            locators.to_js_array()?,
            serde_json::to_string(text)?
        );
        let index: i64 = self.eval_as(js_code).await?;
        usize::try_from(index)
            .ok()
            .and_then(|i| locators.candidates().get(i).copied())
            .ok_or_else(|| locators.not_found())
    }

    /// 通过 CDP `DOM.setFileInputFiles` 把文件交给首个命中的文件输入框
    pub async fn upload_files(
        &self,
        locators: &LocatorList,
        files: &[PathBuf],
    ) -> Result<&'static str, DriverError> {
        let selector = self
            .first_present(locators, false)
            .await?
            .ok_or_else(|| locators.not_found())?;

        let element = self.page.find_element(selector).await?;
        let files: Vec<String> = files
            .iter()
            .map(|f| {
                std::path::absolute(f)
                    .unwrap_or_else(|_| f.clone())
                    .display()
                    .to_string()
            })
            .collect();

        let mut params = SetFileInputFilesParams::new(files);
        params.backend_node_id = Some(element.backend_node_id);
        self.page
            .execute(params)
            .await
            .map_err(|e| DriverError::upload(format!("设置上传文件失败: {}", e)))?;

        debug!("已通过 {} 上传文件", selector);
        Ok(selector)
    }

    /// 页面是否仍可响应
    pub async fn is_alive(&self) -> bool {
        self.eval("1").await.is_ok()
    }
}
