//! 平台配置
//!
//! 每个平台的页面操作都表达为有序候选定位器列表，页面改版时只需要改这里。

use crate::infrastructure::LocatorList;

/// 一个聊天平台的声明式描述
#[derive(Debug, Clone, Copy)]
pub struct ProviderProfile {
    /// 注册表中的标识
    pub id: &'static str,
    /// 展示名称
    pub name: &'static str,
    pub url: &'static str,
    pub file_input: LocatorList,
    /// 找不到文件输入框时先点击的附件按钮
    pub attach_button: LocatorList,
    pub input_box: LocatorList,
    pub send_button: LocatorList,
    /// "生成中"标识（通常是停止按钮），消失即视为回复完成
    pub generating_indicator: LocatorList,
    /// 助手回复容器，最后一个为最新回复
    pub reply_container: LocatorList,
    pub new_chat: LocatorList,
    /// 平台提示横幅（限流、额度用尽）
    pub rate_limit_banner: LocatorList,
}

pub static CHATGPT: ProviderProfile = ProviderProfile {
    id: "chatgpt",
    name: "ChatGPT",
    url: "https://chatgpt.com/",
    file_input: LocatorList::new(
        "文件上传入口",
        &[r#"input[type="file"][accept*="image"]"#, r#"input[type="file"]"#],
    ),
    attach_button: LocatorList::new(
        "附件按钮",
        &[
            r#"[data-testid="attachment-button"]"#,
            r#"button[aria-label*="Attach"]"#,
            r#"button[aria-label*="附件"]"#,
            r#"button[aria-label*="Upload"]"#,
        ],
    ),
    input_box: LocatorList::new(
        "输入框",
        &[
            "#prompt-textarea",
            r#"textarea[placeholder*="Message"]"#,
            r#"textarea[placeholder*="消息"]"#,
            r#"[contenteditable="true"]"#,
        ],
    ),
    send_button: LocatorList::new(
        "发送按钮",
        &[
            r#"[data-testid="send-button"]"#,
            r#"button[aria-label*="Send"]"#,
            r#"button[aria-label*="发送"]"#,
        ],
    ),
    generating_indicator: LocatorList::new(
        "停止按钮",
        &[
            r#"[data-testid="stop-button"]"#,
            r#"button[aria-label*="Stop"]"#,
            r#"button[aria-label*="停止"]"#,
        ],
    ),
    reply_container: LocatorList::new(
        "回复内容",
        &[r#"[data-message-author-role="assistant"]"#],
    ),
    new_chat: LocatorList::new(
        "新对话按钮",
        &[
            r#"[data-testid="create-new-chat-button"]"#,
            r#"a[href="/"]"#,
        ],
    ),
    rate_limit_banner: LocatorList::new(
        "平台提示",
        &[
            r#"[data-testid="rate-limit-banner"]"#,
            r#"div[class*="text-token-text-error"]"#,
        ],
    ),
};

pub static GEMINI: ProviderProfile = ProviderProfile {
    id: "gemini",
    name: "Google Gemini",
    url: "https://gemini.google.com/app",
    file_input: LocatorList::new(
        "文件上传入口",
        &[r#"input[type="file"][accept*="image"]"#, r#"input[type="file"]"#],
    ),
    attach_button: LocatorList::new(
        "附件按钮",
        &[
            r#"button[aria-label*="upload" i]"#,
            r#"button[aria-label*="上传"]"#,
            "uploader button",
        ],
    ),
    input_box: LocatorList::new(
        "输入框",
        &[
            "div.ql-editor",
            r#"div[contenteditable="true"]"#,
            "rich-textarea",
            ".text-input-field_textarea",
            "p[data-placeholder]",
        ],
    ),
    send_button: LocatorList::new(
        "发送按钮",
        &[
            r#"button[aria-label*="发送" i]"#,
            r#"button[aria-label*="send" i]"#,
            r#"button[aria-label*="提交" i]"#,
            r#"button[aria-label*="submit" i]"#,
            ".send-button",
            r#"button[type="submit"]"#,
        ],
    ),
    generating_indicator: LocatorList::new(
        "停止按钮",
        &[
            r#"button[aria-label*="stop" i]"#,
            r#"button[aria-label*="停止"]"#,
        ],
    ),
    reply_container: LocatorList::new(
        "回复内容",
        &[
            ".model-response-text",
            ".response-content",
            ".markdown-content",
            r#"[data-message-author-role="model"]"#,
            "message-content",
        ],
    ),
    new_chat: LocatorList::new(
        "新对话按钮",
        &[
            r#"[data-test-id="new-chat-button"] button"#,
            r#"a[aria-label*="New chat" i]"#,
            r#"button[aria-label*="发起新对话"]"#,
        ],
    ),
    rate_limit_banner: LocatorList::new(
        "平台提示",
        &["snack-bar-container"],
    ),
};

pub static CLAUDE: ProviderProfile = ProviderProfile {
    id: "claude",
    name: "Claude",
    url: "https://claude.ai/",
    file_input: LocatorList::new(
        "文件上传入口",
        &[r#"input[type="file"][data-testid="file-upload"]"#, r#"input[type="file"]"#],
    ),
    attach_button: LocatorList::new(
        "附件按钮",
        &[
            r#"button[aria-label*="Attach" i]"#,
            r#"button[aria-label*="附件"]"#,
        ],
    ),
    input_box: LocatorList::new(
        "输入框",
        &[
            ".ProseMirror",
            r#"div[contenteditable="true"]"#,
            "div[data-placeholder]",
            "textarea",
            ".input-area",
        ],
    ),
    send_button: LocatorList::new(
        "发送按钮",
        &[
            r#"button[aria-label*="Send" i]"#,
            r#"button[aria-label*="发送"]"#,
            r#"button[type="submit"]"#,
            r#"[data-testid="send-button"]"#,
        ],
    ),
    generating_indicator: LocatorList::new(
        "停止按钮",
        &[
            r#"button[aria-label*="Stop" i]"#,
            r#"button[aria-label*="停止"]"#,
            r#"[data-testid="stop-button"]"#,
            r#"[data-is-streaming="true"]"#,
        ],
    ),
    reply_container: LocatorList::new(
        "回复内容",
        &[
            "[data-is-streaming]",
            ".claude-response",
            ".assistant-message",
            r#"[data-message-author-role="assistant"]"#,
        ],
    ),
    new_chat: LocatorList::new(
        "新对话按钮",
        &[r#"a[href="/new"]"#, r#"button[aria-label*="New chat" i]"#],
    ),
    rate_limit_banner: LocatorList::new(
        "平台提示",
        &[r#"[data-testid="message-limit-banner"]"#],
    ),
};

pub static DEEPSEEK: ProviderProfile = ProviderProfile {
    id: "deepseek",
    name: "DeepSeek",
    url: "https://chat.deepseek.com/",
    file_input: LocatorList::new(
        "文件上传入口",
        &[
            r#"input[type="file"]"#,
            r#"input[type="file"][accept*="image"]"#,
            "#image-upload",
            ".upload-input",
        ],
    ),
    attach_button: LocatorList::none("附件按钮"),
    input_box: LocatorList::new(
        "输入框",
        &[
            "#chat-input",
            "textarea[placeholder]",
            "textarea",
            r#"div[contenteditable="true"]"#,
            ".chat-input",
        ],
    ),
    send_button: LocatorList::new(
        "发送按钮",
        &[
            r#"button[type="submit"]"#,
            r#"button[aria-label*="Send" i]"#,
            r#"button[aria-label*="发送"]"#,
            r#"[data-testid="send-button"]"#,
            ".send-button",
            r#"div[role="button"][aria-disabled="false"]"#,
        ],
    ),
    // 没有可靠的停止按钮，依赖内容稳定检测
    generating_indicator: LocatorList::none("停止按钮"),
    reply_container: LocatorList::new(
        "回复内容",
        &[
            ".ds-markdown",
            r#"[class*="markdown"]"#,
            ".message-content",
            r#"[class*="answer"]"#,
            ".prose",
        ],
    ),
    new_chat: LocatorList::new(
        "新对话按钮",
        &[r#"div[class*="new-chat"]"#, r#"a[href="/"]"#],
    ),
    rate_limit_banner: LocatorList::new(
        "平台提示",
        &[".ds-toast"],
    ),
};
