//! 限流识别 - 业务能力层
//!
//! 根据错误消息文本判断是否为平台限流。启发式匹配：宁可误判为限流
//! （多暂停一次），也不要漏判（白白消耗重试次数）。

use std::sync::LazyLock;

use regex::Regex;

use crate::error::DriverError;

/// 识别结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    Normal,
    RateLimit,
}

/// 已知的限流提示（小写匹配）
const RATE_LIMIT_PHRASES: &[&str] = &[
    "rate limit",
    "rate-limit",
    "ratelimit",
    "too many requests",
    "too many messages",
    "quota exceeded",
    "exceeded your quota",
    "daily limit",
    "usage limit",
    "usage cap",
    "message limit",
    "reached our limit",
    "reached the limit",
    "reached your limit",
    "limit reached",
    "try again later",
    "slow down",
    "server is busy",
    "请求过于频繁",
    "请求太频繁",
    "次数已达上限",
    "已达上限",
    "额度",
    "稍后再试",
    "服务器繁忙",
];

/// HTTP 429 状态码（独立数字）
static STATUS_429: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b429\b").expect("固定的 429 正则必须可编译"));

/// 判断一段消息是否为限流提示
pub fn classify_message(message: &str) -> Classification {
    let lower = message.to_lowercase();
    if STATUS_429.is_match(&lower) || RATE_LIMIT_PHRASES.iter().any(|p| lower.contains(p)) {
        Classification::RateLimit
    } else {
        Classification::Normal
    }
}

/// 判断驱动错误是否为限流
///
/// 会话关闭不参与判断，始终视为 Normal（由上层单独处理）。
pub fn classify(error: &DriverError) -> Classification {
    match error {
        DriverError::SessionClosed => Classification::Normal,
        other => classify_message(&other.to_string()),
    }
}

pub fn is_rate_limited(error: &DriverError) -> bool {
    classify(error) == Classification::RateLimit
}
