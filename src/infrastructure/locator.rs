//! 候选定位器
//!
//! 每项页面能力（输入框、发送按钮、回复容器……）对应一组有序的 CSS 选择器，
//! 依次尝试，首个命中者生效。

use crate::error::DriverError;

/// 一项能力的候选选择器列表
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocatorList {
    capability: &'static str,
    candidates: &'static [&'static str],
}

impl LocatorList {
    pub const fn new(capability: &'static str, candidates: &'static [&'static str]) -> Self {
        Self {
            capability,
            candidates,
        }
    }

    /// 该平台不提供此能力
    pub const fn none(capability: &'static str) -> Self {
        Self::new(capability, &[])
    }

    pub fn capability(&self) -> &'static str {
        self.capability
    }

    pub fn candidates(&self) -> &'static [&'static str] {
        self.candidates
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    /// 作为 JS 数组字面量嵌入脚本
    pub fn to_js_array(&self) -> Result<String, DriverError> {
        Ok(serde_json::to_string(self.candidates)?)
    }

    pub fn not_found(&self) -> DriverError {
        DriverError::LocatorNotFound {
            capability: self.capability.to_string(),
            tried: self.candidates.len(),
        }
    }
}
