//! 批次处理上下文
//!
//! 封装"我正在处理哪个文档的第几批"这一信息

use std::fmt::Display;

/// 批次处理上下文
#[derive(Debug, Clone)]
pub struct BatchCtx {
    /// 文档在队列中的序号（从0开始）
    pub document_index: usize,

    /// 文档名（仅用于日志显示）
    pub document_name: String,

    /// 批次序号（从0开始）
    pub batch_index: usize,

    /// 该文档的批次总数
    pub batch_total: usize,

    /// 批次描述，如 "第 1,2 页"
    pub label: String,
}

impl BatchCtx {
    pub fn new(
        document_index: usize,
        document_name: impl Into<String>,
        batch_index: usize,
        batch_total: usize,
        label: impl Into<String>,
    ) -> Self {
        Self {
            document_index,
            document_name: document_name.into(),
            batch_index,
            batch_total,
            label: label.into(),
        }
    }

    /// 是否是文档的第一个批次
    pub fn is_first(&self) -> bool {
        self.batch_index == 0
    }
}

impl Display for BatchCtx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[文档 {}] [批次 {}/{}]",
            self.document_index + 1,
            self.batch_index + 1,
            self.batch_total
        )
    }
}
