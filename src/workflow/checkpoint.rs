//! 断点状态
//!
//! 编排器独占的位置记录：停止、限流暂停、会话关闭后都从这里继续。
//! 只存在于内存中，进程退出即丢失。

use serde::Serialize;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Checkpoint {
    /// 当前文档序号
    pub document_index: usize,
    /// 当前文档内的批次序号（下一个要处理的批次）
    pub batch_index: usize,
    /// 距上次新建对话已发送的页数
    pub pages_since_new_conversation: u32,
    /// 是否处于限流暂停
    pub paused: bool,
    /// 暂停剩余秒数；无限期暂停或未暂停时为 None
    pub pause_remaining_secs: Option<u64>,
}

impl Checkpoint {
    pub fn new() -> Self {
        Self::default()
    }

    /// 从指定位置开始
    pub fn at(document_index: usize, batch_index: usize) -> Self {
        Self {
            document_index,
            batch_index,
            ..Self::default()
        }
    }

    pub fn is_at_start(&self) -> bool {
        self.document_index == 0 && self.batch_index == 0
    }

    /// 批次完成（成功或放弃）后前进一步
    pub fn advance_batch(&mut self) {
        self.batch_index += 1;
    }

    /// 文档完成后移到下一个文档开头
    pub fn advance_document(&mut self) {
        self.document_index += 1;
        self.batch_index = 0;
    }

    /// 批次序号不能超过计划长度（计划可能在两次运行之间变短）
    pub fn clamp_batch(&mut self, plan_len: usize) {
        if self.batch_index > plan_len {
            self.batch_index = plan_len;
        }
    }

    pub fn record_pages(&mut self, pages: usize) {
        let pages = u32::try_from(pages).unwrap_or(u32::MAX);
        self.pages_since_new_conversation = self.pages_since_new_conversation.saturating_add(pages);
    }

    pub fn reset_conversation_counter(&mut self) {
        self.pages_since_new_conversation = 0;
    }

    pub fn set_paused(&mut self, remaining_secs: Option<u64>) {
        self.paused = true;
        self.pause_remaining_secs = remaining_secs;
    }

    pub fn clear_pause(&mut self) {
        self.paused = false;
        self.pause_remaining_secs = None;
    }

    /// 队列全部完成后回到起点
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
