//! 批次模型
//!
//! 批次是一次发送给助手的图片集合，由分组、固定大小切块或单页派生，不单独持久化。

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// 文档的分批模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanMode {
    /// 每页一批
    #[default]
    Single,
    /// 每 N 页一批
    FixedN,
    /// 按分组 / 自定义顺序
    Custom,
}

/// 批次来源
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchKind {
    Group,
    Chunk,
    Page,
}

/// 自定义顺序中的一项
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "members", rename_all = "snake_case")]
pub enum OrderEntry {
    Group(Vec<usize>),
    Page(Vec<usize>),
}

impl OrderEntry {
    pub fn members(&self) -> &[usize] {
        match self {
            OrderEntry::Group(m) | OrderEntry::Page(m) => m,
        }
    }

    pub fn kind(&self) -> BatchKind {
        match self {
            OrderEntry::Group(_) => BatchKind::Group,
            OrderEntry::Page(_) => BatchKind::Page,
        }
    }
}

/// 一次提交的批次
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch {
    pub kind: BatchKind,
    /// 页码（从 0 开始），与 `images` 一一对应
    pub pages: Vec<usize>,
    pub images: Vec<PathBuf>,
}

impl Batch {
    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    /// 只保留满足条件的页
    pub fn retain_pages(&mut self, mut keep: impl FnMut(usize) -> bool) {
        let (pages, images): (Vec<_>, Vec<_>) = self
            .pages
            .iter()
            .copied()
            .zip(self.images.drain(..))
            .filter(|(page, _)| keep(*page))
            .unzip();
        self.pages = pages;
        self.images = images;
    }
}

impl fmt::Display for Batch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let numbers: Vec<String> = self.pages.iter().map(|p| (p + 1).to_string()).collect();
        match self.kind {
            BatchKind::Page => write!(f, "第 {} 页", numbers.join(",")),
            BatchKind::Chunk => write!(f, "第 {} 页 (连续)", numbers.join(",")),
            BatchKind::Group => write!(f, "分组 [{}]", numbers.join(",")),
        }
    }
}

/// 一个文档的完整批次计划
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchPlan {
    batches: Vec<Batch>,
}

impl BatchPlan {
    pub fn new(batches: Vec<Batch>) -> Self {
        Self { batches }
    }

    pub fn len(&self) -> usize {
        self.batches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.batches.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Batch> {
        self.batches.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Batch> {
        self.batches.iter()
    }

    pub fn batches(&self) -> &[Batch] {
        &self.batches
    }

    /// 每个批次的页码列表
    pub fn page_lists(&self) -> Vec<Vec<usize>> {
        self.batches.iter().map(|b| b.pages.clone()).collect()
    }

    pub fn total_pages(&self) -> usize {
        self.batches.iter().map(Batch::len).sum()
    }
}
