//! 文档与队列模型

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::models::batch::{BatchPlan, OrderEntry, PlanMode};
use crate::services::batch_planner;

/// 文档中的一页（已渲染为图片）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    pub index: usize,
    pub image: PathBuf,
    pub enabled: bool,
}

/// 页面分组：至少两页，一起发送
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Group {
    pub pages: Vec<usize>,
    /// 仅用于展示
    pub color: Option<String>,
}

impl Group {
    pub fn new(pages: Vec<usize>) -> Self {
        Self { pages, color: None }
    }
}

/// 待处理文档
///
/// 页面在首次访问时由渲染器生成并缓存；从队列移除时缓存随之失效。
#[derive(Debug, Clone)]
pub struct Document {
    pub path: PathBuf,
    pub mode: PlanMode,
    pub chunk_size: usize,
    pages: Option<Vec<Page>>,
    groups: Vec<Group>,
    order_override: Option<Vec<OrderEntry>>,
}

impl Document {
    pub fn new(path: impl Into<PathBuf>, mode: PlanMode, chunk_size: usize) -> Self {
        Self {
            path: path.into(),
            mode,
            chunk_size,
            pages: None,
            groups: Vec::new(),
            order_override: None,
        }
    }

    /// 文件名（用于日志）
    pub fn name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string())
    }

    pub fn is_rasterized(&self) -> bool {
        self.pages.is_some()
    }

    pub fn pages(&self) -> Option<&[Page]> {
        self.pages.as_deref()
    }

    /// 缓存渲染结果，所有页默认启用
    pub fn set_rasterized_pages(&mut self, images: Vec<PathBuf>) {
        self.pages = Some(
            images
                .into_iter()
                .enumerate()
                .map(|(index, image)| Page {
                    index,
                    image,
                    enabled: true,
                })
                .collect(),
        );
    }

    pub fn invalidate_pages(&mut self) {
        self.pages = None;
    }

    pub fn is_page_enabled(&self, index: usize) -> bool {
        self.pages
            .as_ref()
            .and_then(|pages| pages.iter().find(|p| p.index == index))
            .is_some_and(|p| p.enabled)
    }

    /// 启用/禁用某页；页面未渲染或不存在时返回 false
    pub fn set_page_enabled(&mut self, index: usize, enabled: bool) -> bool {
        match self
            .pages
            .as_mut()
            .and_then(|pages| pages.iter_mut().find(|p| p.index == index))
        {
            Some(page) => {
                page.enabled = enabled;
                true
            }
            None => false,
        }
    }

    pub fn groups(&self) -> &[Group] {
        &self.groups
    }

    /// 新建分组，返回分组序号
    ///
    /// 每页至多属于一个分组：新分组中的页会先从已有分组移除，
    /// 移除后不足两页的旧分组随之解散。
    pub fn add_group(&mut self, group: Group) -> Option<usize> {
        let mut members = Vec::with_capacity(group.pages.len());
        for page in group.pages {
            if !members.contains(&page) {
                members.push(page);
            }
        }
        if members.len() < 2 {
            return None;
        }

        for existing in &mut self.groups {
            existing.pages.retain(|p| !members.contains(p));
        }
        self.groups.retain(|g| g.pages.len() >= 2);

        self.groups.push(Group {
            pages: members,
            color: group.color,
        });
        Some(self.groups.len() - 1)
    }

    pub fn remove_group(&mut self, index: usize) -> Option<Group> {
        (index < self.groups.len()).then(|| self.groups.remove(index))
    }

    pub fn clear_groups(&mut self) {
        self.groups.clear();
    }

    pub fn order_override(&self) -> Option<&[OrderEntry]> {
        self.order_override.as_deref()
    }

    pub fn set_order_override(&mut self, order: Option<Vec<OrderEntry>>) {
        self.order_override = order;
    }

    /// 当前的批次计划；未渲染时为空
    pub fn plan(&self) -> BatchPlan {
        match &self.pages {
            Some(pages) => batch_planner::plan(
                pages,
                &self.groups,
                self.order_override.as_deref(),
                self.mode,
                self.chunk_size,
            ),
            None => BatchPlan::default(),
        }
    }
}

/// 文档队列
#[derive(Debug, Clone, Default)]
pub struct DocumentQueue {
    documents: Vec<Document>,
}

/// 编排器与展示层共享的队列
pub type SharedQueue = Arc<RwLock<DocumentQueue>>;

impl DocumentQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn into_shared(self) -> SharedQueue {
        Arc::new(RwLock::new(self))
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Document> {
        self.documents.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut Document> {
        self.documents.get_mut(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Document> {
        self.documents.iter()
    }

    /// 添加文档，返回其位置；同一路径不会重复添加
    pub fn push(&mut self, document: Document) -> usize {
        if let Some(pos) = self.position(&document.path) {
            return pos;
        }
        self.documents.push(document);
        self.documents.len() - 1
    }

    pub fn position(&self, path: &Path) -> Option<usize> {
        self.documents.iter().position(|d| d.path == path)
    }

    /// 移除文档，渲染缓存随之失效
    pub fn remove(&mut self, index: usize) -> Option<Document> {
        if index >= self.documents.len() {
            return None;
        }
        let mut removed = self.documents.remove(index);
        removed.invalidate_pages();
        Some(removed)
    }

    pub fn move_up(&mut self, index: usize) -> bool {
        if index == 0 || index >= self.documents.len() {
            return false;
        }
        self.documents.swap(index, index - 1);
        true
    }

    pub fn move_down(&mut self, index: usize) -> bool {
        if index + 1 >= self.documents.len() {
            return false;
        }
        self.documents.swap(index, index + 1);
        true
    }

    pub fn clear(&mut self) {
        self.documents.clear();
    }
}
