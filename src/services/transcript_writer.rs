//! 回复记录服务 - 业务能力层
//!
//! 只负责"追加写 transcript 文件"能力，不关心流程

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{AppError, AppResult};

/// 回复记录服务
///
/// 职责：
/// - 把每个批次的回复按文档追加到 Markdown 文件
/// - 记录重试耗尽后被跳过的批次
/// - 不解析回复内容
pub struct TranscriptWriter {
    path: PathBuf,
}

impl TranscriptWriter {
    pub fn new() -> Self {
        Self::with_path("transcript.md")
    }

    /// 使用自定义文件路径创建
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 写入文档标题
    pub fn write_document_header(&self, document: &str) -> AppResult<()> {
        self.append(&format!(
            "\n## {}\n\n_{}_\n\n",
            document,
            chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
        ))
    }

    /// 写入一个批次的回复
    pub fn write_reply(&self, document: &str, batch: &str, reply: &str) -> AppResult<()> {
        debug!(
            "写入回复: 文档 {} | {} | 长度: {}",
            document,
            batch,
            reply.len()
        );
        self.append(&format!("### {}\n\n{}\n\n", batch, reply.trim()))
    }

    /// 记录失败并跳过的批次
    pub fn write_failure(&self, document: &str, batch: &str, attempts: u32) -> AppResult<()> {
        debug!("写入失败记录: 文档 {} | {}", document, batch);
        self.append(&format!(
            "### {}\n\n> ⚠️ 尝试 {} 次后仍未获得有效回复，已跳过\n\n",
            batch, attempts
        ))
    }

    fn append(&self, text: &str) -> AppResult<()> {
        let path = self.path.display().to_string();
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| AppError::file_write_failed(&path, e))?;
        file.write_all(text.as_bytes())
            .map_err(|e| AppError::file_write_failed(&path, e))?;
        Ok(())
    }
}

impl Default for TranscriptWriter {
    fn default() -> Self {
        Self::new()
    }
}
