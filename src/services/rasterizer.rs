//! 文档转图片 - 业务能力层
//!
//! 只负责"把一个文档变成有序的页面图片"，不关心批次和发送。

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info};

use crate::error::ConversionError;

/// 可直接作为单页发送的图片格式
const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "webp", "gif"];

/// 文档渲染器
///
/// 同一文档、同一 DPI 的输出必须稳定，否则断点续传的批次位置会错位。
#[async_trait]
pub trait Rasterizer: Send + Sync {
    async fn rasterize(&self, document: &Path, dpi: u32) -> Result<Vec<PathBuf>, ConversionError>;
}

/// 基于 poppler `pdftoppm` 的渲染器
///
/// 输出到 `output_dir/<文档名>-<路径哈希>/page-N.png`，每次转换前清空该目录；
/// 图片文件直接作为单页返回。
pub struct PdftoppmRasterizer {
    output_dir: PathBuf,
    program: String,
}

impl PdftoppmRasterizer {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            program: "pdftoppm".to_string(),
        }
    }

    /// 指定 pdftoppm 可执行文件
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    fn target_dir(&self, document: &Path) -> PathBuf {
        let stem = document
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "document".to_string());
        self.output_dir
            .join(format!("{}-{:016x}", stem, path_hash(document)))
    }
}

#[async_trait]
impl Rasterizer for PdftoppmRasterizer {
    async fn rasterize(&self, document: &Path, dpi: u32) -> Result<Vec<PathBuf>, ConversionError> {
        if !document.is_file() {
            return Err(ConversionError::NotFound {
                path: document.to_path_buf(),
            });
        }

        if is_image(document) {
            debug!("{} 是图片文件，直接作为单页", document.display());
            return Ok(vec![document.to_path_buf()]);
        }

        // pdftoppm 的补零位数随页数变化，旧文件不会被覆盖
        let target_dir = self.target_dir(document);
        match tokio::fs::remove_dir_all(&target_dir).await {
            Ok(()) => debug!("已清空输出目录 {}", target_dir.display()),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(source) => {
                return Err(ConversionError::Io {
                    path: target_dir,
                    source,
                })
            }
        }
        tokio::fs::create_dir_all(&target_dir)
            .await
            .map_err(|source| ConversionError::Io {
                path: target_dir.clone(),
                source,
            })?;

        info!("正在转换 {} (DPI: {})", document.display(), dpi);
        let output = Command::new(&self.program)
            .arg("-png")
            .arg("-r")
            .arg(dpi.to_string())
            .arg(document)
            .arg(target_dir.join("page"))
            .output()
            .await
            .map_err(|e| ConversionError::ToolFailed {
                path: document.to_path_buf(),
                message: format!("无法启动 {}: {}", self.program, e),
            })?;

        if !output.status.success() {
            return Err(ConversionError::ToolFailed {
                path: document.to_path_buf(),
                message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let pages = collect_pages(&target_dir).await?;
        if pages.is_empty() {
            return Err(ConversionError::NoPages {
                path: document.to_path_buf(),
            });
        }

        info!("✓ {} 转换完成，共 {} 页", document.display(), pages.len());
        Ok(pages)
    }
}

/// 同名文档放在不同目录时输出互不干扰
fn path_hash(path: &Path) -> u64 {
    let mut hasher = DefaultHasher::new();
    path.hash(&mut hasher);
    hasher.finish()
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
        .is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext.as_str()))
}

/// 从 `page-N.png` / `page-0N.png` 中取出页码
fn page_number(path: &Path) -> Option<u32> {
    let stem = path.file_stem()?.to_str()?;
    if path.extension()?.to_str()? != "png" {
        return None;
    }
    stem.strip_prefix("page-")?.parse().ok()
}

/// 按页码排序收集输出目录中的页面图片
async fn collect_pages(dir: &Path) -> Result<Vec<PathBuf>, ConversionError> {
    let io_err = |source| ConversionError::Io {
        path: dir.to_path_buf(),
        source,
    };

    let mut entries = tokio::fs::read_dir(dir).await.map_err(io_err)?;
    let mut numbered = Vec::new();
    while let Some(entry) = entries.next_entry().await.map_err(io_err)? {
        let path = entry.path();
        if let Some(number) = page_number(&path) {
            numbered.push((number, path));
        }
    }

    numbered.sort_by_key(|(number, _)| *number);
    Ok(numbered.into_iter().map(|(_, path)| path).collect())
}
