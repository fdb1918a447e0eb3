use std::path::{Path, PathBuf};
use thiserror::Error;

/// 自定义错误类型
#[derive(Error, Debug)]
pub enum DocError {
    #[error("File not found: {0}")]
    NotFound(PathBuf),

    #[error("Invalid document format in {path}: {reason}")]
    InvalidFormat { path: PathBuf, reason: String },

    #[error("Slot count mismatch: expected {expected} replacement values, got {actual}")]
    SlotCountMismatch { expected: usize, actual: usize },

    #[error("Invalid replacement: {0}")]
    InvalidReplacement(String),

    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("XML error: {0}")]
    XmlError(#[from] quick_xml::Error),

    #[error("ZIP error: {0}")]
    ZipError(#[from] zip::result::ZipError),
}

impl DocError {
    pub(crate) fn invalid_format(path: &Path, reason: impl Into<String>) -> Self {
        DocError::InvalidFormat {
            path: path.to_path_buf(),
            reason: reason.into(),
        }
    }

    pub(crate) fn write(path: &Path, source: std::io::Error) -> Self {
        DocError::Write {
            path: path.to_path_buf(),
            source,
        }
    }

    /// 把读取源文件时的 IO 错误转换为 NotFound 或 IoError
    pub(crate) fn from_read(path: &Path, error: std::io::Error) -> Self {
        if error.kind() == std::io::ErrorKind::NotFound {
            DocError::NotFound(path.to_path_buf())
        } else {
            DocError::IoError(error)
        }
    }
}

pub type Result<T> = std::result::Result<T, DocError>;

/// 文本槽位是否可提取：非空且不全是空白
pub fn is_eligible_text(text: Option<&str>) -> bool {
    text.is_some_and(|t| !t.trim().is_empty())
}

/// 为目标文件创建父目录
pub fn make_parent_directory(file_path: &Path) -> Result<()> {
    match file_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() && !parent.exists() => {
            std::fs::create_dir_all(parent).map_err(|e| DocError::write(parent, e))
        }
        _ => Ok(()),
    }
}

/// 创建文件备份
pub fn create_backup(file_path: &Path) -> Result<PathBuf> {
    if !file_path.exists() {
        return Err(DocError::NotFound(file_path.to_path_buf()));
    }

    let timestamp = chrono::Local::now().format("%Y-%m-%d-%H-%M-%S");
    let extension = file_path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| format!("{}.{}.bak", ext, timestamp))
        .unwrap_or_else(|| format!("{}.bak", timestamp));
    let backup_path = file_path.with_extension(extension);

    std::fs::copy(file_path, &backup_path).map_err(|e| DocError::write(&backup_path, e))?;

    Ok(backup_path)
}
