/// 文档模块
///
/// 三种文档格式共享同一个契约 [`DocumentHandle`]：
///
/// - **text**: 纯文本，整个文件是一个片段
/// - **spreadsheet**: OOXML 表格的共享字符串表（`xl/sharedStrings.xml`）
/// - **xml**: 通用 XML，按 text/tail 模型遍历
///
/// # 使用示例
///
/// ```rust,ignore
/// use docswap::{Document, DocumentHandle};
///
/// let mut doc = docswap::open("messages.xml")?;
/// let texts = doc.extract();
/// let translated: Vec<Option<String>> = texts.iter().map(|t| Some(translate(t))).collect();
/// doc.swap(&translated)?;
/// doc.save(Some(Path::new("out/messages.xml")))?;
/// ```
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::utils::{DocError, Result};

mod spreadsheet;
mod text;
mod xml;

pub use spreadsheet::{SpreadsheetDocument, SHARED_STRINGS_PART, SPREADSHEETML_NAMESPACE};
pub use text::TextDocument;
pub use xml::XmlDocument;

/// 文档格式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
#[serde(rename_all = "snake_case")]
pub enum Format {
    PlainText,
    Spreadsheet,
    Xml,
}

impl Format {
    /// 从文件扩展名推断格式
    pub fn from_extension(extension: &str) -> Option<Self> {
        match extension.to_lowercase().as_str() {
            "txt" | "text" | "md" => Some(Format::PlainText),
            "xlsx" | "xlsm" => Some(Format::Spreadsheet),
            "xml" | "xhtml" | "xliff" | "xlf" | "svg" | "resx" | "ts" => Some(Format::Xml),
            _ => None,
        }
    }

    /// 从路径推断格式，无法识别时返回格式错误
    pub fn from_path(path: &Path) -> Result<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(Self::from_extension)
            .ok_or_else(|| DocError::invalid_format(path, "unrecognized file extension"))
    }

    pub fn name(&self) -> &'static str {
        match self {
            Format::PlainText => "plain text",
            Format::Spreadsheet => "spreadsheet",
            Format::Xml => "xml",
        }
    }
}

/// 所有文档格式的公共契约
///
/// 流程：打开 → `extract` → 外部翻译 → `swap` → `save`。
/// `swap` 按 `extract` 的顺序消费替换序列，`None` 表示保留原文。
pub trait DocumentHandle {
    /// 打开时的路径
    fn original_path(&self) -> &Path;

    fn format(&self) -> Format;

    /// 按文档顺序提取文本片段
    fn extract(&self) -> Vec<String>;

    /// 按文档顺序写回替换文本（仅修改内存）
    fn swap(&mut self, texts: &[Option<String>]) -> Result<()>;

    /// 保存到 `dest`，为 `None` 时覆盖原文件
    ///
    /// # 返回
    /// 实际写入的路径
    fn save(&self, dest: Option<&Path>) -> Result<PathBuf>;

    /// 计算实际保存路径
    fn resolve_destination(&self, dest: Option<&Path>) -> PathBuf {
        dest.unwrap_or_else(|| self.original_path()).to_path_buf()
    }
}

/// 格式封闭集合，打开时确定具体类型
#[derive(Debug)]
pub enum Document {
    Text(TextDocument),
    Spreadsheet(SpreadsheetDocument),
    Xml(XmlDocument),
}

impl Document {
    /// 按指定格式打开文档
    pub fn open(path: impl AsRef<Path>, format: Format) -> Result<Self> {
        let path = path.as_ref();
        Ok(match format {
            Format::PlainText => Document::Text(TextDocument::open(path)?),
            Format::Spreadsheet => Document::Spreadsheet(SpreadsheetDocument::open(path)?),
            Format::Xml => Document::Xml(XmlDocument::open(path)?),
        })
    }

    fn handle(&self) -> &dyn DocumentHandle {
        match self {
            Document::Text(doc) => doc,
            Document::Spreadsheet(doc) => doc,
            Document::Xml(doc) => doc,
        }
    }

    fn handle_mut(&mut self) -> &mut dyn DocumentHandle {
        match self {
            Document::Text(doc) => doc,
            Document::Spreadsheet(doc) => doc,
            Document::Xml(doc) => doc,
        }
    }
}

impl DocumentHandle for Document {
    fn original_path(&self) -> &Path {
        self.handle().original_path()
    }

    fn format(&self) -> Format {
        self.handle().format()
    }

    fn extract(&self) -> Vec<String> {
        self.handle().extract()
    }

    fn swap(&mut self, texts: &[Option<String>]) -> Result<()> {
        self.handle_mut().swap(texts)
    }

    fn save(&self, dest: Option<&Path>) -> Result<PathBuf> {
        self.handle().save(dest)
    }
}

/// 根据扩展名推断格式并打开文档
pub fn open(path: impl AsRef<Path>) -> Result<Document> {
    let path = path.as_ref();
    let format = Format::from_path(path)?;
    Document::open(path, format)
}
