/// 纯文本文档：整个文件内容作为唯一片段
use std::path::{Path, PathBuf};

use tracing::debug;

use super::{DocumentHandle, Format};
use crate::io::{DefaultDocumentReader, DefaultDocumentWriter, DocumentReader, DocumentWriter, RawDocumentData};
use crate::utils::{DocError, Result};

#[derive(Debug, Clone)]
pub struct TextDocument {
    original_path: PathBuf,
    text: String,
}

impl TextDocument {
    /// 读取 UTF-8 文本文件
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with(&DefaultDocumentReader, path)
    }

    pub fn open_with<R: DocumentReader>(reader: &R, path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = reader.read(path)?;
        let text = String::from_utf8(data.bytes)
            .map_err(|e| DocError::invalid_format(path, format!("not valid UTF-8 text: {}", e)))?;

        debug!(path = %path.display(), bytes = text.len(), "opened text document");
        Ok(Self {
            original_path: path.to_path_buf(),
            text,
        })
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn save_with<W: DocumentWriter>(&self, writer: &W, dest: Option<&Path>) -> Result<PathBuf> {
        let path = self.resolve_destination(dest);
        let data = RawDocumentData {
            bytes: self.text.as_bytes().to_vec(),
        };
        writer.write(&data, &path)?;

        debug!(path = %path.display(), "saved text document");
        Ok(path)
    }
}

impl DocumentHandle for TextDocument {
    fn original_path(&self) -> &Path {
        &self.original_path
    }

    fn format(&self) -> Format {
        Format::PlainText
    }

    fn extract(&self) -> Vec<String> {
        vec![self.text.clone()]
    }

    /// 唯一片段总是可替换（不做空白过滤）
    fn swap(&mut self, texts: &[Option<String>]) -> Result<()> {
        match texts {
            [replacement] => {
                if let Some(text) = replacement {
                    self.text = text.clone();
                }
                Ok(())
            }
            _ => Err(DocError::SlotCountMismatch {
                expected: 1,
                actual: texts.len(),
            }),
        }
    }

    fn save(&self, dest: Option<&Path>) -> Result<PathBuf> {
        self.save_with(&DefaultDocumentWriter, dest)
    }
}
