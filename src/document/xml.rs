/// 通用 XML 文档
///
/// 打开时解析整棵树，`extract`/`swap` 直接委托给 [`walker`](crate::walker)，
/// 保存时重新序列化整个文档（不做字节级保留）。
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use super::{DocumentHandle, Format};
use crate::io::{DefaultDocumentReader, DefaultDocumentWriter, DocumentReader, DocumentWriter, RawDocumentData};
use crate::tree::XmlTree;
use crate::utils::{DocError, Result};
use crate::walker::{self, SlotLocation};

#[derive(Debug, Clone)]
pub struct XmlDocument {
    original_path: PathBuf,
    tree: XmlTree,
}

impl XmlDocument {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with(&DefaultDocumentReader, path)
    }

    pub fn open_with<R: DocumentReader>(reader: &R, path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = reader.read(path)?;
        let tree = XmlTree::parse(&data.bytes).map_err(|reason| DocError::invalid_format(path, reason))?;

        debug!(
            path = %path.display(),
            root = %tree.root.name,
            slots = walker::slot_count(&tree.root),
            "opened xml document"
        );
        Ok(Self {
            original_path: path.to_path_buf(),
            tree,
        })
    }

    pub fn tree(&self) -> &XmlTree {
        &self.tree
    }

    /// 每个片段所在的槽位（text/tail）和元素名
    pub fn locate(&self) -> Vec<SlotLocation> {
        walker::locate(&self.tree.root)
    }

    pub fn save_with<W: DocumentWriter>(&self, writer: &W, dest: Option<&Path>) -> Result<PathBuf> {
        let path = self.resolve_destination(dest);
        let data = RawDocumentData {
            bytes: self.tree.to_bytes()?,
        };
        writer.write(&data, &path)?;

        debug!(path = %path.display(), bytes = data.bytes.len(), "saved xml document");
        Ok(path)
    }
}

impl DocumentHandle for XmlDocument {
    fn original_path(&self) -> &Path {
        &self.original_path
    }

    fn format(&self) -> Format {
        Format::Xml
    }

    fn extract(&self) -> Vec<String> {
        walker::extract(&self.tree.root)
    }

    fn swap(&mut self, texts: &[Option<String>]) -> Result<()> {
        walker::swap(&mut self.tree.root, texts).inspect_err(|e| {
            warn!(path = %self.original_path.display(), error = %e, "rejected swap");
        })
    }

    fn save(&self, dest: Option<&Path>) -> Result<PathBuf> {
        self.save_with(&DefaultDocumentWriter, dest)
    }
}
