/// OOXML 表格文档（共享字符串表）
///
/// 只读取容器中的 `xl/sharedStrings.xml`。共享字符串表没有嵌套文本结构，
/// 每个 SpreadsheetML 命名空间下的 `<t>` 元素就是一个条目（包括富文本 run
/// 和拼音 run 中的 `<t>`），按出现顺序组成扁平列表。
///
/// 与通用 XML 不同，条目不做空白过滤：空字符串同样占据一个位置。
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use super::{DocumentHandle, Format};
use crate::io::{ArchiveReader, ArchiveWriter, DefaultArchiveReader, DefaultArchiveWriter};
use crate::tree::{XmlNode, XmlTree};
use crate::utils::{DocError, Result};

/// 共享字符串表在容器中的位置
pub const SHARED_STRINGS_PART: &str = "xl/sharedStrings.xml";

/// SpreadsheetML 主命名空间
pub const SPREADSHEETML_NAMESPACE: &str = "http://schemas.openxmlformats.org/spreadsheetml/2006/main";

#[derive(Debug, Clone)]
pub struct SpreadsheetDocument {
    original_path: PathBuf,
    tree: XmlTree,
    /// 每个 `<t>` 元素相对根元素的子节点索引路径（文档顺序）
    entries: Vec<Vec<usize>>,
}

impl SpreadsheetDocument {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with(&DefaultArchiveReader, path)
    }

    pub fn open_with<R: ArchiveReader>(reader: &R, path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = reader.read_part(path, SHARED_STRINGS_PART)?;
        let tree = XmlTree::parse(&bytes).map_err(|reason| {
            DocError::invalid_format(path, format!("{}: {}", SHARED_STRINGS_PART, reason))
        })?;

        let mut entries = Vec::new();
        let mut scopes = Vec::new();
        let mut current = Vec::new();
        collect_entries(&tree.root, &mut scopes, &mut current, &mut entries);

        debug!(path = %path.display(), entries = entries.len(), "opened spreadsheet shared strings");
        Ok(Self {
            original_path: path.to_path_buf(),
            tree,
            entries,
        })
    }

    /// 条目数量
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn save_with<W: ArchiveWriter>(&self, writer: &W, dest: Option<&Path>) -> Result<PathBuf> {
        let path = self.resolve_destination(dest);
        let bytes = self.tree.to_bytes()?;
        writer.replace_part(&self.original_path, &path, SHARED_STRINGS_PART, &bytes)?;

        debug!(path = %path.display(), entries = self.entries.len(), "saved spreadsheet shared strings");
        Ok(path)
    }

    fn entry(&self, path: &[usize]) -> Option<&XmlNode> {
        self.tree.root.descendant(path)
    }
}

impl DocumentHandle for SpreadsheetDocument {
    fn original_path(&self) -> &Path {
        &self.original_path
    }

    fn format(&self) -> Format {
        Format::Spreadsheet
    }

    fn extract(&self) -> Vec<String> {
        self.entries
            .iter()
            .filter_map(|path| self.entry(path))
            .map(|node| node.text.clone().unwrap_or_default())
            .collect()
    }

    /// 按位置配对；`texts` 较短时后面的条目保持不变
    fn swap(&mut self, texts: &[Option<String>]) -> Result<()> {
        if texts.len() > self.entries.len() {
            warn!(
                path = %self.original_path.display(),
                entries = self.entries.len(),
                texts = texts.len(),
                "rejected swap"
            );
            return Err(DocError::SlotCountMismatch {
                expected: self.entries.len(),
                actual: texts.len(),
            });
        }

        for (path, text) in self.entries.iter().zip(texts) {
            let Some(text) = text else { continue };
            if let Some(node) = self.tree.root.descendant_mut(path) {
                set_entry_text(node, text);
            }
        }
        Ok(())
    }

    fn save(&self, dest: Option<&Path>) -> Result<PathBuf> {
        self.save_with(&DefaultArchiveWriter, dest)
    }
}

/// 写入条目文本；首尾有空白时标记 `xml:space="preserve"`，否则表格软件会丢弃空白
fn set_entry_text(node: &mut XmlNode, text: &str) {
    if text.trim() != text {
        node.set_attribute("xml:space", "preserve");
    }
    node.text = Some(text.to_string());
}

/// 深度优先收集 SpreadsheetML 命名空间下的 `<t>` 元素
///
/// `scopes` 是当前生效的命名空间声明栈（前缀，URI），默认命名空间的前缀为空串。
fn collect_entries(
    node: &XmlNode,
    scopes: &mut Vec<(String, String)>,
    current: &mut Vec<usize>,
    entries: &mut Vec<Vec<usize>>,
) {
    let declared = push_namespaces(node, scopes);

    let (prefix, local) = match node.name.split_once(':') {
        Some((prefix, local)) => (prefix, local),
        None => ("", node.name.as_str()),
    };
    if local == "t" && resolve_namespace(scopes, prefix) == Some(SPREADSHEETML_NAMESPACE) {
        entries.push(current.clone());
    }

    for (index, child) in node.children.iter().enumerate() {
        if child.is_element() {
            current.push(index);
            collect_entries(child, scopes, current, entries);
            current.pop();
        }
    }

    scopes.truncate(scopes.len() - declared);
}

fn push_namespaces(node: &XmlNode, scopes: &mut Vec<(String, String)>) -> usize {
    let before = scopes.len();
    for (key, value) in &node.attributes {
        if key == "xmlns" {
            scopes.push((String::new(), value.clone()));
        } else if let Some(prefix) = key.strip_prefix("xmlns:") {
            scopes.push((prefix.to_string(), value.clone()));
        }
    }
    scopes.len() - before
}

fn resolve_namespace<'a>(scopes: &'a [(String, String)], prefix: &str) -> Option<&'a str> {
    scopes
        .iter()
        .rev()
        .find(|(p, _)| p == prefix)
        .map(|(_, uri)| uri.as_str())
        .filter(|uri| !uri.is_empty())
}
