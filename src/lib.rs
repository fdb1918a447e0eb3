pub mod document;
pub mod io;
pub mod segment;
pub mod tree;
pub mod utils;
pub mod walker;

// 重新导出主要结构
pub use document::{open, Document, DocumentHandle, Format, SpreadsheetDocument, TextDocument, XmlDocument};
pub use segment::{Replacement, Segment};
pub use tree::{XmlNode, XmlTree};
pub use utils::{is_eligible_text, DocError, Result};
pub use walker::{SlotKind, SlotLocation, TextNode};

// 常量定义
pub const SUPPORTED_EXTENSIONS: &[&str] = &[
    "txt", "text", "md", "xlsx", "xlsm", "xml", "xhtml", "xliff", "xlf", "svg", "resx", "ts",
];
