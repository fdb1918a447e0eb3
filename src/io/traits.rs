/// IO 抽象层 - trait 定义
///
/// 该模块定义了文件读写的抽象接口，支持依赖注入和测试 mock。
use std::path::Path;

use crate::utils::Result;

/// 文档原始数据
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawDocumentData {
    /// 文件的原始字节数据
    pub bytes: Vec<u8>,
}

/// 文档读取 trait
///
/// # 职责
/// - 从文件系统读取整个文件的原始字节
/// - 不负责解析，仅负责 IO
/// - 路径不存在时返回 [`DocError::NotFound`](crate::DocError::NotFound)
pub trait DocumentReader {
    fn read(&self, path: &Path) -> Result<RawDocumentData>;
}

/// 文档写入 trait
///
/// # 职责
/// - 将序列化后的数据写入目标路径，必要时创建父目录
/// - 写入失败时目标文件保持原状
pub trait DocumentWriter {
    fn write(&self, data: &RawDocumentData, path: &Path) -> Result<()>;
}

/// 压缩容器部件读取 trait
pub trait ArchiveReader {
    /// 读取容器中的一个部件
    ///
    /// # 参数
    /// * `archive` - 容器文件路径（如 `book.xlsx`）
    /// * `part` - 部件名称（如 `xl/sharedStrings.xml`）
    ///
    /// # 错误
    /// 路径不存在返回 NotFound；不是合法容器或缺少部件返回 InvalidFormat
    fn read_part(&self, archive: &Path, part: &str) -> Result<Vec<u8>>;
}

/// 压缩容器部件写入 trait
pub trait ArchiveWriter {
    /// 以 `source` 为模板写出容器到 `dest`，只替换 `part` 的内容
    ///
    /// `source` 与 `dest` 可以是同一路径（原地覆盖）。
    /// 其余部件保持原始字节不变。
    fn replace_part(&self, source: &Path, dest: &Path, part: &str, bytes: &[u8]) -> Result<()>;
}
