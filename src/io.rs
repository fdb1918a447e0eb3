/// IO 抽象层模块
///
/// 该模块提供了文件读写的抽象接口，文档类型只依赖这些 trait，
/// 便于在测试中替换为内存实现。
///
/// # 架构设计
///
/// - **traits**: 定义 Reader/Writer trait 接口
/// - **fs_io**: 普通文件的默认实现（原子写入）
/// - **zip_io**: OOXML 容器的默认实现（只重写一个部件）
///
/// # 使用示例
///
/// ```rust,ignore
/// use docswap::io::{DefaultDocumentReader, DocumentReader};
///
/// let reader = DefaultDocumentReader;
/// let data = reader.read(Path::new("messages.xml"))?;
/// ```
pub mod fs_io;
pub mod traits;
pub mod zip_io;

// === 导出 trait 定义 ===
pub use traits::{ArchiveReader, ArchiveWriter, DocumentReader, DocumentWriter, RawDocumentData};

// === 导出默认实现 ===
pub use fs_io::{DefaultDocumentReader, DefaultDocumentWriter};
pub use zip_io::{DefaultArchiveReader, DefaultArchiveWriter};
