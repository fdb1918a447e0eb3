/// 普通文件 IO 实现
///
/// 写入采用"临时文件 + 重命名"，失败时不会留下半写的目标文件。
/// 覆盖已有文件时保留其权限；目标是符号链接时写入链接指向的文件。
use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use super::traits::{DocumentReader, DocumentWriter, RawDocumentData};
use crate::utils::{make_parent_directory, DocError, Result};

/// 默认的文档读取器（基于 std::fs）
#[derive(Debug, Clone, Default)]
pub struct DefaultDocumentReader;

impl DocumentReader for DefaultDocumentReader {
    fn read(&self, path: &Path) -> Result<RawDocumentData> {
        let bytes = std::fs::read(path).map_err(|e| DocError::from_read(path, e))?;
        Ok(RawDocumentData { bytes })
    }
}

/// 默认的文档写入器（基于 std::fs + tempfile）
#[derive(Debug, Clone, Default)]
pub struct DefaultDocumentWriter;

impl DocumentWriter for DefaultDocumentWriter {
    fn write(&self, data: &RawDocumentData, path: &Path) -> Result<()> {
        let target = resolve_target(path);
        let mut temp = create_temp_beside(&target)?;
        temp.write_all(&data.bytes)
            .and_then(|_| temp.flush())
            .map_err(|e| DocError::write(path, e))?;
        persist(temp, &target)
    }
}

/// 在目标文件所在目录创建临时文件（确保重命名不跨文件系统）
pub(crate) fn create_temp_beside(path: &Path) -> Result<NamedTempFile> {
    make_parent_directory(path)?;
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    NamedTempFile::new_in(dir).map_err(|e| DocError::write(path, e))
}

/// 符号链接解析为实际文件，其余路径原样返回
pub(crate) fn resolve_target(path: &Path) -> PathBuf {
    match std::fs::symlink_metadata(path) {
        Ok(metadata) if metadata.file_type().is_symlink() => {
            std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
        }
        _ => path.to_path_buf(),
    }
}

/// 用临时文件原子替换目标文件
///
/// 临时文件创建时权限为 0600，目标已存在时先复制目标的权限。
pub(crate) fn persist(temp: NamedTempFile, path: &Path) -> Result<()> {
    if let Ok(metadata) = std::fs::metadata(path) {
        temp.as_file()
            .set_permissions(metadata.permissions())
            .map_err(|e| DocError::write(path, e))?;
    }
    temp.persist(path)
        .map(|_| ())
        .map_err(|e| DocError::write(path, e.error))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_document_reader() {
        let temp_dir = TempDir::new().unwrap();
        let test_file = temp_dir.path().join("reader.txt");
        std::fs::write(&test_file, b"hello").unwrap();

        let reader = DefaultDocumentReader;
        let result = reader.read(&test_file).unwrap();

        assert_eq!(result.bytes, b"hello");
    }

    #[test]
    fn test_reader_missing_file() {
        let temp_dir = TempDir::new().unwrap();
        let missing = temp_dir.path().join("missing.txt");

        let result = DefaultDocumentReader.read(&missing);
        assert!(matches!(result, Err(DocError::NotFound(path)) if path == missing));
    }

    #[test]
    fn test_default_document_writer_overwrites() {
        let temp_dir = TempDir::new().unwrap();
        let test_file = temp_dir.path().join("writer.txt");
        std::fs::write(&test_file, b"old content that is longer").unwrap();

        let data = RawDocumentData { bytes: b"new".to_vec() };
        DefaultDocumentWriter.write(&data, &test_file).unwrap();

        assert_eq!(std::fs::read(&test_file).unwrap(), b"new");
        // 不残留临时文件
        assert_eq!(std::fs::read_dir(temp_dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_writer_creates_parent_dirs() {
        let temp_dir = TempDir::new().unwrap();
        let test_file = temp_dir.path().join("nested").join("subdir").join("out.txt");

        let data = RawDocumentData { bytes: vec![1, 2, 3, 4] };
        DefaultDocumentWriter.write(&data, &test_file).unwrap();

        assert_eq!(std::fs::read(&test_file).unwrap(), vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_writer_reports_write_error() {
        let temp_dir = TempDir::new().unwrap();
        // 父路径是一个普通文件，无法创建目录
        let blocker = temp_dir.path().join("blocker");
        std::fs::write(&blocker, b"x").unwrap();
        let target = blocker.join("out.txt");

        let data = RawDocumentData { bytes: vec![0] };
        let result = DefaultDocumentWriter.write(&data, &target);
        assert!(matches!(result, Err(DocError::Write { .. })));
    }

    #[cfg(unix)]
    #[test]
    fn test_overwrite_keeps_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let temp_dir = TempDir::new().unwrap();
        let test_file = temp_dir.path().join("shared.txt");
        std::fs::write(&test_file, b"old").unwrap();
        std::fs::set_permissions(&test_file, std::fs::Permissions::from_mode(0o644)).unwrap();

        let data = RawDocumentData { bytes: b"new".to_vec() };
        DefaultDocumentWriter.write(&data, &test_file).unwrap();

        let mode = std::fs::metadata(&test_file).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o644);
        assert_eq!(std::fs::read(&test_file).unwrap(), b"new");
    }

    #[cfg(unix)]
    #[test]
    fn test_overwrite_through_symlink() {
        let temp_dir = TempDir::new().unwrap();
        let real = temp_dir.path().join("real.txt");
        let link = temp_dir.path().join("link.txt");
        std::fs::write(&real, b"old").unwrap();
        std::os::unix::fs::symlink(&real, &link).unwrap();

        let data = RawDocumentData { bytes: b"new".to_vec() };
        DefaultDocumentWriter.write(&data, &link).unwrap();

        assert!(std::fs::symlink_metadata(&link).unwrap().file_type().is_symlink());
        assert_eq!(std::fs::read(&real).unwrap(), b"new");
        assert_eq!(std::fs::read_dir(temp_dir.path()).unwrap().count(), 2);
    }
}
