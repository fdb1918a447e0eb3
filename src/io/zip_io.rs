/// OOXML 容器 IO 实现
///
/// 写入时重建整个容器：除目标部件外的所有条目使用 raw copy（压缩数据原样复制，
/// 保持原有顺序），目标部件在原位置以原压缩方式重新写入，最后原子替换目标文件。
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use zip::result::ZipError;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use super::fs_io::{create_temp_beside, persist, resolve_target};
use super::traits::{ArchiveReader, ArchiveWriter};
use crate::utils::{DocError, Result};

/// 默认的容器读取器
#[derive(Debug, Clone, Default)]
pub struct DefaultArchiveReader;

impl ArchiveReader for DefaultArchiveReader {
    fn read_part(&self, archive: &Path, part: &str) -> Result<Vec<u8>> {
        let mut zip = open_archive(archive)?;
        let mut entry = zip.by_name(part).map_err(|e| match e {
            ZipError::FileNotFound => {
                DocError::invalid_format(archive, format!("missing part {}", part))
            }
            other => DocError::invalid_format(archive, other.to_string()),
        })?;

        let mut bytes = Vec::with_capacity(entry.size() as usize);
        entry
            .read_to_end(&mut bytes)
            .map_err(|e| DocError::invalid_format(archive, format!("cannot read {}: {}", part, e)))?;
        Ok(bytes)
    }
}

/// 默认的容器写入器
#[derive(Debug, Clone, Default)]
pub struct DefaultArchiveWriter;

impl ArchiveWriter for DefaultArchiveWriter {
    fn replace_part(&self, source: &Path, dest: &Path, part: &str, bytes: &[u8]) -> Result<()> {
        let target = resolve_target(dest);
        let temp = create_temp_beside(&target)?;
        {
            let mut zip = open_archive(source)?;
            let file = temp.reopen().map_err(|e| DocError::write(dest, e))?;
            let mut writer = ZipWriter::new(file);
            let mut replaced = false;

            for index in 0..zip.len() {
                let entry = zip.by_index_raw(index)?;
                if entry.name() == part {
                    let options = SimpleFileOptions::default().compression_method(entry.compression());
                    drop(entry);
                    write_part(&mut writer, part, options, bytes)?;
                    replaced = true;
                } else {
                    writer.raw_copy_file(entry)?;
                }
            }

            if !replaced {
                let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
                write_part(&mut writer, part, options, bytes)?;
            }

            writer.finish()?;
        }
        persist(temp, &target)
    }
}

fn open_archive(path: &Path) -> Result<ZipArchive<File>> {
    let file = File::open(path).map_err(|e| DocError::from_read(path, e))?;
    ZipArchive::new(file).map_err(|e| DocError::invalid_format(path, e.to_string()))
}

fn write_part(
    writer: &mut ZipWriter<File>,
    part: &str,
    options: SimpleFileOptions,
    bytes: &[u8],
) -> Result<()> {
    writer.start_file(part, options)?;
    writer.write_all(bytes)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_archive(path: &Path, entries: &[(&str, &str, CompressionMethod)]) {
        let file = File::create(path).unwrap();
        let mut zip = ZipWriter::new(file);
        for (name, content, method) in entries {
            let options = SimpleFileOptions::default().compression_method(*method);
            zip.start_file(*name, options).unwrap();
            zip.write_all(content.as_bytes()).unwrap();
        }
        zip.finish().unwrap();
    }

    fn read_entries(path: &Path) -> Vec<(String, Vec<u8>)> {
        let mut zip = ZipArchive::new(File::open(path).unwrap()).unwrap();
        (0..zip.len())
            .map(|i| {
                let mut entry = zip.by_index(i).unwrap();
                let mut content = Vec::new();
                entry.read_to_end(&mut content).unwrap();
                (entry.name().to_string(), content)
            })
            .collect()
    }

    fn raw_bytes(path: &Path, name: &str) -> Vec<u8> {
        let mut zip = ZipArchive::new(File::open(path).unwrap()).unwrap();
        let index = zip.index_for_name(name).unwrap();
        let mut entry = zip.by_index_raw(index).unwrap();
        let mut content = Vec::new();
        entry.read_to_end(&mut content).unwrap();
        content
    }

    #[test]
    fn test_read_part() {
        let temp_dir = TempDir::new().unwrap();
        let archive = temp_dir.path().join("book.xlsx");
        create_archive(
            &archive,
            &[
                ("[Content_Types].xml", "<Types/>", CompressionMethod::Deflated),
                ("xl/sharedStrings.xml", "<sst/>", CompressionMethod::Deflated),
            ],
        );

        let content = DefaultArchiveReader.read_part(&archive, "xl/sharedStrings.xml").unwrap();
        assert_eq!(content, b"<sst/>");
    }

    #[test]
    fn test_read_part_errors() {
        let temp_dir = TempDir::new().unwrap();

        let missing = temp_dir.path().join("missing.xlsx");
        let result = DefaultArchiveReader.read_part(&missing, "xl/sharedStrings.xml");
        assert!(matches!(result, Err(DocError::NotFound(_))));

        let not_zip = temp_dir.path().join("plain.xlsx");
        std::fs::write(&not_zip, b"definitely not a zip").unwrap();
        let result = DefaultArchiveReader.read_part(&not_zip, "xl/sharedStrings.xml");
        assert!(matches!(result, Err(DocError::InvalidFormat { .. })));

        let no_part = temp_dir.path().join("empty.xlsx");
        create_archive(&no_part, &[("xl/workbook.xml", "<workbook/>", CompressionMethod::Stored)]);
        let result = DefaultArchiveReader.read_part(&no_part, "xl/sharedStrings.xml");
        assert!(matches!(result, Err(DocError::InvalidFormat { reason, .. }) if reason.contains("missing part")));
    }

    #[test]
    fn test_replace_part_to_new_path() {
        let temp_dir = TempDir::new().unwrap();
        let source = temp_dir.path().join("book.xlsx");
        let dest = temp_dir.path().join("out").join("book.xlsx");
        create_archive(
            &source,
            &[
                ("[Content_Types].xml", "<Types/>", CompressionMethod::Deflated),
                ("xl/sharedStrings.xml", "<sst>old</sst>", CompressionMethod::Deflated),
                ("xl/worksheets/sheet1.xml", "<worksheet/>", CompressionMethod::Stored),
            ],
        );
        let original_bytes = std::fs::read(&source).unwrap();

        DefaultArchiveWriter
            .replace_part(&source, &dest, "xl/sharedStrings.xml", b"<sst>new</sst>")
            .unwrap();

        // 原文件不变
        assert_eq!(std::fs::read(&source).unwrap(), original_bytes);

        // 顺序不变，只有目标部件被替换
        let entries = read_entries(&dest);
        assert_eq!(
            entries,
            vec![
                ("[Content_Types].xml".to_string(), b"<Types/>".to_vec()),
                ("xl/sharedStrings.xml".to_string(), b"<sst>new</sst>".to_vec()),
                ("xl/worksheets/sheet1.xml".to_string(), b"<worksheet/>".to_vec()),
            ]
        );

        // 未修改的部件压缩字节完全一致
        assert_eq!(
            raw_bytes(&source, "[Content_Types].xml"),
            raw_bytes(&dest, "[Content_Types].xml")
        );
    }

    #[test]
    fn test_replace_part_in_place() {
        let temp_dir = TempDir::new().unwrap();
        let archive = temp_dir.path().join("book.xlsx");
        create_archive(
            &archive,
            &[
                ("xl/sharedStrings.xml", "<sst>old</sst>", CompressionMethod::Stored),
                ("xl/styles.xml", "<styleSheet/>", CompressionMethod::Deflated),
            ],
        );

        DefaultArchiveWriter
            .replace_part(&archive, &archive, "xl/sharedStrings.xml", b"<sst>new</sst>")
            .unwrap();

        let entries = read_entries(&archive);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].1, b"<sst>new</sst>");
        assert_eq!(entries[1].1, b"<styleSheet/>");
        assert_eq!(std::fs::read_dir(temp_dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_replace_part_appends_when_absent() {
        let temp_dir = TempDir::new().unwrap();
        let source = temp_dir.path().join("book.xlsx");
        let dest = temp_dir.path().join("copy.xlsx");
        create_archive(&source, &[("xl/workbook.xml", "<workbook/>", CompressionMethod::Deflated)]);

        DefaultArchiveWriter
            .replace_part(&source, &dest, "xl/sharedStrings.xml", b"<sst/>")
            .unwrap();

        let entries = read_entries(&dest);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1], ("xl/sharedStrings.xml".to_string(), b"<sst/>".to_vec()));
    }

    #[test]
    fn test_replace_part_failure_leaves_destination() {
        let temp_dir = TempDir::new().unwrap();
        let source = temp_dir.path().join("broken.xlsx");
        let dest = temp_dir.path().join("dest.xlsx");
        std::fs::write(&source, b"not a zip").unwrap();
        std::fs::write(&dest, b"previous").unwrap();

        let result = DefaultArchiveWriter.replace_part(&source, &dest, "xl/sharedStrings.xml", b"<sst/>");
        assert!(result.is_err());
        assert_eq!(std::fs::read(&dest).unwrap(), b"previous");
        assert_eq!(std::fs::read_dir(temp_dir.path()).unwrap().count(), 2);
    }

    #[cfg(unix)]
    #[test]
    fn test_replace_part_in_place_keeps_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let temp_dir = TempDir::new().unwrap();
        let archive = temp_dir.path().join("book.xlsx");
        create_archive(&archive, &[("xl/sharedStrings.xml", "<sst>old</sst>", CompressionMethod::Deflated)]);
        std::fs::set_permissions(&archive, std::fs::Permissions::from_mode(0o640)).unwrap();

        DefaultArchiveWriter
            .replace_part(&archive, &archive, "xl/sharedStrings.xml", b"<sst>new</sst>")
            .unwrap();

        let mode = std::fs::metadata(&archive).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o640);
        assert_eq!(read_entries(&archive)[0].1, b"<sst>new</sst>");
    }

    #[cfg(unix)]
    #[test]
    fn test_replace_part_through_symlink() {
        let temp_dir = TempDir::new().unwrap();
        let real = temp_dir.path().join("real.xlsx");
        let link = temp_dir.path().join("link.xlsx");
        create_archive(&real, &[("xl/sharedStrings.xml", "<sst>old</sst>", CompressionMethod::Deflated)]);
        std::os::unix::fs::symlink(&real, &link).unwrap();

        DefaultArchiveWriter
            .replace_part(&link, &link, "xl/sharedStrings.xml", b"<sst>new</sst>")
            .unwrap();

        assert!(std::fs::symlink_metadata(&link).unwrap().file_type().is_symlink());
        assert_eq!(read_entries(&real)[0].1, b"<sst>new</sst>");
    }
}
