// 图片扫描模块
// 列出输入目录下扩展名匹配的文件（不递归），结果按文件名排序

use std::ffi::OsStr;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::config::DEFAULT_EXTENSION;
use crate::error::ThumbnailError;

/// 目录扫描器
#[derive(Debug, Clone)]
pub struct FileScanner {
    extension: String,
}

impl Default for FileScanner {
    fn default() -> Self {
        Self::new(DEFAULT_EXTENSION)
    }
}

impl FileScanner {
    pub fn new(extension: impl Into<String>) -> Self {
        Self {
            extension: extension.into(),
        }
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }

    /// 扫描指定文件夹中的图片文件
    ///
    /// 只取第一层的普通文件（符号链接会被跟随，指向目录的链接被排除）。
    /// 目录本身不存在、不是目录或无法列出时返回 `DirectoryUnreadable`。
    pub fn scan(&self, dir: &Path) -> Result<Vec<PathBuf>, ThumbnailError> {
        let metadata = fs::metadata(dir).map_err(|source| unreadable(dir, source))?;
        if !metadata.is_dir() {
            return Err(unreadable(dir, io::Error::other("not a directory")));
        }

        let walker = WalkDir::new(dir)
            .min_depth(1)
            .max_depth(1)
            .follow_links(true)
            .sort_by_file_name();

        let mut files = Vec::new();
        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                // 根目录本身读取失败
                Err(err) if err.depth() == 0 => return Err(unreadable(dir, err.into())),
                Err(err) => {
                    log::warn!("跳过无法读取的条目: {}", err);
                    continue;
                }
            };

            if entry.file_type().is_file() && self.matches(entry.file_name()) {
                files.push(entry.into_path());
            }
        }

        log::debug!(
            "在 {} 中找到 {} 个 .{} 文件",
            dir.display(),
            files.len(),
            self.extension
        );
        Ok(files)
    }

    /// 文件名最后一个 `.` 之后的部分与目标扩展名完全相同（区分大小写）
    ///
    /// 按字节比较，文件名不是合法 UTF-8 时也能匹配。
    pub fn matches(&self, file_name: &OsStr) -> bool {
        let name = file_name.as_encoded_bytes();
        name.iter()
            .rposition(|&b| b == b'.')
            .is_some_and(|dot| &name[dot + 1..] == self.extension.as_bytes())
    }
}

fn unreadable(dir: &Path, source: io::Error) -> ThumbnailError {
    ThumbnailError::DirectoryUnreadable {
        path: dir.to_path_buf(),
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(files: &[PathBuf]) -> Vec<String> {
        files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect()
    }

    #[test]
    fn extension_match_is_case_sensitive() {
        let scanner = FileScanner::default();
        assert!(scanner.matches(OsStr::new("a.jpg")));
        assert!(scanner.matches(OsStr::new("archive.tar.jpg")));
        assert!(scanner.matches(OsStr::new(".jpg")));
        assert!(!scanner.matches(OsStr::new("b.JPG")));
        assert!(!scanner.matches(OsStr::new("c.png")));
        assert!(!scanner.matches(OsStr::new("jpg")));
        assert!(!scanner.matches(OsStr::new("readme")));
        assert!(!scanner.matches(OsStr::new("a.jpg.bak")));
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn non_utf8_names_are_matched_by_bytes() {
        use std::os::unix::ffi::OsStrExt;

        let scanner = FileScanner::default();
        let latin1 = OsStr::from_bytes(b"caf\xe9.jpg");
        assert!(scanner.matches(latin1));
        assert!(!scanner.matches(OsStr::from_bytes(b"caf\xe9.png")));
        assert!(!scanner.matches(OsStr::from_bytes(b"\xe9jpg")));

        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(latin1), b"x").unwrap();
        fs::write(dir.path().join("a.jpg"), b"x").unwrap();

        let files = FileScanner::default().scan(dir.path()).unwrap();
        assert_eq!(files.len(), 2);
        assert!(files.iter().any(|p| p.file_name() == Some(latin1)));
    }

    #[test]
    fn scan_filters_by_extension_and_kind() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["a.jpg", "b.JPG", "c.png", "readme"] {
            fs::write(dir.path().join(name), b"x").unwrap();
        }
        fs::create_dir(dir.path().join("nested.jpg")).unwrap();
        fs::write(dir.path().join("nested.jpg").join("inner.jpg"), b"x").unwrap();

        let files = FileScanner::default().scan(dir.path()).unwrap();
        assert_eq!(names(&files), vec!["a.jpg"]);
    }

    #[test]
    fn scan_result_is_sorted() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["c.jpg", "a.jpg", "b.jpg"] {
            fs::write(dir.path().join(name), b"x").unwrap();
        }

        let files = FileScanner::default().scan(dir.path()).unwrap();
        assert_eq!(names(&files), vec!["a.jpg", "b.jpg", "c.jpg"]);
    }

    #[test]
    fn empty_directory_yields_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let files = FileScanner::default().scan(dir.path()).unwrap();
        assert!(files.is_empty());
    }

    #[test]
    fn missing_directory_is_unreadable() {
        let dir = tempfile::tempdir().unwrap();
        let result = FileScanner::default().scan(&dir.path().join("missing"));
        assert!(matches!(
            result,
            Err(ThumbnailError::DirectoryUnreadable { .. })
        ));
    }

    #[test]
    fn regular_file_is_unreadable() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("a.jpg");
        fs::write(&file, b"x").unwrap();

        let result = FileScanner::default().scan(&file);
        assert!(matches!(
            result,
            Err(ThumbnailError::DirectoryUnreadable { .. })
        ));
    }

    #[test]
    fn custom_extension() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["a.jpg", "b.png"] {
            fs::write(dir.path().join(name), b"x").unwrap();
        }

        let files = FileScanner::new("png").scan(dir.path()).unwrap();
        assert_eq!(names(&files), vec!["b.png"]);
    }

    #[cfg(unix)]
    #[test]
    fn symlinks_to_files_count_but_links_to_dirs_do_not() {
        let dir = tempfile::tempdir().unwrap();
        let target = tempfile::tempdir().unwrap();
        fs::write(target.path().join("real.jpg"), b"x").unwrap();
        fs::create_dir(target.path().join("folder")).unwrap();

        std::os::unix::fs::symlink(target.path().join("real.jpg"), dir.path().join("link.jpg"))
            .unwrap();
        std::os::unix::fs::symlink(target.path().join("folder"), dir.path().join("dir.jpg"))
            .unwrap();
        std::os::unix::fs::symlink(target.path().join("gone.jpg"), dir.path().join("dangling.jpg"))
            .unwrap();

        let files = FileScanner::default().scan(dir.path()).unwrap();
        assert_eq!(names(&files), vec!["link.jpg"]);
    }
}
