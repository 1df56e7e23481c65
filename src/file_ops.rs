// 文件操作模块
// 负责输出目录的幂等创建和缩略图目标路径的计算

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::error::ThumbnailError;

/// 确保输出目录存在
///
/// 已存在的目录视为成功；同名的非目录条目或其他创建错误都返回
/// `OutputDirectoryCreationFailed`。
pub fn ensure_output_dir(dir: &Path) -> Result<(), ThumbnailError> {
    match fs::create_dir(dir) {
        Ok(()) => {
            log::debug!("创建输出目录: {}", dir.display());
            Ok(())
        }
        Err(e) if e.kind() == ErrorKind::AlreadyExists && dir.is_dir() => Ok(()),
        Err(e) => Err(ThumbnailError::OutputDirectoryCreationFailed {
            path: dir.to_path_buf(),
            source: e,
        }),
    }
}

/// 缩略图文件名与原文件名相同，放在输出目录下
pub fn thumbnail_path(output_dir: &Path, source: &Path) -> Option<PathBuf> {
    source.file_name().map(|name| output_dir.join(name))
}
