//! 目录创建
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::error::{FsError, Result};

/// 创建目录（`parents` 为真时连同父目录），返回绝对路径
///
/// 目录已存在不算错误；同名的非目录文件存在时报错。
pub fn makedir(directory: impl AsRef<Path>, parents: bool) -> Result<PathBuf> {
    let directory = std::path::absolute(directory.as_ref())
        .map_err(|e| FsError::io(format!("resolve {}", directory.as_ref().display()), e))?;
    let res = if parents { fs::create_dir_all(&directory) } else { fs::create_dir(&directory) };
    match res {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists && directory.is_dir() => {}
        Err(e) => return Err(FsError::io(format!("create directory {}", directory.display()), e)),
    }
    Ok(directory)
}
