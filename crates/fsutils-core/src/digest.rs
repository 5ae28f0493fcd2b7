//! 整文件摘要（MD5 / SHA-256）
use md5::Md5;
use sha2::{Digest, Sha256};
use std::io::{self, Read};
use std::path::Path;

use crate::error::{FsError, Result};
use crate::options::HashAlgorithm;
use crate::source::open_file;

/// 以 `buffer_size` 为单位读取文件并计算摘要，返回小写十六进制
fn digest_file<D: Digest>(path: &Path, buffer_size: usize) -> Result<String> {
    let mut file = open_file(path)?;
    let mut hasher = D::new();
    let mut buf = vec![0u8; buffer_size.max(1)];
    loop {
        let n = match file.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(FsError::IoRead(e)),
        };
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

pub fn md5sum(path: &Path, buffer_size: usize) -> Result<String> {
    digest_file::<Md5>(path, buffer_size)
}

pub fn sha256sum(path: &Path, buffer_size: usize) -> Result<String> {
    digest_file::<Sha256>(path, buffer_size)
}

/// 按算法分派
pub fn hash_file(path: &Path, algorithm: HashAlgorithm, buffer_size: usize) -> Result<String> {
    match algorithm {
        HashAlgorithm::Md5 => md5sum(path, buffer_size),
        HashAlgorithm::Sha256 => sha256sum(path, buffer_size),
    }
}
