//! 库级错误类型
use std::io;
use thiserror::Error;

/// 扫描器与文件工具的统一错误
#[derive(Debug, Error)]
pub enum FsError {
    /// 数据源无法打开（或无法查询初始位置）
    #[error("cannot open source {target}: {source}")]
    SourceOpen {
        target: String,
        #[source]
        source: io::Error,
    },
    /// 对不可 seek 的数据源调用 reset
    #[error("source does not support seeking")]
    UnseekableSource,
    /// 扫描器已关闭
    #[error("scanner is closed")]
    ScannerClosed,
    /// 读取过程中底层 I/O 失败；游标保持不变
    #[error("read from source failed: {0}")]
    IoRead(#[source] io::Error),
    #[error("invalid delimiter: {0}")]
    InvalidDelimiter(String),
    #[error("unknown text encoding: {0}")]
    UnknownEncoding(String),
    /// 其余文件系统操作失败（seek、建目录等）
    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: io::Error,
    },
}

impl FsError {
    pub(crate) fn io(context: impl Into<String>, source: io::Error) -> Self {
        FsError::Io { context: context.into(), source }
    }
}

pub type Result<T> = std::result::Result<T, FsError>;
