//! 读取模式、文本选项与驱动参数（模块）
use std::path::PathBuf;

use crate::delimiter::DelimiterKind;

/// 默认分块大小（单元数）：1 MiB
pub const BUFFER_SIZE: usize = 1_048_576;

/// 读取模式
/// - Bytes：按字节切分，缓冲区为 `Vec<u8>`，模式使用 `regex::bytes`。
/// - Text：先解码为字符，缓冲区为 `String`，分块与 peek 以字符计。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReadMode {
    #[default]
    Bytes,
    Text,
}

/// 解码错误处理方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ErrorMode {
    /// 遇到非法序列即报错（InvalidData）
    #[default]
    Strict,
    /// 以 U+FFFD 替换
    Replace,
    /// 直接丢弃
    Ignore,
}

/// 换行处理
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NewlineMode {
    /// `\r\n` 与单独的 `\r` 统一转为 `\n`
    #[default]
    Translate,
    /// 原样保留
    Preserve,
}

/// 文本模式选项（字节模式下忽略）
#[derive(Debug, Clone, Default)]
pub struct TextOptions {
    /// WHATWG 编码标签；None 表示 UTF-8
    pub encoding: Option<String>,
    pub errors: ErrorMode,
    pub newline: NewlineMode,
}

/// 记录输出格式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// JSON 数组：`[{"index":0,"record":"..."}]`
    #[default]
    Json,
    /// 原样拼接输出，可无损还原输入
    Raw,
}

/// 切分驱动参数
#[derive(Debug, Clone)]
pub struct SplitOptions {
    pub mode: ReadMode,
    pub delimiter: DelimiterKind,
    /// 每次读取请求的单元数
    pub chunk_size: usize,
    pub text: TextOptions,
    pub format: OutputFormat,
}

impl Default for SplitOptions {
    fn default() -> Self {
        Self {
            mode: ReadMode::Bytes,
            delimiter: DelimiterKind::Literal("\n".to_string()),
            chunk_size: BUFFER_SIZE,
            text: TextOptions::default(),
            format: OutputFormat::Json,
        }
    }
}

/// 摘要算法
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HashAlgorithm {
    Md5,
    #[default]
    Sha256,
}

/// 目录摘要驱动参数
#[derive(Debug, Clone)]
pub struct HashOptions {
    pub algorithm: HashAlgorithm,
    /// 线程数：None 表示自动（等于 CPU 核数）；Some(1) 走串行
    pub threads: Option<usize>,
    /// 单次读取的字节数
    pub buffer_size: usize,
    /// 最大文件大小（字节）；超过则跳过
    pub max_file_size: Option<u64>,
}

impl Default for HashOptions {
    fn default() -> Self {
        Self {
            algorithm: HashAlgorithm::Sha256,
            threads: None,
            buffer_size: BUFFER_SIZE,
            max_file_size: None,
        }
    }
}

/// 切分统计（便于 CLI 打印）
#[derive(Debug, Default, Clone)]
pub struct SplitStats {
    pub records_written: usize,
    /// 所有记录的单元总数
    pub units_written: usize,
}

/// 摘要统计
#[derive(Debug, Default, Clone)]
pub struct HashStats {
    pub files_hashed: usize,
    pub files_skipped: usize,
    /// 读取失败的文件路径
    pub failed: Vec<PathBuf>,
}
