//! 文件工具库
//!
//! 设计要点：
//! - 核心是按分隔符（字面量或正则）流式切分记录的扫描器，不把整个数据源读入内存。
//! - 字节模式（`Vec<u8>` + `regex::bytes`）与文本模式（`String` + `regex`）共用同一套扫描逻辑。
//! - 路径打开的句柄由扫描器负责关闭；调用方传入的流只借用，不关闭。
//! - 外围工具：建目录、整文件摘要、ASCII 校验、编码嗅探、行数统计。

mod options;
mod error;
mod units;
mod delimiter;
mod source;
mod engine_bytes;
mod engine_utf8;
mod scanner;
mod profiles;
mod types;
mod digest;
mod encoding;
mod paths;
mod scan;

pub use options::{
    ErrorMode, HashAlgorithm, HashOptions, HashStats, NewlineMode, OutputFormat, ReadMode,
    SplitOptions, SplitStats, TextOptions, BUFFER_SIZE,
};
pub use error::{FsError, Result};
pub use units::{Matcher, Units};
pub use delimiter::{Delimiter, DelimiterKind, Literal};
pub use source::{open_file, open_src, Handle, Ownership, ReadSeek, Source};
pub use engine_bytes::ByteStream;
pub use engine_utf8::TextStream;
pub use scanner::{line_count, ByteScanner, Scanner, TextScanner, UnitStream};
pub use profiles::{find_profile, load_profiles, parse_profiles, DelimiterProfile};
pub use types::{FileDigest, RecordItem};
pub use digest::{hash_file, md5sum, sha256sum};
pub use encoding::{detect_encoding, find_non_ascii, is_ascii, DetectedEncoding, NonAscii};
pub use paths::makedir;
pub use scan::{hash_and_write, hash_files, split_and_write};
