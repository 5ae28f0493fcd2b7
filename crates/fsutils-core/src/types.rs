//! 公共类型（对外暴露）
use serde::Serialize;

/// JSON 输出中的单条记录
#[derive(Debug, Clone, Serialize)]
pub struct RecordItem<'a> {
    pub index: usize,
    pub record: &'a str,
}

/// 单个文件的摘要结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileDigest {
    pub path: std::path::PathBuf,
    pub digest: String,
}
