//! 分隔符配置文件加载（TOML）
use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::Path;

use crate::delimiter::DelimiterKind;

/// 单条分隔符配置（literal 或 regex 二选一；pattern 视为 regex 的别名）
#[derive(Debug, Clone, Deserialize)]
struct ProfileEntry {
    id: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    literal: Option<String>,
    #[serde(default, alias = "pattern")]
    regex: Option<String>,
}

/// 顶层配置文件结构
#[derive(Debug, Clone, Deserialize)]
struct ProfileFile {
    #[serde(default)]
    delimiters: Vec<ProfileEntry>,
}

/// 归一化后的分隔符配置
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DelimiterProfile {
    pub id: String,
    pub name: Option<String>,
    pub kind: DelimiterKind,
}

/// 解析 TOML 文本；两种字段都缺失的条目被跳过
pub fn parse_profiles(txt: &str) -> Result<Vec<DelimiterProfile>> {
    let parsed: ProfileFile = toml::from_str(txt).context("parse delimiter profiles")?;
    let mut out = Vec::new();

    for e in parsed.delimiters {
        let kind = match (e.literal, e.regex) {
            (Some(l), _) => DelimiterKind::Literal(l),
            (None, Some(r)) => DelimiterKind::Regex(r),
            _ => continue,
        };
        out.push(DelimiterProfile { id: e.id, name: e.name, kind });
    }

    Ok(out)
}

/// 从文件加载分隔符配置
pub fn load_profiles(path: &Path) -> Result<Vec<DelimiterProfile>> {
    let txt = std::fs::read_to_string(path)
        .with_context(|| format!("read delimiter profiles {}", path.display()))?;
    parse_profiles(&txt)
}

/// 按 id 查找
pub fn find_profile<'p>(profiles: &'p [DelimiterProfile], id: &str) -> Result<&'p DelimiterProfile> {
    match profiles.iter().find(|p| p.id == id) {
        Some(p) => Ok(p),
        None => bail!("no delimiter profile named {id:?}"),
    }
}
