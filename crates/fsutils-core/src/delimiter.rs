//! 分隔符：字面量或正则（统一的查找入口）
use aho_corasick::{AhoCorasick, Input};

use crate::error::{FsError, Result};
use crate::units::{Matcher, Units};

/// 字面量分隔符：原文 + 单模式 AC 自动机
#[derive(Debug, Clone)]
pub struct Literal<U> {
    text: U,
    finder: AhoCorasick,
}

impl<U: Units> Literal<U> {
    pub fn text(&self) -> &U {
        &self.text
    }
}

/// 记录边界的标记方式
#[derive(Debug, Clone)]
pub enum Delimiter<U: Units> {
    Literal(Literal<U>),
    Pattern(U::Pattern),
}

/// 单次查找的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Probe {
    /// 已确定的匹配，值为匹配结束偏移
    Complete(usize),
    /// 尚无确定匹配；重新查找时需从缓冲区末尾回退 `keep` 个存储单位
    Incomplete { keep: usize },
}

impl<U: Units> Delimiter<U> {
    /// 字面量分隔符；空串会导致零宽记录，直接拒绝
    pub fn literal(text: impl Into<U>) -> Result<Self> {
        let text = text.into();
        if text.as_bytes().is_empty() {
            return Err(FsError::InvalidDelimiter("literal delimiter is empty".to_string()));
        }
        let finder = AhoCorasick::new([text.as_bytes()])
            .map_err(|e| FsError::InvalidDelimiter(e.to_string()))?;
        Ok(Delimiter::Literal(Literal { text, finder }))
    }

    /// 编译正则分隔符（bytes 或 str 版本由 `U` 决定）
    pub fn pattern(pattern: &str) -> Result<Self> {
        U::compile_pattern(pattern)
            .map(Delimiter::Pattern)
            .map_err(|e| FsError::InvalidDelimiter(e.to_string()))
    }

    /// 直接使用已编译的正则
    pub fn from_matcher(pattern: U::Pattern) -> Self {
        Delimiter::Pattern(pattern)
    }

    pub fn is_pattern(&self) -> bool {
        matches!(self, Delimiter::Pattern(_))
    }

    /// 在 `buf[from..]` 中查找分隔符；`cursor` 为当前记录起点（`cursor <= from`）
    ///
    /// 正则匹配若恰好结束于缓冲区末尾，可能在更多数据到达后继续延伸，
    /// 因此只报告为 `Incomplete`，由调用方补读后从匹配起点重试。
    /// 位于 `cursor` 处的零宽匹配会被跳过，保证每条记录至少前进一个单元。
    pub(crate) fn find(&self, buf: &U, cursor: usize, from: usize) -> Probe {
        let len = buf.storage_len();
        match self {
            Delimiter::Literal(lit) => {
                let hay = buf.as_bytes();
                match lit.finder.find(Input::new(hay).span(from.min(len)..len)) {
                    Some(m) => Probe::Complete(m.end()),
                    None => Probe::Incomplete { keep: lit.text.storage_len() - 1 },
                }
            }
            Delimiter::Pattern(re) => {
                let mut at = from;
                while at <= len {
                    match re.search(buf.haystack(), at) {
                        Some((_, end)) if end == cursor => at = buf.next_boundary(at),
                        Some((start, end)) if end == len => {
                            return Probe::Incomplete { keep: end - start };
                        }
                        Some((_, end)) => return Probe::Complete(end),
                        None => break,
                    }
                }
                Probe::Incomplete { keep: len - cursor }
            }
        }
    }
}

/// 与单元类型无关的分隔符描述（来自命令行或配置文件）
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DelimiterKind {
    Literal(String),
    Regex(String),
}

impl DelimiterKind {
    pub fn build<U: Units>(&self) -> Result<Delimiter<U>> {
        match self {
            DelimiterKind::Literal(text) => Delimiter::literal(U::from_text(text)),
            DelimiterKind::Regex(pattern) => Delimiter::pattern(pattern),
        }
    }
}
