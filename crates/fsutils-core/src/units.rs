//! 缓冲区单元抽象与模式匹配器
//!
//! 字节模式的单元是 `u8`，文本模式的单元是 `char`。
//! 所有偏移均为底层存储偏移（`String` 中即 UTF-8 字节偏移，且始终落在字符边界上），
//! 只有 `count_units` / `offset_after` 按单元计数。
use std::fmt;

/// 模式匹配器：从 `start` 开始搜索下一个匹配，返回 `(start, end)`
pub trait Matcher {
    type Hay: ?Sized;

    fn search(&self, hay: &Self::Hay, start: usize) -> Option<(usize, usize)>;
}

impl Matcher for regex::bytes::Regex {
    type Hay = [u8];

    fn search(&self, hay: &[u8], start: usize) -> Option<(usize, usize)> {
        self.find_at(hay, start).map(|m| (m.start(), m.end()))
    }
}

impl Matcher for regex::Regex {
    type Hay = str;

    fn search(&self, hay: &str, start: usize) -> Option<(usize, usize)> {
        self.find_at(hay, start).map(|m| (m.start(), m.end()))
    }
}

/// 扫描缓冲区的存储类型
pub trait Units: Default + Clone + fmt::Debug + PartialEq {
    type Hay: ?Sized;
    type Pattern: Matcher<Hay = Self::Hay> + Clone + fmt::Debug;

    fn compile_pattern(pattern: &str) -> Result<Self::Pattern, regex::Error>;
    fn from_text(text: &str) -> Self;

    fn haystack(&self) -> &Self::Hay;
    fn as_bytes(&self) -> &[u8];

    /// `self[from..]` 中的单元数
    fn count_units(&self, from: usize) -> usize;
    /// 从 `from` 起前进 `n` 个单元后的偏移（不超过末尾）
    fn offset_after(&self, from: usize, n: usize) -> usize;
    /// 向下对齐到单元边界
    fn floor_boundary(&self, idx: usize) -> usize;
    /// `idx` 之后下一个单元的起点；`idx` 位于末尾时返回 `len + 1`
    fn next_boundary(&self, idx: usize) -> usize;

    fn slice(&self, start: usize, end: usize) -> Self;
    fn drop_prefix(&mut self, n: usize);

    fn storage_len(&self) -> usize {
        self.as_bytes().len()
    }
}

impl Units for Vec<u8> {
    type Hay = [u8];
    type Pattern = regex::bytes::Regex;

    fn compile_pattern(pattern: &str) -> Result<Self::Pattern, regex::Error> {
        regex::bytes::Regex::new(pattern)
    }

    fn from_text(text: &str) -> Self {
        text.as_bytes().to_vec()
    }

    fn haystack(&self) -> &[u8] {
        self
    }

    fn as_bytes(&self) -> &[u8] {
        self
    }

    fn count_units(&self, from: usize) -> usize {
        self.len().saturating_sub(from)
    }

    fn offset_after(&self, from: usize, n: usize) -> usize {
        from.saturating_add(n).min(self.len())
    }

    fn floor_boundary(&self, idx: usize) -> usize {
        idx.min(self.len())
    }

    fn next_boundary(&self, idx: usize) -> usize {
        idx + 1
    }

    fn slice(&self, start: usize, end: usize) -> Self {
        self[start..end].to_vec()
    }

    fn drop_prefix(&mut self, n: usize) {
        self.drain(..n);
    }
}

impl Units for String {
    type Hay = str;
    type Pattern = regex::Regex;

    fn compile_pattern(pattern: &str) -> Result<Self::Pattern, regex::Error> {
        regex::Regex::new(pattern)
    }

    fn from_text(text: &str) -> Self {
        text.to_string()
    }

    fn haystack(&self) -> &str {
        self
    }

    fn as_bytes(&self) -> &[u8] {
        str::as_bytes(self)
    }

    fn count_units(&self, from: usize) -> usize {
        self[from..].chars().count()
    }

    fn offset_after(&self, from: usize, n: usize) -> usize {
        self[from..]
            .char_indices()
            .nth(n)
            .map_or(self.len(), |(i, _)| from + i)
    }

    fn floor_boundary(&self, idx: usize) -> usize {
        let mut i = idx.min(self.len());
        while !self.is_char_boundary(i) {
            i -= 1;
        }
        i
    }

    fn next_boundary(&self, idx: usize) -> usize {
        idx + self[idx..].chars().next().map_or(1, char::len_utf8)
    }

    fn slice(&self, start: usize, end: usize) -> Self {
        self[start..end].to_string()
    }

    fn drop_prefix(&mut self, n: usize) {
        self.drain(..n);
    }
}
