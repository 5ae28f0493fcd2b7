//! 按分隔符流式切分记录的缓冲读取器
//!
//! 设计要点：
//! - 缓冲区只保存“未消费 + 预读”的内容；补读前丢弃游标之前的已消费前缀。
//! - 字面量分隔符跨读边界时，保留 `len - 1` 个单元重新查找，避免漏检。
//! - 正则匹配恰好结束于缓冲区末尾时视为“可能未完成”，补读后从匹配起点重试；
//!   只有确认数据源耗尽后才接受该匹配。
//! - 所有记录按序拼接可无损还原输入；记录带有其结尾分隔符（最后一条可能没有）。
use std::io;
use tracing::debug;

use crate::delimiter::{Delimiter, Probe};
use crate::engine_bytes::ByteStream;
use crate::engine_utf8::TextStream;
use crate::error::{FsError, Result};
use crate::options::{ReadMode, TextOptions, BUFFER_SIZE};
use crate::source::{open_src, Ownership, Source};
use crate::units::Units;

/// 按单元读取的底层流（字节或字符）
pub trait UnitStream {
    type Units: Units;

    /// 读取至多 `n` 个单元并追加到 `out`，返回实际读取数；0 表示数据源已耗尽
    fn read_units(&mut self, n: usize, out: &mut Self::Units) -> io::Result<usize>;
    /// 当前位置；不可 seek 时为 None
    fn position(&mut self) -> io::Result<Option<u64>>;
    fn seek_to(&mut self, pos: u64) -> io::Result<()>;
    fn ownership(&self) -> Ownership;
    fn target(&self) -> &str;
}

/// 分隔符扫描器
pub struct Scanner<S: UnitStream> {
    stream: Option<S>,
    delimiter: Delimiter<S::Units>,
    buf: S::Units,
    idx: usize,
    eof: bool,
    start: Option<u64>,
    chunk_size: usize,
}

pub type ByteScanner<'a> = Scanner<ByteStream<'a>>;
pub type TextScanner<'a> = Scanner<TextStream<'a>>;

impl<S: UnitStream> Scanner<S> {
    /// 绑定到已打开的单元流，记录起始位置并预读第一块
    ///
    /// 出错时 `stream` 随之被丢弃，自有句柄因此关闭。
    pub fn new(mut stream: S, delimiter: Delimiter<S::Units>, chunk_size: usize) -> Result<Self> {
        let chunk_size = chunk_size.max(1);
        let start = stream.position().map_err(|source| FsError::SourceOpen {
            target: stream.target().to_string(),
            source,
        })?;
        let mut buf = S::Units::default();
        let got = stream.read_units(chunk_size, &mut buf).map_err(FsError::IoRead)?;
        debug!(target_src = stream.target(), chunk_size, first_read = got, "scanner opened");
        Ok(Self {
            stream: Some(stream),
            delimiter,
            buf,
            idx: 0,
            eof: got == 0,
            start,
            chunk_size,
        })
    }

    /// 下一条记录；Ok(None) 表示流结束
    pub fn next_record(&mut self) -> Result<Option<S::Units>> {
        let Some(end) = self.locate()? else {
            return Ok(None);
        };
        let record = self.buf.slice(self.idx, end);
        self.idx = end;
        Ok(Some(record))
    }

    /// 预览下一条记录，不移动游标
    pub fn peek(&mut self) -> Result<Option<S::Units>> {
        Ok(self.locate()?.map(|end| self.buf.slice(self.idx, end)))
    }

    /// 预览游标之后的 `size` 个单元（数据源先耗尽时可能更少），不移动游标
    pub fn peek_units(&mut self, size: usize) -> Result<S::Units> {
        let stream = self.stream.as_mut().ok_or(FsError::ScannerClosed)?;
        if size == 0 {
            return Ok(S::Units::default());
        }
        let available = self.buf.count_units(self.idx);
        if size > available && !self.eof {
            let extra = size - available;
            // 请求极大时（如 usize::MAX）取饱和值，直到数据源耗尽为止
            let mut to_read = extra.div_ceil(self.chunk_size).saturating_mul(self.chunk_size);
            loop {
                let got = stream.read_units(to_read, &mut self.buf).map_err(FsError::IoRead)?;
                if got == 0 {
                    self.eof = true;
                    break;
                }
                if got >= to_read {
                    break;
                }
                to_read -= got;
            }
        }
        let end = self.buf.offset_after(self.idx, size);
        Ok(self.buf.slice(self.idx, end))
    }

    /// 回到构造时的位置重新开始，可同时更换分隔符
    pub fn reset(&mut self, delimiter: Option<Delimiter<S::Units>>) -> Result<()> {
        let stream = self.stream.as_mut().ok_or(FsError::ScannerClosed)?;
        let start = self.start.ok_or(FsError::UnseekableSource)?;
        stream
            .seek_to(start)
            .map_err(|e| FsError::io("seek to start offset", e))?;
        // seek 成功后状态即为“位于起点、缓冲为空”，预读失败也不会残留旧内容
        self.buf = S::Units::default();
        self.idx = 0;
        self.eof = false;
        if let Some(d) = delimiter {
            self.delimiter = d;
        }
        let got = stream.read_units(self.chunk_size, &mut self.buf).map_err(FsError::IoRead)?;
        self.eof = got == 0;
        debug!(start, "scanner reset");
        Ok(())
    }

    /// 释放缓冲区并丢弃流（自有句柄随之关闭）；可重复调用
    pub fn close(&mut self) {
        if let Some(stream) = self.stream.take() {
            debug!(target_src = stream.target(), "scanner closed");
        }
        self.buf = S::Units::default();
        self.idx = 0;
        self.eof = true;
    }

    pub fn is_closed(&self) -> bool {
        self.stream.is_none()
    }

    pub fn delimiter(&self) -> &Delimiter<S::Units> {
        &self.delimiter
    }

    pub fn set_delimiter(&mut self, delimiter: Delimiter<S::Units>) {
        self.delimiter = delimiter;
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// 句柄归属；已关闭时为 None
    pub fn ownership(&self) -> Option<Ownership> {
        self.stream.as_ref().map(UnitStream::ownership)
    }

    pub fn start_offset(&self) -> Option<u64> {
        self.start
    }

    /// 找到下一条记录的结束偏移（起点总是 `self.idx`）；None 表示流结束
    ///
    /// 可能压缩缓冲区并补读，但压缩后 `idx` 与缓冲区内容保持一致，
    /// 读取失败时调用方仍可安全地检查或关闭扫描器。
    fn locate(&mut self) -> Result<Option<usize>> {
        let stream = self.stream.as_mut().ok_or(FsError::ScannerClosed)?;
        let mut search_idx = self.idx;
        loop {
            let keep = match self.delimiter.find(&self.buf, self.idx, search_idx) {
                Probe::Complete(end) => return Ok(Some(end)),
                Probe::Incomplete { keep } => keep,
            };
            let len = self.buf.storage_len();
            if self.eof {
                return Ok((self.idx < len).then_some(len));
            }
            self.buf.drop_prefix(self.idx);
            self.idx = 0;
            let len = self.buf.storage_len();
            search_idx = self.buf.floor_boundary(len.saturating_sub(keep));
            let got = stream
                .read_units(self.chunk_size, &mut self.buf)
                .map_err(FsError::IoRead)?;
            debug!(retained = len, got, "scanner refill");
            if got == 0 {
                self.eof = true;
            }
        }
    }
}

impl<S: UnitStream> Iterator for Scanner<S> {
    type Item = Result<S::Units>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_record().transpose()
    }
}

impl<'a> Scanner<ByteStream<'a>> {
    /// 字节模式：打开数据源并构造扫描器
    pub fn open(
        src: impl Into<Source<'a>>,
        delimiter: Delimiter<Vec<u8>>,
        chunk_size: usize,
    ) -> Result<Self> {
        let handle = open_src(src)?;
        Scanner::new(ByteStream::new(handle), delimiter, chunk_size)
    }

    /// 以 `\n` 切分的逐行读取
    pub fn lines(src: impl Into<Source<'a>>) -> Result<Self> {
        Self::open(src, Delimiter::literal(b"\n")?, BUFFER_SIZE)
    }
}

impl<'a> Scanner<TextStream<'a>> {
    /// 文本模式：打开数据源、按 `opts` 解码并构造扫描器
    pub fn open(
        src: impl Into<Source<'a>>,
        delimiter: Delimiter<String>,
        chunk_size: usize,
        opts: &TextOptions,
    ) -> Result<Self> {
        let handle = open_src(src)?;
        Scanner::new(TextStream::new(handle, opts)?, delimiter, chunk_size)
    }

    pub fn lines(src: impl Into<Source<'a>>, opts: &TextOptions) -> Result<Self> {
        Self::open(src, Delimiter::literal("\n")?, BUFFER_SIZE, opts)
    }
}

/// 统计行数（按 `\n` 切分的记录数，末尾不完整的一行也计入）
pub fn line_count<'a>(src: impl Into<Source<'a>>, mode: ReadMode, opts: &TextOptions) -> Result<usize> {
    let mut n = 0;
    match mode {
        ReadMode::Bytes => {
            for rec in ByteScanner::lines(src)? {
                rec?;
                n += 1;
            }
        }
        ReadMode::Text => {
            for rec in TextScanner::lines(src, opts)? {
                rec?;
                n += 1;
            }
        }
    }
    Ok(n)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Read};

    fn text_scanner<'a>(cur: &'a mut Cursor<Vec<u8>>, delimiter: Delimiter<String>, chunk: usize) -> TextScanner<'a> {
        TextScanner::open(Source::seekable(cur), delimiter, chunk, &TextOptions::default()).unwrap()
    }

    fn collect<S: UnitStream>(scanner: &mut Scanner<S>) -> Vec<S::Units> {
        scanner.map(|r| r.unwrap()).collect()
    }

    #[test]
    fn splits_on_newline_and_tilde() {
        let mut cur = Cursor::new(b"a~\nb~\nc~\n".to_vec());
        let mut s = text_scanner(&mut cur, Delimiter::literal("\n").unwrap(), BUFFER_SIZE);
        assert_eq!(collect(&mut s), ["a~\n", "b~\n", "c~\n"]);

        let mut cur = Cursor::new(b"a~\nb~\nc~\n".to_vec());
        let mut s = text_scanner(&mut cur, Delimiter::literal("~").unwrap(), BUFFER_SIZE);
        assert_eq!(collect(&mut s), ["a~", "\nb~", "\nc~", "\n"]);
    }

    #[test]
    fn empty_source_has_no_records() {
        let mut cur = Cursor::new(Vec::new());
        let mut s = ByteScanner::open(Source::seekable(&mut cur), Delimiter::literal(b"\n").unwrap(), 4).unwrap();
        assert!(s.next_record().unwrap().is_none());
        assert!(s.peek().unwrap().is_none());
        assert!(s.next_record().unwrap().is_none());
    }

    #[test]
    fn delimiter_straddling_chunk_boundary() {
        // "abcX|YZde|f"：分隔符跨越偏移 4
        let mut cur = Cursor::new(b"abcXYZdef".to_vec());
        let mut s = ByteScanner::open(Source::seekable(&mut cur), Delimiter::literal(b"XYZ").unwrap(), 4).unwrap();
        assert_eq!(collect(&mut s), [b"abcXYZ".to_vec(), b"def".to_vec()]);
    }

    #[test]
    fn final_partial_record_then_end() {
        let mut cur = Cursor::new(b"one\ntwo".to_vec());
        let mut s = ByteScanner::open(Source::seekable(&mut cur), Delimiter::literal(b"\n").unwrap(), 2).unwrap();
        assert_eq!(s.next_record().unwrap().unwrap(), b"one\n");
        assert_eq!(s.next_record().unwrap().unwrap(), b"two");
        assert!(s.next_record().unwrap().is_none());
        assert!(s.next_record().unwrap().is_none());
    }

    #[test]
    fn pattern_match_at_boundary_merges_with_next_chunk() {
        let mut cur = Cursor::new(b"xaaaaaay".to_vec());
        let mut s = text_scanner(&mut cur, Delimiter::pattern("a+").unwrap(), 4);
        assert_eq!(collect(&mut s), ["xaaaaaa", "y"]);
    }

    #[test]
    fn pattern_match_at_end_of_source_is_accepted() {
        let mut cur = Cursor::new(b"1,,2,,".to_vec());
        let mut s = ByteScanner::open(Source::seekable(&mut cur), Delimiter::pattern(",+").unwrap(), 3).unwrap();
        assert_eq!(collect(&mut s), [b"1,,".to_vec(), b"2,,".to_vec()]);
    }

    #[test]
    fn peek_does_not_advance() {
        let mut cur = Cursor::new(b"ab|cd|ef".to_vec());
        let mut s = ByteScanner::open(Source::seekable(&mut cur), Delimiter::literal(b"|").unwrap(), 2).unwrap();
        assert_eq!(s.peek().unwrap().unwrap(), b"ab|");
        assert_eq!(s.peek().unwrap().unwrap(), b"ab|");
        assert_eq!(s.next_record().unwrap().unwrap(), b"ab|");
        assert_eq!(s.peek().unwrap().unwrap(), b"cd|");
        assert_eq!(s.next_record().unwrap().unwrap(), b"cd|");
    }

    #[test]
    fn peek_units_reads_ahead_in_chunks() {
        let mut cur = Cursor::new(b"0123456789".to_vec());
        let mut s = ByteScanner::open(Source::seekable(&mut cur), Delimiter::literal(b"5").unwrap(), 3).unwrap();
        assert_eq!(s.peek_units(0).unwrap(), b"");
        assert_eq!(s.peek_units(7).unwrap(), b"0123456");
        assert_eq!(s.peek_units(50).unwrap(), b"0123456789");
        assert_eq!(s.next_record().unwrap().unwrap(), b"012345");
        assert_eq!(s.peek_units(2).unwrap(), b"67");
    }

    #[test]
    fn peek_units_with_huge_count_drains_without_losing_records() {
        let mut cur = Cursor::new(b"a\nbc\nd".to_vec());
        let mut s = ByteScanner::open(Source::seekable(&mut cur), Delimiter::literal(b"\n").unwrap(), 2).unwrap();
        assert_eq!(s.next_record().unwrap().unwrap(), b"a\n");
        assert_eq!(s.peek_units(usize::MAX).unwrap(), b"bc\nd");
        assert_eq!(collect(&mut s), [b"bc\n".to_vec(), b"d".to_vec()]);
    }

    #[test]
    fn peek_units_with_huge_count_in_text_mode() {
        let mut cur = Cursor::new("x\nyé\nz".as_bytes().to_vec());
        let mut s = text_scanner(&mut cur, Delimiter::literal("\n").unwrap(), 3);
        assert_eq!(s.next_record().unwrap().unwrap(), "x\n");
        assert_eq!(s.peek_units(usize::MAX).unwrap(), "yé\nz");
        assert_eq!(collect(&mut s), ["yé\n", "z"]);
    }

    #[test]
    fn peek_units_counts_characters_in_text_mode() {
        let mut cur = Cursor::new("héllo wörld".as_bytes().to_vec());
        let mut s = text_scanner(&mut cur, Delimiter::literal(" ").unwrap(), 2);
        assert_eq!(s.peek_units(4).unwrap(), "héll");
        assert_eq!(s.next_record().unwrap().unwrap(), "héllo ");
        assert_eq!(s.peek_units(2).unwrap(), "wö");
    }

    #[test]
    fn reset_replays_and_can_swap_delimiter() {
        let mut cur = Cursor::new(b"a,b;c,d".to_vec());
        let mut s = ByteScanner::open(Source::seekable(&mut cur), Delimiter::literal(b",").unwrap(), 2).unwrap();
        let first = collect(&mut s);
        assert_eq!(first.len(), 3);
        s.reset(None).unwrap();
        assert_eq!(collect(&mut s), first);
        s.reset(Some(Delimiter::literal(b";").unwrap())).unwrap();
        assert_eq!(collect(&mut s), [b"a,b;".to_vec(), b"c,d".to_vec()]);
    }

    #[test]
    fn reset_starts_from_initial_position() {
        let mut cur = Cursor::new(b"skip\nkeep\nme\n".to_vec());
        let mut line = [0u8; 5];
        cur.read_exact(&mut line).unwrap();
        let mut s = ByteScanner::lines(Source::seekable(&mut cur)).unwrap();
        assert_eq!(s.start_offset(), Some(5));
        assert_eq!(s.next_record().unwrap().unwrap(), b"keep\n");
        s.reset(None).unwrap();
        assert_eq!(s.next_record().unwrap().unwrap(), b"keep\n");
    }

    #[test]
    fn reset_on_stream_is_unseekable() {
        let mut raw: &[u8] = b"x\ny\n";
        let mut s = ByteScanner::lines(Source::stream(&mut raw)).unwrap();
        assert_eq!(s.next_record().unwrap().unwrap(), b"x\n");
        assert!(matches!(s.reset(None), Err(FsError::UnseekableSource)));
        // 失败的 reset 不影响后续读取
        assert_eq!(s.next_record().unwrap().unwrap(), b"y\n");
    }

    #[test]
    fn close_is_idempotent_and_blocks_reads() {
        let mut cur = Cursor::new(b"a\nb\n".to_vec());
        let mut s = ByteScanner::lines(Source::seekable(&mut cur)).unwrap();
        assert_eq!(s.ownership(), Some(Ownership::Borrowed));
        s.close();
        s.close();
        assert!(s.is_closed());
        assert_eq!(s.ownership(), None);
        assert!(matches!(s.next_record(), Err(FsError::ScannerClosed)));
        assert!(matches!(s.peek(), Err(FsError::ScannerClosed)));
        assert!(matches!(s.peek_units(3), Err(FsError::ScannerClosed)));
        assert!(matches!(s.reset(None), Err(FsError::ScannerClosed)));
    }

    #[test]
    fn zero_chunk_size_is_clamped() {
        let mut cur = Cursor::new(b"a\nb".to_vec());
        let mut s = ByteScanner::open(Source::seekable(&mut cur), Delimiter::literal(b"\n").unwrap(), 0).unwrap();
        assert_eq!(s.chunk_size(), 1);
        assert_eq!(collect(&mut s), [b"a\n".to_vec(), b"b".to_vec()]);
    }

    #[test]
    fn read_error_leaves_cursor_untouched() {
        /// 先吐出 `data`，之后每次读取都失败
        struct Flaky {
            data: &'static [u8],
        }
        impl Read for Flaky {
            fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
                if self.data.is_empty() {
                    return Err(io::Error::new(io::ErrorKind::Other, "boom"));
                }
                let n = buf.len().min(self.data.len());
                buf[..n].copy_from_slice(&self.data[..n]);
                self.data = &self.data[n..];
                Ok(n)
            }
        }
        let mut src = Flaky { data: b"ab\nc" };
        let mut s = ByteScanner::open(Source::stream(&mut src), Delimiter::literal(b"\n").unwrap(), 4).unwrap();
        assert_eq!(s.next_record().unwrap().unwrap(), b"ab\n");
        assert!(matches!(s.next_record(), Err(FsError::IoRead(_))));
        assert_eq!(s.peek_units(1).unwrap(), b"c");
        assert_eq!(s.peek_units(5).unwrap_err().to_string(), "read from source failed: boom");
        s.close();
    }

    #[test]
    fn failed_read_during_reset_leaves_scanner_at_start() {
        /// seek 到绝对位置后，下一次读取失败一次
        struct FailAfterSeek {
            inner: Cursor<Vec<u8>>,
            armed: bool,
        }
        impl Read for FailAfterSeek {
            fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
                if std::mem::take(&mut self.armed) {
                    return Err(io::Error::new(io::ErrorKind::Other, "boom"));
                }
                self.inner.read(buf)
            }
        }
        impl io::Seek for FailAfterSeek {
            fn seek(&mut self, pos: io::SeekFrom) -> io::Result<u64> {
                if matches!(pos, io::SeekFrom::Start(_)) {
                    self.armed = true;
                }
                self.inner.seek(pos)
            }
        }
        let mut src = FailAfterSeek { inner: Cursor::new(b"ab\ncd\nef\n".to_vec()), armed: false };
        let mut s = ByteScanner::open(Source::seekable(&mut src), Delimiter::literal(b"\n").unwrap(), 4).unwrap();
        assert_eq!(s.next_record().unwrap().unwrap(), b"ab\n");
        assert_eq!(s.reset(None).unwrap_err().to_string(), "read from source failed: boom");
        assert_eq!(collect(&mut s), [b"ab\n".to_vec(), b"cd\n".to_vec(), b"ef\n".to_vec()]);
    }

    #[test]
    fn line_count_counts_trailing_partial_line() {
        let mut cur = Cursor::new(b"1\n2\n3".to_vec());
        assert_eq!(line_count(Source::seekable(&mut cur), ReadMode::Bytes, &TextOptions::default()).unwrap(), 3);
        let mut cur = Cursor::new(b"1\r\n2\r\n".to_vec());
        assert_eq!(line_count(Source::seekable(&mut cur), ReadMode::Text, &TextOptions::default()).unwrap(), 2);
    }
}
