//! 文本单元流：按编码增量解码为字符，并可选地统一换行
use encoding_rs::{CoderResult, Decoder, DecoderResult, Encoding, UTF_8};
use std::io::{self, Read};

use crate::error::{FsError, Result};
use crate::options::{ErrorMode, NewlineMode, TextOptions, BUFFER_SIZE};
use crate::scanner::UnitStream;
use crate::source::{Handle, Ownership};

/// 单次原始读取的字节数范围
const RAW_READ_MIN: usize = 8 * 1024;
const RAW_READ_MAX: usize = BUFFER_SIZE;

/// 解码后的字符流（单元 = char）
pub struct TextStream<'a> {
    handle: Handle<'a>,
    encoding: &'static Encoding,
    decoder: Decoder,
    errors: ErrorMode,
    newline: NewlineMode,
    /// 已解码、尚未交给扫描器的字符
    pending: String,
    pending_chars: usize,
    /// 上一段以 `\r` 结尾，需看到下一个字符才能决定是否与 `\n` 合并
    pending_cr: bool,
    raw: Vec<u8>,
    raw_eof: bool,
}

impl<'a> TextStream<'a> {
    pub fn new(handle: Handle<'a>, opts: &TextOptions) -> Result<Self> {
        let encoding = match &opts.encoding {
            Some(label) => Encoding::for_label(label.as_bytes())
                .ok_or_else(|| FsError::UnknownEncoding(label.clone()))?,
            None => UTF_8,
        };
        Ok(Self {
            handle,
            encoding,
            decoder: encoding.new_decoder(),
            errors: opts.errors,
            newline: opts.newline,
            pending: String::new(),
            pending_chars: 0,
            pending_cr: false,
            raw: Vec::new(),
            raw_eof: false,
        })
    }

    pub fn encoding(&self) -> &'static Encoding {
        self.encoding
    }

    /// 读一段原始字节并解码进 `pending`
    fn fill(&mut self, want: usize) -> io::Result<()> {
        self.raw.resize(want.clamp(RAW_READ_MIN, RAW_READ_MAX), 0);
        let n = loop {
            match self.handle.read(&mut self.raw) {
                Ok(n) => break n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        };
        let last = n == 0;
        let mut decoded = String::new();
        decode_chunk(&mut self.decoder, self.errors, &self.raw[..n], last, &mut decoded)?;
        if last {
            self.raw_eof = true;
        }
        self.push_decoded(&decoded, last);
        Ok(())
    }

    fn push_decoded(&mut self, piece: &str, last: bool) {
        if self.newline == NewlineMode::Preserve {
            self.pending.push_str(piece);
            self.pending_chars += piece.chars().count();
            return;
        }
        let mut chars = piece.chars().peekable();
        if self.pending_cr {
            if chars.peek().is_none() && !last {
                return;
            }
            self.pending_cr = false;
            self.push_char('\n');
            if chars.peek() == Some(&'\n') {
                chars.next();
            }
        }
        while let Some(c) = chars.next() {
            if c != '\r' {
                self.push_char(c);
                continue;
            }
            match chars.peek() {
                Some('\n') => {
                    chars.next();
                }
                None if !last => {
                    self.pending_cr = true;
                    continue;
                }
                _ => {}
            }
            self.push_char('\n');
        }
    }

    fn push_char(&mut self, c: char) {
        self.pending.push(c);
        self.pending_chars += 1;
    }
}

/// 解码一段输入；输出空间不足时扩容后继续
fn decode_chunk(
    decoder: &mut Decoder,
    errors: ErrorMode,
    mut src: &[u8],
    last: bool,
    dst: &mut String,
) -> io::Result<()> {
    loop {
        let room = decoder
            .max_utf8_buffer_length(src.len())
            .unwrap_or_else(|| src.len().saturating_mul(3));
        dst.reserve(room.max(16));
        if errors == ErrorMode::Replace {
            let (res, read, _) = decoder.decode_to_string(src, dst, last);
            src = &src[read..];
            if matches!(res, CoderResult::InputEmpty) {
                return Ok(());
            }
            continue;
        }
        let (res, read) = decoder.decode_to_string_without_replacement(src, dst, last);
        src = &src[read..];
        match res {
            DecoderResult::InputEmpty => return Ok(()),
            DecoderResult::OutputFull => {}
            DecoderResult::Malformed(..) if errors == ErrorMode::Ignore => {}
            DecoderResult::Malformed(..) => {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("malformed {} input", decoder.encoding().name()),
                ));
            }
        }
    }
}

impl UnitStream for TextStream<'_> {
    type Units = String;

    fn read_units(&mut self, n: usize, out: &mut String) -> io::Result<usize> {
        while self.pending_chars < n && !self.raw_eof {
            self.fill(n - self.pending_chars)?;
        }
        let take = n.min(self.pending_chars);
        let split = self
            .pending
            .char_indices()
            .nth(take)
            .map_or(self.pending.len(), |(i, _)| i);
        out.push_str(&self.pending[..split]);
        self.pending.drain(..split);
        self.pending_chars -= take;
        Ok(take)
    }

    fn position(&mut self) -> io::Result<Option<u64>> {
        self.handle.position()
    }

    fn seek_to(&mut self, pos: u64) -> io::Result<()> {
        self.handle.seek_to(pos)?;
        self.decoder = self.encoding.new_decoder();
        self.pending.clear();
        self.pending_chars = 0;
        self.pending_cr = false;
        self.raw_eof = false;
        Ok(())
    }

    fn ownership(&self) -> Ownership {
        self.handle.ownership()
    }

    fn target(&self) -> &str {
        self.handle.target()
    }
}
