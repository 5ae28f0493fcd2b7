//! ASCII 校验与编码嗅探
//!
//! 只做确定性的判断（BOM、纯 ASCII、合法 UTF-8），不做统计式字符集猜测。
use encoding_rs::{DecoderResult, Encoding, UTF_8};
use std::io::{self, Read};
use std::path::Path;
use tracing::warn;

use crate::error::{FsError, Result};
use crate::source::open_file;

/// 第一个非 ASCII 文本字节
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NonAscii {
    pub offset: u64,
    pub byte: u8,
}

/// 嗅探结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectedEncoding {
    Ascii,
    Utf8,
    /// 文件以 BOM 开头
    Bom(&'static Encoding),
    Unknown,
}

impl DetectedEncoding {
    pub fn label(&self) -> Option<&'static str> {
        match self {
            DetectedEncoding::Ascii => Some("ascii"),
            DetectedEncoding::Utf8 => Some("utf-8"),
            DetectedEncoding::Bom(enc) => Some(enc.name()),
            DetectedEncoding::Unknown => None,
        }
    }
}

/// 可打印 ASCII（32..=126）以及 LF/CR 视为文本
fn is_ascii_text(b: u8) -> bool {
    (32..=126).contains(&b) || b == b'\n' || b == b'\r'
}

fn read_some(file: &mut impl Read, buf: &mut [u8]) -> Result<usize> {
    loop {
        match file.read(buf) {
            Ok(n) => return Ok(n),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(FsError::IoRead(e)),
        }
    }
}

/// 找出第一个不属于 ASCII 文本的字节
pub fn find_non_ascii(path: &Path, buffer_size: usize) -> Result<Option<NonAscii>> {
    let mut file = open_file(path)?;
    let mut buf = vec![0u8; buffer_size.max(1)];
    let mut base: u64 = 0;
    loop {
        let n = read_some(&mut file, &mut buf)?;
        if n == 0 {
            return Ok(None);
        }
        if let Some(off) = buf[..n].iter().position(|&b| !is_ascii_text(b)) {
            return Ok(Some(NonAscii { offset: base + off as u64, byte: buf[off] }));
        }
        base += n as u64;
    }
}

/// 文件是否为纯 ASCII 文本；`report` 为真时以 warn 级别记录首个违规字节与嗅探结果
pub fn is_ascii(path: &Path, report: bool, buffer_size: usize) -> Result<bool> {
    let Some(hit) = find_non_ascii(path, buffer_size)? else {
        return Ok(true);
    };
    if report {
        let guess = detect_encoding(path, buffer_size)?;
        warn!(
            path = %path.display(),
            offset = hit.offset,
            byte = %format!("{:#04x}", hit.byte),
            possibly = guess.label().unwrap_or("unknown"),
            "not ascii text"
        );
    }
    Ok(false)
}

/// 嗅探文件编码：BOM > 纯 ASCII > 合法 UTF-8 > 未知
pub fn detect_encoding(path: &Path, buffer_size: usize) -> Result<DetectedEncoding> {
    let mut file = open_file(path)?;
    let mut buf = vec![0u8; buffer_size.max(4)];
    let mut decoder = UTF_8.new_decoder_without_bom_handling();
    let mut scratch = String::new();
    let mut all_ascii = true;
    let mut first = true;
    loop {
        let n = read_some(&mut file, &mut buf)?;
        let chunk = &buf[..n];
        if first {
            first = false;
            if let Some((enc, _)) = Encoding::for_bom(chunk) {
                return Ok(DetectedEncoding::Bom(enc));
            }
        }
        all_ascii &= chunk.is_ascii();
        let mut src = chunk;
        let last = n == 0;
        loop {
            scratch.clear();
            scratch.reserve(src.len() + 16);
            let (res, read) = decoder.decode_to_string_without_replacement(src, &mut scratch, last);
            src = &src[read..];
            match res {
                DecoderResult::InputEmpty => break,
                DecoderResult::OutputFull => continue,
                DecoderResult::Malformed(..) => return Ok(DetectedEncoding::Unknown),
            }
        }
        if last {
            break;
        }
    }
    Ok(if all_ascii { DetectedEncoding::Ascii } else { DetectedEncoding::Utf8 })
}
