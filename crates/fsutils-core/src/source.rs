//! 数据源打开：路径（自有句柄）或调用方已打开的流（借用句柄）
use std::fs::File;
use std::io::{self, BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use crate::error::{FsError, Result};

/// 可读且可 seek 的流
pub trait ReadSeek: Read + Seek {}

impl<T: Read + Seek + ?Sized> ReadSeek for T {}

/// 扫描器的输入
pub enum Source<'a> {
    /// 由扫描器打开并负责关闭
    Path(PathBuf),
    /// 调用方持有的可 seek 流（支持 reset）
    Seekable(&'a mut dyn ReadSeek),
    /// 调用方持有的只读流（如标准输入），不支持 reset
    Stream(&'a mut dyn Read),
}

impl<'a> Source<'a> {
    pub fn seekable<R: Read + Seek>(reader: &'a mut R) -> Self {
        Source::Seekable(reader)
    }

    pub fn stream<R: Read>(reader: &'a mut R) -> Self {
        Source::Stream(reader)
    }

    fn describe(&self) -> String {
        match self {
            Source::Path(p) => p.display().to_string(),
            Source::Seekable(_) => "<seekable stream>".to_string(),
            Source::Stream(_) => "<stream>".to_string(),
        }
    }
}

impl From<PathBuf> for Source<'_> {
    fn from(p: PathBuf) -> Self {
        Source::Path(p)
    }
}

impl From<&Path> for Source<'_> {
    fn from(p: &Path) -> Self {
        Source::Path(p.to_path_buf())
    }
}

impl From<&str> for Source<'_> {
    fn from(p: &str) -> Self {
        Source::Path(PathBuf::from(p))
    }
}

impl From<String> for Source<'_> {
    fn from(p: String) -> Self {
        Source::Path(PathBuf::from(p))
    }
}

/// 句柄归属：决定扫描器是否负责关闭
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ownership {
    Owned,
    Borrowed,
}

enum Inner<'a> {
    File(BufReader<File>),
    Seekable(&'a mut dyn ReadSeek),
    Stream(&'a mut dyn Read),
}

/// 已打开的字节句柄；自有文件随 Drop 关闭，借用句柄仅释放引用
pub struct Handle<'a> {
    inner: Inner<'a>,
    target: String,
}

impl Handle<'_> {
    pub fn ownership(&self) -> Ownership {
        match self.inner {
            Inner::File(_) => Ownership::Owned,
            Inner::Seekable(_) | Inner::Stream(_) => Ownership::Borrowed,
        }
    }

    /// 描述信息（路径或流类型），用于日志与错误
    pub fn target(&self) -> &str {
        &self.target
    }

    /// 当前位置；不可 seek 的流返回 None
    pub fn position(&mut self) -> io::Result<Option<u64>> {
        match &mut self.inner {
            Inner::File(f) => f.stream_position().map(Some),
            Inner::Seekable(s) => s.stream_position().map(Some),
            Inner::Stream(_) => Ok(None),
        }
    }

    pub fn seek_to(&mut self, pos: u64) -> io::Result<()> {
        match &mut self.inner {
            Inner::File(f) => f.seek(SeekFrom::Start(pos)).map(|_| ()),
            Inner::Seekable(s) => s.seek(SeekFrom::Start(pos)).map(|_| ()),
            Inner::Stream(_) => Err(io::Error::new(
                io::ErrorKind::Unsupported,
                "stream does not support seeking",
            )),
        }
    }
}

impl Read for Handle<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match &mut self.inner {
            Inner::File(f) => f.read(buf),
            Inner::Seekable(s) => s.read(buf),
            Inner::Stream(s) => s.read(buf),
        }
    }
}

/// 以只读方式打开文件
pub fn open_file(path: &Path) -> Result<File> {
    File::open(path).map_err(|source| FsError::SourceOpen {
        target: path.display().to_string(),
        source,
    })
}

/// 把路径或已打开的流解析为句柄；路径会被新打开（Owned），流原样借用（Borrowed）
pub fn open_src<'a>(src: impl Into<Source<'a>>) -> Result<Handle<'a>> {
    let src = src.into();
    let target = src.describe();
    let inner = match src {
        Source::Path(p) => Inner::File(BufReader::new(open_file(&p)?)),
        Source::Seekable(s) => Inner::Seekable(s),
        Source::Stream(s) => Inner::Stream(s),
    };
    Ok(Handle { inner, target })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn missing_path_fails_to_open() {
        let err = open_src("/definitely/not/here.txt").err().unwrap();
        assert!(matches!(err, FsError::SourceOpen { .. }));
    }

    #[test]
    fn borrowed_handles_report_ownership() {
        let mut cur = Cursor::new(b"abc".to_vec());
        let mut h = open_src(Source::seekable(&mut cur)).unwrap();
        assert_eq!(h.ownership(), Ownership::Borrowed);
        assert_eq!(h.position().unwrap(), Some(0));

        let mut raw: &[u8] = b"abc";
        let mut h = open_src(Source::stream(&mut raw)).unwrap();
        assert_eq!(h.position().unwrap(), None);
        assert!(h.seek_to(0).is_err());
    }

    #[test]
    fn path_is_owned() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        std::io::Write::write_all(&mut file, b"xyz").unwrap();
        let mut h = open_src(file.path()).unwrap();
        assert_eq!(h.ownership(), Ownership::Owned);
        let mut s = String::new();
        h.read_to_string(&mut s).unwrap();
        assert_eq!(s, "xyz");
    }
}
