//! 字节级单元流
use std::io::{self, Read};

use crate::scanner::UnitStream;
use crate::source::{Handle, Ownership};

/// 直接读取原始字节（单元 = u8）
pub struct ByteStream<'a> {
    handle: Handle<'a>,
}

impl<'a> ByteStream<'a> {
    pub fn new(handle: Handle<'a>) -> Self {
        Self { handle }
    }
}

impl UnitStream for ByteStream<'_> {
    type Units = Vec<u8>;

    /// 读取至多 `n` 字节并追加到 `out`；除非到达末尾，否则凑满 `n` 字节才返回
    fn read_units(&mut self, n: usize, out: &mut Vec<u8>) -> io::Result<usize> {
        Read::by_ref(&mut self.handle).take(n as u64).read_to_end(out)
    }

    fn position(&mut self) -> io::Result<Option<u64>> {
        self.handle.position()
    }

    fn seek_to(&mut self, pos: u64) -> io::Result<()> {
        self.handle.seek_to(pos)
    }

    fn ownership(&self) -> Ownership {
        self.handle.ownership()
    }

    fn target(&self) -> &str {
        self.handle.target()
    }
}
