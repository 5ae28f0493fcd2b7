//! 切分与摘要的驱动流程
use anyhow::{anyhow, Context, Result};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::digest::hash_file;
use crate::options::{HashOptions, HashStats, OutputFormat, ReadMode, SplitOptions, SplitStats};
use crate::scanner::{ByteScanner, Scanner, TextScanner, UnitStream};
use crate::source::Source;
use crate::types::{FileDigest, RecordItem};
use crate::units::Units;

/// 切分数据源并把记录流式写入 `out`
/// - Json：写出 JSON 数组，字节模式下记录做有损 UTF-8 转换以保证 JSON 可写
/// - Raw：记录原样拼接，输出与输入逐字节一致（文本模式下为解码后的 UTF-8）
pub fn split_and_write<'a>(
    src: impl Into<Source<'a>>,
    out: &mut dyn Write,
    opts: &SplitOptions,
) -> Result<SplitStats> {
    match opts.mode {
        ReadMode::Bytes => {
            let delimiter = opts.delimiter.build::<Vec<u8>>()?;
            let scanner = ByteScanner::open(src, delimiter, opts.chunk_size)?;
            write_records(scanner, out, opts.format)
        }
        ReadMode::Text => {
            let delimiter = opts.delimiter.build::<String>()?;
            let scanner = TextScanner::open(src, delimiter, opts.chunk_size, &opts.text)?;
            write_records(scanner, out, opts.format)
        }
    }
}

fn write_records<S: UnitStream>(
    mut scanner: Scanner<S>,
    out: &mut dyn Write,
    format: OutputFormat,
) -> Result<SplitStats> {
    let mut stats = SplitStats::default();
    if format == OutputFormat::Json {
        write!(out, "[")?;
    }
    while let Some(record) = scanner.next_record().context("read next record")? {
        stats.units_written += record.count_units(0);
        match format {
            OutputFormat::Raw => out.write_all(record.as_bytes())?,
            OutputFormat::Json => {
                if stats.records_written > 0 {
                    write!(out, ",")?;
                }
                let text = String::from_utf8_lossy(record.as_bytes());
                let item = RecordItem { index: stats.records_written, record: &text };
                serde_json::to_writer(&mut *out, &item)?;
            }
        }
        stats.records_written += 1;
    }
    if format == OutputFormat::Json {
        write!(out, "]")?;
    }
    scanner.close();
    Ok(stats)
}

/// 收集待摘要的文件：单个文件直接返回，目录则递归遍历并按路径排序
fn collect_files(input: &Path) -> Result<Vec<PathBuf>> {
    if input.is_file() {
        return Ok(vec![input.to_path_buf()]);
    }
    if !input.is_dir() {
        return Err(anyhow!("input {} is neither a file nor a directory", input.display()));
    }
    let mut files: Vec<PathBuf> = vec![];
    for entry in WalkDir::new(input).min_depth(1) {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                warn!(error = %e, "skip unreadable entry");
                continue;
            }
        };
        if entry.file_type().is_file() {
            files.push(entry.into_path());
        }
    }
    files.sort();
    Ok(files)
}

/// 计算单个文件或整个目录的摘要，以 `digest  path` 行写入 `out`
/// 稳定性保证：输出顺序与排序后的路径一致，与线程数无关
pub fn hash_and_write(input: &Path, out: &mut dyn Write, opts: &HashOptions) -> Result<HashStats> {
    let files = collect_files(input)?;
    let (digests, stats) = hash_files(&files, opts)?;
    for d in &digests {
        writeln!(out, "{}  {}", d.digest, d.path.display())?;
    }
    Ok(stats)
}

/// 并行计算摘要（rayon）；`threads` 为 1 时串行
pub fn hash_files(files: &[PathBuf], opts: &HashOptions) -> Result<(Vec<FileDigest>, HashStats)> {
    use rayon::prelude::*;

    let threads = opts.threads.unwrap_or_else(num_cpus::get).max(1);
    let hash_one = |path: &PathBuf| -> Option<std::result::Result<FileDigest, PathBuf>> {
        if let Some(max) = opts.max_file_size {
            if let Ok(md) = std::fs::metadata(path) {
                if md.len() > max {
                    return None;
                }
            }
        }
        match hash_file(path, opts.algorithm, opts.buffer_size) {
            Ok(digest) => Some(Ok(FileDigest { path: path.clone(), digest })),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "hash failed");
                Some(Err(path.clone()))
            }
        }
    };

    let results: Vec<_> = if threads == 1 {
        files.iter().map(hash_one).collect()
    } else {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build()
            .context("build rayon pool")?;
        // par_iter + collect 保持输入顺序
        pool.install(|| files.par_iter().map(hash_one).collect())
    };

    let mut stats = HashStats::default();
    let mut digests = Vec::with_capacity(results.len());
    for r in results {
        match r {
            Some(Ok(d)) => {
                stats.files_hashed += 1;
                digests.push(d);
            }
            Some(Err(path)) => stats.failed.push(path),
            None => stats.files_skipped += 1,
        }
    }
    debug!(threads, hashed = stats.files_hashed, skipped = stats.files_skipped, "hashing finished");
    Ok((digests, stats))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delimiter::DelimiterKind;
    use crate::options::HashAlgorithm;
    use std::io::Cursor;

    #[test]
    fn split_to_json() {
        let mut cur = Cursor::new(b"a~\nb~\nc~\n".to_vec());
        let mut out = Vec::new();
        let opts = SplitOptions { delimiter: DelimiterKind::Literal("~".into()), chunk_size: 3, ..SplitOptions::default() };
        let stats = split_and_write(Source::seekable(&mut cur), &mut out, &opts).unwrap();
        assert_eq!(stats.records_written, 4);
        assert_eq!(stats.units_written, 9);
        let v: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(v[1]["record"], "\nb~");
        assert_eq!(v[3]["index"], 3);
    }

    #[test]
    fn split_raw_round_trips_text() {
        let input = "α|β||γ\r\nδ";
        let mut cur = Cursor::new(input.as_bytes().to_vec());
        let mut out = Vec::new();
        let opts = SplitOptions {
            mode: ReadMode::Text,
            delimiter: DelimiterKind::Regex(r"\|+".into()),
            chunk_size: 2,
            format: OutputFormat::Raw,
            text: crate::options::TextOptions { newline: crate::options::NewlineMode::Preserve, ..Default::default() },
        };
        let stats = split_and_write(Source::seekable(&mut cur), &mut out, &opts).unwrap();
        assert_eq!(stats.records_written, 3);
        assert_eq!(String::from_utf8(out).unwrap(), input);
    }

    #[test]
    fn split_empty_source_writes_empty_array() {
        let mut cur = Cursor::new(Vec::new());
        let mut out = Vec::new();
        let stats = split_and_write(Source::seekable(&mut cur), &mut out, &SplitOptions::default()).unwrap();
        assert_eq!(stats.records_written, 0);
        assert_eq!(out, b"[]");
    }

    #[test]
    fn hash_directory_is_sorted_and_thread_independent() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        std::fs::write(dir.path().join("b.txt"), "abc").unwrap();
        std::fs::write(dir.path().join("a.txt"), "abc").unwrap();
        std::fs::write(dir.path().join("sub").join("c.txt"), "").unwrap();

        let mut serial = Vec::new();
        let opts = HashOptions { algorithm: HashAlgorithm::Md5, threads: Some(1), ..HashOptions::default() };
        let stats = hash_and_write(dir.path(), &mut serial, &opts).unwrap();
        assert_eq!(stats.files_hashed, 3);

        let mut parallel = Vec::new();
        let opts = HashOptions { threads: Some(4), ..opts };
        hash_and_write(dir.path(), &mut parallel, &opts).unwrap();
        assert_eq!(serial, parallel);

        let text = String::from_utf8(serial).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert!(lines[0].starts_with("900150983cd24fb0d6963f7d28e17f72  "));
        assert!(lines[0].ends_with("a.txt"));
        assert!(lines[2].ends_with("c.txt"));
    }

    #[test]
    fn max_file_size_skips_large_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("big"), "0123456789").unwrap();
        std::fs::write(dir.path().join("small"), "0").unwrap();
        let opts = HashOptions { max_file_size: Some(4), threads: Some(2), ..HashOptions::default() };
        let mut out = Vec::new();
        let stats = hash_and_write(dir.path(), &mut out, &opts).unwrap();
        assert_eq!(stats.files_hashed, 1);
        assert_eq!(stats.files_skipped, 1);
    }
}
