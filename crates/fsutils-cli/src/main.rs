use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use fsutils_core::{
    detect_encoding, find_profile, hash_and_write, is_ascii, line_count, load_profiles, makedir,
    split_and_write, DelimiterKind, ErrorMode, HashAlgorithm, HashOptions, NewlineMode,
    OutputFormat, ReadMode, Source, SplitOptions, TextOptions, BUFFER_SIZE,
};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// 命令行入口（基于 clap）
#[derive(Parser, Debug)]
#[command(name = "fsutils", version, about = "Streaming file utilities")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// 文本解码相关参数（split / count 共用）
#[derive(clap::Args, Debug)]
struct DecodeArgs {
    /// 读取模式：bytes 或 text（split 默认 bytes，count 默认 text）
    #[arg(long, value_parser = ["bytes", "text"])]
    mode: Option<String>,

    /// 文本编码标签（仅 text 模式），默认 utf-8
    #[arg(long)]
    encoding: Option<String>,

    /// 解码错误处理：strict、replace 或 ignore
    #[arg(long, default_value = "strict", value_parser = ["strict", "replace", "ignore"])]
    errors: String,

    /// 换行处理：translate（\r\n、\r 转 \n）或 preserve
    #[arg(long, default_value = "translate", value_parser = ["translate", "preserve"])]
    newline: String,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// 按分隔符切分输入并输出记录
    Split {
        /// 输入文件；"-" 表示标准输入
        #[arg(long, default_value = "-")]
        input: String,

        /// 输出文件；缺省写到标准输出
        #[arg(long)]
        output: Option<PathBuf>,

        /// 分隔符（支持 \n \r \t \\ \0 转义），默认换行
        #[arg(long)]
        delimiter: Option<String>,

        /// 把 --delimiter 当作正则表达式
        #[arg(long, default_value_t = false)]
        regex: bool,

        /// 使用配置文件中的命名分隔符
        #[arg(long, conflicts_with = "delimiter")]
        profile: Option<String>,

        /// 分隔符配置文件（TOML），默认 ./delimiters.toml
        #[arg(long)]
        profiles: Option<PathBuf>,

        /// 每次读取的单元数
        #[arg(long, default_value_t = BUFFER_SIZE)]
        chunk_size: usize,

        /// 输出格式：json 或 raw
        #[arg(long, default_value = "json", value_parser = ["json", "raw"])]
        format: String,

        #[command(flatten)]
        decode: DecodeArgs,
    },
    /// 统计行数
    Count {
        /// 输入文件；"-" 表示标准输入
        #[arg(long, default_value = "-")]
        input: String,

        #[command(flatten)]
        decode: DecodeArgs,
    },
    /// 计算文件或目录下所有文件的摘要
    Hash {
        /// 输入文件或目录
        #[arg(long)]
        input: PathBuf,

        /// 摘要算法：md5 或 sha256
        #[arg(long, default_value = "sha256", value_parser = ["md5", "sha256"])]
        algorithm: String,

        /// 输出文件；缺省写到标准输出
        #[arg(long)]
        output: Option<PathBuf>,

        /// 线程数（"auto"=CPU 核心数）
        #[arg(long, default_value = "auto")]
        threads: String,

        /// 最大文件大小（单位字节），超过则跳过
        #[arg(long)]
        max_file_size: Option<u64>,
    },
    /// 检查文件是否为纯 ASCII 文本（非 ASCII 时退出码为 1）
    CheckAscii {
        input: PathBuf,

        /// 不记录违规字节的位置
        #[arg(long, default_value_t = false)]
        quiet: bool,
    },
    /// 嗅探文件编码（BOM / ascii / utf-8）
    DetectEncoding { input: PathBuf },
    /// 创建目录
    Mkdir {
        path: PathBuf,

        /// 同时创建父目录
        #[arg(long, default_value_t = false)]
        parents: bool,
    },
}

fn main() -> Result<()> {
    // 初始化日志（支持通过 RUST_LOG 控制等级，例如 info、debug）
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Commands::Split { input, output, delimiter, regex, profile, profiles, chunk_size, format, decode } => {
            let delimiter = resolve_delimiter(delimiter, regex, profile, profiles)?;
            let format = match format.as_str() {
                "raw" => OutputFormat::Raw,
                _ => OutputFormat::Json,
            };
            let (mode, text) = parse_decode(&decode, ReadMode::Bytes);
            let opts = SplitOptions { mode, delimiter, chunk_size, text, format };
            let mut out = open_output(output.as_deref())?;
            let stats = with_input(&input, |src| split_and_write(src, &mut out, &opts))
                .context("split failed")?;
            out.flush().context("flush output")?;
            info!(records = stats.records_written, units = stats.units_written, "split finished");
        }
        Commands::Count { input, decode } => {
            let (mode, text) = parse_decode(&decode, ReadMode::Text);
            let n = with_input(&input, |src| Ok(line_count(src, mode, &text)?)).context("count failed")?;
            println!("{n}");
        }
        Commands::Hash { input, algorithm, output, threads, max_file_size } => {
            let algorithm = match algorithm.as_str() {
                "md5" => HashAlgorithm::Md5,
                _ => HashAlgorithm::Sha256,
            };
            let opts = HashOptions {
                algorithm,
                threads: parse_threads(&threads),
                max_file_size,
                ..HashOptions::default()
            };
            let mut out = open_output(output.as_deref())?;
            let stats = hash_and_write(&input, &mut out, &opts).context("hash failed")?;
            out.flush().context("flush output")?;
            info!(files_hashed = stats.files_hashed, files_skipped = stats.files_skipped, "hash finished");
            if !stats.failed.is_empty() {
                bail!("{} file(s) could not be hashed", stats.failed.len());
            }
        }
        Commands::CheckAscii { input, quiet } => {
            let ok = is_ascii(&input, !quiet, BUFFER_SIZE).context("ascii check failed")?;
            if !ok {
                std::process::exit(1);
            }
        }
        Commands::DetectEncoding { input } => {
            let detected = detect_encoding(&input, BUFFER_SIZE).context("encoding detection failed")?;
            println!("{}", detected.label().unwrap_or("unknown"));
        }
        Commands::Mkdir { path, parents } => {
            let made = makedir(&path, parents)?;
            println!("{}", made.display());
        }
    }

    Ok(())
}

fn init_tracing() {
    use tracing_subscriber::{EnvFilter, FmtSubscriber};
    // 日志写到 stderr，避免与标准输出上的结果混在一起
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(env_filter)
        .with_writer(io::stderr)
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);
}

/// 以数据源调用 `f`：文件路径由扫描器打开，"-" 借用标准输入
fn with_input<T>(input: &str, f: impl FnOnce(Source<'_>) -> Result<T>) -> Result<T> {
    if input == "-" {
        let stdin = io::stdin();
        let mut lock = stdin.lock();
        f(Source::stream(&mut lock))
    } else {
        f(Source::from(input))
    }
}

fn open_output(path: Option<&Path>) -> Result<Box<dyn Write>> {
    Ok(match path {
        Some(p) => Box::new(BufWriter::new(File::create(p).context("create output file")?)),
        None => Box::new(BufWriter::new(io::stdout().lock())),
    })
}

/// 决定分隔符：--profile 优先，其次 --delimiter，最后默认换行
fn resolve_delimiter(
    delimiter: Option<String>,
    regex: bool,
    profile: Option<String>,
    profiles: Option<PathBuf>,
) -> Result<DelimiterKind> {
    if let Some(id) = profile {
        let path = profiles.unwrap_or_else(|| PathBuf::from("./delimiters.toml"));
        let loaded = load_profiles(&path)?;
        let found = find_profile(&loaded, &id)?;
        info!(profile = %found.id, "using delimiter profile");
        return Ok(found.kind.clone());
    }
    if profiles.is_some() {
        warn!("--profiles given without --profile; ignored");
    }
    let raw = delimiter.unwrap_or_else(|| "\\n".to_string());
    Ok(if regex { DelimiterKind::Regex(raw) } else { DelimiterKind::Literal(unescape(&raw)) })
}

fn parse_decode(args: &DecodeArgs, default_mode: ReadMode) -> (ReadMode, TextOptions) {
    let mode = match args.mode.as_deref() {
        Some("text") => ReadMode::Text,
        Some(_) => ReadMode::Bytes,
        None => default_mode,
    };
    let errors = match args.errors.as_str() {
        "replace" => ErrorMode::Replace,
        "ignore" => ErrorMode::Ignore,
        _ => ErrorMode::Strict,
    };
    let newline = match args.newline.as_str() {
        "preserve" => NewlineMode::Preserve,
        _ => NewlineMode::Translate,
    };
    (mode, TextOptions { encoding: args.encoding.clone(), errors, newline })
}

/// 解析常见转义；未知转义原样保留
fn unescape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('t') => out.push('\t'),
            Some('0') => out.push('\0'),
            Some('\\') => out.push('\\'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

/// 解析线程参数
fn parse_threads(s: &str) -> Option<usize> {
    if s.eq_ignore_ascii_case("auto") { return None; }
    match s.parse::<usize>() {
        Ok(n) if n >= 1 => Some(n),
        _ => None,
    }
}
