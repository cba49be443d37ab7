use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use multiregex_core::{build_engine, catalog, scan_and_write, scan_reader, ScanMode, ScanOptions, StreamOptions};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

/// 命令行入口（基于 clap）
#[derive(Parser, Debug)]
#[command(name = "multiregex", version, about = "Match files or a live stream against many regex rules at once")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// 扫描文件或目录并生成 JSON 报告
    Scan {
        /// 输入文件或目录（目录只扫描第一层）
        #[arg(long)]
        input: PathBuf,

        /// 输出文件（JSON 数组）
        #[arg(long, default_value = "./result.json")]
        output: PathBuf,

        /// 线程数（"auto"=CPU 核心数）
        #[arg(long, default_value = "auto")]
        threads: String,

        /// 最大扫描文件大小（单位字节，例如 5242880 代表 5MB）
        #[arg(long)]
        max_file_size: Option<u64>,

        #[command(flatten)]
        common: Common,
    },
    /// 把标准输入当作实时流扫描，输出一条 JSON 报告
    ///
    /// 注意：读 stdin 的调用无法被打断。交互式输入下即使 `--mode any` 已经命中，
    /// 也要等到下一行输入或 EOF（Ctrl-D）才会输出结果并退出。
    Stream {
        #[command(flatten)]
        common: Common,
    },
    /// 列出内置规则
    Catalog,
}

#[derive(clap::Args, Debug)]
struct Common {
    /// 扫描模式
    #[arg(long, value_enum, default_value_t = Mode::All)]
    mode: Mode,

    /// 规则文件路径（TOML），未指定且无 --catalog 时使用 ./rules/default.toml
    #[arg(long)]
    rules: Option<PathBuf>,

    /// 启用的内置规则名（可多次指定，"default" = email + domain + url）
    #[arg(long)]
    catalog: Vec<String>,

    /// 会话超时（毫秒）
    #[arg(long)]
    timeout_ms: Option<u64>,

    /// 每次从源读取的块大小
    #[arg(long)]
    chunk_size: Option<usize>,

    /// 滑动窗口大小（提取模式，以及无法增量匹配的规则）
    #[arg(long)]
    window_size: Option<usize>,

    /// 窗口间的重叠字节数
    #[arg(long)]
    overlap: Option<usize>,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Mode {
    Any,
    All,
    Extract,
}

impl From<Mode> for ScanMode {
    fn from(m: Mode) -> Self {
        match m {
            Mode::Any => ScanMode::Any,
            Mode::All => ScanMode::All,
            Mode::Extract => ScanMode::Extract,
        }
    }
}

impl Common {
    fn into_options(self, threads: Option<usize>, max_file_size: Option<u64>) -> ScanOptions {
        ScanOptions {
            mode: self.mode.into(),
            max_file_size,
            rules_path: self.rules,
            catalog: self.catalog,
            threads,
            stream: stream_overrides(self.timeout_ms, self.chunk_size, self.window_size, self.overlap),
        }
    }
}

fn main() -> Result<()> {
    // 初始化日志（支持通过 RUST_LOG 控制等级，例如 info、debug）
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Commands::Scan { input, output, threads, max_file_size, common } => {
            info!(?input, ?output, "starting scan");

            // 以缓冲方式打开输出文件，按 JSON 数组流式写入
            let mut out = BufWriter::new(File::create(&output).context("create output file")?);
            let opts = common.into_options(parse_threads(&threads), max_file_size);
            let stats = scan_and_write(&input, &mut out, &opts).context("scan and write failed")?;
            out.flush().ok();

            info!(
                files_scanned = stats.files_scanned,
                files_matched = stats.files_matched,
                files_failed = stats.files_failed,
                outputs_written = stats.outputs_written,
                "scan finished"
            );
        }
        Commands::Stream { common } => {
            let opts = common.into_options(None, None);
            let engine = build_engine(&opts)?;
            info!(rules = engine.rules().len(), mode = ?opts.mode, "scanning stdin");
            let report = scan_reader(&engine, std::io::stdin(), "-", opts.mode)?;
            let stdout = std::io::stdout();
            let mut lock = stdout.lock();
            serde_json::to_writer(&mut lock, &report)?;
            writeln!(lock)?;
        }
        Commands::Catalog => {
            for name in catalog::NAMES {
                if let Some(rule) = catalog::by_name(name) {
                    println!("{name}\t{}", rule.pattern());
                }
            }
        }
    }

    Ok(())
}

fn init_tracing() {
    use tracing_subscriber::{EnvFilter, FmtSubscriber};
    // 支持通过环境变量 RUST_LOG 控制日志等级，如：RUST_LOG=debug；日志写到 stderr，避免污染 stdout 的 JSON
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);
}

/// 解析线程参数
fn parse_threads(s: &str) -> Option<usize> {
    if s.eq_ignore_ascii_case("auto") { return None; }
    match s.parse::<usize>() {
        Ok(n) if n >= 1 => Some(n),
        _ => None,
    }
}

/// 只要指定了任一流式参数，就以默认值为底构造完整参数（覆盖规则文件中的 `[stream]`）
fn stream_overrides(
    timeout_ms: Option<u64>,
    chunk_size: Option<usize>,
    window_size: Option<usize>,
    overlap: Option<usize>,
) -> Option<StreamOptions> {
    if timeout_ms.is_none() && chunk_size.is_none() && window_size.is_none() && overlap.is_none() {
        return None;
    }
    let mut opts = StreamOptions::default();
    if let Some(ms) = timeout_ms { opts.timeout = Some(Duration::from_millis(ms)); }
    if let Some(v) = chunk_size { opts.chunk_size = v; }
    if let Some(v) = window_size { opts.window_size = v; }
    if let Some(v) = overlap { opts.overlap = v; }
    Some(opts)
}
