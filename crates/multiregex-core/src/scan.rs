//! 批量扫描主流程与并行调度
use anyhow::{anyhow, Context, Result};
use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::cancel::CancelToken;
use crate::engine::Engine;
use crate::findings::sort_matches_stable;
use crate::options::{ScanMode, ScanOptions, ScanStats};
use crate::rules::{catalog_rules, load_rule_file};
use crate::types::{FileReport, MatchItem};

/// 默认规则文件路径
const DEFAULT_RULES_PATH: &str = "./rules/default.toml";

/// 根据选项组装引擎：规则文件 + 内置规则；流式参数优先取选项，其次取规则文件
pub fn build_engine(opts: &ScanOptions) -> Result<Engine> {
    let rules_path = match (&opts.rules_path, opts.catalog.is_empty()) {
        (Some(p), _) => Some(p.clone()),
        // 未指定任何规则来源时回退到默认规则文件
        (None, true) => Some(PathBuf::from(DEFAULT_RULES_PATH)),
        (None, false) => None,
    };
    let (mut rules, file_stream) = match rules_path {
        Some(path) => {
            let file = load_rule_file(&path).with_context(|| format!("load rules from {}", path.display()))?;
            (file.rules, Some(file.stream))
        }
        None => (Default::default(), None),
    };
    rules.extend(catalog_rules(&opts.catalog)?);
    if rules.is_empty() {
        warn!("no rules loaded; every file will report no match");
    }
    let stream = opts.stream.clone().or(file_stream).unwrap_or_default();
    stream.validate()?;
    Ok(Engine::with_options(rules, stream))
}

/// 扫描单个流，生成报告
pub fn scan_reader<R>(engine: &Engine, source: R, name: &str, mode: ScanMode) -> Result<FileReport>
where
    R: Read + Send + 'static,
{
    let cancel = CancelToken::new();
    let mut report = FileReport {
        file: name.to_string(),
        status: "",
        matched: None,
        rules: Vec::new(),
        matches: Vec::new(),
        diagnostics: Vec::new(),
    };
    let scan = match mode {
        ScanMode::Any => {
            let out = engine.scan_any(source, &cancel)?;
            report.matched = Some(out.value.is_match());
            out.report
        }
        ScanMode::All => {
            let out = engine.scan_all(source, &cancel)?;
            report.matched = Some(!out.value.is_empty());
            report.rules = out.value.ids().into_iter().map(String::from).collect();
            out.report
        }
        ScanMode::Extract => {
            let mut stream = engine.scan_all_with_ranges(source, &cancel)?;
            let mut items: Vec<MatchItem> = stream
                .by_ref()
                .map(|m| MatchItem {
                    rule: m.rule.id().to_string(),
                    start: m.range.start,
                    end: m.range.end,
                    // 命中值有损转换为字符串，保证 JSON 可写
                    value: String::from_utf8_lossy(&m.bytes).into_owned(),
                })
                .collect();
            sort_matches_stable(&mut items);
            report.matched = Some(!items.is_empty());
            report.matches = items;
            stream.finish()
        }
    };
    report.status = scan.status.as_str();
    report.diagnostics = scan.diagnostics;
    Ok(report)
}

/// 扫描文件或目录（深度 1）并将结果以 JSON 数组流式写入 `out`
/// 稳定性保证：按文件名排序后输出，与线程数无关
pub fn scan_and_write(input: &Path, out: &mut dyn Write, opts: &ScanOptions) -> Result<ScanStats> {
    let engine = Arc::new(build_engine(opts)?);
    let files = collect_files(input)?;
    let mut stats = ScanStats::default();

    let threads = opts.threads.unwrap_or_else(num_cpus::get);
    if threads > 1 && files.len() > 1 {
        scan_and_write_parallel(&files, out, opts, &engine, &mut stats, threads)?;
        return Ok(stats);
    }

    // 串行路径
    write!(out, "[")?;
    let mut first = true;
    for path in &files {
        let report = scan_one(&engine, path, opts);
        write_report(out, report, &mut first, &mut stats)?;
    }
    write!(out, "]")?;
    Ok(stats)
}

fn collect_files(input: &Path) -> Result<Vec<PathBuf>> {
    if input.is_file() {
        return Ok(vec![input.to_path_buf()]);
    }
    if !input.is_dir() {
        return Err(anyhow!("input {} is neither a file nor a directory", input.display()));
    }
    let mut files: Vec<PathBuf> = vec![];
    for entry in WalkDir::new(input).min_depth(1).max_depth(1) {
        let entry = match entry { Ok(e) => e, Err(_) => continue };
        if entry.file_type().is_file() { files.push(entry.into_path()); }
    }
    // 按文件名排序，确保输出顺序稳定
    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(files)
}

/// 扫描单个文件；`None` 表示跳过（超出大小限制）；`Some(Err)` 表示打开或启动失败
fn scan_one(engine: &Engine, path: &Path, opts: &ScanOptions) -> Option<Result<FileReport>> {
    if let Some(max) = opts.max_file_size {
        if let Ok(md) = std::fs::metadata(path) {
            if md.len() > max {
                debug!(path = %path.display(), size = md.len(), "file too large, skipped");
                return None;
            }
        }
    }
    let name = path.file_name().map(|s| s.to_string_lossy().into_owned()).unwrap_or_default();
    let res = File::open(path)
        .with_context(|| format!("open {}", path.display()))
        .and_then(|f| scan_reader(engine, f, &name, opts.mode));
    Some(res)
}

fn write_report(
    out: &mut dyn Write,
    report: Option<Result<FileReport>>,
    first: &mut bool,
    stats: &mut ScanStats,
) -> Result<()> {
    let report = match report {
        None => return Ok(()),
        Some(Err(e)) => {
            warn!(error = %e, "file scan failed");
            stats.files_failed += 1;
            return Ok(());
        }
        Some(Ok(r)) => r,
    };
    stats.files_scanned += 1;
    if report.matched == Some(true) { stats.files_matched += 1; }
    stats.outputs_written += 1;
    if !*first { write!(out, ",")?; } else { *first = false; }
    serde_json::to_writer(&mut *out, &report)?;
    Ok(())
}

/// 并行调度：
/// - Rayon 线程池并行扫描文件（每个文件内部仍是泵 + 每规则一个 worker）
/// - 单线程 Writer 按 idx 重排并流式写 JSON，保证稳定顺序
fn scan_and_write_parallel(
    files: &[PathBuf],
    out: &mut dyn Write,
    opts: &ScanOptions,
    engine: &Arc<Engine>,
    stats: &mut ScanStats,
    threads: usize,
) -> Result<()> {
    use crossbeam_channel as channel;
    use rayon::prelude::*;
    use std::collections::BTreeMap;

    write!(out, "[")?;
    let mut first = true;

    // 通道用于 worker → writer 传递结果
    type Msg = (usize /*idx*/, Option<Result<FileReport>>);
    let (tx, rx) = channel::bounded::<Msg>(256);

    let pool = rayon::ThreadPoolBuilder::new().num_threads(threads).build()?;
    let engine = Arc::clone(engine);
    let opts = opts.clone();
    let files_vec: Vec<(usize, PathBuf)> = files.iter().cloned().enumerate().collect();

    // Writer 保持在当前线程，扫描在后台线程的 Rayon 池内执行
    let scan_thread = std::thread::spawn(move || {
        pool.install(|| {
            files_vec.par_iter().for_each(|(idx, path)| {
                let _ = tx.send((*idx, scan_one(&engine, path, &opts)));
            });
        });
        // 结束后 Sender 全部被丢弃，Receiver 将收到关闭信号
    });

    let mut next_idx: usize = 0;
    let mut buffer: BTreeMap<usize, Option<Result<FileReport>>> = BTreeMap::new();
    while let Ok((idx, report)) = rx.recv() {
        buffer.insert(idx, report);
        // 从 next_idx 开始顺序冲刷
        while let Some(report) = buffer.remove(&next_idx) {
            write_report(out, report, &mut first, stats)?;
            next_idx += 1;
        }
    }

    scan_thread.join().map_err(|_| anyhow!("scan thread panicked"))?;

    write!(out, "]")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::StreamOptions;
    use std::io::Cursor;

    fn temp_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("multiregex-{tag}-{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn opts(mode: ScanMode, threads: usize) -> ScanOptions {
        ScanOptions {
            mode,
            catalog: vec!["cve".into(), "md5".into()],
            threads: Some(threads),
            stream: Some(StreamOptions { window_size: 64, overlap: 32, ..Default::default() }),
            ..Default::default()
        }
    }

    #[test]
    fn reader_report_in_extract_mode() {
        let engine = build_engine(&opts(ScanMode::Extract, 1)).unwrap();
        let text = "CVE-2021-44228 and CVE-2014-0160";
        let report = scan_reader(&engine, Cursor::new(text), "-", ScanMode::Extract).unwrap();
        assert_eq!(report.status, "completed");
        let values: Vec<_> = report.matches.iter().map(|m| m.value.as_str()).collect();
        assert_eq!(values, vec!["CVE-2021-44228", "CVE-2014-0160"]);
    }

    #[test]
    fn directory_output_is_ordered_and_independent_of_threads() {
        let dir = temp_dir("batch");
        std::fs::write(dir.join("b.txt"), "nothing here").unwrap();
        std::fs::write(dir.join("a.txt"), "see CVE-2020-1472").unwrap();
        std::fs::write(dir.join("c.txt"), "d41d8cd98f00b204e9800998ecf8427e").unwrap();

        let mut outputs = Vec::new();
        for threads in [1, 4] {
            let mut out = Vec::new();
            let stats = scan_and_write(&dir, &mut out, &opts(ScanMode::All, threads)).unwrap();
            assert_eq!(stats.files_scanned, 3);
            assert_eq!(stats.files_matched, 2);
            outputs.push(String::from_utf8(out).unwrap());
        }
        assert_eq!(outputs[0], outputs[1]);
        let json: serde_json::Value = serde_json::from_str(&outputs[0]).unwrap();
        assert_eq!(json[0]["file"], "a.txt");
        assert_eq!(json[0]["rules"][0], "cve");
        assert_eq!(json[1]["matched"], false);
        assert_eq!(json[2]["rules"][0], "md5");
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn oversized_files_are_skipped() {
        let dir = temp_dir("limit");
        std::fs::write(dir.join("big.txt"), vec![b'x'; 4096]).unwrap();
        let mut o = opts(ScanMode::Any, 1);
        o.max_file_size = Some(1024);
        let mut out = Vec::new();
        let stats = scan_and_write(&dir, &mut out, &o).unwrap();
        assert_eq!(stats.files_scanned, 0);
        assert_eq!(out, b"[]");
        let _ = std::fs::remove_dir_all(&dir);
    }
}
