// ssh-keyscan - SSH 主机密钥扫描工具
// 命令行入口

use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use ssh_keyscan::models::ScanSettings;
use ssh_keyscan::services::{invoke, render, storage, InvocationInput};
use ssh_keyscan::ssh::{
    HostKeyScanner, KeyAlgorithm, RusshTransport, ScanError, ScanEvent, ScanEventKind,
    ScanReporter,
};

/// 输出格式
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    /// {changed, host, port, keys, warnings}
    Json,
    /// known_hosts 行
    KnownHosts,
}

#[derive(Parser)]
#[command(name = "ssh-keyscan")]
#[command(author, version, about = "Collect SSH host keys with one forced-algorithm handshake per key type", long_about = None)]
struct Cli {
    /// Target host name or IP address
    #[arg(value_name = "HOST", required_unless_present_any = ["args", "save_settings"])]
    host: Option<String>,

    /// SSH port
    #[arg(short, long, default_value_t = 22)]
    port: u16,

    /// Comma separated key algorithms, tried in order
    #[arg(short = 't', long, value_name = "LIST", value_delimiter = ',')]
    algorithms: Option<Vec<String>>,

    /// Per-attempt timeout
    #[arg(short = 'T', long, value_name = "SECONDS")]
    timeout: Option<u64>,

    /// Attempts in flight at once (1 scans sequentially)
    #[arg(short = 'j', long, value_name = "N")]
    concurrency: Option<usize>,

    /// Proxy URL, socks5://[user:pass@]host:port or http://[user:pass@]host:port
    #[arg(long, value_name = "URL")]
    proxy: Option<String>,

    /// JSON invocation arguments {"host", "port", "algorithms"?}; "-" reads stdin
    #[arg(long, value_name = "FILE", conflicts_with_all = ["host", "algorithms"])]
    args: Option<PathBuf>,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Json)]
    format: OutputFormat,

    /// Pretty-print JSON output
    #[arg(long)]
    pretty: bool,

    /// Exit with status 1 when no host key was obtained
    #[arg(long)]
    fail_on_empty: bool,

    /// Settings file (default: <config dir>/ssh-keyscan/settings.json)
    #[arg(long, value_name = "FILE")]
    settings: Option<PathBuf>,

    /// Write the effective settings to the settings file and exit
    #[arg(long)]
    save_settings: bool,

    /// Print per-attempt progress and debug logs
    #[arg(short, long)]
    verbose: bool,
}

/// 正常结束的扫描
const EXIT_OK: u8 = 0;
/// 指定了 --fail-on-empty 且没有取得任何密钥
const EXIT_NO_KEYS: u8 = 1;
/// 配置错误，未发生网络活动
const EXIT_CONFIG: u8 = 2;
/// 其他运行时错误（运行时创建、写设置文件、输出）
const EXIT_RUNTIME: u8 = 3;

/// 一次运行的结果
#[derive(Debug, PartialEq, Eq)]
enum RunOutcome {
    SettingsSaved,
    Scanned { keys: usize },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let outcome = run(&cli);
    if let Err(e) = &outcome {
        error!("{:#}", e);
    }
    ExitCode::from(exit_status(&outcome, cli.fail_on_empty))
}

/// 运行结果对应的退出码
fn exit_status(outcome: &Result<RunOutcome>, fail_on_empty: bool) -> u8 {
    match outcome {
        Ok(RunOutcome::Scanned { keys: 0 }) if fail_on_empty => EXIT_NO_KEYS,
        Ok(_) => EXIT_OK,
        Err(e) if e.downcast_ref::<ScanError>().is_some() => EXIT_CONFIG,
        Err(_) => EXIT_RUNTIME,
    }
}

/// 初始化日志系统，输出到 stderr，stdout 只输出结果
/// 可以通过 RUST_LOG 环境变量控制日志级别
fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: &Cli) -> Result<RunOutcome> {
    let settings = effective_settings(cli)?;

    if cli.save_settings {
        let path = storage::save_settings(&settings, cli.settings.as_deref())?;
        info!("[SCAN] Settings written to {}", path.display());
        return Ok(RunOutcome::SettingsSaved);
    }

    let config = settings.to_scan_config()?;
    let input = match &cli.args {
        Some(path) => read_invocation(path)?,
        None => InvocationInput {
            host: cli.host.clone().unwrap_or_default(),
            port: cli.port,
            algorithms: cli.algorithms.clone(),
        },
    };

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("scan-worker")
        .build()
        .context("Failed to create Tokio runtime")?;

    let mut scanner = HostKeyScanner::new(RusshTransport::new(config.proxy.clone()))
        .with_concurrency(config.concurrency);

    let printer = if cli.verbose {
        let (reporter, events) = ScanReporter::channel();
        scanner = scanner.with_reporter(reporter);
        Some(runtime.spawn(print_events(events)))
    } else {
        None
    };

    let outcome = runtime.block_on(invoke(
        &scanner,
        &input,
        &settings.algorithms,
        config.timeout,
    ));

    // 释放发送端，事件打印任务随之结束
    drop(scanner);
    if let Some(printer) = printer {
        let _ = runtime.block_on(printer);
    }

    let output = outcome?;
    let result = output.result();

    if !result.reached_target() {
        warn!(
            "[SCAN] {}:{} was not reachable for any algorithm",
            result.target().host(),
            result.target().port()
        );
    }

    match cli.format {
        OutputFormat::Json => println!("{}", render::render_json(&output, cli.pretty)?),
        OutputFormat::KnownHosts => print!("{}", render::render_known_hosts(&output)),
    }

    Ok(RunOutcome::Scanned {
        keys: result.keys().len(),
    })
}

/// 设置文件加上命令行覆盖
fn effective_settings(cli: &Cli) -> Result<ScanSettings> {
    let mut settings = storage::load_settings(cli.settings.as_deref())
        .map_err(|e| ScanError::Settings(format!("{:#}", e)))?;

    if let Some(timeout) = cli.timeout {
        settings.timeout_secs = timeout;
    }
    if let Some(concurrency) = cli.concurrency {
        settings.concurrency = concurrency;
    }
    if let Some(proxy) = &cli.proxy {
        settings.proxy = Some(proxy.clone());
    }
    // 只有保存设置时 -t 才改写默认列表，扫描时它是本次调用的参数
    if cli.save_settings {
        if let Some(algorithms) = &cli.algorithms {
            settings.algorithms = KeyAlgorithm::parse_list(algorithms.as_slice())?;
        }
    }

    Ok(settings)
}

/// 读取 JSON 调用参数，读不到输入也是配置错误
fn read_invocation(path: &Path) -> Result<InvocationInput, ScanError> {
    let unreadable = |source: String, e: std::io::Error| {
        ScanError::Config(format!(
            "Failed to read invocation arguments from {}: {}",
            source, e
        ))
    };

    let content = if path == Path::new("-") {
        let mut buffer = String::new();
        std::io::stdin()
            .read_to_string(&mut buffer)
            .map_err(|e| unreadable("stdin".to_string(), e))?;
        buffer
    } else {
        std::fs::read_to_string(path).map_err(|e| unreadable(path.display().to_string(), e))?
    };
    InvocationInput::from_json(&content)
}

/// 打印扫描进度
async fn print_events(mut events: mpsc::UnboundedReceiver<ScanEvent>) {
    while let Some(event) = events.recv().await {
        let message = match &event.kind {
            ScanEventKind::Started => "attempt started".to_string(),
            ScanEventKind::Stage(stage) => stage.label().to_string(),
            ScanEventKind::KeyReceived { fingerprint } => format!("key received {}", fingerprint),
            ScanEventKind::Failed { kind, reason } => format!("failed ({}): {}", kind, reason),
        };
        eprintln!(
            "{} [{}] {}",
            event.timestamp.format("%H:%M:%S%.3f"),
            event.algorithm,
            message
        );
    }
}
