use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use save_patcher::io::{splice, DefaultSaveReader};
use save_patcher::{
    BackupMode, CharacterSession, Config, DirectoryResolver, FieldMap, FieldValue, SaveError,
    SaveOrchestrator, SharedState,
};

#[derive(Parser)]
#[command(name = "save_patcher")]
#[command(about = "对二进制存档应用字段修改（先备份，后拼接写出）")]
#[command(version)]
struct Cli {
    /// 配置文件（JSON）
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// 存档根目录（覆盖配置文件中的 save_root）
    #[arg(long, global = true)]
    save_root: Option<PathBuf>,

    /// 输出调试日志
    #[arg(short, long, global = true)]
    verbose: bool,

    /// 静默模式(仅输出错误)
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// 显示字段的当前值
    Show {
        /// 角色名
        #[arg(short, long)]
        identity: String,
        /// 字段表（JSON）
        #[arg(short, long)]
        fields: PathBuf,
    },
    /// 应用修改并保存（先备份）
    Save {
        #[arg(short, long)]
        identity: String,
        #[arg(short, long)]
        fields: PathBuf,
        /// 修改列表（JSON）
        #[arg(short, long)]
        edits: PathBuf,
        /// 只在内存中拼接，不写入磁盘
        #[arg(long)]
        dry_run: bool,
    },
    /// 只做备份
    Backup {
        #[arg(short, long)]
        identity: String,
        /// 备份整个角色目录
        #[arg(long)]
        full: bool,
    },
    /// 复制角色
    Copy {
        #[arg(short, long)]
        identity: String,
        #[arg(short, long)]
        fields: PathBuf,
        /// 新角色名
        #[arg(short, long)]
        to: String,
    },
}

/// 修改列表中的一项
#[derive(Debug, Deserialize)]
struct EditRequest {
    field: String,
    value: FieldValue,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli);

    let config = load_config(&cli)?;
    let state = Arc::new(SharedState::new());
    let orchestrator = SaveOrchestrator::from_config(&config, state);

    match &cli.command {
        Command::Show { identity, fields } => handle_show(&cli, &config, identity, fields),
        Command::Save {
            identity,
            fields,
            edits,
            dry_run,
        } => handle_save(&cli, &config, &orchestrator, identity, fields, edits, *dry_run),
        Command::Backup { identity, full } => {
            let orchestrator = if *full {
                orchestrator.with_backup_mode(BackupMode::Full)
            } else {
                orchestrator
            };
            handle_backup(&cli, &orchestrator, identity)
        }
        Command::Copy { identity, fields, to } => {
            handle_copy(&cli, &config, &orchestrator, identity, fields, to)
        }
    }
}

fn init_logging(cli: &Cli) {
    let default_level = if cli.quiet {
        "error"
    } else if cli.verbose {
        "debug"
    } else {
        "info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// 加载配置，命令行参数优先
fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = match &cli.config {
        Some(path) => Config::load(path).with_context(|| format!("读取配置文件失败: {:?}", path))?,
        None => Config::default(),
    };
    if let Some(save_root) = &cli.save_root {
        config.save_root = save_root.clone();
    }
    if !config.save_root.is_dir() {
        bail!("存档根目录不存在: {:?}", config.save_root);
    }
    Ok(config)
}

fn load_session(config: &Config, identity: &str, fields: &Path) -> Result<CharacterSession> {
    let fields = FieldMap::load(fields).with_context(|| format!("读取字段表失败: {:?}", fields))?;
    let resolver = DirectoryResolver::from_config(config);
    CharacterSession::load(&DefaultSaveReader, &resolver, identity, fields)
        .with_context(|| format!("加载角色失败: {}", identity))
}

fn load_edits(path: &Path) -> Result<Vec<EditRequest>> {
    let json = std::fs::read_to_string(path).with_context(|| format!("读取修改列表失败: {:?}", path))?;
    serde_json::from_str(&json).with_context(|| format!("解析修改列表失败: {:?}", path))
}

/// 流程错误附带面向用户的提示
fn report_failure(err: SaveError) -> anyhow::Error {
    let message = err.user_message();
    anyhow::Error::new(err).context(message)
}

/// 处理显示模式
fn handle_show(cli: &Cli, config: &Config, identity: &str, fields: &Path) -> Result<()> {
    let session = load_session(config, identity, fields)?;

    if !cli.quiet {
        println!("{} ({} 字节)", session.primary_path().display(), session.buffer().len());
    }
    for (name, desc) in session.ledger().field_map().iter() {
        let value = session
            .current_value(name)
            .map(|v| format!("{:?}", v))
            .unwrap_or_else(|| "<无法解码>".to_string());
        println!("[{:08X}] {:<24} {:?} {}", desc.offset, name, desc.kind, value);
    }
    Ok(())
}

/// 处理保存模式
fn handle_save(
    cli: &Cli,
    config: &Config,
    orchestrator: &SaveOrchestrator,
    identity: &str,
    fields: &Path,
    edits: &Path,
    dry_run: bool,
) -> Result<()> {
    let mut session = load_session(config, identity, fields)?;
    for edit in load_edits(edits)? {
        session
            .set(&edit.field, &edit.value, true)
            .with_context(|| format!("无法修改字段: {}", edit.field))?;
    }

    if !cli.quiet {
        println!("{}", session.summary());
    }

    if dry_run {
        let mut buffer = session.buffer().clone();
        let output = splice(&mut buffer, session.ledger())?;
        println!("试运行：{} 字节 -> {} 字节，未写入磁盘", buffer.len(), output.len());
        return Ok(());
    }

    let report = orchestrator.save(&mut session).map_err(report_failure)?;
    if !cli.quiet {
        println!("备份: {}", report.backup.path().display());
        println!("已写入 {} 字节到 {}", report.bytes_written, report.target.display());
    }
    Ok(())
}

/// 处理备份模式
fn handle_backup(cli: &Cli, orchestrator: &SaveOrchestrator, identity: &str) -> Result<()> {
    let session = load_session_without_fields(orchestrator, identity)?;
    let outcome = orchestrator.backup_only(&session).map_err(report_failure)?;
    if !cli.quiet {
        println!("备份: {}", outcome.path().display());
    }
    Ok(())
}

/// 备份不需要字段表
fn load_session_without_fields(
    orchestrator: &SaveOrchestrator,
    identity: &str,
) -> Result<CharacterSession> {
    CharacterSession::load(orchestrator.reader(), orchestrator.resolver(), identity, FieldMap::new())
        .with_context(|| format!("加载角色失败: {}", identity))
}

/// 处理复制模式
fn handle_copy(
    cli: &Cli,
    config: &Config,
    orchestrator: &SaveOrchestrator,
    identity: &str,
    fields: &Path,
    to: &str,
) -> Result<()> {
    let session = load_session(config, identity, fields)?;
    let report = orchestrator.copy_identity(&session, to).map_err(report_failure)?;
    if !cli.quiet {
        println!(
            "已复制 {} -> {} ({} 个文件)",
            identity,
            report.target_dir.display(),
            report.files_copied
        );
    }
    Ok(())
}
