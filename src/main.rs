//! objectsync 命令行入口
//!
//! - `backup`   - 存储桶下载到本地目录
//! - `upload`   - 本地目录上传到存储桶
//! - `status`   - 查看各桶的状态文件
//! - `validate` - 验证配置并测试连接

use clap::{Args, Parser, Subcommand};
use objectsync_lib::commands;
use objectsync_lib::config::{AppConfig, Overrides};
use objectsync_lib::{logging, Direction};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

/// S3 兼容对象存储与本地目录的增量同步工具
#[derive(Parser)]
#[command(name = "objectsync")]
#[command(version, about, long_about = None)]
struct Cli {
    /// 配置文件路径
    #[arg(global = true, short, long, default_value = "objectsync.json")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 从存储桶增量备份到本地
    Backup(SyncArgs),

    /// 从本地增量上传到存储桶
    Upload(SyncArgs),

    /// 查看状态文件
    Status {
        /// 查看上传任务的状态
        #[arg(short, long)]
        upload: bool,
    },

    /// 验证配置并测试连接
    Validate,
}

#[derive(Args)]
struct SyncArgs {
    /// 覆盖配置中的端点
    #[arg(long)]
    endpoint: Option<String>,

    /// 覆盖配置中的 Access Key
    #[arg(long)]
    access_key: Option<String>,

    /// 覆盖配置中的 Secret Key
    #[arg(long)]
    secret_key: Option<String>,

    /// 全量同步（忽略并且不写入状态文件）
    #[arg(long)]
    full: bool,

    /// 并发数
    #[arg(short, long)]
    workers: Option<usize>,

    /// 输出详细进度
    #[arg(short, long)]
    verbose: bool,
}

impl SyncArgs {
    fn overrides(&self) -> Overrides {
        Overrides {
            endpoint: self.endpoint.clone(),
            access_key: self.access_key.clone(),
            secret_key: self.secret_key.clone(),
            incremental: self.full.then_some(false),
            workers: self.workers,
            verbose: self.verbose,
        }
    }
}

fn load_config(path: &Path, overrides: Option<&Overrides>) -> anyhow::Result<AppConfig> {
    let mut config = AppConfig::load(path)?;
    if let Some(overrides) = overrides {
        config.apply_overrides(overrides);
    }
    Ok(config)
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Backup(args) => sync(&cli.config, &args, Direction::Download).await,
        Commands::Upload(args) => sync(&cli.config, &args, Direction::Upload).await,
        Commands::Status { upload } => {
            let config = load_config(&cli.config, None)?;
            logging::init(&config.log, false);
            let direction = if upload {
                Direction::Upload
            } else {
                Direction::Download
            };
            let statuses = commands::status::collect_status(&config, direction).await?;
            print!("{}", commands::status::render(&statuses));
            Ok(())
        }
        Commands::Validate => {
            println!("验证配置文件: {}", cli.config.display());
            let config = load_config(&cli.config, None)?;
            logging::init(&config.log, false);
            let result = commands::test::validate(&config).await;
            println!("{}", result.message);
            if let Some(details) = &result.details {
                println!("  {}", details);
            }
            if result.success {
                Ok(())
            } else {
                anyhow::bail!("{}", result.message)
            }
        }
    }
}

async fn sync(path: &Path, args: &SyncArgs, direction: Direction) -> anyhow::Result<()> {
    let overrides = args.overrides();
    let config = load_config(path, Some(&overrides))?;
    logging::init(&config.log, config.defaults.verbose);
    commands::sync::run_sync(&config, direction).await?;
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("错误: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
