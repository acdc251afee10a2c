// apps/dt_cli/src/main.rs

//! DrainTrace 命令行界面
//!
//! 在三角网地形上追踪地表径流、注水并查看水塘。

mod commands;

use clap::{Parser, Subcommand};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

/// DrainTrace 地表径流追踪工具
#[derive(Parser)]
#[command(name = "dt_cli")]
#[command(author = "DrainTrace Team")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Surface water drainage tracing over a TIN", long_about = None)]
struct Cli {
    /// 日志级别 (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 从起点追踪水流
    Trace(commands::trace::TraceArgs),
    /// 在起点注水并分配
    Volume(commands::volume::VolumeArgs),
    /// 显示三角网与默认配置
    Info(commands::info::InfoArgs),
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = match cli.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    match cli.command {
        Commands::Trace(args) => commands::trace::execute(args),
        Commands::Volume(args) => commands::volume::execute(args),
        Commands::Info(args) => commands::info::execute(args),
    }
}
