// apps/dt_cli/src/commands/trace.rs

//! 追踪命令

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use dt_config::DrainageConfig;
use dt_drainage::WaterAnalysis;
use dt_tin::{Inverted, TinAccess};
use tracing::{info, warn};

use super::{load_config, load_tin, print_result};

/// 追踪参数
#[derive(Args)]
pub struct TraceArgs {
    /// 三角网 JSON 文件
    #[arg(long)]
    pub tin: PathBuf,

    /// 起点 X
    #[arg(long, allow_negative_numbers = true)]
    pub x: f64,

    /// 起点 Y
    #[arg(long, allow_negative_numbers = true)]
    pub y: f64,

    /// 沿最速上升方向追踪（上溯到山顶）
    #[arg(long)]
    pub ascent: bool,

    /// 配置文件路径
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}

/// 执行追踪命令
pub fn execute(args: TraceArgs) -> Result<()> {
    info!("=== DrainTrace 径流追踪 ===");
    let tin = load_tin(&args.tin)?;
    let config = load_config(args.config.as_deref())?;

    if args.ascent {
        info!("上溯追踪");
        run(&Inverted::new(&tin), config, args.x, args.y)
    } else {
        run(&tin, config, args.x, args.y)
    }
}

fn run<T: TinAccess>(tin: &T, config: DrainageConfig, x: f64, y: f64) -> Result<()> {
    let mut analysis = WaterAnalysis::with_config(tin, config).context("配置无效")?;
    if let Err(err) = analysis.do_trace(x, y) {
        warn!("追踪未完全成功: {}", err);
    }
    info!("追踪节点: {}", analysis.n_features());

    print_result(&analysis.get_result());
    Ok(())
}
