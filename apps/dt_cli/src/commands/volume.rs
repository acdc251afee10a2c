// apps/dt_cli/src/commands/volume.rs

//! 注水命令

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Args;
use dt_drainage::WaterAnalysis;
use tracing::{info, warn};

use super::{load_config, load_tin, print_result};

/// 注水参数
#[derive(Args)]
pub struct VolumeArgs {
    /// 三角网 JSON 文件
    #[arg(long)]
    pub tin: PathBuf,

    /// 注水点 X
    #[arg(long, allow_negative_numbers = true)]
    pub x: f64,

    /// 注水点 Y
    #[arg(long, allow_negative_numbers = true)]
    pub y: f64,

    /// 每次注入的水量
    #[arg(long)]
    pub volume: f64,

    /// 重复注入次数
    #[arg(long, default_value = "1")]
    pub repeat: usize,

    /// 配置文件路径
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}

/// 执行注水命令
pub fn execute(args: VolumeArgs) -> Result<()> {
    info!("=== DrainTrace 注水 ===");
    if args.repeat == 0 {
        bail!("--repeat 必须大于 0");
    }
    let tin = load_tin(&args.tin)?;
    let mut config = load_config(args.config.as_deref())?;
    config.water_volume_result = true;

    let mut analysis = WaterAnalysis::with_config(&tin, config).context("配置无效")?;
    for step in 0..args.repeat {
        match analysis.add_water_volume(args.x, args.y, args.volume) {
            Ok(()) => {}
            Err(err @ dt_drainage::DrainageError::InvalidVolume { .. }) => {
                return Err(err).context("注水量无效");
            }
            Err(err) => warn!("第 {} 次注水未完全成功: {}", step + 1, err),
        }
    }
    info!(
        "累计注入 {:.4}, 追踪节点 {}",
        analysis.injected_volume(),
        analysis.n_features()
    );

    print_result(&analysis.get_result());
    Ok(())
}
