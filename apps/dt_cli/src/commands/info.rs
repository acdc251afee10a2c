// apps/dt_cli/src/commands/info.rs

//! 信息显示命令
//!
//! 显示三角网统计与默认配置。

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use dt_config::DrainageConfig;
use dt_tin::TinAccess;
use tracing::info;

use super::load_tin;

/// 信息显示参数
#[derive(Args)]
pub struct InfoArgs {
    /// 三角网 JSON 文件
    #[arg(long)]
    pub tin: Option<PathBuf>,

    /// 显示默认配置
    #[arg(long)]
    pub defaults: bool,
}

/// 执行信息命令
pub fn execute(args: InfoArgs) -> Result<()> {
    info!("=== DrainTrace 信息 ===");

    if let Some(path) = &args.tin {
        let tin = load_tin(path)?;
        println!("=== 三角网 ===");
        println!("点数: {}", tin.n_points());
        println!("三角形数: {}", tin.n_triangles());
        println!("凸包点数: {}", tin.n_hull_points());
        let (lo, hi) = tin.elevation_range();
        println!("高程范围: {lo:.3} ~ {hi:.3}");
        if let Some(b) = tin.bounds() {
            println!("平面范围: {:?}", b);
        }
    }

    if args.defaults || args.tin.is_none() {
        if args.tin.is_some() {
            println!();
        }
        print_default_config();
    }

    Ok(())
}

fn print_default_config() {
    println!("=== 默认配置 ===");
    let config = DrainageConfig::default();
    println!("水塘高程容差: {}", config.pond_elevation_tolerance);
    println!("水塘体积容差: {}", config.pond_volume_tolerance);
    println!("最小深度: {}", config.minimum_depth);
    println!("零坡度策略: {:?}", config.zero_slope);
    println!("输出水量收支: {}", config.water_volume_result);
    println!("细化迭代上限: {}", config.max_refine_iterations);
    println!("节点上限: {} (0 表示按点数自动)", config.max_features);
}
