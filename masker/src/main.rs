//! 批量胎儿脑掩膜命令行入口.
//!
//! 递归遍历输入目录下的 nii 文件, 逐个运行掩膜流水线,
//! 并将输出写入镜像输入目录结构的输出目录. 单个文件失败不影响
//! 其余文件的处理, 但会使进程以非零状态码退出.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser;

use brain_berry::prelude::*;

#[derive(Parser, Debug)]
#[command(name = "masker")]
#[command(version, about = "3D 胎儿脑部 MRI 自动掩膜批处理工具")]
struct Args {
    /// 输入目录, 递归查找其中待处理的体数据文件.
    inputdir: PathBuf,

    /// 输出目录, 子目录结构与输入目录保持一致.
    outputdir: PathBuf,

    /// 输入文件扩展名.
    #[arg(short = 'p', long, default_value = "nii")]
    extension: String,

    /// 掩膜输出文件名后缀 (替换输入文件的最后一个扩展名).
    /// 空串表示不输出掩膜文件.
    #[arg(short = 's', long, default_value = "_mask.nii")]
    output_suffix: String,

    /// 叠加输出配置, 逗号分隔的 `multiplier:suffix` 列表
    /// (如 `0.1:_overlay.nii,0:_hard.nii`). 空串表示不产生叠加输出.
    #[arg(long, default_value = "")]
    overlays: String,

    /// 跳过掩膜的形态学后处理.
    #[arg(long)]
    no_post_processing: bool,

    /// 后处理的膨胀结构元描述符
    /// (`disk(r)` / `square(n)` / `cube(n)` / `none`).
    #[arg(long, default_value = "disk(2)")]
    dilation_footprint: String,

    /// 基线模型的归一化亮度门限, 取值范围 [0, 255].
    #[arg(long, default_value_t = 128.0)]
    cutoff: f32,
}

fn main() -> ExitCode {
    simple_logger::SimpleLogger::new()
        .with_level(log::LevelFilter::Info)
        .env()
        .init()
        .expect("日志系统初始化失败");

    let args = Args::parse();

    // 配置边界: 任何配置错误都在处理第一份文件之前终止运行,
    // 不会产生部分输出.
    let recipes = match parse_overlay_list(&args.overlays) {
        Ok(v) => v,
        Err(e) => {
            log::error!("{e}");
            return ExitCode::FAILURE;
        }
    };
    let footprint = match parse_footprint(&args.dilation_footprint) {
        Ok(v) => v,
        Err(e) => {
            log::error!("{e}");
            return ExitCode::FAILURE;
        }
    };
    let Some(model) = ThresholdModel::new(args.cutoff) else {
        log::error!("亮度门限 {} 不在 [0, 255] 范围内", args.cutoff);
        return ExitCode::FAILURE;
    };
    if !args.inputdir.is_dir() {
        log::error!("输入目录 `{}` 不存在或不是目录", args.inputdir.display());
        return ExitCode::FAILURE;
    }

    let mut total = 0usize;
    let mut failed = 0usize;
    for entry in scan_walker(&args.inputdir, &args.extension) {
        let input = match entry {
            Ok(p) => p,
            Err(e) => {
                log::error!("目录遍历错误: {e}");
                failed += 1;
                continue;
            }
        };

        total += 1;
        match run_one(&args, &model, &recipes, footprint.as_ref(), &input) {
            Ok(report) => log::info!(
                "`{}`: 前景体素 {}, 写出 {} 个输出文件",
                input.display(),
                report.foreground_voxels,
                report.outputs_written
            ),
            Err(e) => {
                log::error!("`{}` 处理失败: {e}", input.display());
                failed += 1;
            }
        }
    }

    log::info!("共 {total} 份输入, {failed} 份失败");
    if failed > 0 {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

/// 处理单份输入文件: 推导各输出路径并运行流水线.
fn run_one(
    args: &Args,
    model: &ThresholdModel,
    recipes: &[OverlayRecipe],
    footprint: Option<&Footprint>,
    input: &Path,
) -> Result<Report, Box<dyn std::error::Error>> {
    // 输入的相对路径映射到输出目录, 中间子目录按需创建.
    let relative = input.strip_prefix(&args.inputdir)?;
    let out_twin = args.outputdir.join(relative);
    if let Some(parent) = out_twin.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let mask_path = (!args.output_suffix.is_empty())
        .then(|| output_file_name(&out_twin, &args.output_suffix));
    let overlays: Vec<OverlaySpec> = recipes
        .iter()
        .map(|r| OverlaySpec {
            multiplier: r.multiplier,
            path: output_file_name(&out_twin, &r.suffix),
        })
        .collect();

    let report = process(
        model,
        input,
        mask_path.as_deref(),
        &overlays,
        !args.no_post_processing,
        footprint,
    )?;
    Ok(report)
}
