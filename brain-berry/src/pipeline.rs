//! 掩膜流水线编排.

use std::fmt;
use std::path::Path;

use ndarray::{Array3, Axis, Zip};
use nifti::NiftiError;

use crate::consts::{PROB_THRESHOLD, WORKING_RESOLUTION};
use crate::model::{MaskingModel, PredictError};
use crate::output::OverlaySpec;
use crate::post_proc::{refine_mask, Footprint};
use crate::{normalize, resample, save_volume, MriScan};

/// 流水线的逐文件错误. 除掩膜精化内部的空掩膜回退外,
/// 所有阶段的失败均原样上抛给逐文件调用方; 是否继续处理后续文件
/// 由调用方决定, 不属于核心流水线.
#[derive(Debug)]
pub enum PipelineError {
    /// 输入/输出编解码错误 (nifti 边界).
    Nifti(NiftiError),

    /// 推理失败. 对当前文件致命, 不重试 (失败不被假定为瞬态).
    Predict(PredictError),

    /// 推理结果形状与推理输入不一致.
    MaskShape {
        /// 推理结果的形状.
        got: [usize; 4],
        /// 期望的形状 (即推理输入的形状).
        want: [usize; 4],
    },
}

impl From<NiftiError> for PipelineError {
    fn from(e: NiftiError) -> Self {
        Self::Nifti(e)
    }
}

impl From<PredictError> for PipelineError {
    fn from(e: PredictError) -> Self {
        Self::Predict(e)
    }
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Nifti(e) => write!(f, "nii 读写错误: {e}"),
            Self::Predict(e) => write!(f, "{e}"),
            Self::MaskShape { got, want } => {
                write!(f, "推理结果形状 {got:?} 与输入形状 {want:?} 不一致")
            }
        }
    }
}

impl std::error::Error for PipelineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Nifti(e) => Some(e),
            Self::Predict(e) => Some(e),
            Self::MaskShape { .. } => None,
        }
    }
}

/// 单个输入文件的处理摘要.
#[derive(Copy, Clone, Debug)]
pub struct Report {
    /// 最终掩膜中的前景体素数 (含下采样产生的过半数边缘体素).
    pub foreground_voxels: usize,

    /// 是否发生过工作分辨率重采样.
    pub resampled: bool,

    /// 实际写出的输出文件个数.
    pub outputs_written: usize,
}

/// 对单个输入文件运行完整掩膜流水线.
///
/// 依次执行: 读取 → 逐切片归一化 → (必要时) 上采样到 256x256 →
/// 推理 → (可选) 形态学精化 → (必要时) 下采样回原分辨率 →
/// 合成并保存输出. header 自始至终原样传递.
///
/// # 参数
///
/// - `mask_path`: 为 `Some` 时保存二值掩膜文件;
/// - `overlays`: 每项产生一个叠加输出, 掩膜外体素按乘数衰减;
/// - `post_processing`: 是否运行 [`refine_mask`];
/// - `footprint`: 精化时的膨胀结构元. 是否膨胀由结构元存在与否决定,
///   精化内部自行判断.
///
/// # 注意
///
/// 1. 所有输出体积在第一次保存之前全部计算完毕: 计算阶段的任何失败
///   都不会在磁盘上留下半成品.
/// 2. 下采样使用双线性插值, 掩膜边缘可能重新出现小数值.
///   与历史输出保持一致, **不做** 二次阈值化.
/// 3. `overlays` 的乘数必须在 \[0, 1\] 范围内 (由配置边界保证),
///   否则程序 panic.
pub fn process<M: MaskingModel>(
    model: &M,
    input_path: &Path,
    mask_path: Option<&Path>,
    overlays: &[OverlaySpec],
    post_processing: bool,
    footprint: Option<&Footprint>,
) -> Result<Report, PipelineError> {
    // step 1: 读取与逐切片归一化.
    let scan = MriScan::open(input_path)?;
    let (header, raw) = scan.into_parts();
    let normalized = normalize::normalize_volume(&raw);

    // step 2: 记录原始平面形状; 需要时上采样.
    // 下采样目标 = 这里记录的形状, 不重新推算.
    let (_, orig_h, orig_w) = normalized.dim();
    let needs_resize = orig_h != WORKING_RESOLUTION || orig_w != WORKING_RESOLUTION;
    let net_input3 = if needs_resize {
        log::debug!(
            "`{}`: 平面分辨率 {orig_h}x{orig_w} != 工作分辨率, 上采样",
            input_path.display()
        );
        resample::resize_volume(&normalized, (WORKING_RESOLUTION, WORKING_RESOLUTION))
    } else {
        normalized
    };

    // step 3: 末维补单通道后推理.
    let net_input = net_input3.insert_axis(Axis(3));
    let prob = model.predict_mask(net_input.view())?;
    if prob.dim() != net_input.dim() {
        let (a, b, c, d) = prob.dim();
        let (e, f, g, h) = net_input.dim();
        return Err(PipelineError::MaskShape {
            got: [a, b, c, d],
            want: [e, f, g, h],
        });
    }

    // 去掉单通道维, 回到 (z, H, W).
    let mut mask = prob.index_axis_move(Axis(3), 0);

    // step 4: 形态学精化.
    if post_processing {
        mask = refine_mask(&mask, footprint);
    }

    // step 5: 下采样回 step 2 记录的原分辨率.
    if needs_resize {
        mask = resample::resize_volume(&mask, (orig_w, orig_h));
    }

    // step 8 的计算部分提前: 保存之前先合成所有叠加输出.
    let composed: Vec<(&OverlaySpec, Array3<f32>)> = overlays
        .iter()
        .map(|ov| (ov, compose_overlay(&mask, &raw, ov.multiplier)))
        .collect();

    // step 7: 保存掩膜.
    let mut outputs_written = 0usize;
    if let Some(path) = mask_path {
        save_volume(&mask, &header, path)?;
        outputs_written += 1;
    }

    // step 8: 保存叠加输出.
    for (ov, volume) in &composed {
        save_volume(volume, &header, &ov.path)?;
        outputs_written += 1;
    }

    Ok(Report {
        foreground_voxels: mask.iter().filter(|&&v| v >= PROB_THRESHOLD).count(),
        resampled: needs_resize,
        outputs_written,
    })
}

/// 合成叠加输出: `clip(mask, multiplier, 1.0) * raw`, 逐体素.
///
/// 掩膜外体素被衰减为原值的 `multiplier` 倍而不是清零;
/// `raw` 是 **归一化之前** 的原始体积, 与掩膜同为 (z, H, W) 轴序.
fn compose_overlay(mask: &Array3<f32>, raw: &Array3<f32>, multiplier: f32) -> Array3<f32> {
    assert!(
        (0.0..=1.0).contains(&multiplier),
        "叠加输出乘数必须在 [0, 1] 范围内"
    );
    debug_assert_eq!(mask.dim(), raw.dim());
    Zip::from(mask)
        .and(raw)
        .map_collect(|&m, &v| m.clamp(multiplier, 1.0) * v)
}
