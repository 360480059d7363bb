//! 掩膜预测能力接口 (推理边界).
//!
//! 神经网络被视为不透明的外部能力: 核心流水线只依赖
//! [`MaskingModel::predict_mask`] 单一函数签名, 不存在继承层次.
//! 任何替代实现 (包括测试用的 mock) 只需满足该签名即可接入.

use std::fmt;

use ndarray::{Array4, ArrayView4};

use crate::consts::mask::{MASK_BACKGROUND, MASK_FOREGROUND};
use crate::consts::{PROB_THRESHOLD, WORKING_RESOLUTION};

/// 推理边界的错误.
#[derive(Debug, Clone)]
pub enum PredictError {
    /// 输入体积不满足 (N, 256, 256, 1) 约定.
    BadInputShape([usize; 4]),

    /// 推理后端自身的错误.
    Backend(String),
}

impl fmt::Display for PredictError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BadInputShape(s) => write!(
                f,
                "推理输入形状 {s:?} 不满足 (N, {r}, {r}, 1) 约定",
                r = WORKING_RESOLUTION
            ),
            Self::Backend(msg) => write!(f, "推理后端错误: {msg}"),
        }
    }
}

impl std::error::Error for PredictError {}

/// 表明一个可以对 3D 体积预测脑掩膜的对象.
///
/// # 边界约定
///
/// 1. 输入为 (N, 256, 256, 1) 的归一化体积 (N 为切片数, 末维为单通道);
/// 2. 输出形状与输入一致;
/// 3. 输出值 **必须** 已按 [`PROB_THRESHOLD`] (0.5) 二值化为
///   `{0.0, 1.0}` — 阈值化是实现方的责任, 不是流水线的.
///   产生软概率的实现可借助 [`binarize`].
pub trait MaskingModel {
    /// 对整个 3D 体积预测二值掩膜.
    fn predict_mask(&self, volume: ArrayView4<'_, f32>) -> Result<Array4<f32>, PredictError>;
}

/// 将软概率体积按 [`PROB_THRESHOLD`] 二值化为 `{0.0, 1.0}`.
pub fn binarize(mut prob: Array4<f32>) -> Array4<f32> {
    prob.mapv_inplace(|v| {
        if v >= PROB_THRESHOLD {
            MASK_FOREGROUND
        } else {
            MASK_BACKGROUND
        }
    });
    prob
}

/// 无权重的基线实现: 归一化亮度达到 `cutoff` 的体素被视为脑组织.
///
/// 该实现使流水线在没有网络权重时也可以端到端运转 (测试、演练);
/// 真实网络通过同一 [`MaskingModel`] 接口接入.
#[derive(Copy, Clone, Debug)]
pub struct ThresholdModel {
    cutoff: f32,
}

impl ThresholdModel {
    /// 构建基线模型. `cutoff` 必须在 \[0, 255\] 范围内, 否则返回 `None`.
    pub fn new(cutoff: f32) -> Option<ThresholdModel> {
        if (0.0..=255.0).contains(&cutoff) {
            Some(Self { cutoff })
        } else {
            None
        }
    }

    /// 亮度门限.
    #[inline]
    pub fn cutoff(&self) -> f32 {
        self.cutoff
    }
}

impl MaskingModel for ThresholdModel {
    fn predict_mask(&self, volume: ArrayView4<'_, f32>) -> Result<Array4<f32>, PredictError> {
        let shape = volume.dim();
        if shape.1 != WORKING_RESOLUTION || shape.2 != WORKING_RESOLUTION || shape.3 != 1 {
            return Err(PredictError::BadInputShape([
                shape.0, shape.1, shape.2, shape.3,
            ]));
        }

        Ok(volume.mapv(|v| {
            if v >= self.cutoff {
                MASK_FOREGROUND
            } else {
                MASK_BACKGROUND
            }
        }))
    }
}
