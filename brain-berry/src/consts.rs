//! 通用常量.

/// 网络固定工作分辨率: 推理输入的每个切片均为该边长的正方形.
pub const WORKING_RESOLUTION: usize = 256;

/// 归一化时抑制离群亮点的分位点. 大于该分位的灰度值会被钳制.
pub const INTENSITY_PERCENTILE: f64 = 0.97;

/// 归一化目标范围上限 (8-bit 灰度).
pub const NORMALIZED_MAX: f32 = 255.0;

/// 概率掩膜二值化阈值. 按照推理边界约定,
/// [`crate::model::MaskingModel`] 的实现负责以该阈值二值化.
pub const PROB_THRESHOLD: f32 = 0.5;

/// 掩膜体素值.
pub mod mask {
    /// 背景 (非脑组织) 体素值.
    pub const MASK_BACKGROUND: f32 = 0.0;

    /// 前景 (脑组织) 体素值.
    pub const MASK_FOREGROUND: f32 = 1.0;

    /// 体素是否是前景?
    #[inline]
    pub fn is_foreground(v: f32) -> bool {
        v != MASK_BACKGROUND
    }

    /// 体素是否是背景?
    #[inline]
    pub fn is_background(v: f32) -> bool {
        !is_foreground(v)
    }
}
