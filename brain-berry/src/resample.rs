//! 体积的逐切片重采样.

use image::imageops::{self, FilterType};
use image::{ImageBuffer, Luma};
use ndarray::{Array2, Array3, Axis};

use crate::Idx2d;

/// 将 (z, H, W) 体积的每个水平切片独立重采样到 `target` = (宽, 高),
/// 再按原序重新堆叠. 插值方式为双线性.
///
/// 当输入分辨率与网络工作分辨率不一致时, 流水线会调用该函数两次:
/// 推理前上采样到 256x256, 推理后下采样回原分辨率. 下采样目标
/// **必须** 取自上采样前记录的原始形状, 而不是重新推算的值.
///
/// # 注意
///
/// 重采样是有损的. `target` 的两个分量必须非零, 否则程序 panic.
pub fn resize_volume(volume: &Array3<f32>, target: Idx2d) -> Array3<f32> {
    let (width, height) = target;
    assert!(width > 0 && height > 0, "重采样目标分辨率不能为 0");

    let (z, h, w) = volume.dim();
    let mut out = Array3::zeros((z, height, width));

    for (src, mut dst) in volume.axis_iter(Axis(0)).zip(out.axis_iter_mut(Axis(0))) {
        let raw: Vec<f32> = src.iter().copied().collect();
        // 形状与缓冲长度一致, 该操作不会失败, 可直接 unwrap.
        let buf = ImageBuffer::<Luma<f32>, Vec<f32>>::from_raw(w as u32, h as u32, raw).unwrap();

        // Triangle 即双线性插值.
        let resized = imageops::resize(&buf, width as u32, height as u32, FilterType::Triangle);

        let arr = Array2::from_shape_vec((height, width), resized.into_raw()).unwrap();
        dst.assign(&arr);
    }

    debug_assert_eq!(out.dim(), (z, height, width));
    out
}
