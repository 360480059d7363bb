//! 逐切片灰度归一化.

use ndarray::{Array2, Array3, ArrayView2, Axis};
use ordered_float::OrderedFloat;

use crate::consts::{INTENSITY_PERCENTILE, NORMALIZED_MAX};

cfg_if::cfg_if! {
    if #[cfg(feature = "rayon")] {
        use rayon::iter::{IndexedParallelIterator, IntoParallelIterator, ParallelIterator};
    }
}

/// 将一个 2D 灰度切片归一化到 \[0, 255\] 范围.
///
/// 算法流程依次为:
///
/// 1. 负值钳制为 0;
/// 2. 求展平切片排序后第 `0.97 * N` 位置 (下取整) 的灰度值,
///   超过该值的像素被钳制为该值 (亮斑伪影不得主导归一化范围);
/// 3. 若钳制后的最大值为 0 (空切片或全负切片), 返回全零切片;
/// 4. 否则按 `255 / max` 线性缩放, 并截断小数部分.
///
/// # 注意
///
/// 第 4 步的小数截断会损失亚灰度级精度. 这是有意保留的历史行为,
/// 以保证与既有输出逐位可比; 不要 "修复" 它.
///
/// 各切片相互独立, 不存在跨切片状态.
pub fn normalize_slice(slice: ArrayView2<'_, f32>) -> Array2<f32> {
    let mut img = slice.mapv(|v| v.max(0.0));
    if img.is_empty() {
        return img;
    }

    let mut flat: Vec<OrderedFloat<f32>> = img.iter().copied().map(OrderedFloat).collect();
    flat.sort_unstable();
    let limit = flat[(flat.len() as f64 * INTENSITY_PERCENTILE) as usize].into_inner();
    img.mapv_inplace(|v| v.min(limit));

    let max_val = img.fold(0.0f32, |acc, &v| acc.max(v));
    if max_val == 0.0 {
        return img;
    }

    img.mapv_inplace(|v| (v / max_val * NORMALIZED_MAX).trunc());
    img
}

/// 对 (z, H, W) 体积的每个水平切片独立运行 [`normalize_slice`],
/// 并按原序重新堆叠.
///
/// 打开 `rayon` feature 时切片会并行归一化; 由于不存在跨切片状态,
/// 结果与串行版本逐位一致.
pub fn normalize_volume(volume: &Array3<f32>) -> Array3<f32> {
    let mut out = Array3::zeros(volume.dim());

    cfg_if::cfg_if! {
        if #[cfg(feature = "rayon")] {
            out.axis_iter_mut(Axis(0))
                .into_par_iter()
                .zip(volume.axis_iter(Axis(0)).into_par_iter())
                .for_each(|(mut dst, src)| dst.assign(&normalize_slice(src)));
        } else {
            for (mut dst, src) in out.axis_iter_mut(Axis(0)).zip(volume.axis_iter(Axis(0))) {
                dst.assign(&normalize_slice(src));
            }
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{arr2, Array2};

    #[test]
    fn test_output_range_and_max() {
        // 构造 20x20 渐变切片, 含负值.
        let img = Array2::from_shape_fn((20, 20), |(h, w)| (h * 20 + w) as f32 - 30.0);
        let out = normalize_slice(img.view());

        assert!(out.iter().all(|&v| (0.0..=255.0).contains(&v)));
        // 最大输出值应为 255 (截断不影响最大点).
        assert_eq!(out.fold(0.0f32, |a, &v| a.max(v)), 255.0);
        // 所有输出均为整数灰度级.
        assert!(out.iter().all(|&v| v.trunc() == v));
    }

    #[test]
    fn test_zero_and_negative_slices() {
        let zero = Array2::<f32>::zeros((8, 8));
        assert!(normalize_slice(zero.view()).iter().all(|&v| v == 0.0));

        let negative = Array2::from_elem((8, 8), -42.0f32);
        assert!(normalize_slice(negative.view()).iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_outlier_suppression() {
        // 99 个值为 10, 1 个离群值 10000: 离群值被 97% 分位钳制,
        // 归一化范围由其余像素决定.
        let mut img = Array2::from_elem((10, 10), 10.0f32);
        img[(0, 0)] = 10000.0;
        let out = normalize_slice(img.view());

        // 离群点与普通点一同落在 255, 而不是把普通点压到接近 0.
        assert_eq!(out[(0, 0)], 255.0);
        assert_eq!(out[(5, 5)], 255.0);
    }

    #[test]
    fn test_idempotent_on_normalized_slice() {
        // 已归一化切片: 超过 3% 的像素位于 255, 97% 分位即 255,
        // 再次归一化不应产生截断噪声以外的任何变化.
        let mut img = Array2::from_elem((10, 10), 255.0f32);
        for (i, v) in img.iter_mut().enumerate() {
            if i >= 20 {
                *v = (i % 200) as f32;
            }
        }
        let once = normalize_slice(img.view());
        let twice = normalize_slice(once.view());
        assert_eq!(once, twice);
    }

    #[test]
    fn test_truncation_is_floor() {
        // 2x2 切片, 全部值参与; 97% 分位 = 最大值.
        let img = arr2(&[[1.0f32, 2.0], [3.0, 4.0]]);
        let out = normalize_slice(img.view());
        // 1/4*255 = 63.75 -> 63; 2/4*255 = 127.5 -> 127.
        assert_eq!(out, arr2(&[[63.0f32, 127.0], [191.0, 255.0]]));
    }

    #[test]
    fn test_volume_matches_per_slice() {
        let vol =
            ndarray::Array3::from_shape_fn((3, 6, 6), |(z, h, w)| (z * 31 + h * 7 + w) as f32);
        let out = normalize_volume(&vol);
        for (dst, src) in out.axis_iter(Axis(0)).zip(vol.axis_iter(Axis(0))) {
            assert_eq!(dst, normalize_slice(src));
        }
    }
}
