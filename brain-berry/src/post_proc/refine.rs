//! 3D 掩膜的形态学精化 (后处理).

use std::collections::VecDeque;

use itertools::iproduct;
use ndarray::{Array3, Axis};

use super::Footprint;
use crate::consts::mask::*;
use crate::Idx3d;

/// 对预测掩膜实施形态学精化.
///
/// 算法流程依次为 (各步骤依赖前一步结果, 不可重排):
///
/// 1. **膨胀** (仅当给定 `footprint` 时): 沿行轴 (`Axis(1)`) 逐切片
///   用结构元对 (z, W) 平面做二值膨胀, 再重新组装体积.
///   不给定结构元则掩膜原样通过.
/// 2. **闭运算**: 对整个 3D 掩膜用边长 2 的立方体结构元做二值闭运算,
///   无条件执行 (即使膨胀被跳过). 用于填补小孔与缝隙.
/// 3. **最大连通域保留**: 按 26-邻接对闭运算结果做连通域标记,
///   仅保留体素数最多的连通域 (标签 0 为背景, 不参与).
///
/// # 注意
///
/// 若掩膜不含任何前景体素, 第 3 步无连通域可选. 此时 **不报错**,
/// 直接返回闭运算结果 — 这是刻意的失败吸收策略, 调用方不会观察到异常.
///
/// 输入体素以非零为前景; 输出体素恒为 `{0.0, 1.0}`.
pub fn refine_mask(mask: &Array3<f32>, footprint: Option<&Footprint>) -> Array3<f32> {
    // step 1: 按切片膨胀.
    let dilated = match footprint {
        Some(fp) => dilate_rows(mask, fp),
        None => mask.to_owned(),
    };

    // step 2: cube(2) 闭运算.
    let closed = close_cube2(&dilated);

    // step 3: 最大连通域. 空掩膜时回退到闭运算结果.
    match largest_component(&closed) {
        Some(kept) => kept,
        None => closed,
    }
}

/// 26-邻接 3D 连通域标记.
///
/// # 返回值
///
/// `(标签数组, 各标签体素数)`. 标签从 1 开始按扫描序分配;
/// 返回值第二个分量的下标 0 为背景占位, 恒为 0.
pub fn label_components(mask: &Array3<f32>) -> (Array3<u32>, Vec<usize>) {
    let (z_len, h_len, w_len) = mask.dim();
    let mut labels = Array3::<u32>::zeros(mask.dim());
    let mut sizes = vec![0usize];
    let mut next = 1u32;

    for (pos, &v) in mask.indexed_iter() {
        if is_background(v) || labels[pos] != 0 {
            continue;
        }

        // 从该体素出发 BFS 整个连通域.
        let mut size = 0usize;
        let mut q: VecDeque<Idx3d> = VecDeque::new();
        labels[pos] = next;
        q.push_back(pos);

        while let Some((cz, ch, cw)) = q.pop_front() {
            size += 1;
            for (dz, dh, dw) in iproduct!(-1isize..=1, -1isize..=1, -1isize..=1) {
                if (dz, dh, dw) == (0, 0, 0) {
                    continue;
                }
                let (nz, nh, nw) = (cz as isize + dz, ch as isize + dh, cw as isize + dw);
                if nz < 0 || nh < 0 || nw < 0 {
                    continue;
                }
                let np = (nz as usize, nh as usize, nw as usize);
                if np.0 >= z_len || np.1 >= h_len || np.2 >= w_len {
                    continue;
                }
                if is_foreground(mask[np]) && labels[np] == 0 {
                    labels[np] = next;
                    q.push_back(np);
                }
            }
        }

        sizes.push(size);
        next += 1;
    }

    (labels, sizes)
}

/// 沿行轴逐切片做二值膨胀.
fn dilate_rows(mask: &Array3<f32>, footprint: &Footprint) -> Array3<f32> {
    let offsets = footprint.plane_offsets();
    let (z_len, h_len, w_len) = mask.dim();
    let mut out = Array3::from_elem(mask.dim(), MASK_BACKGROUND);

    for j in 0..h_len {
        let plane = mask.index_axis(Axis(1), j);
        let mut grown = out.index_axis_mut(Axis(1), j);

        for ((a, b), &v) in plane.indexed_iter() {
            if is_background(v) {
                continue;
            }
            for &(da, db) in &offsets {
                let (na, nb) = (a as isize + da, b as isize + db);
                if na < 0 || nb < 0 || na >= z_len as isize || nb >= w_len as isize {
                    continue;
                }
                grown[(na as usize, nb as usize)] = MASK_FOREGROUND;
            }
        }
    }

    out
}

/// 边长 2 的立方体结构元的偏移集合. 偶数边长无真正中心,
/// 锚点按 `i - n / 2` 惯例取在负方向.
fn cube2_offsets() -> Vec<(isize, isize, isize)> {
    iproduct!(-1isize..=0, -1isize..=0, -1isize..=0).collect()
}

/// cube(2) 的 3D 二值闭运算 (膨胀后腐蚀).
///
/// 边界策略: 膨胀时越界邻居视为背景, 腐蚀时越界邻居视为前景,
/// 使闭运算不会蚕食体积边界.
fn close_cube2(mask: &Array3<f32>) -> Array3<f32> {
    let offsets = cube2_offsets();
    let (z_len, h_len, w_len) = mask.dim();

    let mut dilated = Array3::from_elem(mask.dim(), MASK_BACKGROUND);
    for ((z, h, w), &v) in mask.indexed_iter() {
        if is_background(v) {
            continue;
        }
        for &(dz, dh, dw) in &offsets {
            let (nz, nh, nw) = (z as isize + dz, h as isize + dh, w as isize + dw);
            if nz < 0 || nh < 0 || nw < 0 {
                continue;
            }
            let (nz, nh, nw) = (nz as usize, nh as usize, nw as usize);
            if nz >= z_len || nh >= h_len || nw >= w_len {
                continue;
            }
            dilated[(nz, nh, nw)] = MASK_FOREGROUND;
        }
    }

    let mut eroded = Array3::from_elem(mask.dim(), MASK_BACKGROUND);
    for ((z, h, w), e) in eroded.indexed_iter_mut() {
        let all_foreground = offsets.iter().all(|&(dz, dh, dw)| {
            let (nz, nh, nw) = (z as isize + dz, h as isize + dh, w as isize + dw);
            if nz < 0 || nh < 0 || nw < 0 {
                return true;
            }
            let (nz, nh, nw) = (nz as usize, nh as usize, nw as usize);
            if nz >= z_len || nh >= h_len || nw >= w_len {
                return true;
            }
            is_foreground(dilated[(nz, nh, nw)])
        });
        if all_foreground {
            *e = MASK_FOREGROUND;
        }
    }

    eroded
}

/// 仅保留体素数最多的连通域. 体素数并列时取扫描序最先出现的标签.
///
/// 无前景体素时返回 `None`.
fn largest_component(mask: &Array3<f32>) -> Option<Array3<f32>> {
    let (labels, sizes) = label_components(mask);
    if sizes.len() <= 1 {
        return None;
    }

    let mut best = 1u32;
    for label in 2..sizes.len() as u32 {
        if sizes[label as usize] > sizes[best as usize] {
            best = label;
        }
    }

    Some(labels.mapv(|l| {
        if l == best {
            MASK_FOREGROUND
        } else {
            MASK_BACKGROUND
        }
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::s;

    /// 在 `dim` 体积内构造一个前景长方体.
    fn block_mask(dim: Idx3d, z: std::ops::Range<usize>, hw: std::ops::Range<usize>) -> Array3<f32> {
        let mut m = Array3::from_elem(dim, MASK_BACKGROUND);
        m.slice_mut(s![z, hw.clone(), hw]).fill(MASK_FOREGROUND);
        m
    }

    #[test]
    fn test_output_is_binary() {
        let mask = block_mask((6, 20, 20), 1..5, 5..15);
        let out = refine_mask(&mask, Some(&Footprint::Disk(2)));
        assert!(out.iter().all(|&v| v == 0.0 || v == 1.0));
    }

    #[test]
    fn test_empty_mask_does_not_error() {
        let mask = Array3::from_elem((4, 8, 8), MASK_BACKGROUND);
        let out = refine_mask(&mask, Some(&Footprint::Disk(2)));
        assert_eq!(out.dim(), (4, 8, 8));
        // 空掩膜闭运算后仍为空.
        assert!(out.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_largest_component_wins() {
        // 大块 + 远处的孤立碎片: 碎片应被丢弃.
        let mut mask = block_mask((8, 24, 24), 1..6, 4..16);
        mask[(7, 22, 22)] = MASK_FOREGROUND;

        let out = refine_mask(&mask, None);
        assert!(is_background(out[(7, 22, 22)]));
        assert!(is_foreground(out[(3, 10, 10)]));
    }

    #[test]
    fn test_closing_fills_small_hole() {
        let mut mask = block_mask((6, 16, 16), 1..5, 2..14);
        mask[(3, 8, 8)] = MASK_BACKGROUND;

        let out = refine_mask(&mask, None);
        assert!(is_foreground(out[(3, 8, 8)]));
    }

    #[test]
    fn test_dilation_grows_in_plane() {
        let mut mask = Array3::from_elem((5, 9, 9), MASK_BACKGROUND);
        mask[(2, 4, 4)] = MASK_FOREGROUND;

        let out = refine_mask(&mask, Some(&Footprint::Disk(2)));
        // 膨胀沿 (z, W) 平面进行: z 与 w 方向都应生长.
        assert!(is_foreground(out[(4, 4, 4)]));
        assert!(is_foreground(out[(2, 4, 6)]));
    }

    #[test]
    fn test_no_footprint_skips_dilation() {
        let mask = block_mask((6, 16, 16), 1..5, 4..12);
        let out = refine_mask(&mask, None);
        // 块外远处不应出现前景.
        assert!(is_background(out[(0, 1, 1)]));
        assert!(is_background(out[(5, 15, 15)]));
    }

    #[test]
    fn test_refine_is_stable_without_footprint() {
        // 单一连通域稳定后, 再精化一次不应改变结果.
        let mask = block_mask((6, 20, 20), 1..5, 5..15);
        let once = refine_mask(&mask, None);
        let twice = refine_mask(&once, None);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_label_components_counts() {
        let mut mask = block_mask((4, 10, 10), 0..2, 0..3);
        mask[(3, 9, 9)] = MASK_FOREGROUND;

        let (labels, sizes) = label_components(&mask);
        // 背景占位 + 两个连通域.
        assert_eq!(sizes.len(), 3);
        assert_eq!(sizes[0], 0);
        assert_eq!(sizes[1], 2 * 3 * 3);
        assert_eq!(sizes[2], 1);
        assert_eq!(labels[(3, 9, 9)], 2);
        assert_eq!(labels[(0, 0, 0)], 1);
    }
}
