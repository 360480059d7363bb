//! nii 格式 3D MRI 扫描的读写与元信息.

use std::ops::{Index, IndexMut};
use std::path::Path;

use ndarray::{Array3, ArrayView, ArrayView2, Axis, Ix3};
use nifti::writer::WriterOptions;
use nifti::{IntoNdArray, NiftiHeader, NiftiObject, ReaderOptions};

use crate::{Idx2d, Idx3d};

/// `NiftiHeader` 是栈上大对象, 移动该对象的开销很可观.
/// 因此我们将其分配到堆上.
type BoxedHeader = Box<NiftiHeader>;

/// 将 (W, H, z) 转换成 (z, H, W). 以后均按照该模式访问.
#[inline]
fn get_shape_from_header(h: &NiftiHeader) -> Idx3d {
    // [W, H, z]. 体素个数数组.
    let [_, w, h, z, ..] = h.dim;
    (z as usize, h as usize, w as usize)
}

/// 3D MRI nii 文件 header 的共用属性和部分通用操作.
pub trait NiftiHeaderAttr {
    /// 获取 header 部分.
    fn header(&self) -> &NiftiHeader;

    /// 获取数据形状大小, 格式为 (切片数, 高, 宽).
    #[inline]
    fn shape(&self) -> Idx3d {
        get_shape_from_header(self.header())
    }

    /// 获取数据水平切片形状大小, 格式为 (高, 宽).
    #[inline]
    fn slice_shape(&self) -> Idx2d {
        let (_, h, w) = self.shape();
        (h, w)
    }

    /// 获取水平切片个数.
    #[inline]
    fn len_z(&self) -> usize {
        self.shape().0
    }

    /// 获取数据体素个数.
    #[inline]
    fn size(&self) -> usize {
        let (z, h, w) = self.shape();
        z * h * w
    }

    /// 获取单个体素分辨率. 该分辨率以毫米为单位, 分别代表空间 (相邻切片方向),
    /// 高 (自然图像的垂直方向), 宽 (自然图像的水平方向).
    #[inline]
    fn pix_dim(&self) -> [f64; 3] {
        let [_, w, h, z, ..] = self.header().pixdim;
        [z as f64, h as f64, w as f64]
    }

    /// 获取体素的实际体积值, 以立方毫米为单位.
    #[inline]
    fn voxel(&self) -> f64 {
        self.pix_dim().iter().product()
    }
}

/// nii 格式 3D MRI 扫描, 包括 header 和灰度数据. 灰度值以 `f32` 保存.
///
/// header 在整个流水线中保持原样, 从输入文件一路传递到每个输出文件,
/// 以保证输出与源图像在空间上正确配准.
#[derive(Debug, Clone)]
pub struct MriScan {
    header: BoxedHeader,
    data: Array3<f32>,
}

impl NiftiHeaderAttr for MriScan {
    #[inline]
    fn header(&self) -> &NiftiHeader {
        &self.header
    }
}

impl Index<Idx3d> for MriScan {
    type Output = f32;

    #[inline]
    fn index(&self, index: Idx3d) -> &Self::Output {
        &self.data[index]
    }
}

impl IndexMut<Idx3d> for MriScan {
    #[inline]
    fn index_mut(&mut self, index: Idx3d) -> &mut Self::Output {
        &mut self.data[index]
    }
}

impl MriScan {
    /// 打开 nii 文件格式的 3D MRI 扫描. `path` 为 nii 文件的本地路径.
    /// 如果打开成功, 则返回 `Ok(Self)`, 否则返回 `Err`.
    ///
    /// # 注意
    ///
    /// 仅支持 3D 体数据. 若文件数据与 header 声明的 3D 形状不一致,
    /// 则程序 panic.
    pub fn open<P: AsRef<Path>>(path: P) -> nifti::Result<Self> {
        let obj = ReaderOptions::new().read_file(path.as_ref())?;
        let header = Box::new(obj.header().clone());

        // [W, H, z] -> [z, H, W].
        // hint: 原第一维向下增长, 原第二维向右增长.
        let data = obj
            .into_volume()
            .into_ndarray::<f32>()?
            .permuted_axes([2, 1, 0].as_slice());

        // The nature of nifti data field layout.
        debug_assert!(data.is_standard_layout());

        let data =
            Array3::<f32>::from_shape_vec(get_shape_from_header(&header), data.into_raw_vec())
                .expect("nii 文件数据与 header 声明的形状不一致");

        Ok(Self { header, data })
    }

    /// 获取 3D 扫描 z 空间的第 `z_index` 层切片视图, 格式为 (高, 宽).
    ///
    /// 当 `z_index` 越界时 panic.
    #[inline]
    pub fn slice_at(&self, z_index: usize) -> ArrayView2<'_, f32> {
        self.data.index_axis(Axis(0), z_index)
    }

    /// 获取能按升序迭代 3D 扫描水平切片的迭代器.
    #[inline]
    pub fn slice_iter(&self) -> impl ExactSizeIterator<Item = ArrayView2<'_, f32>> {
        self.data.axis_iter(Axis(0))
    }

    /// 获得数据的一份不可变 shallow copy.
    #[inline]
    pub fn data(&self) -> ArrayView<'_, f32, Ix3> {
        self.data.view()
    }

    /// 拆解为 (header, 数据) 两部分, 转移所有权.
    #[inline]
    pub fn into_parts(self) -> (BoxedHeader, Array3<f32>) {
        (self.header, self.data)
    }
}

/// 以 `header` 为参考 header, 将 (z, H, W) 格式的体数据保存为 `path`
/// 处的 nii 文件.
///
/// 写入前会将数据转换回 nifti 惯用的 \[W, H, z\] 磁盘布局
/// (即 [`MriScan::open`] 所做轴变换的逆变换). 参考 header
/// 保证体素分辨率与方向元信息在读写往返中保持不变; 数据形状和元素类型
/// 由写入器根据数组本身重新计算.
pub fn save_volume<P: AsRef<Path>>(
    data: &Array3<f32>,
    header: &NiftiHeader,
    path: P,
) -> nifti::Result<()> {
    // (z, H, W) -> [W, H, z].
    let disk = data.view().permuted_axes([2, 1, 0]);
    WriterOptions::new(path.as_ref())
        .reference_header(header)
        .write_nifti(&disk)
}
