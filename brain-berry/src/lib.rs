#![warn(missing_docs)] // <= 合适时移除它.

//! 核心库. 提供 nii 格式 3D 胎儿脑部 MRI 扫描的自动掩膜 (brain masking)
//! 流水线: 逐切片灰度归一化、定尺寸重采样、掩膜形态学精化与叠加输出合成.
//!
//! 神经网络本身被视为外部能力, 通过 [`model::MaskingModel`] 单一接口接入;
//! 该 crate 不关心网络的训练、结构或权重格式.
//!
//! # 注意
//!
//! 1. 该 crate 目前仅支持 3D 的 nii 体数据, 没有对 4D (多回波等)
//!   数据进行直接适配.
//! 2. 在非期望情况下 (违反调用约定), 程序会直接 panic, 而不会导致内存错误.
//!   As what Rust promises. 数据相关的失败则通过 `Result` 逐层上抛.
//!
//! # 流水线结构
//!
//! 数据在 [`pipeline::process`] 中严格从左向右流动, 各阶段不保留跨阶段状态:
//!
//! 1. 读取体数据与 header ([`MriScan`]);
//! 2. 逐切片归一化到 0-255 ([`normalize`]);
//! 3. 若分辨率不是 256x256, 上采样到网络工作分辨率 ([`resample`]);
//! 4. 推理 ([`model`]);
//! 5. 掩膜精化: 膨胀、闭运算、最大连通域保留 ([`post_proc`]);
//! 6. 下采样回原分辨率, 合成掩膜文件与叠加输出并保存 ([`pipeline`]).

/// 二维索引, 同时也可一定程度上用作非负整数向量. 语义为 (高, 宽).
pub type Idx2d = (usize, usize);

/// 三维索引, 同时也可一定程度上用作非负整数向量. 语义为 (切片, 高, 宽).
pub type Idx3d = (usize, usize, usize);

/// 3D MRI nii 文件基础数据结构.
mod data;

pub use data::{save_volume, MriScan, NiftiHeaderAttr};

pub mod consts;

pub mod dataset;
pub mod model;
pub mod normalize;
pub mod output;
pub mod pipeline;
pub mod post_proc;
pub mod prelude;
pub mod resample;
