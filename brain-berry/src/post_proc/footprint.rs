//! 膨胀结构元 (footprint) 及其文本描述符解析.

use itertools::iproduct;
use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// 控制形态学膨胀范围的结构元.
///
/// 结构元由命名形状加数值参数构成, 从固定白名单文法的文本描述符解析而来
/// (`disk(2)`, `square(3)`, `cube(2)`, `none`). 描述符 **永远不会**
/// 被当作代码求值.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Footprint {
    /// 半径为 `r` 的平面圆盘: 所有满足 `dh^2 + dw^2 <= r^2` 的偏移.
    Disk(u32),

    /// 边长为 `n` 的平面正方形.
    Square(u32),

    /// 边长为 `n` 的立方体. 膨胀按切片进行, 因此实际使用其 `n x n`
    /// 正方形截面.
    Cube(u32),
}

impl Footprint {
    /// 获取该结构元在 2D 切片平面内的偏移集合 (相对锚点).
    ///
    /// 偶数边长的正方形/立方体没有真正的中心, 按照惯例锚点取
    /// `i - n / 2`, 即负方向多出一个单位.
    pub fn plane_offsets(&self) -> Vec<(isize, isize)> {
        match *self {
            Footprint::Disk(r) => {
                let r = r as isize;
                iproduct!(-r..=r, -r..=r)
                    .filter(|&(a, b)| a * a + b * b <= r * r)
                    .collect()
            }
            Footprint::Square(n) | Footprint::Cube(n) => {
                let n = n as isize;
                debug_assert!(n >= 1);
                let lo = -(n / 2);
                let hi = n - 1 - n / 2;
                iproduct!(lo..=hi, lo..=hi).collect()
            }
        }
    }
}

impl fmt::Display for Footprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Footprint::Disk(r) => write!(f, "disk({r})"),
            Footprint::Square(n) => write!(f, "square({n})"),
            Footprint::Cube(n) => write!(f, "cube({n})"),
        }
    }
}

/// 结构元描述符的解析错误.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum ParseFootprintError {
    /// 描述符不符合 `shape(param)` 文法.
    Malformed(String),

    /// 形状名不在白名单内.
    UnknownShape(String),

    /// 数值参数缺失、不是非负整数或超出形状的合法范围.
    InvalidParameter(String),
}

impl fmt::Display for ParseFootprintError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Malformed(s) => write!(f, "结构元描述符 `{s}` 不符合 `shape(param)` 文法"),
            Self::UnknownShape(s) => {
                write!(f, "未知结构元形状 `{s}` (支持 disk, square, cube, none)")
            }
            Self::InvalidParameter(s) => write!(f, "结构元参数 `{s}` 非法"),
        }
    }
}

impl std::error::Error for ParseFootprintError {}

/// 解析结构元描述符.
///
/// 空串与 `none` 均表示不做膨胀, 返回 `Ok(None)`. 按照构造约定,
/// "没有结构元" 与 "不做膨胀" 是同一个条件.
pub fn parse_footprint(expr: &str) -> Result<Option<Footprint>, ParseFootprintError> {
    let s = expr.trim().to_ascii_lowercase();
    if s.is_empty() || s == "none" {
        return Ok(None);
    }

    let Some(open) = s.find('(') else {
        return Err(ParseFootprintError::Malformed(expr.to_owned()));
    };
    if !s.ends_with(')') {
        return Err(ParseFootprintError::Malformed(expr.to_owned()));
    }

    let name = s[..open].trim();
    let raw_param = s[open + 1..s.len() - 1].trim();
    let param: u32 = raw_param
        .parse()
        .map_err(|_| ParseFootprintError::InvalidParameter(raw_param.to_owned()))?;

    match name {
        "disk" => Ok(Some(Footprint::Disk(param))),
        "square" | "cube" => {
            if param == 0 {
                return Err(ParseFootprintError::InvalidParameter(raw_param.to_owned()));
            }
            Ok(Some(if name == "square" {
                Footprint::Square(param)
            } else {
                Footprint::Cube(param)
            }))
        }
        other => Err(ParseFootprintError::UnknownShape(other.to_owned())),
    }
}
