//! 输出文件命名与叠加输出 (overlay) 配置.

use std::fmt;
use std::path::{Path, PathBuf};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// 尚未绑定到具体输入文件的叠加输出配置: 灰度下限乘数 + 文件名后缀.
///
/// 乘数为 `m` 的叠加输出中, 掩膜外体素被衰减为原值的 `m` 倍
/// (而不是清零); `m = 0` 时为硬掩膜, `m = 1` 时输出与原图一致.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct OverlayRecipe {
    /// 灰度下限乘数, 必须在 \[0, 1\] 范围内.
    pub multiplier: f32,

    /// 输出文件名后缀, 替换输入文件的最后一个扩展名.
    pub suffix: String,
}

/// 绑定到具体输出路径的叠加输出项.
#[derive(Clone, Debug, PartialEq)]
pub struct OverlaySpec {
    /// 灰度下限乘数.
    pub multiplier: f32,

    /// 输出文件路径.
    pub path: PathBuf,
}

/// 叠加输出配置列表的解析错误.
///
/// 该错误属于配置边界: 调用方应在处理任何输入文件 **之前**
/// 上报并终止运行 (fail fast), 而不是逐文件失败.
#[derive(Debug, Clone, PartialEq)]
pub enum ParseOverlayError {
    /// 配置项不符合 `multiplier:suffix` 文法.
    Malformed(String),

    /// 乘数无法解析, 或不在 \[0, 1\] 范围内.
    InvalidMultiplier(String),

    /// 后缀为空.
    EmptySuffix,
}

impl fmt::Display for ParseOverlayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Malformed(s) => {
                write!(f, "叠加输出配置 `{s}` 不符合 `multiplier:suffix` 文法")
            }
            Self::InvalidMultiplier(s) => {
                write!(f, "叠加输出乘数 `{s}` 非法 (必须是 [0, 1] 内的数)")
            }
            Self::EmptySuffix => write!(f, "叠加输出后缀不能为空"),
        }
    }
}

impl std::error::Error for ParseOverlayError {}

/// 解析逗号分隔的 `multiplier:suffix` 配置列表.
///
/// 空串 (或纯空白) 表示不产生叠加输出, 返回空 `Vec`.
/// 配置项顺序保持不变.
pub fn parse_overlay_list(arg: &str) -> Result<Vec<OverlayRecipe>, ParseOverlayError> {
    let arg = arg.trim();
    if arg.is_empty() {
        return Ok(Vec::new());
    }

    arg.split(',')
        .map(|item| {
            let item = item.trim();
            let Some((mult, suffix)) = item.split_once(':') else {
                return Err(ParseOverlayError::Malformed(item.to_owned()));
            };

            let multiplier: f32 = mult
                .trim()
                .parse()
                .map_err(|_| ParseOverlayError::InvalidMultiplier(mult.trim().to_owned()))?;
            if !multiplier.is_finite() || !(0.0..=1.0).contains(&multiplier) {
                return Err(ParseOverlayError::InvalidMultiplier(mult.trim().to_owned()));
            }

            let suffix = suffix.trim();
            if suffix.is_empty() {
                return Err(ParseOverlayError::EmptySuffix);
            }

            Ok(OverlayRecipe {
                multiplier,
                suffix: suffix.to_owned(),
            })
        })
        .collect()
}

/// 由输入文件路径推导输出文件路径: 将最后一个扩展名替换为 `suffix`.
///
/// `input` 没有扩展名时, 后缀直接拼接在文件名之后.
pub fn output_file_name(input: &Path, suffix: &str) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    input.with_file_name(format!("{stem}{suffix}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_overlay_list() {
        let got = parse_overlay_list("0.1:_overlay.nii, 0:_hard.nii").unwrap();
        assert_eq!(
            got,
            vec![
                OverlayRecipe {
                    multiplier: 0.1,
                    suffix: "_overlay.nii".to_owned()
                },
                OverlayRecipe {
                    multiplier: 0.0,
                    suffix: "_hard.nii".to_owned()
                },
            ]
        );

        assert_eq!(parse_overlay_list("").unwrap(), vec![]);
        assert_eq!(parse_overlay_list("   ").unwrap(), vec![]);
    }

    #[test]
    fn test_parse_overlay_list_fails_fast() {
        assert!(matches!(
            parse_overlay_list("0.1"),
            Err(ParseOverlayError::Malformed(_))
        ));
        assert!(matches!(
            parse_overlay_list("x:_a.nii"),
            Err(ParseOverlayError::InvalidMultiplier(_))
        ));
        assert!(matches!(
            parse_overlay_list("1.5:_a.nii"),
            Err(ParseOverlayError::InvalidMultiplier(_))
        ));
        assert!(matches!(
            parse_overlay_list("0.1:"),
            Err(ParseOverlayError::EmptySuffix)
        ));
        // 列表中任何一项非法都整体失败.
        assert!(parse_overlay_list("0.1:_a.nii,bad").is_err());
    }

    #[test]
    fn test_output_file_name() {
        assert_eq!(
            output_file_name(Path::new("/data/in/case7.nii"), "_mask.nii"),
            PathBuf::from("/data/in/case7_mask.nii")
        );
        assert_eq!(
            output_file_name(Path::new("scan"), "_mask.nii"),
            PathBuf::from("scan_mask.nii")
        );
    }
}
