//! 输入数据集的文件发现.
//!
//! 输入目录下的 nii 文件可能按受检者分散在多层子目录中,
//! 本模块提供确定性顺序的递归遍历.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// 创建递归遍历 `root` 下所有指定扩展名文件的迭代器.
///
/// `extension` 为最后一个扩展名, 开头的 `.` 可有可无
/// (即 `"nii"` 与 `".nii"` 等价).
///
/// # 注意
///
/// `root` 必须是已存在的目录, 否则程序 panic.
pub fn scan_walker<P: AsRef<Path>>(root: P, extension: &str) -> ScanWalker {
    let root = root.as_ref().to_owned();
    assert!(root.is_dir(), "输入根目录不存在或不是目录");
    ScanWalker {
        pending: vec![root],
        extension: extension.trim_start_matches('.').to_owned(),
    }
}

/// 深度优先、按路径字典序产出输入文件的迭代器.
///
/// 目录读取错误以 `Err` 项的形式产出, 遍历本身继续进行,
/// 由调用方决定如何处置.
#[derive(Debug)]
pub struct ScanWalker {
    pending: Vec<PathBuf>,
    extension: String,
}

impl Iterator for ScanWalker {
    type Item = io::Result<PathBuf>;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(path) = self.pending.pop() {
            if path.is_dir() {
                match read_sorted(&path) {
                    // 逆序压栈, 保证弹出顺序为字典序.
                    Ok(entries) => self.pending.extend(entries.into_iter().rev()),
                    Err(e) => return Some(Err(e)),
                }
            } else if path.extension().is_some_and(|e| e == self.extension.as_str()) {
                return Some(Ok(path));
            }
        }
        None
    }
}

fn read_sorted(dir: &Path) -> io::Result<Vec<PathBuf>> {
    let mut entries = fs::read_dir(dir)?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<io::Result<Vec<_>>>()?;
    entries.sort_unstable();
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(path: &Path) {
        fs::write(path, b"").unwrap();
    }

    #[test]
    fn test_walk_is_recursive_sorted_and_filtered() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::create_dir(root.join("b_sub")).unwrap();
        fs::create_dir_all(root.join("z_sub/deep")).unwrap();
        touch(&root.join("c.nii"));
        touch(&root.join("a.nii"));
        touch(&root.join("notes.txt"));
        touch(&root.join("b_sub/s1.nii"));
        touch(&root.join("z_sub/deep/s2.nii"));

        let got: Vec<PathBuf> = scan_walker(root, "nii").map(|p| p.unwrap()).collect();
        assert_eq!(
            got,
            vec![
                root.join("a.nii"),
                root.join("b_sub/s1.nii"),
                root.join("c.nii"),
                root.join("z_sub/deep/s2.nii"),
            ]
        );
    }

    #[test]
    fn test_leading_dot_in_extension_is_tolerated() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("x.nii"));

        let with_dot: Vec<_> = scan_walker(dir.path(), ".nii").map(|p| p.unwrap()).collect();
        let without: Vec<_> = scan_walker(dir.path(), "nii").map(|p| p.unwrap()).collect();
        assert_eq!(with_dot, without);
        assert_eq!(with_dot.len(), 1);
    }

    #[test]
    fn test_empty_directory_yields_nothing() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(scan_walker(dir.path(), "nii").count(), 0);
    }
}
