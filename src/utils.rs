use thiserror::Error;
use std::path::{Path, PathBuf};
use tracing::debug;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

use crate::datatypes::FieldKind;

/// 自定义错误类型
#[derive(Error, Debug)]
pub enum PatchError {
    #[error("Field already has a pending edit: {0}")]
    DuplicateEdit(String),

    #[error("Overlapping edits: entry at offset {offset} starts before cursor {cursor}")]
    EditOverlap { offset: usize, cursor: usize },

    #[error("Edit at offset {offset} (length {length}) exceeds buffer of {buffer_len} bytes")]
    EditOutOfBounds {
        offset: usize,
        length: usize,
        buffer_len: usize,
    },

    #[error("Unknown field: {0}")]
    UnknownField(String),

    #[error("Field {field} is {expected:?}, value is not encodable as that kind")]
    KindMismatch { field: String, expected: FieldKind },

    #[error("Invalid identity: {0:?}")]
    InvalidIdentity(String),

    #[error("Target already exists: {0}")]
    AlreadyExists(PathBuf),

    #[error("Backup directory error at {path}: {reason}")]
    BackupDirectory { path: PathBuf, reason: String },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Archive error: {0}")]
    ArchiveError(#[from] zip::result::ZipError),

    #[error("Directory walk error: {0}")]
    WalkError(#[from] walkdir::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

/// 目录名中不允许出现的字符
const FORBIDDEN_IDENTITY_CHARS: &[char] = &['\\', '/', ':', '*', '?', '"', '<', '>', '|', ';'];

/// 清理角色名，去除不能出现在目录名里的字符
///
/// 码位大于 0xFF 的字符先去掉重音（`Ō` → `O`），其余字符过滤非法字符和控制字符。
/// 结果为空白时返回 `InvalidIdentity`。
pub fn sanitize_identity(raw: &str) -> Result<String, PatchError> {
    let cleaned: String = raw
        .chars()
        .filter_map(|c| {
            if u32::from(c) > 0xFF {
                strip_accent(c)
            } else if FORBIDDEN_IDENTITY_CHARS.contains(&c) || c.is_control() {
                None
            } else {
                Some(c)
            }
        })
        .collect();

    if cleaned.trim().is_empty() {
        return Err(PatchError::InvalidIdentity(raw.to_string()));
    }

    Ok(cleaned)
}

/// NFD 分解后的第一个基字符；本身就是组合符号时返回 None
fn strip_accent(c: char) -> Option<char> {
    std::iter::once(c).nfd().find(|d| !is_combining_mark(*d))
}

/// 递归复制目录，返回复制的文件数
///
/// 目标目录不能已存在；符号链接不复制。
pub fn copy_dir_recursive(src: &Path, dest: &Path) -> Result<usize, PatchError> {
    if dest.symlink_metadata().is_ok() {
        return Err(PatchError::AlreadyExists(dest.to_path_buf()));
    }
    std::fs::create_dir_all(dest)?;

    let mut copied = 0;
    for entry in walkdir::WalkDir::new(src).min_depth(1).follow_links(false) {
        let entry = entry?;
        let Ok(rel_path) = entry.path().strip_prefix(src) else {
            continue;
        };
        let new_path = dest.join(rel_path);

        if entry.file_type().is_dir() {
            std::fs::create_dir_all(&new_path)?;
        } else if entry.file_type().is_file() {
            if let Some(parent) = new_path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::copy(entry.path(), &new_path)?;
            copied += 1;
        } else {
            debug!(path = %entry.path().display(), "skipping non-regular file");
        }
    }

    Ok(copied)
}
