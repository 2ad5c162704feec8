//! 配置
//!
//! 所有字段都有默认值，JSON 中只需写出需要覆盖的部分。

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::utils::PatchError;

/// 默认备份目录名（位于存档根目录下）
pub const DEFAULT_BACKUP_DIRECTORY: &str = "SaveBackup";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// 存放所有角色目录的根目录
    pub save_root: PathBuf,
    /// 备份目录，未设置时为 `<save_root>/SaveBackup`
    pub backup_dir: Option<PathBuf>,
    /// 角色目录名前缀（角色 `Hero` 的目录为 `_Hero`）
    pub dir_prefix: String,
    /// 角色目录中的主存档文件名
    pub primary_file: String,
    /// 存放角色名的字段
    pub identity_field: String,
    /// 总是做完整备份
    pub always_full_backup: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            save_root: PathBuf::from("."),
            backup_dir: None,
            dir_prefix: "_".to_string(),
            primary_file: "Player.chr".to_string(),
            identity_field: "myPlayerName".to_string(),
            always_full_backup: false,
        }
    }
}

impl Config {
    pub fn with_save_root(save_root: impl Into<PathBuf>) -> Self {
        Self {
            save_root: save_root.into(),
            ..Self::default()
        }
    }

    /// 从 JSON 文件加载
    pub fn load(path: &Path) -> Result<Self, PatchError> {
        let json = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&json)?)
    }

    pub fn backup_root(&self) -> PathBuf {
        self.backup_dir
            .clone()
            .unwrap_or_else(|| self.save_root.join(DEFAULT_BACKUP_DIRECTORY))
    }
}
