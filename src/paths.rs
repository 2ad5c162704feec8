//! 路径解析
//!
//! 角色名 → 角色目录 / 主存档文件 / 备份目录。

use std::path::PathBuf;

use crate::config::Config;

pub trait PathResolver {
    /// 角色目录
    fn identity_dir(&self, identity: &str) -> PathBuf;

    /// 角色目录中的主存档文件
    fn primary_file(&self, identity: &str) -> PathBuf;

    /// 备份归档存放目录
    fn backup_root(&self) -> PathBuf;
}

/// 基于配置的默认目录布局：`<save_root>/<prefix><identity>/<primary_file>`
#[derive(Debug, Clone)]
pub struct DirectoryResolver {
    save_root: PathBuf,
    backup_root: PathBuf,
    dir_prefix: String,
    primary_file: String,
}

impl DirectoryResolver {
    pub fn from_config(config: &Config) -> Self {
        Self {
            save_root: config.save_root.clone(),
            backup_root: config.backup_root(),
            dir_prefix: config.dir_prefix.clone(),
            primary_file: config.primary_file.clone(),
        }
    }
}

impl PathResolver for DirectoryResolver {
    fn identity_dir(&self, identity: &str) -> PathBuf {
        self.save_root.join(format!("{}{}", self.dir_prefix, identity))
    }

    fn primary_file(&self, identity: &str) -> PathBuf {
        self.identity_dir(identity).join(&self.primary_file)
    }

    fn backup_root(&self) -> PathBuf {
        self.backup_root.clone()
    }
}
