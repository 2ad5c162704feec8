//! 备份管理
//!
//! 在任何破坏性写入之前生成带时间戳的 zip 归档。归档名按小时取整：
//! `{identity}[-fullbackup]_{yyyyMMdd_HH}.zip`，同一小时内已有的非空归档
//! 不会被覆盖，再次调用直接复用。
//!
//! 归档先写入备份目录中的临时文件，成功后才改名为最终文件名，
//! 失败时临时文件随之删除。

use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use chrono::{Local, NaiveDateTime};
use tempfile::NamedTempFile;
use tracing::{debug, info};
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::utils::PatchError;

/// 备份范围
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackupMode {
    /// 整个角色目录
    Full,
    /// 只有主存档文件
    Incremental,
}

impl BackupMode {
    pub fn from_full(full: bool) -> Self {
        if full {
            BackupMode::Full
        } else {
            BackupMode::Incremental
        }
    }

    fn name_suffix(&self) -> &'static str {
        match self {
            BackupMode::Full => "-fullbackup",
            BackupMode::Incremental => "",
        }
    }
}

/// 备份结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackupOutcome {
    /// 新建了归档
    Created(PathBuf),
    /// 当前时间窗口内已有归档，未做任何写入
    Reused(PathBuf),
}

impl BackupOutcome {
    pub fn path(&self) -> &Path {
        match self {
            BackupOutcome::Created(path) | BackupOutcome::Reused(path) => path,
        }
    }
}

#[derive(Debug, Clone)]
pub struct BackupManager {
    backup_root: PathBuf,
}

impl BackupManager {
    pub fn new(backup_root: impl Into<PathBuf>) -> Self {
        Self {
            backup_root: backup_root.into(),
        }
    }

    pub fn backup_root(&self) -> &Path {
        &self.backup_root
    }

    /// 归档文件名（时间按小时取整）
    pub fn archive_name(identity: &str, mode: BackupMode, now: NaiveDateTime) -> String {
        format!(
            "{}{}_{}.zip",
            identity,
            mode.name_suffix(),
            now.format("%Y%m%d_%H")
        )
    }

    /// 以当前本地时间备份
    ///
    /// # 参数
    /// * `source` - 主存档文件，其父目录即角色目录
    /// * `identity` - 角色名
    /// * `mode` - 备份范围
    pub fn backup(&self, source: &Path, identity: &str, mode: BackupMode) -> Result<BackupOutcome, PatchError> {
        self.backup_at(source, identity, mode, Local::now().naive_local())
    }

    /// 以指定时间备份
    pub fn backup_at(
        &self,
        source: &Path,
        identity: &str,
        mode: BackupMode,
        now: NaiveDateTime,
    ) -> Result<BackupOutcome, PatchError> {
        let archive_path = self.backup_root.join(Self::archive_name(identity, mode, now));

        // 不覆盖已有的备份
        if let Ok(meta) = fs::metadata(&archive_path) {
            if meta.is_file() && meta.len() > 0 {
                info!(archive = %archive_path.display(), "backup already exists for this hour");
                return Ok(BackupOutcome::Reused(archive_path));
            }
        }

        self.ensure_backup_root()?;

        let identity_dir = source.parent().filter(|p| !p.as_os_str().is_empty()).ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidInput, format!("存档没有所在目录: {}", source.display()))
        })?;
        let dir_name = identity_dir
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .ok_or_else(|| {
                io::Error::new(io::ErrorKind::InvalidInput, format!("无效的角色目录: {}", identity_dir.display()))
            })?;

        let mut temp = NamedTempFile::new_in(&self.backup_root).map_err(|e| self.directory_error(e))?;
        {
            let mut zip = ZipWriter::new(temp.as_file_mut());
            match mode {
                BackupMode::Full => archive_tree(&mut zip, identity_dir, &dir_name)?,
                BackupMode::Incremental => archive_single(&mut zip, source, &dir_name)?,
            }
            zip.finish()?;
        }
        temp.as_file().sync_all()?;
        temp.persist(&archive_path).map_err(|e| PatchError::IoError(e.error))?;

        info!(archive = %archive_path.display(), ?mode, "backup created");
        Ok(BackupOutcome::Created(archive_path))
    }

    /// 创建备份目录并检查是否可写
    fn ensure_backup_root(&self) -> Result<(), PatchError> {
        fs::create_dir_all(&self.backup_root).map_err(|e| self.directory_error(e))?;
        let meta = fs::metadata(&self.backup_root).map_err(|e| self.directory_error(e))?;
        if !meta.is_dir() || meta.permissions().readonly() {
            return Err(PatchError::BackupDirectory {
                path: self.backup_root.clone(),
                reason: "备份目录不可写".to_string(),
            });
        }
        Ok(())
    }

    fn directory_error(&self, err: io::Error) -> PatchError {
        PatchError::BackupDirectory {
            path: self.backup_root.clone(),
            reason: err.to_string(),
        }
    }
}

fn file_options() -> SimpleFileOptions {
    SimpleFileOptions::default().compression_method(CompressionMethod::Deflated)
}

/// 归档内路径统一使用 `/` 分隔
fn archive_entry_name(dir_name: &str, relative: &Path) -> String {
    let mut name = dir_name.to_string();
    for component in relative.components() {
        name.push('/');
        name.push_str(&component.as_os_str().to_string_lossy());
    }
    name
}

/// 整个角色目录，路径以角色目录名为根
fn archive_tree(zip: &mut ZipWriter<&mut File>, identity_dir: &Path, dir_name: &str) -> Result<(), PatchError> {
    zip.add_directory(dir_name, file_options())?;

    let walk = WalkDir::new(identity_dir)
        .min_depth(1)
        .follow_links(false)
        .sort_by_file_name();

    for entry in walk {
        let entry = entry?;
        let Ok(relative) = entry.path().strip_prefix(identity_dir) else {
            continue;
        };
        let name = archive_entry_name(dir_name, relative);

        if entry.file_type().is_dir() {
            zip.add_directory(name, file_options())?;
        } else if entry.file_type().is_file() {
            debug!(entry = %name, "archiving file");
            zip.start_file(name, file_options())?;
            let mut file = File::open(entry.path())?;
            io::copy(&mut file, zip)?;
        }
    }

    Ok(())
}

/// 只有主存档，归档内路径为 `{角色目录名}/{文件名}`
fn archive_single(zip: &mut ZipWriter<&mut File>, source: &Path, dir_name: &str) -> Result<(), PatchError> {
    let file_name = source
        .file_name()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, format!("无效的存档路径: {}", source.display())))?;

    let mut file = File::open(source)?;
    zip.add_directory(dir_name, file_options())?;
    zip.start_file(archive_entry_name(dir_name, Path::new(file_name)), file_options())?;
    io::copy(&mut file, zip)?;
    Ok(())
}
