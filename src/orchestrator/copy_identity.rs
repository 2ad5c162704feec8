use std::path::{Path, PathBuf};

use tracing::{info, warn};

use super::{SaveError, SaveOrchestrator, SavePhase};
use crate::datatypes::FieldValue;
use crate::editor::CharacterSession;
use crate::utils::{copy_dir_recursive, sanitize_identity, PatchError};

/// 角色复制结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopyReport {
    pub identity: String,
    pub target_dir: PathBuf,
    pub target_file: PathBuf,
    pub files_copied: usize,
    pub bytes_written: u64,
}

impl SaveOrchestrator {
    /// 把当前角色复制为新角色
    ///
    /// 整个角色目录原样复制，然后在副本的主存档上写出深拷贝的账本，
    /// 其中角色名字段被设置为新名字。源目录和源账本都不会被修改。
    ///
    /// # 错误
    /// - `Busy` / `GameRunning`：与保存相同的前置条件
    /// - `AlreadyExists`：目标目录已存在，不触碰任何文件
    /// - `CopyFailed`：名字无效、复制或写出失败（已创建的目标目录会被删除）
    pub fn copy_identity(&self, session: &CharacterSession, target_identity: &str) -> Result<CopyReport, SaveError> {
        let _guard = self.acquire()?;
        let result = self.run_copy(session, target_identity);
        self.set_phase(SavePhase::Idle);
        result
    }

    fn run_copy(&self, session: &CharacterSession, target_identity: &str) -> Result<CopyReport, SaveError> {
        let identity = sanitize_identity(target_identity).map_err(SaveError::CopyFailed)?;

        let source_dir = self.resolver.identity_dir(session.identity());
        let target_dir = self.resolver.identity_dir(&identity);
        if target_dir.symlink_metadata().is_ok() {
            warn!(target = %target_dir.display(), "copy refused: target exists");
            return Err(SaveError::AlreadyExists(target_dir));
        }

        // 先在副本账本上设置新名字，失败时还没有触碰文件系统
        let mut ledger = session.ledger().deep_clone();
        ledger
            .set(&self.identity_field, &FieldValue::Text(identity.clone()), true)
            .map_err(SaveError::CopyFailed)?;

        self.set_phase(SavePhase::Copying);
        let target_file = self.resolver.primary_file(&identity);
        let copied = copy_dir_recursive(&source_dir, &target_dir).and_then(|files_copied| {
            let mut buffer = self.reader.read(&target_file)?;
            let bytes_written = self.writer.write(&target_file, &mut buffer, &ledger)?;
            Ok((files_copied, bytes_written))
        });

        match copied {
            Ok((files_copied, bytes_written)) => {
                info!(
                    from = session.identity(),
                    to = %identity,
                    files_copied,
                    bytes_written,
                    "identity copied"
                );
                Ok(CopyReport {
                    identity,
                    target_dir,
                    target_file,
                    files_copied,
                    bytes_written,
                })
            }
            Err(PatchError::AlreadyExists(path)) => Err(SaveError::AlreadyExists(path)),
            Err(e) => {
                remove_partial_copy(&target_dir);
                Err(SaveError::CopyFailed(e))
            }
        }
    }
}

fn remove_partial_copy(target_dir: &Path) {
    if let Err(e) = std::fs::remove_dir_all(target_dir) {
        warn!(target = %target_dir.display(), error = %e, "failed to remove partial copy");
    }
}
