//! 保存流程
//!
//! 状态机：`Idle → BackingUp → Writing → Idle`。
//! 进入 `BackingUp` 之前依次检查：已有流程在执行（`Busy`）、
//! 游戏正在运行（`GameRunning`），两者都不产生任何文件系统访问。
//! 备份失败时不会进入 `Writing`；写出失败时目标文件状态不确定，
//! 此前生成的备份是唯一的恢复手段。不做自动重试。

mod copy_identity;

pub use copy_identity::CopyReport;

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use thiserror::Error;
use tracing::{error, info, warn};

use crate::backup::{BackupManager, BackupMode, BackupOutcome};
use crate::config::Config;
use crate::editor::CharacterSession;
use crate::io::{DefaultSaveReader, SaveReader, SaveWriter, SplicePatchWriter};
use crate::paths::{DirectoryResolver, PathResolver};
use crate::state::{SaveGuard, SharedState};
use crate::utils::PatchError;

/// 流程阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SavePhase {
    Idle,
    BackingUp,
    Writing,
    Copying,
}

/// 流程的终止错误，每种对应一条面向用户的提示
#[derive(Error, Debug)]
pub enum SaveError {
    #[error("Another save is already in progress")]
    Busy,

    #[error("Refusing to write while the game is running")]
    GameRunning,

    #[error("Target identity already exists: {0}")]
    AlreadyExists(PathBuf),

    #[error("Backup failed: {0}")]
    BackupFailed(#[source] PatchError),

    #[error("Write failed: {0}")]
    WriteFailed(#[source] PatchError),

    #[error("Copy failed: {0}")]
    CopyFailed(#[source] PatchError),
}

impl SaveError {
    /// 面向用户的提示
    pub fn user_message(&self) -> &'static str {
        match self {
            SaveError::Busy => "正在保存，请稍候再试",
            SaveError::GameRunning => "游戏正在运行，请先退出游戏再保存",
            SaveError::AlreadyExists(_) => "目标角色目录已存在，已取消复制",
            SaveError::BackupFailed(_) => "备份失败，存档未被修改",
            SaveError::WriteFailed(_) => "保存失败，可以从备份目录恢复存档",
            SaveError::CopyFailed(_) => "复制角色失败",
        }
    }
}

/// 一次成功保存的结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveReport {
    pub backup: BackupOutcome,
    pub target: PathBuf,
    pub bytes_written: u64,
}

/// 保存流程编排
///
/// 持有共享状态、路径解析、备份管理和读写器。
/// 读写器通过 trait 注入，测试中可以替换。
pub struct SaveOrchestrator {
    state: Arc<SharedState>,
    resolver: Box<dyn PathResolver + Send + Sync>,
    backups: BackupManager,
    reader: Box<dyn SaveReader + Send + Sync>,
    writer: Box<dyn SaveWriter + Send + Sync>,
    backup_mode: BackupMode,
    identity_field: String,
    phase: Mutex<SavePhase>,
}

impl SaveOrchestrator {
    pub fn from_config(config: &Config, state: Arc<SharedState>) -> Self {
        let resolver = DirectoryResolver::from_config(config);
        Self {
            state,
            backups: BackupManager::new(resolver.backup_root()),
            resolver: Box::new(resolver),
            reader: Box::new(DefaultSaveReader),
            writer: Box::new(SplicePatchWriter),
            backup_mode: BackupMode::from_full(config.always_full_backup),
            identity_field: config.identity_field.clone(),
            phase: Mutex::new(SavePhase::Idle),
        }
    }

    pub fn with_writer(mut self, writer: Box<dyn SaveWriter + Send + Sync>) -> Self {
        self.writer = writer;
        self
    }

    pub fn with_reader(mut self, reader: Box<dyn SaveReader + Send + Sync>) -> Self {
        self.reader = reader;
        self
    }

    /// 替换路径解析，备份目录随之改为解析器给出的位置
    pub fn with_resolver(mut self, resolver: Box<dyn PathResolver + Send + Sync>) -> Self {
        self.backups = BackupManager::new(resolver.backup_root());
        self.resolver = resolver;
        self
    }

    pub fn with_backup_mode(mut self, mode: BackupMode) -> Self {
        self.backup_mode = mode;
        self
    }

    pub fn state(&self) -> &Arc<SharedState> {
        &self.state
    }

    pub fn resolver(&self) -> &dyn PathResolver {
        self.resolver.as_ref()
    }

    pub fn reader(&self) -> &dyn SaveReader {
        self.reader.as_ref()
    }

    pub fn backup_mode(&self) -> BackupMode {
        self.backup_mode
    }

    /// 当前阶段
    pub fn phase(&self) -> SavePhase {
        self.phase.lock().map(|p| *p).unwrap_or(SavePhase::Idle)
    }

    fn set_phase(&self, phase: SavePhase) {
        if let Ok(mut current) = self.phase.lock() {
            info!(from = ?*current, to = ?phase, "save phase");
            *current = phase;
        }
    }

    /// 检查前置条件并占用写入标志
    ///
    /// 两个标志都在占用之前读取，被拒绝的尝试不持有写入标志；占用后再检查一次游戏状态。
    fn acquire(&self) -> Result<SaveGuard<'_>, SaveError> {
        if self.state.save_in_progress() {
            warn!("save refused: another sequence is running");
            return Err(SaveError::Busy);
        }
        if self.state.game_running() {
            warn!("save refused: game is running");
            return Err(SaveError::GameRunning);
        }
        let guard = self.state.try_begin_save().ok_or_else(|| {
            warn!("save refused: another sequence is running");
            SaveError::Busy
        })?;
        if self.state.game_running() {
            warn!("save refused: game is running");
            return Err(SaveError::GameRunning);
        }
        Ok(guard)
    }

    /// 备份后写出
    pub fn save(&self, session: &mut CharacterSession) -> Result<SaveReport, SaveError> {
        let _guard = self.acquire()?;
        let result = self.run_save(session);
        self.set_phase(SavePhase::Idle);

        match &result {
            Ok(report) => info!(identity = session.identity(), bytes = report.bytes_written, "save completed"),
            Err(e) => error!(identity = session.identity(), error = %e, "save failed"),
        }
        result
    }

    fn run_save(&self, session: &mut CharacterSession) -> Result<SaveReport, SaveError> {
        self.set_phase(SavePhase::BackingUp);
        let backup = self
            .backups
            .backup(session.primary_path(), session.identity(), self.backup_mode)
            .map_err(SaveError::BackupFailed)?;

        self.set_phase(SavePhase::Writing);
        let (target, buffer, ledger) = session.write_parts();
        let bytes_written = self
            .writer
            .write(target, buffer, ledger)
            .map_err(SaveError::WriteFailed)?;

        Ok(SaveReport {
            backup,
            target: target.to_path_buf(),
            bytes_written,
        })
    }

    /// 只做备份（与保存相同的前置条件）
    pub fn backup_only(&self, session: &CharacterSession) -> Result<BackupOutcome, SaveError> {
        let _guard = self.acquire()?;
        self.set_phase(SavePhase::BackingUp);
        let result = self
            .backups
            .backup(session.primary_path(), session.identity(), self.backup_mode)
            .map_err(SaveError::BackupFailed);
        self.set_phase(SavePhase::Idle);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::RawSaveBuffer;
    use crate::datatypes::{FieldKind, FieldValue};
    use crate::editor::{ChangeLedger, FieldDescriptor, FieldMap};
    use std::path::Path;
    use tempfile::TempDir;

    struct FailingWriter;

    impl SaveWriter for FailingWriter {
        fn write(&self, _: &Path, _: &mut RawSaveBuffer, _: &ChangeLedger) -> Result<u64, PatchError> {
            Err(PatchError::IoError(std::io::Error::new(std::io::ErrorKind::Other, "disk full")))
        }
    }

    fn setup() -> (TempDir, Config, CharacterSession) {
        let temp = TempDir::new().unwrap();
        let config = Config::with_save_root(temp.path());
        let dir = temp.path().join("_Hero");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("Player.chr"), vec![0u8; 32]).unwrap();

        let fields = FieldMap::new().with_field("money", FieldDescriptor::new(8, 4, FieldKind::Int));
        let resolver = DirectoryResolver::from_config(&config);
        let session = CharacterSession::load(&DefaultSaveReader, &resolver, "Hero", fields).unwrap();
        (temp, config, session)
    }

    #[test]
    fn test_save_backs_up_then_writes() {
        let (temp, config, mut session) = setup();
        let orchestrator = SaveOrchestrator::from_config(&config, Arc::new(SharedState::new()));
        session.set("money", &FieldValue::Int(0x01020304), false).unwrap();

        let report = orchestrator.save(&mut session).unwrap();
        assert!(matches!(report.backup, BackupOutcome::Created(_)));
        assert!(report.backup.path().starts_with(temp.path().join("SaveBackup")));
        assert_eq!(report.bytes_written, 32);

        let written = std::fs::read(temp.path().join("_Hero/Player.chr")).unwrap();
        assert_eq!(&written[8..12], &[4, 3, 2, 1]);
        assert_eq!(orchestrator.phase(), SavePhase::Idle);
        assert!(!orchestrator.state().save_in_progress());
    }

    #[test]
    fn test_busy_when_save_in_progress() {
        let (temp, config, mut session) = setup();
        let state = Arc::new(SharedState::new());
        let orchestrator = SaveOrchestrator::from_config(&config, Arc::clone(&state));

        let _held = state.try_begin_save().unwrap();
        let result = orchestrator.save(&mut session);
        assert!(matches!(result, Err(SaveError::Busy)));
        assert!(!temp.path().join("SaveBackup").exists());
    }

    #[test]
    fn test_refuses_while_game_running() {
        let (temp, config, mut session) = setup();
        let state = Arc::new(SharedState::new());
        state.set_game_running(true);
        let orchestrator = SaveOrchestrator::from_config(&config, Arc::clone(&state));

        let result = orchestrator.save(&mut session);
        assert!(matches!(result, Err(SaveError::GameRunning)));
        assert!(!temp.path().join("SaveBackup").exists());
        assert!(!state.save_in_progress());
    }

    #[test]
    fn test_backup_failure_skips_write() {
        let (temp, mut config, mut session) = setup();
        let blocker = temp.path().join("blocker");
        std::fs::write(&blocker, b"file").unwrap();
        config.backup_dir = Some(blocker.join("SaveBackup"));

        let orchestrator = SaveOrchestrator::from_config(&config, Arc::new(SharedState::new()));
        session.set("money", &FieldValue::Int(7), false).unwrap();

        let result = orchestrator.save(&mut session);
        assert!(matches!(result, Err(SaveError::BackupFailed(PatchError::BackupDirectory { .. }))));
        assert_eq!(std::fs::read(temp.path().join("_Hero/Player.chr")).unwrap(), vec![0u8; 32]);
        assert!(!orchestrator.state().save_in_progress());
    }

    #[test]
    fn test_write_failure_keeps_backup() {
        let (_temp, config, mut session) = setup();
        let orchestrator = SaveOrchestrator::from_config(&config, Arc::new(SharedState::new()))
            .with_writer(Box::new(FailingWriter));

        let result = orchestrator.save(&mut session);
        let err = result.unwrap_err();
        assert!(matches!(err, SaveError::WriteFailed(_)));
        assert_eq!(err.user_message(), "保存失败，可以从备份目录恢复存档");

        let backups: Vec<_> = std::fs::read_dir(config.backup_root()).unwrap().collect();
        assert_eq!(backups.len(), 1);
        assert!(!orchestrator.state().save_in_progress());
        assert_eq!(orchestrator.phase(), SavePhase::Idle);
    }

    #[test]
    fn test_full_backup_mode_from_config() {
        let (_temp, mut config, session) = setup();
        config.always_full_backup = true;
        let orchestrator = SaveOrchestrator::from_config(&config, Arc::new(SharedState::new()));
        assert_eq!(orchestrator.backup_mode(), BackupMode::Full);

        let outcome = orchestrator.backup_only(&session).unwrap();
        let name = outcome.path().file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("Hero-fullbackup_"));
    }

    /// 备份统一放到另一个目录的布局
    struct SeparateBackupResolver {
        inner: DirectoryResolver,
        backup_root: PathBuf,
    }

    impl PathResolver for SeparateBackupResolver {
        fn identity_dir(&self, identity: &str) -> PathBuf {
            self.inner.identity_dir(identity)
        }

        fn primary_file(&self, identity: &str) -> PathBuf {
            self.inner.primary_file(identity)
        }

        fn backup_root(&self) -> PathBuf {
            self.backup_root.clone()
        }
    }

    #[test]
    fn test_resolver_backup_root_receives_archive() {
        let (temp, config, mut session) = setup();
        let backup_root = temp.path().join("elsewhere");
        let resolver = SeparateBackupResolver {
            inner: DirectoryResolver::from_config(&config),
            backup_root: backup_root.clone(),
        };
        let orchestrator = SaveOrchestrator::from_config(&config, Arc::new(SharedState::new()))
            .with_resolver(Box::new(resolver));

        let report = orchestrator.save(&mut session).unwrap();
        assert!(report.backup.path().starts_with(&backup_root));
        assert_eq!(std::fs::read_dir(&backup_root).unwrap().count(), 1);
        assert!(!config.backup_root().exists());
    }

    #[test]
    fn test_game_running_refusals_never_report_busy() {
        let (_temp, config, session) = setup();
        let state = Arc::new(SharedState::new());
        state.set_game_running(true);
        let orchestrator = SaveOrchestrator::from_config(&config, Arc::clone(&state));

        std::thread::scope(|scope| {
            for _ in 0..8 {
                scope.spawn(|| {
                    for _ in 0..200 {
                        let result = orchestrator.backup_only(&session);
                        assert!(matches!(result, Err(SaveError::GameRunning)));
                    }
                });
            }
        });
        assert!(!state.save_in_progress());
    }
}
