pub mod backup;
pub mod buffer;
pub mod config;
pub mod datatypes;
pub mod editor;
pub mod io;
pub mod orchestrator;
pub mod paths;
pub mod state;
pub mod utils;

// 重新导出主要结构
pub use backup::{BackupManager, BackupMode, BackupOutcome};
pub use buffer::RawSaveBuffer;
pub use config::Config;
pub use datatypes::{EncodedValue, FieldKind, FieldValue};
pub use editor::{ChangeEntry, ChangeLedger, CharacterSession, FieldDescriptor, FieldMap};
pub use orchestrator::{CopyReport, SaveError, SaveOrchestrator, SavePhase, SaveReport};
pub use paths::{DirectoryResolver, PathResolver};
pub use state::SharedState;
pub use utils::{sanitize_identity, PatchError};
