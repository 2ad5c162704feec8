/// 编辑器层模块
///
/// 该模块提供有状态的编辑接口。遵循"修改-保存分离"原则，
/// 所有修改操作仅记录在账本中，需要显式调用保存才会写入磁盘。
///
/// # 架构设计
///
/// - **field_map**: 外部解码得到的字段位置表
/// - **ledger**: 变更账本，记录待写入的字段修改
/// - **session**: 角色会话，独占一个存档缓冲区和它的账本
///
/// # 使用示例
///
/// ```rust,ignore
/// use save_patcher::{CharacterSession, FieldValue};
///
/// let mut session = CharacterSession::load(&reader, &resolver, "Hero", fields)?;
/// session.set("myPlayerName", &FieldValue::Text("Hero".into()), true)?;
/// println!("{}", session.summary());
/// ```
pub mod field_map;
pub mod ledger;
pub mod session;

// === 导出公共接口 ===
pub use field_map::{FieldDescriptor, FieldMap};
pub use ledger::{ChangeEntry, ChangeLedger};
pub use session::CharacterSession;
