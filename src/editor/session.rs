/// 角色会话模块
///
/// 一个会话独占一个已加载存档的缓冲区和它的变更账本。
/// 两者在加载角色时一起创建，切换角色或重置时一起丢弃。

use std::path::{Path, PathBuf};

use tracing::info;

use super::field_map::FieldMap;
use super::ledger::ChangeLedger;
use crate::buffer::RawSaveBuffer;
use crate::datatypes::FieldValue;
use crate::io::SaveReader;
use crate::paths::PathResolver;
use crate::utils::PatchError;

/// 角色会话
///
/// # 核心特性
/// - **Stateful**: 维护待写入的修改，多次修改后统一保存
/// - **隔离性**: 缓冲区和账本不在会话之间共享
///
/// # 使用示例
///
/// ```rust,ignore
/// let mut session = CharacterSession::load(&DefaultSaveReader, &resolver, "Hero", fields)?;
/// session.set("money", &FieldValue::Int(5000), true)?;
/// orchestrator.save(&mut session)?;
/// ```
#[derive(Debug)]
pub struct CharacterSession {
    identity: String,
    primary_path: PathBuf,
    buffer: RawSaveBuffer,
    ledger: ChangeLedger,
}

impl CharacterSession {
    /// 由已读入的缓冲区创建会话
    ///
    /// 字段表中的所有字段必须落在缓冲区之内。
    pub fn new(
        identity: impl Into<String>,
        primary_path: impl Into<PathBuf>,
        buffer: RawSaveBuffer,
        fields: FieldMap,
    ) -> Result<Self, PatchError> {
        fields.validate(buffer.len())?;
        Ok(Self {
            identity: identity.into(),
            primary_path: primary_path.into(),
            buffer,
            ledger: ChangeLedger::new(fields),
        })
    }

    /// 读取角色的主存档并创建会话
    pub fn load(
        reader: &dyn SaveReader,
        resolver: &dyn PathResolver,
        identity: &str,
        fields: FieldMap,
    ) -> Result<Self, PatchError> {
        let primary_path = resolver.primary_file(identity);
        let buffer = reader.read(&primary_path)?;
        info!(
            identity,
            path = %primary_path.display(),
            size = buffer.len(),
            fields = fields.len(),
            "character loaded"
        );
        Self::new(identity, primary_path, buffer, fields)
    }

    pub fn identity(&self) -> &str {
        &self.identity
    }

    pub fn primary_path(&self) -> &Path {
        &self.primary_path
    }

    pub fn buffer(&self) -> &RawSaveBuffer {
        &self.buffer
    }

    pub fn ledger(&self) -> &ChangeLedger {
        &self.ledger
    }

    /// 记录一个字段修改，见 [`ChangeLedger::set`]
    pub fn set(&mut self, field: &str, value: &FieldValue, overwrite: bool) -> Result<(), PatchError> {
        self.ledger.set(field, value, overwrite)
    }

    /// 字段在源数据中的当前值
    pub fn current_value(&self, field: &str) -> Option<FieldValue> {
        let desc = self.ledger.field_map().get(field)?;
        let bytes = self.buffer.slice(desc.offset, desc.length)?;
        FieldValue::decode(desc.kind, bytes)
    }

    /// 字段的待写入值
    pub fn pending_value(&self, field: &str) -> Option<FieldValue> {
        let desc = self.ledger.field_map().get(field)?;
        FieldValue::decode(desc.kind, self.ledger.get(field)?)
    }

    pub fn is_modified(&self) -> bool {
        !self.ledger.is_empty()
    }

    pub fn modified_count(&self) -> usize {
        self.ledger.len()
    }

    /// 丢弃所有待写入的修改
    pub fn reset(&mut self) {
        self.ledger.clear();
        self.buffer.rewind();
    }

    /// 写出时使用：缓冲区游标可变，账本只读
    pub(crate) fn write_parts(&mut self) -> (&Path, &mut RawSaveBuffer, &ChangeLedger) {
        (&self.primary_path, &mut self.buffer, &self.ledger)
    }

    /// 生成编辑摘要
    pub fn summary(&self) -> String {
        format!(
            "角色: {}, 修改状态: {}, {}",
            self.identity,
            if self.is_modified() { "已修改" } else { "未修改" },
            self.ledger.summary()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datatypes::{encode_wide_text, FieldKind};
    use crate::editor::field_map::FieldDescriptor;

    fn create_test_session() -> CharacterSession {
        let mut bytes = vec![0u8; 8];
        bytes.extend(encode_wide_text("Hero"));
        bytes.extend(7i32.to_le_bytes());
        let fields = FieldMap::new()
            .with_field("myPlayerName", FieldDescriptor::new(8, 12, FieldKind::WideText))
            .with_field("level", FieldDescriptor::new(20, 4, FieldKind::Int));
        CharacterSession::new(
            "Hero",
            "/saves/_Hero/Player.chr",
            RawSaveBuffer::from_bytes(bytes),
            fields,
        )
        .unwrap()
    }

    #[test]
    fn test_session_values() {
        let mut session = create_test_session();
        assert_eq!(
            session.current_value("myPlayerName"),
            Some(FieldValue::Text("Hero".to_string()))
        );
        assert_eq!(session.current_value("level"), Some(FieldValue::Int(7)));
        assert!(!session.is_modified());

        session.set("level", &FieldValue::Int(8), false).unwrap();
        assert_eq!(session.pending_value("level"), Some(FieldValue::Int(8)));
        assert_eq!(session.current_value("level"), Some(FieldValue::Int(7)));
        assert_eq!(session.modified_count(), 1);
        assert!(session.summary().contains("已修改"));
    }

    #[test]
    fn test_session_reset() {
        let mut session = create_test_session();
        session.set("level", &FieldValue::Int(8), false).unwrap();
        session.reset();
        assert!(!session.is_modified());
        assert!(session.pending_value("level").is_none());
    }

    #[test]
    fn test_session_rejects_out_of_range_fields() {
        let fields = FieldMap::new().with_field("x", FieldDescriptor::new(10, 4, FieldKind::Int));
        let result = CharacterSession::new("Hero", "Player.chr", RawSaveBuffer::from_bytes(vec![0; 12]), fields);
        assert!(matches!(result, Err(PatchError::EditOutOfBounds { .. })));
    }
}
