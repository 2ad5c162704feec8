/// 字段变更账本
///
/// 记录所有待写入的字段修改。每个字段在首次修改时，从字段表中取得
/// 其原始占用长度并登记到反向索引（偏移 → 原始长度），之后无论该字段
/// 被覆盖多少次都不再更新，写出时总是跳过源数据中原本占用的那一段。

use std::collections::{BTreeMap, HashMap};

use tracing::debug;

use super::field_map::FieldMap;
use crate::datatypes::FieldValue;
use crate::utils::PatchError;

/// 单个待写入的修改
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEntry {
    /// 绝对字节偏移
    pub offset: usize,
    /// 替换后的字节
    pub new_bytes: Vec<u8>,
    /// 该修改在源数据中替换掉的字节数
    pub original_length: usize,
}

impl ChangeEntry {
    /// 写出后长度变化量
    pub fn delta(&self) -> isize {
        self.new_bytes.len() as isize - self.original_length as isize
    }
}

/// 变更账本
///
/// # 实现细节
/// - `entries`：字段名 → 修改
/// - `original_lengths`：偏移 → 原始长度，只在首次写入时登记
/// - `offset_owners`：偏移 → 当前持有该偏移的字段，保证每个偏移至多一个有效修改
///
/// 账本不实现 `Clone`，复制只能通过 [`ChangeLedger::deep_clone`]。
#[derive(Debug)]
pub struct ChangeLedger {
    fields: FieldMap,
    entries: BTreeMap<String, ChangeEntry>,
    original_lengths: HashMap<usize, usize>,
    offset_owners: HashMap<usize, String>,
}

impl ChangeLedger {
    pub fn new(fields: FieldMap) -> Self {
        Self {
            fields,
            entries: BTreeMap::new(),
            original_lengths: HashMap::new(),
            offset_owners: HashMap::new(),
        }
    }

    /// 记录一个字段修改
    ///
    /// # 参数
    /// * `field` - 字段名（必须在字段表中）
    /// * `value` - 新值，按字段类型编码
    /// * `overwrite` - 字段已有修改时是否覆盖
    ///
    /// # 错误
    /// - `UnknownField`：字段表中没有该字段
    /// - `DuplicateEdit`：已有修改且 `overwrite` 为 false
    /// - `KindMismatch`：值无法按字段类型编码
    pub fn set(&mut self, field: &str, value: &FieldValue, overwrite: bool) -> Result<(), PatchError> {
        let descriptor = *self
            .fields
            .get(field)
            .ok_or_else(|| PatchError::UnknownField(field.to_string()))?;

        if !overwrite && self.entries.contains_key(field) {
            return Err(PatchError::DuplicateEdit(field.to_string()));
        }

        let encoded = value.encode(descriptor.kind).ok_or_else(|| PatchError::KindMismatch {
            field: field.to_string(),
            expected: descriptor.kind,
        })?;

        // 原始长度只在首次写入时登记
        let original_length = *self
            .original_lengths
            .entry(descriptor.offset)
            .or_insert(descriptor.length);

        // 同一偏移上只保留最后一次修改
        if let Some(previous_owner) = self.offset_owners.insert(descriptor.offset, field.to_string()) {
            if previous_owner != field {
                self.entries.remove(&previous_owner);
            }
        }

        debug!(
            field,
            offset = descriptor.offset,
            original_length,
            new_length = encoded.bytes.len(),
            "ledger edit recorded"
        );

        self.entries.insert(
            field.to_string(),
            ChangeEntry {
                offset: descriptor.offset,
                new_bytes: encoded.bytes,
                original_length,
            },
        );

        Ok(())
    }

    /// 当前待写入的字节
    pub fn get(&self, field: &str) -> Option<&[u8]> {
        self.entries.get(field).map(|entry| entry.new_bytes.as_slice())
    }

    pub fn entry(&self, field: &str) -> Option<&ChangeEntry> {
        self.entries.get(field)
    }

    /// 撤销单个字段的待写入修改
    ///
    /// 反向索引中登记的原始长度保留，源数据没有变化。
    pub fn remove(&mut self, field: &str) -> Option<ChangeEntry> {
        let entry = self.entries.remove(field)?;
        self.offset_owners.remove(&entry.offset);
        Some(entry)
    }

    /// 深拷贝
    ///
    /// 新账本持有所有字节序列的独立副本，之后任一方的修改对另一方不可见。
    pub fn deep_clone(&self) -> Self {
        Self {
            fields: self.fields.clone(),
            entries: self
                .entries
                .iter()
                .map(|(field, entry)| {
                    (
                        field.clone(),
                        ChangeEntry {
                            offset: entry.offset,
                            new_bytes: entry.new_bytes.to_vec(),
                            original_length: entry.original_length,
                        },
                    )
                })
                .collect(),
            original_lengths: self.original_lengths.clone(),
            offset_owners: self.offset_owners.clone(),
        }
    }

    /// 所有修改，按偏移升序
    pub fn entries(&self) -> Vec<(usize, &ChangeEntry)> {
        let mut entries: Vec<(usize, &ChangeEntry)> = self
            .entries
            .values()
            .map(|entry| (entry.offset, entry))
            .collect();
        entries.sort_by_key(|(offset, _)| *offset);
        entries
    }

    pub fn field_map(&self) -> &FieldMap {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 清空所有修改（包括原始长度登记）
    pub fn clear(&mut self) {
        self.entries.clear();
        self.original_lengths.clear();
        self.offset_owners.clear();
    }

    /// 写出后的总长度变化量
    pub fn total_delta(&self) -> isize {
        self.entries.values().map(ChangeEntry::delta).sum()
    }

    /// 生成变更摘要
    pub fn summary(&self) -> String {
        format!(
            "待写入修改: {}, 长度变化: {:+}",
            self.entries.len(),
            self.total_delta()
        )
    }
}

impl std::fmt::Display for ChangeEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[{:08X}] {} -> {} bytes",
            self.offset,
            self.original_length,
            self.new_bytes.len()
        )
    }
}
