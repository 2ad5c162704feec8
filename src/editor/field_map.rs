/// 字段表
///
/// 由外部解码阶段给出的 字段名 → (偏移, 原始长度, 类型) 映射。
/// 本模块不负责发现这些位置，只负责承载和校验。

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::datatypes::FieldKind;
use crate::utils::PatchError;

/// 单个字段在存档中的位置
///
/// 文本类字段的 `offset` 指向长度前缀，`length` 包含前缀和内容。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDescriptor {
    /// 绝对字节偏移
    pub offset: usize,
    /// 解码时该字段占用的字节数
    pub length: usize,
    /// 字段类型
    pub kind: FieldKind,
}

impl FieldDescriptor {
    pub fn new(offset: usize, length: usize, kind: FieldKind) -> Self {
        Self { offset, length, kind }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldMap {
    fields: BTreeMap<String, FieldDescriptor>,
}

impl FieldMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// 添加字段（同名字段会被替换）
    pub fn insert(&mut self, name: impl Into<String>, descriptor: FieldDescriptor) {
        self.fields.insert(name.into(), descriptor);
    }

    pub fn with_field(mut self, name: impl Into<String>, descriptor: FieldDescriptor) -> Self {
        self.insert(name, descriptor);
        self
    }

    pub fn get(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.get(name)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldDescriptor)> {
        self.fields.iter().map(|(name, desc)| (name.as_str(), desc))
    }

    /// 从 JSON 字符串解析
    pub fn from_json(json: &str) -> Result<Self, PatchError> {
        Ok(serde_json::from_str(json)?)
    }

    /// 从 JSON 文件加载
    pub fn load(path: &Path) -> Result<Self, PatchError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// 校验所有字段都落在缓冲区范围内
    ///
    /// 偏移必须在 `[0, buffer_len)` 内，且 `offset + length` 不超过末尾。
    pub fn validate(&self, buffer_len: usize) -> Result<(), PatchError> {
        for desc in self.fields.values() {
            let end = desc.offset.checked_add(desc.length);
            if desc.offset >= buffer_len || end.map_or(true, |end| end > buffer_len) {
                return Err(PatchError::EditOutOfBounds {
                    offset: desc.offset,
                    length: desc.length,
                    buffer_len,
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_json() {
        let json = r#"{
            "myPlayerName": {"offset": 16, "length": 12, "kind": "wide_text"},
            "money": {"offset": 40, "length": 4, "kind": "int"}
        }"#;
        let map = FieldMap::from_json(json).unwrap();
        assert_eq!(map.len(), 2);
        assert_eq!(
            map.get("myPlayerName"),
            Some(&FieldDescriptor::new(16, 12, FieldKind::WideText))
        );
        assert!(map.get("missing").is_none());
    }

    #[test]
    fn test_validate() {
        let map = FieldMap::new().with_field("a", FieldDescriptor::new(90, 10, FieldKind::Raw));
        assert!(map.validate(100).is_ok());
        assert!(map.validate(99).is_err());

        let map = FieldMap::new().with_field("b", FieldDescriptor::new(100, 0, FieldKind::Raw));
        assert!(matches!(
            map.validate(100),
            Err(PatchError::EditOutOfBounds { offset: 100, .. })
        ));
    }
}
