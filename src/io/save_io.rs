/// 存档 IO 实现
///
/// 提供基于文件系统的默认存档读取实现
use std::path::Path;

use super::traits::SaveReader;
use crate::buffer::RawSaveBuffer;
use crate::utils::PatchError;

/// 默认的存档读取器（基于 std::fs）
#[derive(Debug, Clone, Default)]
pub struct DefaultSaveReader;

impl SaveReader for DefaultSaveReader {
    fn read(&self, path: &Path) -> Result<RawSaveBuffer, PatchError> {
        let bytes = std::fs::read(path)?;
        Ok(RawSaveBuffer::from_bytes(bytes))
    }
}
