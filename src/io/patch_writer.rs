/// 拼接写出
///
/// 按偏移升序遍历账本：先原样复制 `[游标, 偏移)`，再写入新字节，
/// 然后把游标移到 `偏移 + 原始长度`（游标始终相对源数据）。
/// 最后复制剩余的 `[游标, 末尾)`。
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use tracing::{debug, info};

use super::traits::SaveWriter;
use crate::buffer::RawSaveBuffer;
use crate::editor::{ChangeEntry, ChangeLedger};
use crate::utils::PatchError;

/// 默认的拼接写入器
#[derive(Debug, Clone, Default)]
pub struct SplicePatchWriter;

impl SaveWriter for SplicePatchWriter {
    fn write(
        &self,
        target: &Path,
        buffer: &mut RawSaveBuffer,
        ledger: &ChangeLedger,
    ) -> Result<u64, PatchError> {
        // 先完整校验，避免在目标文件被截断之后才发现重叠
        let entries = plan(buffer.len(), ledger)?;

        let file = File::create(target)?;
        let mut out = BufWriter::new(file);
        let written = write_spliced(&mut out, buffer, &entries)?;

        let file = out.into_inner().map_err(|e| e.into_error())?;
        file.sync_all()?;

        info!(
            target = %target.display(),
            edits = entries.len(),
            source_len = buffer.len(),
            written,
            "save written"
        );
        Ok(written)
    }
}

/// 在内存中生成拼接结果
pub fn splice(buffer: &mut RawSaveBuffer, ledger: &ChangeLedger) -> Result<Vec<u8>, PatchError> {
    let entries = plan(buffer.len(), ledger)?;
    let expected = (buffer.len() as isize + ledger.total_delta()).max(0) as usize;
    let mut out = Vec::with_capacity(expected);
    write_spliced(&mut out, buffer, &entries)?;
    Ok(out)
}

/// 排序并校验所有修改
///
/// 偏移落在游标之前（与前一个修改重叠）返回 `EditOverlap`，
/// 替换范围越过缓冲区末尾返回 `EditOutOfBounds`。
fn plan(buffer_len: usize, ledger: &ChangeLedger) -> Result<Vec<&ChangeEntry>, PatchError> {
    let mut cursor = 0usize;
    let mut entries = Vec::with_capacity(ledger.len());

    for (offset, entry) in ledger.entries() {
        if offset < cursor {
            return Err(PatchError::EditOverlap { offset, cursor });
        }
        let end = offset
            .checked_add(entry.original_length)
            .filter(|end| offset < buffer_len && *end <= buffer_len)
            .ok_or(PatchError::EditOutOfBounds {
                offset,
                length: entry.original_length,
                buffer_len,
            })?;

        debug!(
            offset,
            original_length = entry.original_length,
            new_length = entry.new_bytes.len(),
            "splice segment"
        );
        cursor = end;
        entries.push(entry);
    }

    Ok(entries)
}

fn write_spliced<W: Write>(
    out: &mut W,
    buffer: &mut RawSaveBuffer,
    entries: &[&ChangeEntry],
) -> Result<u64, PatchError> {
    buffer.rewind();
    let mut written = 0u64;

    for entry in entries {
        let cursor = buffer.position();
        let verbatim = buffer
            .read_to(entry.offset)
            .ok_or(PatchError::EditOverlap { offset: entry.offset, cursor })?;
        out.write_all(verbatim)?;
        written += verbatim.len() as u64;

        out.write_all(&entry.new_bytes)?;
        written += entry.new_bytes.len() as u64;

        let buffer_len = buffer.len();
        buffer.skip(entry.original_length).ok_or(PatchError::EditOutOfBounds {
            offset: entry.offset,
            length: entry.original_length,
            buffer_len,
        })?;
    }

    let rest = buffer.read_remaining();
    out.write_all(rest)?;
    written += rest.len() as u64;

    out.flush()?;
    buffer.rewind();
    Ok(written)
}
