/// IO 抽象层 - trait 定义
///
/// 该模块定义了存档读写的抽象接口，支持依赖注入和测试 mock。

use std::path::Path;

use crate::buffer::RawSaveBuffer;
use crate::editor::ChangeLedger;
use crate::utils::PatchError;

/// 存档读取 trait
///
/// # 职责
/// - 把存档文件完整读入内存
/// - 不负责解析，仅负责 IO
pub trait SaveReader {
    /// 读取存档的原始数据
    ///
    /// # 参数
    /// * `path` - 文件路径
    fn read(&self, path: &Path) -> Result<RawSaveBuffer, PatchError>;
}

/// 存档写入 trait
///
/// # 职责
/// - 把源缓冲区与账本中的修改合并写入目标文件
/// - 账本只读；缓冲区只有读游标会移动
pub trait SaveWriter {
    /// 写出存档
    ///
    /// # 参数
    /// * `target` - 目标文件路径
    /// * `buffer` - 源数据
    /// * `ledger` - 待写入的修改
    ///
    /// # 返回
    /// 写出的字节数
    fn write(
        &self,
        target: &Path,
        buffer: &mut RawSaveBuffer,
        ledger: &ChangeLedger,
    ) -> Result<u64, PatchError>;
}
