/// IO 抽象层模块
///
/// 该模块提供了存档读写的抽象接口，遵循依赖倒置原则。
/// 保存流程通过 trait 使用读写器，测试中可以替换为会失败的实现。
///
/// # 架构设计
///
/// - **traits**: 定义 SaveReader/SaveWriter trait 接口
/// - **save_io**: 基于文件系统的默认读取实现
/// - **patch_writer**: 拼接写出（只替换账本中记录的字节段）
///
/// # 使用示例
///
/// ```rust,ignore
/// use save_patcher::io::{DefaultSaveReader, SaveReader, SaveWriter, SplicePatchWriter};
///
/// let mut buffer = DefaultSaveReader.read(Path::new("_Hero/Player.chr"))?;
/// SplicePatchWriter.write(Path::new("_Hero/Player.chr"), &mut buffer, &ledger)?;
/// ```
pub mod traits;
pub mod save_io;
pub mod patch_writer;

// === 导出 trait 定义 ===
pub use traits::{SaveReader, SaveWriter};

// === 导出默认实现 ===
pub use save_io::DefaultSaveReader;
pub use patch_writer::{splice, SplicePatchWriter};
