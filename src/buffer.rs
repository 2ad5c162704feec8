/// 存档原始字节缓冲区
///
/// 持有一个已加载存档的完整字节内容，内容不可变；
/// 读游标只在写出时向前移动。
#[derive(Debug, Clone)]
pub struct RawSaveBuffer {
    bytes: Vec<u8>,
    position: usize,
}

impl RawSaveBuffer {
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self { bytes, position: 0 }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// 当前读游标（相对源数据）
    pub fn position(&self) -> usize {
        self.position
    }

    pub fn rewind(&mut self) {
        self.position = 0;
    }

    /// 读取 `[position, offset)` 并把游标移到 `offset`
    ///
    /// `offset` 小于游标或超出缓冲区时返回 None，游标不变。
    pub fn read_to(&mut self, offset: usize) -> Option<&[u8]> {
        if offset < self.position || offset > self.bytes.len() {
            return None;
        }
        let start = self.position;
        self.position = offset;
        Some(&self.bytes[start..offset])
    }

    /// 跳过 `count` 个字节，不能越过末尾
    pub fn skip(&mut self, count: usize) -> Option<usize> {
        let next = self.position.checked_add(count)?;
        if next > self.bytes.len() {
            return None;
        }
        self.position = next;
        Some(next)
    }

    /// 读取游标之后的全部剩余字节，游标移到末尾
    pub fn read_remaining(&mut self) -> &[u8] {
        let start = self.position;
        self.position = self.bytes.len();
        &self.bytes[start..]
    }

    /// 按绝对位置取一段字节（不影响游标）
    pub fn slice(&self, offset: usize, length: usize) -> Option<&[u8]> {
        let end = offset.checked_add(length)?;
        self.bytes.get(offset..end)
    }
}
