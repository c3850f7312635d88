use bytes::{Buf, BytesMut};

use crate::error::{ReassemblyError, Result};

/// 单个分片的字节累加器。
///
/// # 角色定位（Why）
/// - 写入侧只做追加：同一分片的多次写入按到达顺序拼接，不按分片内偏移定位；
/// - 读取侧从头部消费：已读字节立即丢弃，`remaining()` 归零即表示分片已被完全消费。
///
/// # 结构设计（How）
/// - 底层为 `BytesMut`，`advance` 只移动起始指针；
/// - [`ChunkBuffer::reset`] 先 `clear` 再 `reserve`，在缓冲唯一持有时 `BytesMut` 会把空间
///   挪回原分配的起点，因此回收后的缓冲保留原有容量而不必重新向堆申请。
///
/// # 契约（What）
/// - 任一时刻只属于空闲池、分片表、就绪队列或读取方之一，因此本类型不需要内部加锁。
#[derive(Debug)]
pub(crate) struct ChunkBuffer {
    data: BytesMut,
}

impl ChunkBuffer {
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Self {
            data: BytesMut::with_capacity(capacity),
        }
    }

    /// 追加写入，返回写入字节数。
    pub(crate) fn append(&mut self, chunk: u64, bytes: &[u8]) -> Result<usize> {
        let len = self.data.len();
        if !representable(len, bytes.len()) {
            return Err(ReassemblyError::CapacityOverflow {
                chunk,
                len,
                additional: bytes.len(),
            });
        }
        self.data.extend_from_slice(bytes);
        Ok(bytes.len())
    }

    /// 尚未被读取的字节数。
    pub(crate) fn remaining(&self) -> usize {
        self.data.len()
    }

    #[cfg(test)]
    pub(crate) fn capacity(&self) -> usize {
        self.data.capacity()
    }

    /// 当前可读切片。
    pub(crate) fn chunk(&self) -> &[u8] {
        &self.data
    }

    /// 丢弃头部 `amt` 字节，超出部分按剩余长度截断。
    pub(crate) fn advance(&mut self, amt: usize) {
        let amt = amt.min(self.data.len());
        self.data.advance(amt);
    }

    /// 复制到 `dst` 并消费，返回复制的字节数。
    pub(crate) fn read_into(&mut self, dst: &mut [u8]) -> usize {
        let n = dst.len().min(self.data.len());
        dst[..n].copy_from_slice(&self.data[..n]);
        self.data.advance(n);
        n
    }

    /// 清空内容并确保至少 `capacity` 字节的可写空间。
    pub(crate) fn reset(&mut self, capacity: usize) {
        self.data.clear();
        self.data.reserve(capacity);
    }
}

/// 追加后的长度能否作为单个分配表示（不超过 `isize::MAX`）。
///
/// 只校验可表示性；堆内存耗尽仍由分配器按默认方式中止进程。
fn representable(len: usize, additional: usize) -> bool {
    len.checked_add(additional)
        .is_some_and(|total| total <= isize::MAX as usize)
}
