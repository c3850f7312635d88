use std::sync::atomic::{AtomicU64, Ordering};

/// 重组流的统计快照。
///
/// # 教案式说明
/// - **意图（Why）**：分配次数是判断空闲池是否生效的核心指标，
///   若 `allocated_buffers` 随分片数线性增长，说明读取方过慢或池容量不足。
/// - **契约（What）**：各字段为单调递增的累计值，读取时采用 `Relaxed` 语义，
///   快照之间不保证跨字段一致。
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ReassemblyStats {
    /// 新分配的缓冲数。
    pub allocated_buffers: u64,
    /// 从空闲池复用的缓冲数。
    pub reused_buffers: u64,
    /// 被消费完毕后成功放回空闲池的缓冲数。
    pub recycled_buffers: u64,
    /// 空闲池已满而被丢弃的缓冲数。
    pub discarded_buffers: u64,
    /// 进入就绪队列的分片数。
    pub promoted_chunks: u64,
    /// 被读取方完全消费的分片数。
    pub consumed_chunks: u64,
    /// 关闭时因序号缺口而未能交付的分片数。
    pub stranded_chunks: u64,
    pub bytes_written: u64,
    pub bytes_read: u64,
}

#[derive(Debug, Default)]
pub(crate) struct Metrics {
    allocated_buffers: AtomicU64,
    reused_buffers: AtomicU64,
    recycled_buffers: AtomicU64,
    discarded_buffers: AtomicU64,
    promoted_chunks: AtomicU64,
    consumed_chunks: AtomicU64,
    stranded_chunks: AtomicU64,
    bytes_written: AtomicU64,
    bytes_read: AtomicU64,
}

impl Metrics {
    pub(crate) fn on_allocate(&self) {
        self.allocated_buffers.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn on_reuse(&self) {
        self.reused_buffers.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn on_recycle(&self) {
        self.recycled_buffers.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn on_discard(&self) {
        self.discarded_buffers.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn on_promote(&self) {
        self.promoted_chunks.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn on_consume(&self) {
        self.consumed_chunks.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn on_stranded(&self, count: usize) {
        self.stranded_chunks
            .fetch_add(count as u64, Ordering::Relaxed);
    }

    pub(crate) fn on_write(&self, bytes: usize) {
        self.bytes_written.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    pub(crate) fn on_read(&self, bytes: usize) {
        self.bytes_read.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> ReassemblyStats {
        ReassemblyStats {
            allocated_buffers: self.allocated_buffers.load(Ordering::Relaxed),
            reused_buffers: self.reused_buffers.load(Ordering::Relaxed),
            recycled_buffers: self.recycled_buffers.load(Ordering::Relaxed),
            discarded_buffers: self.discarded_buffers.load(Ordering::Relaxed),
            promoted_chunks: self.promoted_chunks.load(Ordering::Relaxed),
            consumed_chunks: self.consumed_chunks.load(Ordering::Relaxed),
            stranded_chunks: self.stranded_chunks.load(Ordering::Relaxed),
            bytes_written: self.bytes_written.load(Ordering::Relaxed),
            bytes_read: self.bytes_read.load(Ordering::Relaxed),
        }
    }
}
