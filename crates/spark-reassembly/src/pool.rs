use std::sync::Arc;

use crate::{
    chunk::ChunkBuffer,
    queue::{BoundedQueue, TryPushError},
    stats::Metrics,
};

/// `ChunkPool` 复用已被完全消费的分片缓冲，降低大分片反复分配带来的抖动。
///
/// # 模块角色（Why）
/// - 写入方第一次命中某个分片序号时向池租借缓冲；读取方消费完一个分片后归还；
/// - 池只决定“复用还是新分配”，不参与顺序控制。
///
/// # 核心机制（How）
/// - 内部是容量为 `concurrency` 的 [`BoundedQueue`]，租借用 `try_pop`，归还用 `try_push`，
///   两侧都不阻塞；
/// - 租借未命中时直接按 `part_size` 预留容量新建缓冲，并通过 [`Metrics`] 记录分配次数；
/// - 归还时队列已满则丢弃该缓冲，交由分配器释放。
///
/// # 契约说明（What）
/// - **后置条件**：`acquire` 返回的缓冲长度为 0，可写空间不小于 `capacity_hint`；
/// - **前置条件**：`release` 只接受已被完全消费的缓冲。
///
/// # 设计权衡（Trade-offs）
/// - 分配总量不设上限：同时在途的分片数超过池容量时仍会新分配，保证写入方不因池耗尽而阻塞；
///   内存上限由就绪队列的背压间接约束。
#[derive(Debug)]
pub(crate) struct ChunkPool {
    free: BoundedQueue<ChunkBuffer>,
    capacity_hint: usize,
    metrics: Arc<Metrics>,
}

impl ChunkPool {
    pub(crate) fn new(capacity: usize, capacity_hint: usize, metrics: Arc<Metrics>) -> Self {
        Self {
            free: BoundedQueue::new(capacity),
            capacity_hint,
            metrics,
        }
    }

    /// 租借一个空缓冲，返回值第二项表示是否为新分配。
    pub(crate) fn acquire(&self) -> (ChunkBuffer, bool) {
        match self.free.try_pop() {
            Some(mut buf) => {
                buf.reset(self.capacity_hint);
                self.metrics.on_reuse();
                (buf, false)
            }
            None => {
                self.metrics.on_allocate();
                (ChunkBuffer::with_capacity(self.capacity_hint), true)
            }
        }
    }

    /// 归还缓冲；返回 `false` 表示池已满、缓冲被丢弃。
    pub(crate) fn release(&self, buf: ChunkBuffer) -> bool {
        debug_assert_eq!(buf.remaining(), 0, "只能归还已被完全消费的缓冲");
        match self.free.try_push(buf) {
            Ok(()) => {
                self.metrics.on_recycle();
                true
            }
            Err(TryPushError::Full(_) | TryPushError::Closed(_)) => {
                self.metrics.on_discard();
                false
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn idle(&self) -> usize {
        self.free.len()
    }
}
