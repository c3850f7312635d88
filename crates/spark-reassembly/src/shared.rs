use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::{
    chunk::ChunkBuffer,
    config::ReassemblyConfig,
    error::{ReassemblyError, Result},
    lifecycle::{Lifecycle, StreamState},
    pool::ChunkPool,
    queue::BoundedQueue,
    sequencer::{QueueClosed, Sequencer},
    stats::{Metrics, ReassemblyStats},
};

/// 读写两端共享的协调状态。
///
/// # 教案式说明
/// - **意图（Why）**：分片表与游标是唯一需要跨线程修改的状态，全部收敛到一把互斥锁之后；
///   缓冲本身在任一时刻只有一个所有者，无需逐块加锁。
/// - **逻辑（How）**：
///   - 写入：持锁完成“记录写入 + 扫描晋升”，推入就绪队列时若队列已满会持锁阻塞，
///     从而把所有写入方节流到读取方的消费速率；
///   - 正常关闭：持锁冲刷分片表，发布 `Closed` 后关闭就绪队列；
///   - 异常关闭/读取方离开：不取分片表锁（持锁的写入方可能正阻塞在就绪队列上），
///     先发布终态，再关闭就绪队列唤醒所有阻塞方。
#[derive(Debug)]
pub(crate) struct Shared {
    config: ReassemblyConfig,
    sequencer: Mutex<Sequencer>,
    pool: ChunkPool,
    pub(crate) ready: BoundedQueue<ChunkBuffer>,
    pub(crate) lifecycle: Lifecycle,
    pub(crate) metrics: Arc<Metrics>,
}

impl Shared {
    pub(crate) fn new(config: ReassemblyConfig) -> Self {
        let metrics = Arc::new(Metrics::default());
        let capacity_hint = config.capacity_hint();
        Self {
            sequencer: Mutex::new(Sequencer::new(capacity_hint)),
            pool: ChunkPool::new(
                config.free_pool_capacity(),
                capacity_hint,
                Arc::clone(&metrics),
            ),
            ready: BoundedQueue::new(config.ready_queue_capacity()),
            lifecycle: Lifecycle::default(),
            metrics,
            config,
        }
    }

    pub(crate) fn config(&self) -> &ReassemblyConfig {
        &self.config
    }

    pub(crate) fn state(&self) -> StreamState {
        self.lifecycle.state()
    }

    pub(crate) fn stats(&self) -> ReassemblyStats {
        self.metrics.snapshot()
    }

    pub(crate) fn write_at(&self, bytes: &[u8], offset: u64) -> Result<usize> {
        let index = self.config.chunk_index(offset);
        let mut sequencer = self.sequencer.lock();
        self.lifecycle.check_writable()?;

        let recorded = sequencer.record_write(index, bytes, &self.pool)?;
        self.metrics.on_write(recorded.written);
        if self.config.debug {
            debug!(
                chunk = index,
                offset,
                len = recorded.written,
                opened = recorded.opened,
                allocated = recorded.allocated,
                "writing chunk"
            );
        }

        sequencer
            .promote_complete(&self.ready, |chunk, len| self.on_promote(chunk, len))
            .map_err(|QueueClosed| self.lifecycle.halted_error())?;
        Ok(recorded.written)
    }

    pub(crate) fn close(&self) -> Result<()> {
        let mut sequencer = self.sequencer.lock();
        if !self.lifecycle.begin_close()? {
            return Ok(());
        }

        let finalized = sequencer
            .finalize(&self.ready, |chunk, len| self.on_promote(chunk, len))
            .map_err(|QueueClosed| self.lifecycle.halted_error())?;
        if finalized.stranded > 0 {
            self.metrics.on_stranded(finalized.stranded);
            warn!(
                gap_at = finalized.gap_at,
                stranded = finalized.stranded,
                "stream closed with a missing chunk; later chunks are not delivered"
            );
        }

        self.lifecycle.finish_close()?;
        self.ready.close();
        if self.config.debug {
            debug!(
                flushed = finalized.promoted,
                cursor = sequencer.cursor(),
                pending = sequencer.pending(),
                "stream closed"
            );
        }
        Ok(())
    }

    /// 以错误终止流；返回本次调用是否决定了终态。
    pub(crate) fn abort(&self, error: ReassemblyError) -> bool {
        let code = error.code();
        let decided = self.lifecycle.abort(error);
        if decided {
            self.ready.close();
            warn!(code, "stream aborted");
        }
        decided
    }

    pub(crate) fn detach(&self) {
        if self.lifecycle.detach() {
            debug!("reader dropped before end of stream");
        }
        self.ready.close();
    }

    /// 读取方交还一个已完全消费的分片。
    pub(crate) fn recycle(&self, buf: ChunkBuffer) {
        self.metrics.on_consume();
        let kept = self.pool.release(buf);
        if self.config.debug && !kept {
            debug!("free pool full, dropping drained buffer");
        }
    }

    fn on_promote(&self, chunk: u64, len: usize) {
        self.metrics.on_promote();
        if self.config.debug {
            debug!(chunk, len, "chunk ready");
        }
    }
}
