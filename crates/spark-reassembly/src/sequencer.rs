use std::collections::{BTreeMap, btree_map::Entry};

use crate::{
    chunk::ChunkBuffer,
    error::{ReassemblyError, Result},
    pool::ChunkPool,
    queue::BoundedQueue,
};

/// 就绪队列已关闭，晋升中止。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct QueueClosed;

/// 一次 `record_write` 的结果。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct RecordedWrite {
    pub(crate) written: usize,
    /// 本次写入是否新建了分片条目。
    pub(crate) opened: bool,
    /// 新建条目时缓冲是否为新分配。
    pub(crate) allocated: bool,
}

/// 关闭时冲刷的结果。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Finalized {
    pub(crate) promoted: usize,
    /// 因序号缺口滞留在分片表中的分片数。
    pub(crate) stranded: usize,
    /// 第一个缺失的分片序号（即冲刷结束时的游标）。
    pub(crate) gap_at: u64,
}

/// 分片表与顺序游标。
///
/// # 教案式说明
/// - **意图（Why）**：写入方并发地按偏移写入不同分片，读取方只能按序号递增消费；
///   `Sequencer` 负责在两者之间维持“严格按序晋升”的不变量。
/// - **逻辑（How）**：
///   - `chunks` 以序号为键保存所有进行中或已完成但尚未晋升的分片；
///   - 每次写入后 [`Sequencer::promote_complete`] 从游标开始扫描，遇到长度达到 `part_size`
///     的分片就移出表并推入就绪队列，游标加一；遇到缺失或未完成的分片即停止；
///   - 关闭时 [`Sequencer::finalize`] 不再检查完整性，只要序号连续存在就全部晋升，
///     从而冲刷末尾不足一个分片的尾块。
/// - **契约（What）**：
///   - 游标始终等于尚未晋升的最小序号，且单调不减；
///   - 已晋升的分片不会再被写入：目标序号小于游标的写入返回
///     [`ReassemblyError::ChunkAlreadyPromoted`]；
///   - 调用方需持有外层互斥锁，推入就绪队列可能阻塞（背压）。
/// - **风险提示（Trade-offs）**：关闭时若存在序号缺口，缺口之后的分片不会被交付且不报错，
///   只在 [`Finalized::stranded`] 中体现；保证序号从 0 连续是生产者的责任。
#[derive(Debug)]
pub(crate) struct Sequencer {
    chunks: BTreeMap<u64, ChunkBuffer>,
    cursor: u64,
    part_size: usize,
}

impl Sequencer {
    pub(crate) fn new(part_size: usize) -> Self {
        Self {
            chunks: BTreeMap::new(),
            cursor: 0,
            part_size,
        }
    }

    pub(crate) fn cursor(&self) -> u64 {
        self.cursor
    }

    pub(crate) fn pending(&self) -> usize {
        self.chunks.len()
    }

    /// 将 `bytes` 追加到分片 `index`，首次命中时向池租借缓冲。
    pub(crate) fn record_write(
        &mut self,
        index: u64,
        bytes: &[u8],
        pool: &ChunkPool,
    ) -> Result<RecordedWrite> {
        if index < self.cursor {
            return Err(ReassemblyError::ChunkAlreadyPromoted {
                chunk: index,
                cursor: self.cursor,
            });
        }

        let mut opened = false;
        let mut allocated = false;
        let buf = self.chunks.entry(index).or_insert_with(|| {
            let (buf, fresh) = pool.acquire();
            opened = true;
            allocated = fresh;
            buf
        });
        let written = buf.append(index, bytes)?;
        Ok(RecordedWrite {
            written,
            opened,
            allocated,
        })
    }

    /// 晋升从游标开始连续完成的分片，返回晋升数量。
    pub(crate) fn promote_complete(
        &mut self,
        ready: &BoundedQueue<ChunkBuffer>,
        on_promote: impl FnMut(u64, usize),
    ) -> core::result::Result<usize, QueueClosed> {
        self.promote(ready, false, on_promote)
    }

    /// 关闭时冲刷：晋升从游标开始连续存在的全部分片，无论是否完整。
    pub(crate) fn finalize(
        &mut self,
        ready: &BoundedQueue<ChunkBuffer>,
        on_promote: impl FnMut(u64, usize),
    ) -> core::result::Result<Finalized, QueueClosed> {
        let promoted = self.promote(ready, true, on_promote)?;
        Ok(Finalized {
            promoted,
            stranded: self.chunks.len(),
            gap_at: self.cursor,
        })
    }

    fn promote(
        &mut self,
        ready: &BoundedQueue<ChunkBuffer>,
        flush: bool,
        mut on_promote: impl FnMut(u64, usize),
    ) -> core::result::Result<usize, QueueClosed> {
        let mut promoted = 0;
        loop {
            let buf = match self.chunks.entry(self.cursor) {
                Entry::Occupied(entry) if flush || entry.get().remaining() >= self.part_size => {
                    entry.remove()
                }
                _ => return Ok(promoted),
            };
            let index = self.cursor;
            self.cursor += 1;
            on_promote(index, buf.remaining());
            ready.push(buf).map_err(|_| QueueClosed)?;
            promoted += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::stats::Metrics;

    const PART: usize = 4;

    fn fixture() -> (Sequencer, ChunkPool, BoundedQueue<ChunkBuffer>) {
        let pool = ChunkPool::new(2, PART, Arc::new(Metrics::default()));
        (Sequencer::new(PART), pool, BoundedQueue::new(16))
    }

    fn drain(ready: &BoundedQueue<ChunkBuffer>) -> Vec<u8> {
        let mut out = Vec::new();
        while let Some(buf) = ready.try_pop() {
            out.extend_from_slice(buf.chunk());
        }
        out
    }

    #[test]
    fn out_of_order_chunks_promote_in_index_order() {
        let (mut seq, pool, ready) = fixture();
        seq.record_write(2, b"CCCC", &pool).expect("写入分片 2");
        seq.record_write(1, b"BBBB", &pool).expect("写入分片 1");
        assert_eq!(seq.promote_complete(&ready, |_, _| {}), Ok(0));
        assert_eq!(seq.cursor(), 0, "分片 0 缺失时游标不得前进");

        seq.record_write(0, b"AAAA", &pool).expect("写入分片 0");
        let mut order = Vec::new();
        let promoted = seq
            .promote_complete(&ready, |index, _| order.push(index))
            .expect("就绪队列未关闭");
        assert_eq!(promoted, 3);
        assert_eq!(order, vec![0, 1, 2]);
        assert_eq!(seq.cursor(), 3);
        assert_eq!(seq.pending(), 0);
        assert_eq!(drain(&ready), b"AAAABBBBCCCC");
    }

    #[test]
    fn incomplete_chunk_blocks_later_complete_chunks() {
        let (mut seq, pool, ready) = fixture();
        seq.record_write(0, b"AA", &pool).expect("写入前半段");
        seq.record_write(1, b"BBBB", &pool).expect("写入分片 1");
        assert_eq!(seq.promote_complete(&ready, |_, _| {}), Ok(0));

        seq.record_write(0, b"AA", &pool).expect("追加后半段");
        assert_eq!(seq.promote_complete(&ready, |_, _| {}), Ok(2));
        assert_eq!(drain(&ready), b"AAAABBBB");
    }

    #[test]
    fn write_below_cursor_is_rejected() {
        let (mut seq, pool, ready) = fixture();
        seq.record_write(0, b"AAAA", &pool).expect("写入分片 0");
        seq.promote_complete(&ready, |_, _| {}).expect("晋升");
        let err = seq
            .record_write(0, b"late", &pool)
            .expect_err("已晋升的分片不可再写");
        assert!(matches!(
            err,
            ReassemblyError::ChunkAlreadyPromoted {
                chunk: 0,
                cursor: 1
            }
        ));
    }

    #[test]
    fn record_write_reports_opened_and_allocated() {
        let (mut seq, pool, _ready) = fixture();
        let first = seq.record_write(5, b"xy", &pool).expect("首次写入");
        assert!(first.opened && first.allocated);
        assert_eq!(first.written, 2);
        let second = seq.record_write(5, b"z", &pool).expect("追加写入");
        assert!(!second.opened && !second.allocated);
    }

    #[test]
    fn finalize_flushes_short_tail() {
        let (mut seq, pool, ready) = fixture();
        seq.record_write(0, b"AAAA", &pool).expect("写入分片 0");
        seq.record_write(1, b"BB", &pool).expect("写入尾块");
        seq.promote_complete(&ready, |_, _| {}).expect("晋升");

        let finalized = seq.finalize(&ready, |_, _| {}).expect("冲刷");
        assert_eq!(finalized.promoted, 1);
        assert_eq!(finalized.stranded, 0);
        assert_eq!(drain(&ready), b"AAAABB");
    }

    #[test]
    fn finalize_stops_at_gap() {
        let (mut seq, pool, ready) = fixture();
        for index in [0u64, 1, 3] {
            seq.record_write(index, b"XXXX", &pool).expect("写入");
        }
        seq.promote_complete(&ready, |_, _| {}).expect("晋升");
        let finalized = seq.finalize(&ready, |_, _| {}).expect("冲刷");
        assert_eq!(finalized.promoted, 0);
        assert_eq!(finalized.stranded, 1);
        assert_eq!(finalized.gap_at, 2);
        assert_eq!(drain(&ready).len(), 8);
    }

    #[test]
    fn closed_ready_queue_halts_promotion() {
        let (mut seq, pool, ready) = fixture();
        ready.close();
        seq.record_write(0, b"AAAA", &pool).expect("写入分片 0");
        assert_eq!(seq.promote_complete(&ready, |_, _| {}), Err(QueueClosed));
    }
}
