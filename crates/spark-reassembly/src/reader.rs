use std::{
    io::{self, BufRead, Read},
    sync::Arc,
};

use tracing::debug;

use crate::{
    chunk::ChunkBuffer, error::Result, lifecycle::StreamState, shared::Shared,
    stats::ReassemblyStats,
};

/// 重组流的读取端：唯一消费者，按分片序号递增顺序输出字节。
///
/// # 教案式说明
/// - **意图（Why）**：把并发、乱序的分片写入还原为标准的 [`Read`]/[`BufRead`] 流，
///   解码器、哈希器或文件写入器可直接消费，无需理解分片。
/// - **逻辑（How）**：
///   - `current` 为正在消费的分片，读空后交还空闲池，再阻塞等待就绪队列中的下一个分片；
///   - 就绪队列关闭且排空后查询终止状态：正常关闭返回 `Ok(0)`，异常中止返回错误；
///   - 长度为 0 的分片直接跳过，不会被误报为 EOF。
/// - **契约（What）**：
///   - 类型不可克隆，`read` 需要 `&mut self`，单消费者约束由所有权保证；
///   - 以错误关闭时，已晋升的分片仍先被读出，之后每次读取都返回同一错误；
///   - 读取端被释放时关闭就绪队列，阻塞中的写入方将得到
///     [`crate::ReassemblyError::ConsumerDropped`]。
/// - **风险提示（Trade-offs）**：没有内建超时；写入方迟迟不完成当前分片时，读取会一直阻塞，
///   需要取消能力的调用方应在外层自行设定超时。
#[derive(Debug)]
pub struct ReassemblyReader {
    shared: Arc<Shared>,
    current: Option<ChunkBuffer>,
    next_chunk: u64,
}

impl ReassemblyReader {
    pub(crate) fn new(shared: Arc<Shared>) -> Self {
        Self {
            shared,
            current: None,
            next_chunk: 0,
        }
    }

    pub fn state(&self) -> StreamState {
        self.shared.state()
    }

    pub fn stats(&self) -> ReassemblyStats {
        self.shared.stats()
    }

    /// 确保 `current` 中有未读字节；`Ok(false)` 表示正常 EOF。
    fn next_readable(&mut self) -> Result<bool> {
        loop {
            if self
                .current
                .as_ref()
                .is_some_and(|buf| buf.remaining() > 0)
            {
                return Ok(true);
            }
            if let Some(drained) = self.current.take() {
                self.shared.recycle(drained);
            }

            match self.shared.ready.pop() {
                Some(buf) => {
                    if self.shared.config().debug {
                        debug!(chunk = self.next_chunk, len = buf.remaining(), "reading chunk");
                    }
                    self.next_chunk += 1;
                    self.current = Some(buf);
                }
                None => {
                    return match self.shared.lifecycle.terminal_error() {
                        Some(err) => Err(err),
                        None => Ok(false),
                    };
                }
            }
        }
    }
}

impl Read for ReassemblyReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        if !self.next_readable()? {
            return Ok(0);
        }
        let n = self
            .current
            .as_mut()
            .map_or(0, |chunk| chunk.read_into(buf));
        self.shared.metrics.on_read(n);
        Ok(n)
    }
}

impl BufRead for ReassemblyReader {
    fn fill_buf(&mut self) -> io::Result<&[u8]> {
        if !self.next_readable()? {
            return Ok(&[]);
        }
        Ok(self
            .current
            .as_ref()
            .map(ChunkBuffer::chunk)
            .unwrap_or_default())
    }

    fn consume(&mut self, amt: usize) {
        if let Some(chunk) = self.current.as_mut() {
            let amt = amt.min(chunk.remaining());
            chunk.advance(amt);
            self.shared.metrics.on_read(amt);
        }
    }
}

impl Drop for ReassemblyReader {
    fn drop(&mut self) {
        self.shared.detach();
    }
}
