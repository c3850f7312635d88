use std::{error::Error as StdError, io, sync::Arc};

use crate::{
    config::ReassemblyConfig,
    error::{ReassemblyError, Result},
    lifecycle::StreamState,
    shared::Shared,
    stats::ReassemblyStats,
};

/// 按偏移写入的生产者契约。
///
/// # 教案式说明
/// - **意图（Why）**：分段下载器只关心“把这段字节写到某个偏移”，
///   通过该 trait 可以在落盘文件与内存重组流之间无缝切换。
/// - **契约（What）**：`&self` 接收者意味着实现必须允许多线程并发调用；
///   返回值为本次写入的字节数。
pub trait WriteAt {
    fn write_at(&self, buf: &[u8], offset: u64) -> io::Result<usize>;
}

impl<T: WriteAt + ?Sized> WriteAt for &T {
    fn write_at(&self, buf: &[u8], offset: u64) -> io::Result<usize> {
        (**self).write_at(buf, offset)
    }
}

impl<T: WriteAt + ?Sized> WriteAt for Arc<T> {
    fn write_at(&self, buf: &[u8], offset: u64) -> io::Result<usize> {
        (**self).write_at(buf, offset)
    }
}

#[cfg(unix)]
impl WriteAt for std::fs::File {
    fn write_at(&self, buf: &[u8], offset: u64) -> io::Result<usize> {
        std::os::unix::fs::FileExt::write_at(self, buf, offset)
    }
}

/// 重组流的写入端，可克隆后分发给多个下载线程。
///
/// # 教案式说明
/// - **意图（Why）**：每个下载线程持有一份句柄，按 `offset` 写入自己负责的分片，
///   无需了解其它线程的进度。
/// - **逻辑（How）**：全部克隆共享同一个 `WriterHandle`；最后一份句柄被释放时，
///   若流仍未关闭，则以 [`ReassemblyError::WritersDropped`] 中止，避免读取方永久阻塞。
/// - **契约（What）**：
///   - 同一分片的多次写入必须按追加顺序到达，分片内偏移不会被用于定位；
///   - 关闭前生产者需保证分片序号从 0 起连续，否则缺口之后的分片不会被交付；
///   - 写入完成一个分片且就绪队列已满时，调用会阻塞直至读取方消费。
#[derive(Clone, Debug)]
pub struct ReassemblyWriter {
    handle: Arc<WriterHandle>,
}

#[derive(Debug)]
struct WriterHandle {
    shared: Arc<Shared>,
}

impl Drop for WriterHandle {
    fn drop(&mut self) {
        self.shared.abort(ReassemblyError::WritersDropped);
    }
}

impl ReassemblyWriter {
    pub(crate) fn new(shared: Arc<Shared>) -> Self {
        Self {
            handle: Arc::new(WriterHandle { shared }),
        }
    }

    fn shared(&self) -> &Shared {
        &self.handle.shared
    }

    /// 将 `buf` 追加到 `offset / part_size` 对应的分片，并晋升所有已就绪的分片。
    ///
    /// # 契约说明
    /// - 成功时返回 `buf.len()`；
    /// - 单分片失败（如 [`ReassemblyError::CapacityOverflow`]）只影响本次调用；
    /// - 流已终止时返回对应的终止错误。
    pub fn write_at(&self, buf: &[u8], offset: u64) -> Result<usize> {
        self.shared().write_at(buf, offset)
    }

    /// 正常关闭：冲刷分片表中连续存在的分片（包括不足一个分片的尾块），随后发出 EOF。
    ///
    /// 重复调用直接返回 `Ok(())`；若流已被中止则返回对应错误。
    pub fn close(&self) -> Result<()> {
        self.shared().close()
    }

    /// 以错误关闭流。
    ///
    /// # 契约说明
    /// - 已进入就绪队列的分片仍会被读取方消费，随后每次读取都返回该错误而非 EOF；
    /// - 分片表中尚未晋升的数据被丢弃；
    /// - 返回 `true` 表示本次调用决定了流的终态，流已正常关闭或已被中止时返回 `false`。
    pub fn close_with_error<E>(&self, error: E) -> bool
    where
        E: Into<Box<dyn StdError + Send + Sync + 'static>>,
    {
        self.shared().abort(ReassemblyError::aborted(error))
    }

    pub fn state(&self) -> StreamState {
        self.shared().state()
    }

    pub fn stats(&self) -> ReassemblyStats {
        self.shared().stats()
    }

    pub fn config(&self) -> &ReassemblyConfig {
        self.shared().config()
    }
}

impl WriteAt for ReassemblyWriter {
    fn write_at(&self, buf: &[u8], offset: u64) -> io::Result<usize> {
        ReassemblyWriter::write_at(self, buf, offset).map_err(io::Error::from)
    }
}
