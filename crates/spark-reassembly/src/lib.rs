//! `spark-reassembly` 把按偏移乱序、并发到达的分片写入重组为严格有序的顺序字节流。
//!
//! # 模块定位（Why）
//! - 分段下载（例如对象存储的多段并发拉取）天然产生“按偏移写入、完成顺序随机”的数据；
//!   下游的解码器、哈希器或文件写入器却只接受顺序流；
//! - 本 crate 位于两者之间：写入端实现按偏移写入的 [`WriteAt`]，读取端实现
//!   [`std::io::Read`] 与 [`std::io::BufRead`]，消费方无需了解分片。
//!
//! # 设计概要（How）
//! - `chunk`：基于 `BytesMut` 的分片累加器，追加写入、头部消费；
//! - `pool`：有界空闲池，复用已消费完的分片缓冲，未命中时直接新分配；
//! - `sequencer`：分片表 + 顺序游标，只在前序分片全部晋升后才晋升下一个完整分片；
//! - `queue`：有界阻塞队列，就绪队列的填充度即背压信号；
//! - `lifecycle`：终止状态机与错误哨兵，区分正常 EOF 与异常中止；
//! - `writer`/`reader`：对外的两端句柄，由 [`channel`] 成对创建。
//!
//! # 使用示例
//! ```
//! use std::io::Read;
//! use spark_reassembly::{ReassemblyConfig, channel};
//!
//! let config = ReassemblyConfig::default().with_part_size(4).with_concurrency(2);
//! let (writer, mut reader) = channel(config).expect("配置合法");
//! writer.write_at(b"efgh", 4).expect("写入分片 1");
//! writer.write_at(b"abcd", 0).expect("写入分片 0");
//! writer.write_at(b"ij", 8).expect("写入尾块");
//! writer.close().expect("关闭");
//!
//! let mut out = String::new();
//! reader.read_to_string(&mut out).expect("读取");
//! assert_eq!(out, "abcdefghij");
//! ```

mod chunk;
mod config;
mod error;
mod lifecycle;
mod pool;
pub mod queue;
mod reader;
mod sequencer;
mod shared;
mod stats;
mod writer;

use std::sync::Arc;

pub use config::{
    DEFAULT_CONCURRENCY, DEFAULT_PART_SIZE, MAX_CONCURRENCY, MAX_PART_SIZE, ReassemblyConfig,
};
pub use error::{ReassemblyError, Result, SharedError};
pub use lifecycle::StreamState;
pub use reader::ReassemblyReader;
pub use stats::ReassemblyStats;
pub use writer::{ReassemblyWriter, WriteAt};

use crate::shared::Shared;

/// 校验配置并创建一对读写句柄。
///
/// # 契约说明
/// - 写入端可克隆并跨线程共享；读取端唯一；
/// - 配置非法时返回 [`ReassemblyError::InvalidConfig`]。
pub fn channel(config: ReassemblyConfig) -> Result<(ReassemblyWriter, ReassemblyReader)> {
    config.validate()?;
    let shared = Arc::new(Shared::new(config));
    Ok((
        ReassemblyWriter::new(Arc::clone(&shared)),
        ReassemblyReader::new(shared),
    ))
}
