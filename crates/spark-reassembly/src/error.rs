//! # error 模块说明
//!
//! ## 角色定位（Why）
//! - 集中定义重组流对外暴露的全部失败语义：配置非法、单分片写入失败、流级关闭/中止；
//! - 为每个变体提供稳定错误码，便于调用方在日志与告警中做低基数聚合。
//!
//! ## 设计要求（What）
//! - 所有变体实现 `thiserror::Error`，且整体可 `Clone`，以便同一个终止错误被多个写入方与读取方共享；
//! - 通过 `From<ReassemblyError> for io::Error` 接入 `std::io::Read` 契约，原始错误可经
//!   `io::Error::get_ref` 向下转型取回。

use std::{error::Error as StdError, io, sync::Arc};

use thiserror::Error;

/// crate 级结果别名。
pub type Result<T, E = ReassemblyError> = core::result::Result<T, E>;

/// 生产者通过 `close_with_error` 注入的任意错误。
pub type SharedError = Arc<dyn StdError + Send + Sync + 'static>;

/// 重组流错误域。
///
/// # 教案式说明
/// - **意图 (Why)**：区分“单分片局部失败”与“流级终止”两类错误。前者只影响发起写入的调用方，
///   后者会被所有后续写入与读取观测到。
/// - **契约 (What)**：
///   - `CapacityOverflow`、`ChunkAlreadyPromoted` 仅返回给当次 `write_at` 调用，不影响其它分片；
///   - `Closed`、`Aborted`、`WritersDropped`、`ConsumerDropped` 为流级终止状态；
///   - `InvalidConfig`、`ConfigParse` 只会在构造阶段出现。
/// - **设计权衡 (Trade-offs)**：`Aborted` 以 `Arc` 保存调用方错误，牺牲一次堆分配换取可克隆性，
///   使读取方每次调用都能拿到同一个错误实例。
#[derive(Clone, Debug, Error)]
pub enum ReassemblyError {
    /// 配置字段取值非法。
    #[error("invalid reassembly config `{field}`: {reason}")]
    InvalidConfig { field: &'static str, reason: String },

    /// TOML 配置无法解析。
    #[error("failed to parse reassembly config: {reason}")]
    ConfigParse { reason: String },

    /// 追加后的分片长度超出单次分配可表示的范围（`isize::MAX`）。
    ///
    /// - **契约 (What)**：`chunk` 为目标分片序号，`len` 为追加前的长度，`additional` 为本次写入字节数；
    ///   失败时分片内容保持不变。
    /// - **风险提示 (Trade-offs)**：这是可表示性校验，不是内存耗尽处理；分配失败仍按标准库默认行为中止。
    #[error("chunk {chunk} cannot grow from {len} by {additional} bytes")]
    CapacityOverflow {
        chunk: u64,
        len: usize,
        additional: usize,
    },

    /// 目标分片已移交给读取方，不允许再写入。
    #[error("chunk {chunk} was already handed to the reader (cursor at {cursor})")]
    ChunkAlreadyPromoted { chunk: u64, cursor: u64 },

    /// 流已经正常关闭。
    #[error("reassembly stream is closed")]
    Closed,

    /// 生产者以错误终止了流。
    #[error("reassembly stream aborted: {source}")]
    Aborted {
        #[source]
        source: SharedError,
    },

    /// 所有写入句柄均在未关闭的情况下被释放。
    #[error("every writer was dropped before the stream was closed")]
    WritersDropped,

    /// 读取方已被释放，写入方无法继续推进。
    #[error("reader was dropped; no consumer is draining the stream")]
    ConsumerDropped,
}

impl ReassemblyError {
    /// 以任意错误构造 `Aborted`。
    pub fn aborted<E>(error: E) -> Self
    where
        E: Into<Box<dyn StdError + Send + Sync + 'static>>,
    {
        let boxed: Box<dyn StdError + Send + Sync + 'static> = error.into();
        Self::Aborted {
            source: Arc::from(boxed),
        }
    }

    /// `Aborted` 时返回调用方注入的原始错误，可直接向下转型为具体类型。
    pub fn aborted_source(&self) -> Option<&(dyn StdError + Send + Sync + 'static)> {
        match self {
            Self::Aborted { source } => Some(source.as_ref()),
            _ => None,
        }
    }

    /// 返回稳定错误码。
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidConfig { .. } => "spark.reassembly.invalid_config",
            Self::ConfigParse { .. } => "spark.reassembly.config_parse_failed",
            Self::CapacityOverflow { .. } => "spark.reassembly.capacity_overflow",
            Self::ChunkAlreadyPromoted { .. } => "spark.reassembly.chunk_already_promoted",
            Self::Closed => "spark.reassembly.closed",
            Self::Aborted { .. } => "spark.reassembly.aborted",
            Self::WritersDropped => "spark.reassembly.writers_dropped",
            Self::ConsumerDropped => "spark.reassembly.consumer_dropped",
        }
    }

    /// 是否为流级终止错误。
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Closed | Self::Aborted { .. } | Self::WritersDropped | Self::ConsumerDropped
        )
    }

    fn io_kind(&self) -> io::ErrorKind {
        match self {
            Self::InvalidConfig { .. } | Self::ConfigParse { .. } => io::ErrorKind::InvalidInput,
            Self::CapacityOverflow { .. } => io::ErrorKind::OutOfMemory,
            Self::ChunkAlreadyPromoted { .. } => io::ErrorKind::InvalidInput,
            Self::Closed | Self::ConsumerDropped => io::ErrorKind::BrokenPipe,
            Self::WritersDropped => io::ErrorKind::UnexpectedEof,
            Self::Aborted { .. } => io::ErrorKind::Other,
        }
    }
}

impl From<ReassemblyError> for io::Error {
    fn from(error: ReassemblyError) -> Self {
        io::Error::new(error.io_kind(), error)
    }
}
