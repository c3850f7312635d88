use serde::Deserialize;

use crate::error::{ReassemblyError, Result};

/// 默认分片大小：5 MiB，对齐对象存储分段下载的常见粒度。
pub const DEFAULT_PART_SIZE: u64 = 5 * 1024 * 1024;

/// 默认并发提示。
pub const DEFAULT_CONCURRENCY: usize = 5;

/// 单个分片允许的上限：5 GiB。
pub const MAX_PART_SIZE: u64 = 5 * 1024 * 1024 * 1024;

/// 并发提示的上限；空闲池与就绪队列的容量均由它派生。
pub const MAX_CONCURRENCY: usize = 1024;

/// 重组流配置。
///
/// # 教案式说明
/// - **意图（Why）**：将分片粒度、并发度与诊断开关外部化，使同一实现既能服务大对象分段下载，
///   也能在测试中以十几个字节的分片运行。
/// - **结构（How）**：
///   - `part_size`：每个逻辑分片的字节数，`offset / part_size` 即分片序号；
///   - `concurrency`：并发提示，决定空闲池容量（`concurrency`）与就绪队列容量（`concurrency * 2`）；
///   - `debug`：仅控制 `tracing::debug!` 诊断事件是否输出，不影响行为。
/// - **契约（What）**：构造读写两端前必须通过 [`ReassemblyConfig::validate`]；
///   [`crate::channel`] 会自动执行校验。
/// - **风险提示（Trade-offs）**：空闲池只限制“回收复用”的数量，并不限制分配总量；
///   同时在途的分片数超过池容量时会直接新分配缓冲。
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReassemblyConfig {
    pub part_size: u64,
    pub concurrency: usize,
    pub debug: bool,
}

impl Default for ReassemblyConfig {
    fn default() -> Self {
        Self {
            part_size: DEFAULT_PART_SIZE,
            concurrency: DEFAULT_CONCURRENCY,
            debug: false,
        }
    }
}

impl ReassemblyConfig {
    pub fn with_part_size(mut self, part_size: u64) -> Self {
        self.part_size = part_size;
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// 从 TOML 文本解析配置，缺省字段取默认值，解析后立即校验。
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: Self = toml::from_str(raw).map_err(|err| ReassemblyError::ConfigParse {
            reason: err.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// 校验字段取值。
    pub fn validate(&self) -> Result<()> {
        if self.part_size == 0 {
            return Err(invalid("part_size", "must be greater than zero"));
        }
        if self.part_size > MAX_PART_SIZE {
            return Err(invalid(
                "part_size",
                format!("must not exceed {MAX_PART_SIZE} bytes"),
            ));
        }
        if usize::try_from(self.part_size).is_err() {
            return Err(invalid("part_size", "does not fit the address space"));
        }
        if self.concurrency == 0 {
            return Err(invalid("concurrency", "must be at least 1"));
        }
        if self.concurrency > MAX_CONCURRENCY {
            return Err(invalid(
                "concurrency",
                format!("must not exceed {MAX_CONCURRENCY}"),
            ));
        }
        Ok(())
    }

    /// 写入偏移对应的分片序号。
    pub fn chunk_index(&self, offset: u64) -> u64 {
        offset / self.part_size
    }

    /// 空闲池可缓存的缓冲个数。
    pub fn free_pool_capacity(&self) -> usize {
        self.concurrency
    }

    /// 就绪队列容量，即背压阈值。
    pub fn ready_queue_capacity(&self) -> usize {
        self.concurrency.saturating_mul(2)
    }

    /// 新分配缓冲的预留容量。
    pub(crate) fn capacity_hint(&self) -> usize {
        usize::try_from(self.part_size).unwrap_or(usize::MAX)
    }
}

fn invalid(field: &'static str, reason: impl Into<String>) -> ReassemblyError {
    ReassemblyError::InvalidConfig {
        field,
        reason: reason.into(),
    }
}
