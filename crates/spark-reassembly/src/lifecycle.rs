//! 流的终止状态机与错误哨兵。
//!
//! # 教案式说明
//! - **意图（Why）**：就绪队列关闭只能表达“不会再有分片”，无法说明是正常结束还是异常中止；
//!   读取方在队列排空后必须查询此处保存的终止原因，再决定返回 EOF 还是错误。
//! - **逻辑（How）**：单个 `AtomicU8` 表示状态，所有迁移均通过 `compare_exchange` 完成，
//!   第一个到达终态的调用者胜出；错误对象存放在 `Mutex<Option<_>>` 中，写入先于状态发布。
//! - **契约（What）**：
//!   - `Open → Closing → Closed`：正常关闭，读取方最终得到 EOF；
//!   - `Open | Closing → Aborted`：以错误关闭或所有写入句柄被释放，读取方排空后得到错误；
//!   - `Open | Closing → Detached`：读取方被释放，写入方得到 `ConsumerDropped`；
//!   - 进入 `Closed`/`Aborted`/`Detached` 后状态不再改变。

use std::sync::atomic::{AtomicU8, Ordering};

use parking_lot::Mutex;

use crate::error::{ReassemblyError, Result};

const OPEN: u8 = 0;
const CLOSING: u8 = 1;
const CLOSED: u8 = 2;
const ABORTED: u8 = 3;
const DETACHED: u8 = 4;

/// 对外可见的流状态。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StreamState {
    Open,
    Closing,
    Closed,
    Aborted,
    Detached,
}

#[derive(Debug)]
pub(crate) struct Lifecycle {
    state: AtomicU8,
    error: Mutex<Option<ReassemblyError>>,
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self {
            state: AtomicU8::new(OPEN),
            error: Mutex::new(None),
        }
    }
}

impl Lifecycle {
    pub(crate) fn state(&self) -> StreamState {
        match self.state.load(Ordering::Acquire) {
            OPEN => StreamState::Open,
            CLOSING => StreamState::Closing,
            CLOSED => StreamState::Closed,
            ABORTED => StreamState::Aborted,
            _ => StreamState::Detached,
        }
    }

    /// 写入前检查：仅 `Open` 状态允许写入。
    pub(crate) fn check_writable(&self) -> Result<()> {
        match self.state() {
            StreamState::Open => Ok(()),
            _ => Err(self.halted_error()),
        }
    }

    /// 写入方在就绪队列关闭后用于解释失败原因。
    pub(crate) fn halted_error(&self) -> ReassemblyError {
        match self.state() {
            StreamState::Aborted => self.stored_error(),
            StreamState::Detached => ReassemblyError::ConsumerDropped,
            _ => ReassemblyError::Closed,
        }
    }

    /// `Open → Closing`；返回 `Ok(false)` 表示已经正常关闭过。
    pub(crate) fn begin_close(&self) -> Result<bool> {
        match self
            .state
            .compare_exchange(OPEN, CLOSING, Ordering::AcqRel, Ordering::Acquire)
        {
            Ok(_) => Ok(true),
            Err(CLOSING | CLOSED) => Ok(false),
            Err(_) => Err(self.halted_error()),
        }
    }

    /// `Closing → Closed`；失败说明期间被中止或读取方离开。
    pub(crate) fn finish_close(&self) -> Result<()> {
        match self
            .state
            .compare_exchange(CLOSING, CLOSED, Ordering::AcqRel, Ordering::Acquire)
        {
            Ok(_) | Err(CLOSED) => Ok(()),
            Err(_) => Err(self.halted_error()),
        }
    }

    /// 以错误终止流；返回本次调用是否决定了终态。
    pub(crate) fn abort(&self, error: ReassemblyError) -> bool {
        let mut slot = self.error.lock();
        let mut current = self.state.load(Ordering::Acquire);
        loop {
            if current != OPEN && current != CLOSING {
                return false;
            }
            match self.state.compare_exchange_weak(
                current,
                ABORTED,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => {
                    *slot = Some(error);
                    return true;
                }
                Err(actual) => current = actual,
            }
        }
    }

    /// 读取方离开；返回本次调用是否改变了状态。
    pub(crate) fn detach(&self) -> bool {
        let mut current = self.state.load(Ordering::Acquire);
        loop {
            if current != OPEN && current != CLOSING {
                return false;
            }
            match self.state.compare_exchange_weak(
                current,
                DETACHED,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return true,
                Err(actual) => current = actual,
            }
        }
    }

    /// 读取方在就绪队列排空后调用：`None` 表示正常 EOF。
    pub(crate) fn terminal_error(&self) -> Option<ReassemblyError> {
        match self.state() {
            StreamState::Aborted => Some(self.stored_error()),
            _ => None,
        }
    }

    fn stored_error(&self) -> ReassemblyError {
        self.error.lock().clone().unwrap_or(ReassemblyError::Closed)
    }
}
