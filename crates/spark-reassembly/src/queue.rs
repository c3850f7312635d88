//! 有界阻塞队列。
//!
//! # 教案式说明
//! - **意图（Why）**：生产者与唯一消费者之间的交接（就绪队列）以及缓冲回收（空闲池）都需要
//!   “有界 + 可阻塞 + 可关闭”的队列；关闭后只表达“不会再有新元素”，不携带任何负载，
//!   终止原因由 [`crate::lifecycle`] 单独保存。
//! - **逻辑（How）**：`parking_lot::Mutex<VecDeque<T>>` 保存元素，`not_empty` 与 `not_full`
//!   两个条件变量分别唤醒等待中的消费者与生产者；`close` 同时唤醒两侧。
//! - **契约（What）**：
//!   - `push` 在队列满时阻塞，关闭后立即返回 `Err(item)` 归还元素；
//!   - `pop` 在队列空时阻塞，关闭后先排空剩余元素，再返回 `None`；
//!   - `try_push`/`try_pop` 从不阻塞。
//! - **风险提示（Trade-offs）**：所有操作共享一把锁，适合低频的整块交接，不适合逐字节传递。

use std::collections::VecDeque;

use parking_lot::{Condvar, Mutex};

/// `try_push` 的失败原因，均归还原始元素。
#[derive(Debug, PartialEq, Eq)]
pub enum TryPushError<T> {
    Full(T),
    Closed(T),
}

impl<T> TryPushError<T> {
    pub fn into_inner(self) -> T {
        match self {
            Self::Full(item) | Self::Closed(item) => item,
        }
    }
}

#[derive(Debug)]
struct QueueState<T> {
    items: VecDeque<T>,
    closed: bool,
}

/// 有界、可关闭的阻塞队列。
#[derive(Debug)]
pub struct BoundedQueue<T> {
    state: Mutex<QueueState<T>>,
    not_empty: Condvar,
    not_full: Condvar,
    capacity: usize,
}

impl<T> BoundedQueue<T> {
    /// 创建容量为 `capacity` 的队列，容量至少为 1；容量只是逻辑上限，不预先分配。
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            state: Mutex::new(QueueState {
                items: VecDeque::new(),
                closed: false,
            }),
            not_empty: Condvar::new(),
            not_full: Condvar::new(),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.state.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().items.is_empty()
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    /// 阻塞入队；队列已关闭时归还元素。
    pub fn push(&self, item: T) -> Result<(), T> {
        let mut state = self.state.lock();
        while state.items.len() >= self.capacity && !state.closed {
            self.not_full.wait(&mut state);
        }
        if state.closed {
            return Err(item);
        }
        state.items.push_back(item);
        drop(state);
        self.not_empty.notify_one();
        Ok(())
    }

    /// 非阻塞入队。
    pub fn try_push(&self, item: T) -> Result<(), TryPushError<T>> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(TryPushError::Closed(item));
        }
        if state.items.len() >= self.capacity {
            return Err(TryPushError::Full(item));
        }
        state.items.push_back(item);
        drop(state);
        self.not_empty.notify_one();
        Ok(())
    }

    /// 阻塞出队；关闭且排空后返回 `None`。
    pub fn pop(&self) -> Option<T> {
        let mut state = self.state.lock();
        loop {
            if let Some(item) = state.items.pop_front() {
                drop(state);
                self.not_full.notify_one();
                return Some(item);
            }
            if state.closed {
                return None;
            }
            self.not_empty.wait(&mut state);
        }
    }

    /// 非阻塞出队。
    pub fn try_pop(&self) -> Option<T> {
        let item = self.state.lock().items.pop_front();
        if item.is_some() {
            self.not_full.notify_one();
        }
        item
    }

    /// 关闭队列并唤醒全部等待者；返回本次调用是否完成了关闭。
    pub fn close(&self) -> bool {
        let mut state = self.state.lock();
        if state.closed {
            return false;
        }
        state.closed = true;
        drop(state);
        self.not_empty.notify_all();
        self.not_full.notify_all();
        true
    }
}
