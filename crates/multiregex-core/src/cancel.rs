//! 可级联的取消令牌
//!
//! 令牌内部持有一个永不发送消息的零容量通道：取消时丢弃发送端，
//! 所有 `recv(token.cancelled())` 立即就绪，因此可以和数据通道放进同一个
//! `crossbeam_channel::select!`，阻塞中的收发都能在一个块周期内醒来。
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use crossbeam_channel::{Receiver, Sender};

/// 取消令牌（克隆共享同一状态）
#[derive(Debug, Clone)]
pub struct CancelToken {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    flag: AtomicBool,
    trigger: Mutex<Option<Sender<()>>>,
    signal: Receiver<()>,
    children: Mutex<Vec<Weak<Inner>>>,
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

impl CancelToken {
    pub fn new() -> Self {
        let (tx, rx) = crossbeam_channel::bounded(0);
        Self {
            inner: Arc::new(Inner {
                flag: AtomicBool::new(false),
                trigger: Mutex::new(Some(tx)),
                signal: rx,
                children: Mutex::new(Vec::new()),
            }),
        }
    }

    /// 触发取消（幂等），并级联到所有仍存活的子令牌
    pub fn cancel(&self) {
        self.inner.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.flag.load(Ordering::SeqCst)
    }

    /// 取消后永远就绪的接收端，供 `select!` 使用
    pub fn cancelled(&self) -> &Receiver<()> {
        &self.inner.signal
    }

    /// 派生子令牌：父令牌取消时子令牌随之取消，反之不影响父令牌
    pub fn child_token(&self) -> CancelToken {
        let child = CancelToken::new();
        {
            let mut children = lock(&self.inner.children);
            if !self.is_cancelled() {
                children.retain(|w| w.strong_count() > 0);
                children.push(Arc::downgrade(&child.inner));
                return child;
            }
        }
        child.cancel();
        child
    }
}

impl Inner {
    fn cancel(&self) {
        if self.flag.swap(true, Ordering::SeqCst) {
            return;
        }
        drop(lock(&self.trigger).take());
        let children = std::mem::take(&mut *lock(&self.children));
        for child in children.iter().filter_map(Weak::upgrade) {
            child.cancel();
        }
    }
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::select;
    use std::time::Duration;

    #[test]
    fn cancel_wakes_select() {
        let token = CancelToken::new();
        let (_tx, rx) = crossbeam_channel::bounded::<u8>(0);
        let t2 = token.clone();
        let h = std::thread::spawn(move || {
            select! {
                recv(rx) -> _ => false,
                recv(t2.cancelled()) -> _ => true,
            }
        });
        std::thread::sleep(Duration::from_millis(20));
        token.cancel();
        assert!(h.join().unwrap());
        assert!(token.is_cancelled());
    }

    #[test]
    fn children_follow_parent_only() {
        let parent = CancelToken::new();
        let child = parent.child_token();
        child.cancel();
        assert!(!parent.is_cancelled());

        let other = parent.child_token();
        parent.cancel();
        assert!(other.is_cancelled());
        assert!(parent.child_token().is_cancelled());
    }
}
