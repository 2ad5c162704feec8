//! 进程级共享状态
//!
//! `save_in_progress` 在备份+写出或复制流程执行期间为 true；
//! `game_running` 由外部进程监视器写入，本库只读取。

use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Debug, Default)]
pub struct SharedState {
    save_in_progress: AtomicBool,
    game_running: AtomicBool,
}

impl SharedState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn save_in_progress(&self) -> bool {
        self.save_in_progress.load(Ordering::Acquire)
    }

    pub fn game_running(&self) -> bool {
        self.game_running.load(Ordering::Acquire)
    }

    /// 由外部进程监视器调用
    pub fn set_game_running(&self, running: bool) {
        self.game_running.store(running, Ordering::Release);
    }

    /// 原子地占用写入标志
    ///
    /// 已被占用时返回 None；返回的守卫在释放时清除标志。
    pub fn try_begin_save(&self) -> Option<SaveGuard<'_>> {
        self.save_in_progress
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| SaveGuard { state: self })
    }
}

/// 写入标志守卫
#[derive(Debug)]
pub struct SaveGuard<'a> {
    state: &'a SharedState,
}

impl Drop for SaveGuard<'_> {
    fn drop(&mut self) {
        self.state.save_in_progress.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_single_writer() {
        let state = SharedState::new();
        let guard = state.try_begin_save().unwrap();
        assert!(state.save_in_progress());
        assert!(state.try_begin_save().is_none());

        drop(guard);
        assert!(!state.save_in_progress());
        assert!(state.try_begin_save().is_some());
    }

    #[test]
    fn test_game_running_flag() {
        let state = SharedState::new();
        assert!(!state.game_running());
        state.set_game_running(true);
        assert!(state.game_running());
    }

    #[test]
    fn test_only_one_thread_acquires() {
        let state = Arc::new(SharedState::new());
        let _guard = state.try_begin_save().unwrap();

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let state = Arc::clone(&state);
                std::thread::spawn(move || state.try_begin_save().is_some())
            })
            .collect();

        for handle in handles {
            assert!(!handle.join().unwrap());
        }
    }
}
