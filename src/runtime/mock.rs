//! Mock host runtime for testing
//!
//! Spawned tasks are run to completion on the spot, parked until the test
//! drives them, or dropped. Timers fire immediately, never, or depending on
//! their length, which makes deadline behaviour deterministic in tests.

use super::{BoxFuture, HostRuntime, TaskHandle};
use parking_lot::Mutex;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// What `spawn` does with a task
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockSpawn {
    /// Drop tasks without running them
    Drop,
    /// Run tasks to completion before `spawn` returns
    BlockSync,
    /// Park tasks until [`MockRuntime::run_deferred`] is called
    Defer,
}

/// What `sleep` futures do
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockSleep {
    /// Complete on first poll, so any pending load times out
    Immediate,
    /// Never complete, so deadlines never fire
    Never,
    /// Deadlines shorter than the given duration fire at once, longer ones never
    FireBelow(Duration),
}

/// Mock runtime for testing
#[derive(Clone)]
pub struct MockRuntime {
    spawn: MockSpawn,
    sleep: MockSleep,
    spawned: Arc<AtomicUsize>,
    deferred: Arc<Mutex<Vec<BoxFuture<'static, ()>>>>,
}

impl std::fmt::Debug for MockRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockRuntime")
            .field("spawn", &self.spawn)
            .field("sleep", &self.sleep)
            .field("spawned", &self.spawned())
            .field("deferred", &self.deferred.lock().len())
            .finish()
    }
}

impl Default for MockRuntime {
    fn default() -> Self {
        Self::new()
    }
}

impl MockRuntime {
    /// Runs spawned tasks inline; deadlines fire immediately
    pub fn new() -> Self {
        Self::with_behavior(MockSpawn::BlockSync, MockSleep::Immediate)
    }

    pub fn with_behavior(spawn: MockSpawn, sleep: MockSleep) -> Self {
        Self {
            spawn,
            sleep,
            spawned: Arc::new(AtomicUsize::new(0)),
            deferred: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Runs spawned tasks inline; deadlines never fire
    pub fn without_deadlines() -> Self {
        Self::with_behavior(MockSpawn::BlockSync, MockSleep::Never)
    }

    /// Number of tasks handed to `spawn`
    pub fn spawned(&self) -> usize {
        self.spawned.load(Ordering::SeqCst)
    }

    /// Tasks parked by [`MockSpawn::Defer`] and not yet run
    pub fn pending(&self) -> usize {
        self.deferred.lock().len()
    }

    /// Run every parked task to completion, oldest first. Returns how many
    /// ran; tasks parked while running are left for the next call.
    pub fn run_deferred(&self) -> usize {
        let tasks = std::mem::take(&mut *self.deferred.lock());
        let count = tasks.len();
        for task in tasks {
            futures::executor::block_on(task);
        }
        count
    }
}

impl HostRuntime for MockRuntime {
    fn spawn<F>(&self, task: F) -> TaskHandle
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.spawned.fetch_add(1, Ordering::SeqCst);
        match self.spawn {
            MockSpawn::Drop => drop(task),
            MockSpawn::BlockSync => futures::executor::block_on(task),
            MockSpawn::Defer => self.deferred.lock().push(Box::pin(task)),
        }
        TaskHandle::new(self.runtime_name(), ())
    }

    fn sleep(&self, duration: Duration) -> BoxFuture<'static, ()> {
        let fires = match self.sleep {
            MockSleep::Immediate => true,
            MockSleep::Never => false,
            MockSleep::FireBelow(limit) => duration < limit,
        };
        if fires {
            Box::pin(futures::future::ready(()))
        } else {
            Box::pin(futures::future::pending())
        }
    }

    fn runtime_name(&self) -> &'static str {
        "Mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::FutureExt;
    use std::sync::atomic::AtomicBool;

    #[test]
    fn test_mock_runtime_drop() {
        let runtime = MockRuntime::with_behavior(MockSpawn::Drop, MockSleep::Never);
        runtime.spawn(async {
            panic!("Should not run");
        });
        assert_eq!(runtime.spawned(), 1);
    }

    #[test]
    fn test_mock_runtime_blocking() {
        let runtime = MockRuntime::new();
        let ran = Arc::new(AtomicBool::new(false));
        let ran_clone = ran.clone();

        runtime.spawn(async move {
            ran_clone.store(true, Ordering::SeqCst);
        });

        assert!(ran.load(Ordering::SeqCst));
    }

    #[test]
    fn test_mock_sleep_behaviour() {
        let immediate = MockRuntime::new();
        assert!(immediate.sleep(Duration::from_secs(60)).now_or_never().is_some());

        let never = MockRuntime::without_deadlines();
        assert!(never.sleep(Duration::ZERO).now_or_never().is_none());

        let split = MockRuntime::with_behavior(
            MockSpawn::BlockSync,
            MockSleep::FireBelow(Duration::from_secs(1)),
        );
        assert!(split.sleep(Duration::from_millis(1)).now_or_never().is_some());
        assert!(split.sleep(Duration::from_secs(30)).now_or_never().is_none());
    }

    #[test]
    fn test_deferred_tasks_wait_for_the_test() {
        let runtime = MockRuntime::with_behavior(MockSpawn::Defer, MockSleep::Never);
        let ran = Arc::new(AtomicBool::new(false));
        let flag = ran.clone();
        runtime.spawn(async move {
            flag.store(true, Ordering::SeqCst);
        });

        assert!(!ran.load(Ordering::SeqCst));
        assert_eq!(runtime.pending(), 1);
        assert_eq!(runtime.run_deferred(), 1);
        assert!(ran.load(Ordering::SeqCst));
        assert_eq!(runtime.pending(), 0);
    }
}
