//! Host runtime abstraction
//!
//! The controller is driven by whatever event loop hosts it. It needs two
//! things from that loop: a way to run a transition in the background and
//! a timer for load deadlines. [`HostRuntime`] provides both.

pub mod mock;
#[cfg(feature = "runtime-tokio")]
pub mod tokio_impl;

use std::fmt::Debug;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

/// A boxed future that can be sent across threads
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// What `spawn` hands back: the runtime's own task handle, type-erased
#[derive(Debug)]
pub struct TaskHandle {
    runtime: &'static str,
    native: Box<dyn std::any::Any + Send>,
}

impl TaskHandle {
    pub fn new<T: Send + 'static>(runtime: &'static str, native: T) -> Self {
        Self {
            runtime,
            native: Box::new(native),
        }
    }

    /// Name of the runtime that spawned the task
    pub fn runtime(&self) -> &'static str {
        self.runtime
    }

    /// Recover the native handle, if `T` is its type
    pub fn into_native<T: 'static>(self) -> Option<T> {
        self.native.downcast::<T>().ok().map(|native| *native)
    }
}

/// Task spawning and timers supplied by the host
pub trait HostRuntime: Send + Sync + Clone + Debug + 'static {
    /// Run `task` in the background
    fn spawn<F>(&self, task: F) -> TaskHandle
    where
        F: Future<Output = ()> + Send + 'static;

    /// A future that completes after `duration`
    fn sleep(&self, duration: Duration) -> BoxFuture<'static, ()>;

    /// Get the name of this runtime (for debugging)
    fn runtime_name(&self) -> &'static str;
}

// Re-export implementations
pub use mock::{MockRuntime, MockSleep, MockSpawn};

#[cfg(feature = "runtime-tokio")]
pub use tokio_impl::TokioRuntime;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_handle_recovers_native() {
        let handle = TaskHandle::new("Test", 42u32);
        assert_eq!(handle.runtime(), "Test");
        assert_eq!(handle.into_native::<u32>(), Some(42));
    }

    #[test]
    fn test_task_handle_wrong_type() {
        assert!(TaskHandle::new("Test", 42u32).into_native::<String>().is_none());
    }
}
