//! Tokio host runtime

use super::{BoxFuture, HostRuntime, TaskHandle};
use std::future::Future;
use std::time::Duration;

/// Spawns onto the ambient Tokio runtime and uses Tokio timers
#[derive(Clone, Debug, Default, Copy)]
pub struct TokioRuntime;

impl TokioRuntime {
    pub fn new() -> Self {
        Self
    }
}

impl HostRuntime for TokioRuntime {
    fn spawn<F>(&self, task: F) -> TaskHandle
    where
        F: Future<Output = ()> + Send + 'static,
    {
        TaskHandle::new(self.runtime_name(), tokio::spawn(task))
    }

    fn sleep(&self, duration: Duration) -> BoxFuture<'static, ()> {
        Box::pin(tokio::time::sleep(duration))
    }

    fn runtime_name(&self) -> &'static str {
        "Tokio"
    }
}
