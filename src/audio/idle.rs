use std::{future::Future, time::Duration};
use tokio::task::JoinHandle;

/// A single cancellable deferred action.
///
/// The player arms it when its queue drains and cancels it whenever playback
/// starts again. Arming while an action is already pending does nothing, so
/// at most one is ever scheduled. The action itself must re-check state under
/// the player's lock before acting.
#[derive(Debug, Default)]
pub struct IdleTimer {
    task: Option<JoinHandle<()>>,
}

impl IdleTimer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_pending(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    /// Schedules `action` to run after `delay`. Returns `false` if an action
    /// was already pending, in which case `action` is dropped.
    pub fn arm<F>(&mut self, delay: Duration, action: F) -> bool
    where
        F: Future<Output = ()> + Send + 'static,
    {
        if self.is_pending() {
            return false;
        }

        self.task = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            action.await;
        }));
        true
    }

    /// Aborts the pending action, if any. Returns whether one was pending.
    pub fn cancel(&mut self) -> bool {
        match self.task.take() {
            Some(task) => {
                let pending = !task.is_finished();
                task.abort();
                pending
            }
            None => false,
        }
    }

    /// Forgets the handle without aborting. Used by the action itself once it
    /// fires, since aborting its own task would cut it short.
    pub(crate) fn disarm(&mut self) {
        self.task = None;
    }
}
