//! In-process background task runner with cancellation by tag.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tokio::task::JoinHandle;

use super::{AlarmOutcome, AlarmTask, StopHandle};

type Registry = HashMap<String, Vec<(u64, StopHandle)>>;

/// Runs alarm tasks on the tokio runtime and stops them by tag.
#[derive(Clone, Default)]
pub struct TaskRunner {
    registry: Arc<Mutex<Registry>>,
    next_id: Arc<AtomicU64>,
}

impl TaskRunner {
    /// Creates an empty runner.
    pub fn new() -> Self {
        Self::default()
    }

    /// Dispatches `task` immediately under `tag`.
    ///
    /// The task deregisters itself when it finishes.
    pub fn enqueue(&self, tag: &str, task: AlarmTask) -> JoinHandle<AlarmOutcome> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let stop = StopHandle::new();

        if let Ok(mut registry) = self.registry.lock() {
            registry
                .entry(tag.to_string())
                .or_default()
                .push((id, stop.clone()));
        }

        let runner = self.clone();
        let tag = tag.to_string();
        tokio::spawn(async move {
            let outcome = task.run(stop).await;
            runner.deregister(&tag, id);
            outcome
        })
    }

    /// Raises the stop signal of every in-flight task under `tag`.
    ///
    /// Returns the number of tasks signalled.
    pub fn cancel_by_tag(&self, tag: &str) -> usize {
        let handles = self
            .registry
            .lock()
            .ok()
            .and_then(|mut registry| registry.remove(tag))
            .unwrap_or_default();

        for (_, stop) in &handles {
            stop.stop();
        }
        if !handles.is_empty() {
            tracing::debug!("Cancelled {} task(s) tagged '{}'", handles.len(), tag);
        }
        handles.len()
    }

    /// Returns the number of in-flight tasks under `tag`.
    pub fn active(&self, tag: &str) -> usize {
        self.registry
            .lock()
            .map(|registry| registry.get(tag).map_or(0, Vec::len))
            .unwrap_or(0)
    }

    fn deregister(&self, tag: &str, id: u64) {
        if let Ok(mut registry) = self.registry.lock() {
            if let Some(entries) = registry.get_mut(tag) {
                entries.retain(|(entry_id, _)| *entry_id != id);
                if entries.is_empty() {
                    registry.remove(tag);
                }
            }
        }
    }
}

impl std::fmt::Debug for TaskRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let tags = self
            .registry
            .lock()
            .map(|registry| registry.len())
            .unwrap_or(0);
        f.debug_struct("TaskRunner").field("tags", &tags).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alarm::ALARM_TAG;
    use crate::notification::MockNotifier;
    use crate::sound::{AlarmPlayer, MockSoundPlayer, SoundPlayer};
    use crate::types::{AlarmRequest, IntervalKind};
    use std::time::Duration;

    fn task() -> (Arc<MockSoundPlayer>, AlarmTask) {
        let sound = Arc::new(MockSoundPlayer::new());
        let player = Arc::new(AlarmPlayer::new(Some(sound.clone())));
        let task = AlarmTask::new(
            AlarmRequest::new(IntervalKind::Work, None),
            player,
            Arc::new(MockNotifier::new()),
        );
        (sound, task)
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_by_tag_stops_task() {
        let runner = TaskRunner::new();
        let (sound, task) = task();

        let handle = runner.enqueue(ALARM_TAG, task);
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(runner.active(ALARM_TAG), 1);

        assert_eq!(runner.cancel_by_tag(ALARM_TAG), 1);

        assert_eq!(handle.await.unwrap(), AlarmOutcome::Stopped);
        assert!(!sound.is_playing());
        assert_eq!(runner.active(ALARM_TAG), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_finished_task_deregisters() {
        let runner = TaskRunner::new();
        let (_sound, task) = task();

        let handle = runner.enqueue(ALARM_TAG, task.with_ceiling(Duration::from_secs(1)));

        assert_eq!(handle.await.unwrap(), AlarmOutcome::TimedOut);
        assert_eq!(runner.active(ALARM_TAG), 0);
        assert_eq!(runner.cancel_by_tag(ALARM_TAG), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_other_tag_is_noop() {
        let runner = TaskRunner::new();
        let (_sound, task) = task();
        let _handle = runner.enqueue(ALARM_TAG, task);

        assert_eq!(runner.cancel_by_tag("something_else"), 0);
        assert_eq!(runner.active(ALARM_TAG), 1);

        runner.cancel_by_tag(ALARM_TAG);
    }
}
