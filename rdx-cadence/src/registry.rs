//! A weak-referencing index over live tasks, with tag lookup and bulk
//! control.
//!
//! A [`TaskRegistry`] never keeps a task alive: entries hold weak
//! references and are pruned whenever the registry is read. Tasks
//! deregister themselves on cancellation and on drop, so the index tracks
//! reality without any background sweeper.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use slotmap::{new_key_type, SlotMap};
use tracing::debug;

use crate::task::{Task, TaskCore};

new_key_type! {
    /// Stable key of one registry entry.
    pub struct TaskKey;
}

#[derive(Default)]
struct RegistryInner {
    tasks: SlotMap<TaskKey, Weak<TaskCore>>,
    tags: HashMap<String, HashSet<TaskKey>>,
}

impl RegistryInner {
    fn evict(&mut self, key: TaskKey) {
        self.tasks.remove(key);
        self.tags.retain(|_, keys| {
            keys.remove(&key);
            !keys.is_empty()
        });
    }
}

/// Groups tasks so they can be found by tag and controlled in bulk.
///
/// Registries are explicit: there is no process-wide default. Create one,
/// share the [`Arc`], and register tasks through [`TaskRegistry::add`] or
/// [`TaskBuilder::registry`](crate::task::TaskBuilder::registry).
///
/// # Examples
///
/// ```no_run
/// use cadence::prelude::*;
///
/// # async fn demo() {
/// let registry = TaskRegistry::new();
/// let task = Task::spawn(&Schedule::every(Interval::seconds(30)), |_| {});
/// registry.add_with_tag(&task, "poller");
/// registry.suspend_all("poller");
/// # }
/// ```
pub struct TaskRegistry {
    inner: Mutex<RegistryInner>,
    self_ref: Weak<TaskRegistry>,
}

impl TaskRegistry {
    /// Creates an empty registry.
    pub fn new() -> Arc<TaskRegistry> {
        Arc::new_cyclic(|self_ref| TaskRegistry {
            inner: Mutex::new(RegistryInner::default()),
            self_ref: self_ref.clone(),
        })
    }

    /// Registers a task. A task belongs to at most one registry; adding a
    /// cancelled or already registered task is a no-op.
    pub fn add(&self, task: &Task) {
        if let Some(registry) = self.self_ref.upgrade() {
            task.attach_registry(&registry);
        }
    }

    /// Registers a task and tags it in one step.
    pub fn add_with_tag(&self, task: &Task, tag: &str) {
        task.add_tag(tag);
        self.add(task);
    }

    /// Drops this registry's entry for `task`. The task keeps running and
    /// can be registered again later.
    pub fn remove(&self, task: &Task) {
        task.detach_registry(self);
    }

    /// The live tasks carrying `tag`.
    pub fn tasks_with_tag(&self, tag: &str) -> Vec<Task> {
        let mut inner = self.inner.lock();
        let keys: Vec<TaskKey> = match inner.tags.get(tag) {
            Some(keys) => keys.iter().copied().collect(),
            None => return Vec::new(),
        };
        let mut tasks = Vec::new();
        for key in keys {
            match inner.tasks.get(key).and_then(Weak::upgrade) {
                Some(core) => tasks.push(Task::from_core(core)),
                None => inner.evict(key),
            }
        }
        tasks
    }

    /// Every live task in the registry.
    pub fn all_tasks(&self) -> Vec<Task> {
        let mut inner = self.inner.lock();
        let keys: Vec<TaskKey> = inner.tasks.keys().collect();
        let mut tasks = Vec::new();
        for key in keys {
            match inner.tasks.get(key).and_then(Weak::upgrade) {
                Some(core) => tasks.push(Task::from_core(core)),
                None => inner.evict(key),
            }
        }
        tasks
    }

    /// How many live tasks are registered.
    pub fn count(&self) -> usize {
        self.all_tasks().len()
    }

    /// Forgets every entry. No task is suspended or cancelled by this.
    pub fn clear(&self) {
        for task in self.all_tasks() {
            task.detach_registry(self);
        }
        let mut inner = self.inner.lock();
        inner.tasks.clear();
        inner.tags.clear();
    }

    /// Suspends every task carrying `tag`, one task at a time. There is no
    /// atomicity across the batch.
    pub fn suspend_all(&self, tag: &str) {
        for task in self.tasks_with_tag(tag) {
            task.suspend();
        }
    }

    /// Resumes every task carrying `tag`, one task at a time.
    pub fn resume_all(&self, tag: &str) {
        for task in self.tasks_with_tag(tag) {
            task.resume();
        }
    }

    /// Cancels every task carrying `tag`, one task at a time.
    pub fn cancel_all(&self, tag: &str) {
        for task in self.tasks_with_tag(tag) {
            task.cancel();
        }
    }

    pub(crate) fn enroll(&self, core: Weak<TaskCore>, tags: &[String]) -> TaskKey {
        let mut inner = self.inner.lock();
        let key = inner.tasks.insert(core);
        for tag in tags {
            inner.tags.entry(tag.clone()).or_default().insert(key);
        }
        debug!(?key, "task enrolled");
        key
    }

    pub(crate) fn discard(&self, key: TaskKey) {
        self.inner.lock().evict(key);
    }

    pub(crate) fn tag_key(&self, key: TaskKey, tag: &str) {
        let mut inner = self.inner.lock();
        if inner.tasks.contains_key(key) {
            inner.tags.entry(tag.to_owned()).or_default().insert(key);
        }
    }

    pub(crate) fn untag_key(&self, key: TaskKey, tag: &str) {
        let mut inner = self.inner.lock();
        let emptied = match inner.tags.get_mut(tag) {
            Some(keys) => {
                keys.remove(&key);
                keys.is_empty()
            }
            None => false,
        };
        if emptied {
            inner.tags.remove(tag);
        }
    }
}

impl fmt::Debug for TaskRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut debug = f.debug_struct("TaskRegistry");
        if let Some(inner) = self.inner.try_lock() {
            debug
                .field("entries", &inner.tasks.len())
                .field("tags", &inner.tags.len());
        }
        debug.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interval::Interval;
    use crate::schedule::Schedule;
    use crate::task::RunState;

    fn idle_schedule() -> Schedule {
        Schedule::every(Interval::minutes(1))
    }

    #[tokio::test]
    async fn add_and_remove_track_membership() {
        let registry = TaskRegistry::new();
        let task = Task::spawn(&idle_schedule(), |_| {});
        registry.add(&task);
        registry.add(&task);
        assert_eq!(registry.count(), 1);
        registry.remove(&task);
        assert_eq!(registry.count(), 0);
        registry.add(&task);
        assert_eq!(registry.count(), 1);
        task.cancel();
    }

    #[tokio::test]
    async fn a_task_belongs_to_one_registry_at_a_time() {
        let first = TaskRegistry::new();
        let second = TaskRegistry::new();
        let task = Task::spawn(&idle_schedule(), |_| {});
        first.add(&task);
        second.add(&task);
        assert_eq!(first.count(), 1);
        assert_eq!(second.count(), 0);
        second.remove(&task);
        assert_eq!(first.count(), 1);
        task.cancel();
    }

    #[tokio::test]
    async fn tag_index_follows_the_tasks_tags() {
        let registry = TaskRegistry::new();
        let task = Task::builder(&idle_schedule())
            .tag("mail")
            .registry(&registry)
            .spawn(|_| {});
        assert_eq!(registry.tasks_with_tag("mail").len(), 1);
        task.add_tag("sync");
        assert_eq!(registry.tasks_with_tag("sync").len(), 1);
        task.remove_tag("mail");
        assert!(registry.tasks_with_tag("mail").is_empty());
        assert!(registry.tasks_with_tag("unknown").is_empty());
        task.cancel();
    }

    #[tokio::test]
    async fn cancelling_deregisters() {
        let registry = TaskRegistry::new();
        let task = Task::spawn(&idle_schedule(), |_| {});
        registry.add_with_tag(&task, "job");
        assert_eq!(registry.count(), 1);
        task.cancel();
        assert_eq!(registry.count(), 0);
        assert!(registry.tasks_with_tag("job").is_empty());
    }

    #[tokio::test]
    async fn dropped_tasks_vanish_from_the_registry() {
        let registry = TaskRegistry::new();
        {
            let task = Task::spawn(&idle_schedule(), |_| {});
            registry.add(&task);
            assert_eq!(registry.count(), 1);
        }
        assert_eq!(registry.count(), 0);
    }

    #[tokio::test]
    async fn bulk_operations_reach_only_the_tagged_tasks() {
        let registry = TaskRegistry::new();
        let tagged = Task::builder(&idle_schedule())
            .tag("pause-me")
            .registry(&registry)
            .spawn(|_| {});
        let other = Task::builder(&idle_schedule()).registry(&registry).spawn(|_| {});
        registry.suspend_all("pause-me");
        assert_eq!(tagged.state(), RunState::Suspended);
        assert_eq!(other.state(), RunState::Armed);
        registry.resume_all("pause-me");
        assert_eq!(tagged.state(), RunState::Armed);
        registry.cancel_all("pause-me");
        assert!(tagged.is_cancelled());
        assert!(!other.is_cancelled());
        assert_eq!(registry.count(), 1);
        other.cancel();
    }

    #[tokio::test]
    async fn clear_forgets_entries_without_touching_tasks() {
        let registry = TaskRegistry::new();
        let task = Task::spawn(&idle_schedule(), |_| {});
        registry.add_with_tag(&task, "job");
        registry.clear();
        assert_eq!(registry.count(), 0);
        assert_eq!(task.state(), RunState::Armed);
        registry.add(&task);
        assert_eq!(registry.count(), 1);
        task.cancel();
    }
}
