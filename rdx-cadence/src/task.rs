//! The live task runner driving one timer per schedule.
//!
//! A [`Task`] consumes one schedule cursor, arms a one-shot timer for each
//! offset, and runs its registered actions when the timer fires. It
//! supports nested suspend/resume, idempotent cancellation, atomic
//! rescheduling, manual triggering and optional binding to a host object's
//! lifetime. Handles are cheap clones; the underlying state is shared and
//! guarded by a single per-task lock, so a task never contends with other
//! tasks.
//!
//! Each armed task is served by a dedicated driver spawned on the current
//! tokio runtime (or the one picked with [`TaskBuilder::on_runtime`]). The
//! driver owns the deadline and exits as soon as the last handle is dropped
//! or the task is cancelled.

use std::any::Any;
use std::fmt;
use std::future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tokio::sync::{broadcast, mpsc};
use tokio::time::Instant;
use tracing::{debug, trace};

use crate::clock;
use crate::common::{ActionId, Bag};
use crate::events::TaskEvent;
use crate::interval::Interval;
use crate::registry::{TaskKey, TaskRegistry};
use crate::schedule::{OffsetCursor, Schedule};

/// Callback invoked on each fire, in insertion order.
pub(crate) type Action = Arc<dyn Fn(&Task) + Send + Sync>;

static NEXT_TASK_ID: AtomicU64 = AtomicU64::new(1);

const EVENT_CHANNEL_CAPACITY: usize = 64;

// Bounds the missed-occurrence loops so a zero-gap schedule cannot spin
// the caller; anything beyond the cap fires through the timer instead.
const CATCH_UP_LIMIT: usize = 1_024;

/// Where a task currently is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    /// A timer is armed for the next offset.
    Armed,
    /// Suspended at least once; the timer keeps its remaining time but
    /// will not fire.
    Suspended,
    /// The schedule yielded no further offset. Inert, but not cancelled;
    /// a reschedule revives it.
    Exhausted,
    /// Terminal. The timer is released and the registry entry removed.
    Cancelled,
}

enum TimerCmd {
    Arm(Interval),
    Disarm,
    Suspend,
    Resume,
    Cancel,
}

struct TaskState {
    cursor: OffsetCursor,
    // Holds an offset pulled ahead of its turn; consumed before the cursor.
    buffered: Option<Interval>,
    run_state: RunState,
    estimated_next: Option<DateTime<Utc>>,
    commands: mpsc::UnboundedSender<TimerCmd>,
    actions: Bag<Action>,
    suspensions: u64,
    executions: u64,
    first_execution: Option<DateTime<Utc>>,
    last_execution: Option<DateTime<Utc>>,
    tags: Vec<String>,
    registry: Option<(Arc<TaskRegistry>, TaskKey)>,
    host: Option<Weak<dyn Any + Send + Sync>>,
}

impl TaskState {
    fn next_offset(&mut self) -> Option<Interval> {
        self.buffered.take().or_else(|| self.cursor.next())
    }
}

pub(crate) struct TaskCore {
    task_id: u64,
    state: Mutex<TaskState>,
    events: broadcast::Sender<TaskEvent>,
    runtime: Option<tokio::runtime::Handle>,
}

/// Handle to a live, cancellable timer task.
///
/// # Examples
///
/// ```no_run
/// use cadence::prelude::*;
///
/// # async fn demo() {
/// let task = Task::spawn(&Schedule::every(Interval::seconds(1)).first(3), |_task| {
///     println!("tick");
/// });
/// assert!(!task.is_cancelled());
/// # }
/// ```
#[derive(Clone)]
pub struct Task {
    core: Arc<TaskCore>,
}

/// Configures and spawns a [`Task`].
pub struct TaskBuilder {
    schedule: Schedule,
    tags: Vec<String>,
    registry: Option<Arc<TaskRegistry>>,
    host: Option<Weak<dyn Any + Send + Sync>>,
    runtime: Option<tokio::runtime::Handle>,
}

impl TaskBuilder {
    fn new(schedule: &Schedule) -> Self {
        Self {
            schedule: schedule.clone(),
            tags: Vec::new(),
            registry: None,
            host: None,
            runtime: None,
        }
    }

    /// Adds a tag the task starts with.
    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        let tag = tag.into();
        if !self.tags.contains(&tag) {
            self.tags.push(tag);
        }
        self
    }

    /// Registers the task with `registry` on spawn.
    pub fn registry(mut self, registry: &Arc<TaskRegistry>) -> Self {
        self.registry = Some(registry.clone());
        self
    }

    /// Ties the task's effective lifetime to `host`.
    ///
    /// The task holds only a weak reference. Once every strong reference
    /// to `host` is gone, the task cancels itself on its next fire instead
    /// of running its actions.
    pub fn host<H>(mut self, host: &Arc<H>) -> Self
    where
        H: Send + Sync + 'static,
    {
        let erased: Arc<dyn Any + Send + Sync> = host.clone();
        self.host = Some(Arc::downgrade(&erased));
        self
    }

    /// Spawns the timer driver on a specific runtime instead of the
    /// ambient one.
    pub fn on_runtime(mut self, handle: &tokio::runtime::Handle) -> Self {
        self.runtime = Some(handle.clone());
        self
    }

    /// Pulls the first offset and starts the task.
    ///
    /// A schedule that yields nothing, or whose only offset is negative,
    /// produces a task that is exhausted at birth: no timer is armed and
    /// the task is not registered anywhere. A negative first offset with
    /// more offsets behind it (a calendar rule whose pattern matches
    /// today) arms right away and fires as soon as possible.
    pub fn spawn<F>(self, action: F) -> Task
    where
        F: Fn(&Task) + Send + Sync + 'static,
    {
        let (commands, receiver) = mpsc::unbounded_channel();
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        let mut cursor = self.schedule.cursor();
        let mut buffered = None;
        let first = match cursor.next() {
            Some(offset) if offset.is_negative() => match cursor.next() {
                Some(upcoming) => {
                    buffered = Some(upcoming);
                    Some(offset)
                }
                None => None,
            },
            other => other,
        };
        let now = clock::now();

        let mut actions = Bag::new();
        actions.append(Arc::new(action) as Action);

        let state = TaskState {
            cursor,
            buffered,
            run_state: if first.is_some() {
                RunState::Armed
            } else {
                RunState::Exhausted
            },
            estimated_next: first.map(|offset| clock::add_interval(now, offset)),
            commands,
            actions,
            suspensions: 0,
            executions: 0,
            first_execution: None,
            last_execution: None,
            tags: self.tags.clone(),
            registry: None,
            host: self.host,
        };
        let core = Arc::new(TaskCore {
            task_id: NEXT_TASK_ID.fetch_add(1, Ordering::Relaxed),
            state: Mutex::new(state),
            events,
            runtime: self
                .runtime
                .or_else(|| tokio::runtime::Handle::try_current().ok()),
        });
        let task = Task { core };

        match first {
            Some(offset) => {
                task.core.spawn_driver(receiver);
                task.core.state.lock().commands.send(TimerCmd::Arm(offset)).ok();
                if let Some(registry) = &self.registry {
                    task.attach_registry(registry);
                }
                debug!(task = task.core.task_id, offset = %offset, "task armed");
            }
            None => {
                debug!(task = task.core.task_id, "schedule empty at birth, task exhausted");
            }
        }

        task
    }
}

impl Task {
    /// Starts a task on the ambient tokio runtime with a single action.
    pub fn spawn<F>(schedule: &Schedule, action: F) -> Task
    where
        F: Fn(&Task) + Send + Sync + 'static,
    {
        Self::builder(schedule).spawn(action)
    }

    /// Starts configuring a task.
    pub fn builder(schedule: &Schedule) -> TaskBuilder {
        TaskBuilder::new(schedule)
    }

    pub(crate) fn from_core(core: Arc<TaskCore>) -> Self {
        Self { core }
    }

    /// Suspends the task. Nested: every `suspend` needs a matching
    /// [`Task::resume`] before the timer runs again. No-op when cancelled.
    pub fn suspend(&self) {
        let mut state = self.core.state.lock();
        if state.run_state == RunState::Cancelled {
            return;
        }
        let outermost = state.suspensions == 0;
        state.suspensions = state.suspensions.saturating_add(1);
        if outermost {
            if state.run_state == RunState::Armed {
                state.run_state = RunState::Suspended;
            }
            state.commands.send(TimerCmd::Suspend).ok();
        }
        drop(state);
        if outermost {
            debug!(task = self.core.task_id, "task suspended");
            self.core.events.send(TaskEvent::Suspended).ok();
        }
    }

    /// Undoes one [`Task::suspend`]. The timer resumes with its remaining
    /// time once the suspension count reaches zero. No-op when the task is
    /// not suspended or is cancelled.
    pub fn resume(&self) {
        let mut state = self.core.state.lock();
        if state.run_state == RunState::Cancelled || state.suspensions == 0 {
            return;
        }
        state.suspensions -= 1;
        let resumed = state.suspensions == 0;
        if resumed {
            if state.run_state == RunState::Suspended {
                state.run_state = RunState::Armed;
            }
            state.commands.send(TimerCmd::Resume).ok();
        }
        drop(state);
        if resumed {
            debug!(task = self.core.task_id, "task resumed");
            self.core.events.send(TaskEvent::Resumed).ok();
        }
    }

    /// Cancels the task. Idempotent and terminal: the timer is released,
    /// the registry entry removed, and no further fire can happen.
    pub fn cancel(&self) {
        self.core.cancel();
    }

    /// Runs the registered actions right now, without consuming the
    /// schedule or touching the timer. Counts as an execution. No-op when
    /// cancelled.
    pub fn execute_now(&self) {
        let mut state = self.core.state.lock();
        if state.run_state == RunState::Cancelled {
            return;
        }
        let now = clock::now();
        state.executions = state.executions.saturating_add(1);
        if state.first_execution.is_none() {
            state.first_execution = Some(now);
        }
        state.last_execution = Some(now);
        let executions = state.executions;
        let actions: Vec<Action> = state.actions.iter().cloned().collect();
        drop(state);

        trace!(task = self.core.task_id, "manual trigger");
        for action in &actions {
            action(self);
        }
        self.core.events.send(TaskEvent::Fired { at: now, executions }).ok();
    }

    /// Replaces the schedule and recomputes the next fire from the current
    /// moment, consuming any offsets the new sequence places in the past.
    /// Execution counters and registered actions are kept. Revives an
    /// exhausted task; no-op on a cancelled one.
    pub fn reschedule(&self, schedule: &Schedule) {
        let mut state = self.core.state.lock();
        if state.run_state == RunState::Cancelled {
            return;
        }
        state.cursor = schedule.cursor();
        state.buffered = None;
        let now = clock::now();
        let mut estimate = now;
        let mut armed = false;
        let mut pulled = 0;
        loop {
            if pulled >= CATCH_UP_LIMIT {
                armed = true;
                break;
            }
            match state.next_offset() {
                Some(offset) => {
                    pulled += 1;
                    estimate = clock::add_interval(estimate, offset);
                    if estimate > now {
                        armed = true;
                        break;
                    }
                }
                None => break,
            }
        }
        if armed {
            state.estimated_next = Some(estimate);
            state.run_state = if state.suspensions > 0 {
                RunState::Suspended
            } else {
                RunState::Armed
            };
            let remaining = clock::interval_between(now, estimate);
            if state.commands.send(TimerCmd::Arm(remaining)).is_err() {
                // No driver yet: the task was exhausted at birth.
                let (sender, receiver) = mpsc::unbounded_channel();
                sender.send(TimerCmd::Arm(remaining)).ok();
                state.commands = sender;
                drop(state);
                self.core.spawn_driver(receiver);
            } else {
                drop(state);
            }
        } else {
            state.estimated_next = None;
            state.run_state = RunState::Exhausted;
            state.commands.send(TimerCmd::Disarm).ok();
            drop(state);
        }
        debug!(task = self.core.task_id, armed, "task rescheduled");
        self.core.events.send(TaskEvent::Rescheduled).ok();
    }

    /// Registers another action, fired after the existing ones.
    pub fn add_action<F>(&self, action: F) -> ActionId
    where
        F: Fn(&Task) + Send + Sync + 'static,
    {
        self.core.state.lock().actions.append(Arc::new(action) as Action)
    }

    /// Removes one action by the key [`Task::add_action`] returned.
    pub fn remove_action(&self, id: ActionId) {
        self.core.state.lock().actions.remove(id);
    }

    /// Removes every registered action. The task keeps firing; fires just
    /// do nothing until an action is added again.
    pub fn remove_all_actions(&self) {
        self.core.state.lock().actions.clear();
    }

    /// Adds a tag, also updating the registry's tag index when the task is
    /// registered.
    pub fn add_tag(&self, tag: &str) {
        let mut state = self.core.state.lock();
        if state.tags.iter().any(|existing| existing == tag) {
            return;
        }
        state.tags.push(tag.to_owned());
        let membership = state.registry.clone();
        drop(state);
        if let Some((registry, key)) = membership {
            registry.tag_key(key, tag);
        }
    }

    /// Removes a tag, also updating the registry's tag index.
    pub fn remove_tag(&self, tag: &str) {
        let mut state = self.core.state.lock();
        state.tags.retain(|existing| existing != tag);
        let membership = state.registry.clone();
        drop(state);
        if let Some((registry, key)) = membership {
            registry.untag_key(key, tag);
        }
    }

    /// The task's tags, in the order they were added.
    pub fn tags(&self) -> Vec<String> {
        self.core.state.lock().tags.clone()
    }

    pub fn state(&self) -> RunState {
        self.core.state.lock().run_state
    }

    pub fn is_cancelled(&self) -> bool {
        self.state() == RunState::Cancelled
    }

    /// How many times the actions have run, timer fires and manual
    /// triggers combined.
    pub fn execution_count(&self) -> u64 {
        self.core.state.lock().executions
    }

    pub fn first_execution(&self) -> Option<DateTime<Utc>> {
        self.core.state.lock().first_execution
    }

    pub fn last_execution(&self) -> Option<DateTime<Utc>> {
        self.core.state.lock().last_execution
    }

    /// When the next timer fire is expected, if one is pending. Not
    /// adjusted for time spent suspended.
    pub fn estimated_next_execution(&self) -> Option<DateTime<Utc>> {
        self.core.state.lock().estimated_next
    }

    pub fn suspension_count(&self) -> u64 {
        self.core.state.lock().suspensions
    }

    /// A receiver for this task's state transitions.
    pub fn subscribe(&self) -> broadcast::Receiver<TaskEvent> {
        self.core.events.subscribe()
    }

    pub(crate) fn attach_registry(&self, registry: &Arc<TaskRegistry>) {
        let state = self.core.state.lock();
        if state.run_state == RunState::Cancelled || state.registry.is_some() {
            return;
        }
        let tags = state.tags.clone();
        drop(state);
        let key = registry.enroll(Arc::downgrade(&self.core), &tags);
        let mut state = self.core.state.lock();
        if state.registry.is_some() || state.run_state == RunState::Cancelled {
            drop(state);
            registry.discard(key);
        } else {
            state.registry = Some((registry.clone(), key));
        }
    }

    pub(crate) fn detach_registry(&self, registry: &TaskRegistry) {
        let mut state = self.core.state.lock();
        let owned = state
            .registry
            .as_ref()
            .is_some_and(|(owner, _)| std::ptr::eq(Arc::as_ptr(owner), registry));
        if !owned {
            return;
        }
        let membership = state.registry.take();
        drop(state);
        if let Some((owner, key)) = membership {
            owner.discard(key);
        }
    }

    /// One timer fire: record the execution, coalesce any occurrences the
    /// wall clock has already passed, re-arm, then run the actions with no
    /// lock held.
    fn fire_from_timer(&self) {
        let host = self.core.state.lock().host.clone();
        if let Some(host) = host {
            if host.upgrade().is_none() {
                debug!(task = self.core.task_id, "host gone, task cancels itself");
                self.core.cancel();
                return;
            }
        }

        let now = clock::now();
        let mut state = self.core.state.lock();
        if state.run_state == RunState::Cancelled {
            return;
        }
        state.executions = state.executions.saturating_add(1);
        if state.first_execution.is_none() {
            state.first_execution = Some(now);
        }
        state.last_execution = Some(now);
        let executions = state.executions;

        let mut estimate = state.estimated_next.unwrap_or(now);
        let mut exhausted = false;
        let mut pulled = 0;
        loop {
            if pulled >= CATCH_UP_LIMIT {
                break;
            }
            match state.next_offset() {
                Some(offset) => {
                    pulled += 1;
                    estimate = clock::add_interval(estimate, offset);
                    if estimate > now {
                        break;
                    }
                    trace!(task = self.core.task_id, "coalescing a missed occurrence");
                }
                None => {
                    exhausted = true;
                    break;
                }
            }
        }
        if exhausted {
            state.run_state = RunState::Exhausted;
            state.estimated_next = None;
        } else {
            state.estimated_next = Some(estimate);
            state.run_state = if state.suspensions > 0 {
                RunState::Suspended
            } else {
                RunState::Armed
            };
            state
                .commands
                .send(TimerCmd::Arm(clock::interval_between(now, estimate)))
                .ok();
        }
        let actions: Vec<Action> = state.actions.iter().cloned().collect();
        drop(state);

        trace!(task = self.core.task_id, executions, "task fired");
        for action in &actions {
            action(self);
        }
        self.core.events.send(TaskEvent::Fired { at: now, executions }).ok();
        if exhausted {
            debug!(task = self.core.task_id, "schedule exhausted");
            self.core.events.send(TaskEvent::Exhausted).ok();
        }
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut debug = f.debug_struct("Task");
        debug.field("id", &self.core.task_id);
        if let Some(state) = self.core.state.try_lock() {
            debug
                .field("state", &state.run_state)
                .field("executions", &state.executions);
        }
        debug.finish()
    }
}

impl TaskCore {
    fn cancel(&self) {
        let mut state = self.state.lock();
        if state.run_state == RunState::Cancelled {
            return;
        }
        state.run_state = RunState::Cancelled;
        state.estimated_next = None;
        state.commands.send(TimerCmd::Cancel).ok();
        let membership = state.registry.take();
        drop(state);

        if let Some((registry, key)) = membership {
            registry.discard(key);
        }
        debug!(task = self.task_id, "task cancelled");
        self.events.send(TaskEvent::Cancelled).ok();
    }

    fn spawn_driver(self: &Arc<Self>, receiver: mpsc::UnboundedReceiver<TimerCmd>) {
        let driver = run_driver(Arc::downgrade(self), receiver);
        match &self.runtime {
            Some(handle) => {
                handle.spawn(driver);
            }
            None => {
                tokio::spawn(driver);
            }
        }
    }
}

impl Drop for TaskCore {
    fn drop(&mut self) {
        if let Some((registry, key)) = self.state.get_mut().registry.take() {
            registry.discard(key);
        }
    }
}

/// The timer driver: one per armed task.
///
/// Holds only a weak reference to the task, so dropping the last handle
/// closes the command channel and ends the driver.
async fn run_driver(core: Weak<TaskCore>, mut commands: mpsc::UnboundedReceiver<TimerCmd>) {
    let mut deadline: Option<Instant> = None;
    let mut frozen: Option<Duration> = None;
    let mut paused = false;
    loop {
        tokio::select! {
            biased;
            command = commands.recv() => match command {
                None | Some(TimerCmd::Cancel) => break,
                Some(TimerCmd::Arm(offset)) => {
                    // Negative offsets clamp to zero and fire right away.
                    let wait = offset.to_std();
                    if paused {
                        frozen = Some(wait);
                        deadline = None;
                    } else {
                        deadline = Instant::now().checked_add(wait);
                    }
                }
                Some(TimerCmd::Disarm) => {
                    deadline = None;
                    frozen = None;
                }
                Some(TimerCmd::Suspend) => {
                    if !paused {
                        paused = true;
                        frozen = deadline
                            .map(|instant| instant.saturating_duration_since(Instant::now()));
                        deadline = None;
                    }
                }
                Some(TimerCmd::Resume) => {
                    if paused {
                        paused = false;
                        if let Some(wait) = frozen.take() {
                            deadline = Instant::now().checked_add(wait);
                        }
                    }
                }
            },
            _ = sleep_toward(deadline), if deadline.is_some() => {
                let reached = deadline.is_some_and(|instant| Instant::now() >= instant);
                if reached {
                    deadline = None;
                    let Some(core) = core.upgrade() else { break };
                    Task::from_core(core).fire_from_timer();
                }
            }
        }
    }
}

async fn sleep_toward(deadline: Option<Instant>) {
    // tokio rejects sleeps past roughly two years; distant deadlines are
    // approached in slices and re-checked.
    const SLICE: Duration = Duration::from_secs(60 * 60 * 24 * 30);
    match deadline {
        Some(instant) => {
            let capped = match Instant::now().checked_add(SLICE) {
                Some(limit) => instant.min(limit),
                None => instant,
            };
            tokio::time::sleep_until(capped).await;
        }
        None => future::pending().await,
    }
}
