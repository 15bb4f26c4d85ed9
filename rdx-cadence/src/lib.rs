//! # Cadence
//!
//! A composable, calendar-aware task scheduler for Rust.
//!
//! Cadence turns declarative schedules ("every Monday at 6:30", "once in
//! twenty minutes") into running timer tasks. A schedule is a lazy sequence
//! of time offsets; a task consumes that sequence one offset at a time on
//! the tokio runtime and runs your callbacks when each timer fires.
//!
//! ## Core Concepts
//!
//! - **Schedule**: an immutable, lazily-evaluated plan built from
//!   constructors (`every`, `after`, `of_dates`, weekday and month-day
//!   patterns) and combinators (`concat`, `merge`, `first`, `until`,
//!   `at_time`). Cloning is cheap and every task pulls its own cursor.
//! - **Interval and Period**: the two time vocabularies. An `Interval` is
//!   an exact signed nanosecond span; a `Period` is a calendar amount such
//!   as "1 month and 3 days", including English phrase parsing.
//! - **Task**: a cancellable timer bound to one schedule. Tasks support
//!   nested suspend/resume, atomic rescheduling, manual triggering, tags
//!   and binding to a host object's lifetime.
//! - **TaskRegistry**: an explicit, weak-referencing index for finding
//!   tasks by tag and suspending, resuming or cancelling them in bulk.
//! - **Event-Driven**: every task broadcasts strongly-typed `TaskEvent`s
//!   (fired, suspended, resumed, rescheduled, exhausted, cancelled) that
//!   any number of observers can subscribe to.
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use cadence::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     // 1. Describe when to fire: every ninety seconds, five times.
//!     let schedule = Schedule::every(Interval::seconds(90)).first(5);
//!
//!     // 2. Spawn a task consuming that schedule.
//!     let task = Task::spawn(&schedule, |_task| {
//!         println!("tick");
//!     });
//!
//!     // 3. Watch the task's lifecycle from the outside.
//!     let mut events = task.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("task event: {event:?}");
//!         }
//!     });
//!
//!     // 4. Run until Ctrl+C.
//!     tokio::signal::ctrl_c().await?;
//!     task.cancel();
//!     Ok(())
//! }
//! ```

pub const LIBRARY_NAME: &str = "Cadence";
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// Declare all the modules in the crate.
pub mod calendar;
pub mod clock;
pub mod common;
pub mod events;
pub mod interval;
pub mod period;
pub mod registry;
pub mod schedule;
pub mod task;
pub mod time;

/// A prelude module for easy importing of the most common Cadence types.
pub mod prelude {
    pub use crate::calendar::Monthday;
    pub use crate::common::ActionId;
    pub use crate::events::TaskEvent;
    pub use crate::interval::Interval;
    pub use crate::period::{Period, Vocabulary};
    pub use crate::registry::{TaskKey, TaskRegistry};
    pub use crate::schedule::{OffsetCursor, Schedule};
    pub use crate::task::{RunState, Task, TaskBuilder};
    pub use crate::time::Time;

    // Calendar schedules speak in chrono's day and month names.
    pub use chrono::{Month, Weekday};
}
