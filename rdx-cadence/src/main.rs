use std::env;
use std::sync::Arc;

use anyhow::Result;
use cadence::prelude::*;
use cadence::{LIBRARY_NAME, VERSION};
use colored::Colorize;
use serde::Deserialize;
use tracing::{info, warn};

/// Knobs for the demo, loadable from an optional TOML file whose base name
/// is passed as the first argument.
#[derive(Debug, Clone, Deserialize)]
struct DemoConfig {
    /// Seconds between fires of the steady ticker.
    #[serde(default = "default_tick_seconds")]
    tick_seconds: i64,
    /// How many times the steady ticker fires before exhausting.
    #[serde(default = "default_tick_count")]
    tick_count: usize,
    /// English phrase driving the second task.
    #[serde(default = "default_phrase")]
    phrase: String,
    /// Seconds until the one-shot task fires.
    #[serde(default = "default_one_shot_seconds")]
    one_shot_seconds: i64,
}

fn default_tick_seconds() -> i64 {
    2
}

fn default_tick_count() -> usize {
    5
}

fn default_phrase() -> String {
    "seven seconds".to_string()
}

fn default_one_shot_seconds() -> i64 {
    4
}

fn load_config() -> Result<DemoConfig> {
    let source = env::args().nth(1).unwrap_or_else(|| "cadence-dev".to_string());
    let settings = config::Config::builder()
        .add_source(config::File::with_name(&source).required(false))
        .build()?;
    Ok(settings.try_deserialize()?)
}

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Initialize structured logging.
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .with_target(false)
        .init();

    // 2. Load the optional demo configuration.
    let config = load_config()?;
    println!("{} v{}", LIBRARY_NAME.cyan().bold(), VERSION);
    info!(?config, "demo starting");

    // 3. One registry, so every demo task can be swept up by tag.
    let registry = TaskRegistry::new();

    // 4. Spawn the demo tasks. The handles stay in scope: dropping the
    //    last handle ends a task, and the registry holds only weak ones.
    let steady = spawn_steady_ticker(&config, &registry);
    let phrased = spawn_phrase_task(&config, &registry);
    let one_shot = spawn_one_shot(&config, &registry);
    let _conductor = spawn_conductor(&registry);

    // 5. Watch each task's lifecycle from the outside.
    watch_events("STEADY", &steady);
    watch_events("PHRASE", &phrased);
    watch_events("ONE-SHOT", &one_shot);

    // 6. Run until Ctrl+C, then cancel the lot.
    tokio::signal::ctrl_c().await?;
    println!("{}", "shutting down".yellow());
    registry.cancel_all("demo");
    Ok(())
}

/// The steady ticker: a fixed interval limited to a fire count.
fn spawn_steady_ticker(config: &DemoConfig, registry: &Arc<TaskRegistry>) -> Task {
    let schedule =
        Schedule::every(Interval::seconds(config.tick_seconds)).first(config.tick_count);
    Task::builder(&schedule)
        .tag("demo")
        .tag("steady")
        .registry(registry)
        .spawn(|task| {
            println!(
                "<-- [{}] fire #{}",
                "STEADY".green(),
                task.execution_count()
            );
        })
}

/// A task whose schedule is written in English.
fn spawn_phrase_task(config: &DemoConfig, registry: &Arc<TaskRegistry>) -> Task {
    let vocabulary = Vocabulary::standard();
    let schedule = Schedule::every_phrase(&config.phrase, &vocabulary);
    if schedule.is_never() {
        warn!(
            phrase = %config.phrase,
            "phrase did not parse, the task will sit exhausted"
        );
    }
    let phrase = config.phrase.clone();
    Task::builder(&schedule)
        .tag("demo")
        .tag("phrase")
        .registry(registry)
        .spawn(move |_| println!("<-- [{}] \"{}\" elapsed", "PHRASE".blue(), phrase))
}

/// Fires once, then the exhaustion shows up in the event stream.
fn spawn_one_shot(config: &DemoConfig, registry: &Arc<TaskRegistry>) -> Task {
    let schedule = Schedule::after(Interval::seconds(config.one_shot_seconds));
    Task::builder(&schedule)
        .tag("demo")
        .registry(registry)
        .spawn(|_| println!("<-- [{}] single fire", "ONE-SHOT".magenta()))
}

/// Pauses the steady ticker partway through, then resumes it, showing the
/// registry's bulk operations from a task of their own.
fn spawn_conductor(registry: &Arc<TaskRegistry>) -> Task {
    let controller = registry.clone();
    let schedule = Schedule::of([Interval::seconds(5), Interval::seconds(3)]);
    Task::spawn(&schedule, move |task| {
        if task.execution_count() == 1 {
            println!("{}", "pausing the steady ticker".yellow());
            controller.suspend_all("steady");
        } else {
            println!("{}", "resuming the steady ticker".yellow());
            controller.resume_all("steady");
        }
    })
}

/// Prints every lifecycle event a task broadcasts.
fn watch_events(label: &'static str, task: &Task) {
    let mut events = task.subscribe();
    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            info!("[{}] => {:?}", label, event);
        }
    });
}
