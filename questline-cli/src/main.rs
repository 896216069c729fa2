mod config_files;
mod file_store;
mod reports;
mod simulation;
mod util;

use anyhow::{Context, Result, bail};
use chrono::{DateTime, NaiveDate, Utc};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;
use std::time::Duration;

use config_files::FileConfig;
use file_store::FileStore;
use questline_engine::{
    ChecklistItem, ChronosManager, Clock, ConfigLoader, CustomRewards, DayChangeOutcome,
    FixedClock, PathInstance, PathTask, ProgressStore, Quest, QuestStatus, QuestlineEngine,
    Subtask, SystemClock, UserProfile, average_task_rate,
};
use reports::{HistoryView, OutputTarget, Report, ReportFormat, StatusView, write_report};
use simulation::{SimulationConfig, run_simulation};
use util::{parse_date, parse_rate, slugify, split_csv, split_task_entry};

#[derive(Debug, Parser)]
#[command(name = "questline", version)]
#[command(about = "Streaks, milestones and daily resets for the Questline habit tracker")]
struct Args {
    /// JSON file holding profiles, paths, quests and records
    #[arg(long, global = true, default_value = "questline.json")]
    store: PathBuf,

    /// Profile to act on
    #[arg(long, global = true, default_value = "me")]
    user: String,

    /// Pretend today is this day (YYYY-MM-DD) instead of reading the system clock
    #[arg(long, global = true, value_parser = parse_date)]
    today: Option<NaiveDate>,

    /// Engine configuration JSON overriding the defaults
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Milestone catalog JSON overriding the embedded one
    #[arg(long, global = true)]
    catalog: Option<PathBuf>,

    /// Output report format
    #[arg(long, global = true, value_enum, default_value_t = ReportFormat::Console)]
    report: ReportFormat,

    /// Optional path to write the report output instead of stdout
    #[arg(long, global = true)]
    output: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Create the profile and start day tracking
    Init {
        #[arg(long)]
        name: Option<String>,
    },
    /// Add a habit path; tasks are comma-separated, `Task: Sub / Sub` adds subtasks
    AddPath {
        name: String,
        #[arg(long)]
        tasks: String,
        #[arg(long)]
        archetype: Option<String>,
    },
    /// Add a quest for today (or the backlog)
    AddQuest {
        title: String,
        #[arg(long)]
        recurring: bool,
        #[arg(long, default_value_t = 0)]
        coins: i64,
        #[arg(long, default_value_t = 0)]
        stars: i64,
        #[arg(long)]
        backlog: bool,
    },
    /// Check or uncheck a task or subtask on a path
    Toggle {
        #[arg(long)]
        path: String,
        #[arg(long, conflicts_with = "subtask", required_unless_present = "subtask")]
        task: Option<String>,
        #[arg(long)]
        subtask: Option<String>,
        /// Uncheck instead of check
        #[arg(long)]
        undo: bool,
    },
    /// Mark a quest completed and collect its rewards
    CompleteQuest { quest: String },
    /// Prestige a path whose streak reached its milestone
    LevelUp { path: String },
    /// Show paths, quests and wallet
    Status,
    /// Run the day-change reset if the day rolled over
    Reset,
    /// Run the reset now, ignoring the watermark
    ForceReset,
    /// Show completion trend from retained daily records
    History,
    /// Simulate many days against an in-memory store
    Simulate {
        #[arg(long, default_value_t = 30)]
        days: u32,
        #[arg(long, default_value_t = 1337)]
        seed: u64,
        #[arg(long, value_parser = parse_rate, default_value = "0.8")]
        completion_rate: f64,
        #[arg(long, default_value_t = 3)]
        paths: u32,
        /// Leave milestone paths at their level instead of prestiging
        #[arg(long)]
        no_level_up: bool,
    },
    /// Keep checking for the day change until interrupted
    Watch {
        #[arg(long, default_value_t = 60)]
        interval_secs: u64,
        /// Stop after this many checks
        #[arg(long)]
        ticks: Option<u64>,
    },
}

/// Either the host clock or a day pinned with `--today`.
enum CliClock {
    System(SystemClock),
    Fixed(FixedClock),
}

impl Clock for CliClock {
    fn today(&self) -> NaiveDate {
        match self {
            Self::System(clock) => clock.today(),
            Self::Fixed(clock) => clock.today(),
        }
    }

    fn now(&self) -> DateTime<Utc> {
        match self {
            Self::System(clock) => clock.now(),
            Self::Fixed(clock) => clock.now(),
        }
    }
}

type Engine = QuestlineEngine<FileStore, CliClock>;

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    if args.report == ReportFormat::Console {
        announce_banner();
    }

    let loader = FileConfig {
        engine: args.config.clone(),
        catalog: args.catalog.clone(),
    };
    let clock = args
        .today
        .map_or(CliClock::System(SystemClock), |day| CliClock::Fixed(FixedClock::new(day)));

    if let Command::Simulate {
        days,
        seed,
        completion_rate,
        paths,
        no_level_up,
    } = &args.command
    {
        let mut config = SimulationConfig::new(*seed, clock.today())
            .with_days(*days)
            .with_completion_rate(*completion_rate)
            .with_paths(*paths);
        config.auto_level_up = !no_level_up;
        let (engine_config, catalog) = loader.load_all()?;
        let summary = run_simulation(config, engine_config, catalog)?;
        return emit(&args, &[Report::Simulation(summary)]);
    }

    let store = FileStore::open(&args.store)
        .with_context(|| format!("failed to open store {}", args.store.display()))?;
    let engine = QuestlineEngine::load(&loader, store, clock).context("failed to load configuration")?;

    if let Command::Watch {
        interval_secs,
        ticks,
    } = &args.command
    {
        return watch(&args, &engine, *interval_secs, *ticks).await;
    }

    let reports = run_command(&args, &engine)?;
    emit(&args, &reports)
}

fn announce_banner() {
    println!("{}", "🎯 Questline".bright_cyan().bold());
    println!("{}", "================================".cyan());
}

fn emit(args: &Args, reports: &[Report]) -> Result<()> {
    let mut output_target = OutputTarget::new(args.output.clone())?;
    if args.report == ReportFormat::Json && reports.len() > 1 {
        reports::generate_json_report_list(&mut output_target, reports)?;
    } else {
        for report in reports {
            write_report(&mut output_target, args.report, report)?;
        }
    }
    output_target.flush_inner()?;
    Ok(())
}

fn run_command(args: &Args, engine: &Engine) -> Result<Vec<Report>> {
    let user = args.user.as_str();
    let mut chronos = engine.chronos(user);
    let mut reports = Vec::new();

    match &args.command {
        Command::Init { name } => {
            if engine.store().get_profile(user)?.is_some() {
                bail!("profile `{user}` already exists");
            }
            let mut profile = UserProfile::new(user);
            if let Some(name) = name {
                profile.display_name.clone_from(name);
            }
            engine.store().memory().insert_profile(profile)?;
            engine.store().flush()?;
            reports.push(Report::Created {
                kind: "profile",
                id: user.to_string(),
            });
            reports.push(Report::DayChange(chronos.check_day_change()));
        }
        Command::Reset => {
            reports.push(Report::DayChange(chronos.check_day_change()));
        }
        Command::ForceReset => {
            require_profile(engine, user)?;
            reports.push(Report::ForcedReset(chronos.force_reset()));
        }
        command => {
            require_profile(engine, user)?;
            if let Some(report) = day_change_notice(&mut chronos) {
                reports.push(report);
            }
            reports.push(run_daily_command(user, engine, command)?);
        }
    }
    Ok(reports)
}

/// Report the automatic check only when it did something worth showing.
fn day_change_notice(chronos: &mut ChronosManager<'_, FileStore, &CliClock>) -> Option<Report> {
    match chronos.check_day_change() {
        DayChangeOutcome::Latched | DayChangeOutcome::UpToDate => None,
        outcome => Some(Report::DayChange(outcome)),
    }
}

fn require_profile(engine: &Engine, user: &str) -> Result<UserProfile> {
    engine
        .store()
        .get_profile(user)?
        .with_context(|| format!("no profile `{user}`; run `questline init` first"))
}

fn run_daily_command(user: &str, engine: &Engine, command: &Command) -> Result<Report> {
    let tracker = engine.tracker();
    let today = engine.clock().today();
    let report = match command {
        Command::AddPath {
            name,
            tasks,
            archetype,
        } => Report::Created {
            kind: "path",
            id: add_path(user, engine, name, tasks, archetype.as_deref())?,
        },
        Command::AddQuest {
            title,
            recurring,
            coins,
            stars,
            backlog,
        } => {
            let existing = engine.store().memory().snapshot().quests;
            let id = unique_id(slugify(title), |id| existing.contains_key(id));
            if id.is_empty() {
                bail!("quest title `{title}` has no usable characters");
            }
            let mut quest = Quest::new(&id, user, title.as_str(), today);
            if *recurring {
                quest = quest.recurring();
            }
            if *backlog {
                quest = quest.with_status(QuestStatus::Backlog);
            }
            quest.custom_rewards = CustomRewards {
                coins: *coins,
                stars: *stars,
            };
            engine.store().memory().put_quest(quest);
            engine.store().flush()?;
            Report::Created { kind: "quest", id }
        }
        Command::Toggle {
            path,
            task,
            subtask,
            undo,
        } => {
            let item = match (task, subtask) {
                (Some(task), _) => ChecklistItem::Task(task.clone()),
                (None, Some(subtask)) => ChecklistItem::Subtask(subtask.clone()),
                (None, None) => bail!("either --task or --subtask is required"),
            };
            let outcome = tracker.toggle_item(user, path, &item, !undo)?;
            Report::Toggle(Box::new(outcome))
        }
        Command::CompleteQuest { quest } => {
            Report::QuestCompleted(tracker.complete_quest(user, quest)?)
        }
        Command::LevelUp { path } => Report::LevelUp {
            path_id: path.clone(),
            outcome: tracker.level_up_path(user, path)?,
        },
        Command::Status => {
            let profile = require_profile(engine, user)?;
            Report::Status(StatusView {
                user_id: profile.user_id,
                today,
                last_reset_date: profile.last_reset_date,
                wallet: profile.wallet,
                paths: tracker.path_overviews(user)?,
                quests: engine.store().get_quests(user)?,
            })
        }
        Command::History => {
            let points = engine.history(user)?;
            Report::History(HistoryView {
                user_id: user.to_string(),
                average_task_rate: average_task_rate(&points),
                points,
            })
        }
        Command::Init { .. }
        | Command::Reset
        | Command::ForceReset
        | Command::Simulate { .. }
        | Command::Watch { .. } => bail!("command is not a daily action"),
    };
    Ok(report)
}

fn add_path(
    user: &str,
    engine: &Engine,
    name: &str,
    tasks: &str,
    archetype: Option<&str>,
) -> Result<String> {
    let id = slugify(name);
    if id.is_empty() {
        bail!("path name `{name}` has no usable characters");
    }
    if engine.store().get_path(&id)?.is_some() {
        bail!("path `{id}` already exists");
    }
    let entries = split_csv(tasks);
    if entries.is_empty() {
        bail!("a path needs at least one task");
    }

    let mut path = PathInstance::new(&id, user, name);
    if let Some(archetype) = archetype {
        if !engine.catalog().archetypes.contains_key(archetype) {
            bail!("unknown archetype `{archetype}`");
        }
        path.archetype = archetype.to_string();
    }
    for entry in entries {
        let (title, subtasks) = split_task_entry(&entry);
        let task_id = unique_id(slugify(&title), |candidate| {
            path.tasks.iter().any(|task| task.id == candidate)
        });
        let subtasks = subtasks
            .iter()
            .map(|sub| Subtask {
                id: format!("{task_id}-{}", slugify(sub)),
                title: sub.clone(),
            })
            .collect();
        path.tasks.push(PathTask {
            id: task_id,
            title,
            subtasks,
        });
    }
    engine.store().memory().put_path(path);
    engine.store().flush()?;
    Ok(id)
}

/// `base`, or `base-2`, `base-3`, ... until `taken` says no.
fn unique_id(base: String, taken: impl Fn(&str) -> bool) -> String {
    if !taken(&base) {
        return base;
    }
    (2..)
        .map(|n| format!("{base}-{n}"))
        .find(|candidate| !taken(candidate))
        .unwrap_or(base)
}

async fn watch(args: &Args, engine: &Engine, interval_secs: u64, ticks: Option<u64>) -> Result<()> {
    require_profile(engine, &args.user)?;
    let mut chronos = engine.chronos(&args.user);
    let mut output_target = OutputTarget::new(args.output.clone())?;
    let mut interval = tokio::time::interval(Duration::from_secs(interval_secs.max(1)));
    let mut checks = 0_u64;

    loop {
        tokio::select! {
            _ = interval.tick() => {}
            _ = tokio::signal::ctrl_c() => {
                log::info!("watch interrupted after {checks} checks");
                break;
            }
        }

        engine
            .store()
            .reload()
            .with_context(|| format!("failed to reload {}", engine.store().path().display()))?;
        let outcome = chronos.check_day_change();
        if !matches!(outcome, DayChangeOutcome::Latched | DayChangeOutcome::UpToDate) {
            write_report(&mut output_target, args.report, &Report::DayChange(outcome))?;
            output_target.flush_inner()?;
        }

        checks += 1;
        if ticks.is_some_and(|limit| checks >= limit) {
            break;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unique_ids_skip_taken_suffixes() {
        let taken = ["read", "read-2"];
        assert_eq!(unique_id("read".into(), |id| taken.contains(&id)), "read-3");
        assert_eq!(unique_id("run".into(), |id| taken.contains(&id)), "run");
    }

    #[test]
    fn args_parse_global_flags_after_subcommand() {
        let args = Args::try_parse_from([
            "questline",
            "toggle",
            "--path",
            "run",
            "--task",
            "stretch",
            "--today",
            "2024-05-01",
            "--report",
            "json",
        ])
        .unwrap();
        assert_eq!(args.today, NaiveDate::from_ymd_opt(2024, 5, 1));
        assert_eq!(args.report, ReportFormat::Json);
        assert!(matches!(
            args.command,
            Command::Toggle { ref task, undo: false, .. } if task.as_deref() == Some("stretch")
        ));
    }

    #[test]
    fn toggle_requires_an_item() {
        assert!(Args::try_parse_from(["questline", "toggle", "--path", "run"]).is_err());
        assert!(
            Args::try_parse_from([
                "questline", "toggle", "--path", "run", "--task", "a", "--subtask", "b"
            ])
            .is_err()
        );
    }
}
