use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::ValueEnum;
use colored::Colorize;
use questline_engine::{
    DailyRecord, DayChangeOutcome, LevelUpOutcome, PathOverview, Quest, QuestCompletion,
    QuestStatus, ResetReport, ToggleOutcome, TrendPoint, Wallet,
};
use serde::Serialize;
use std::fs::File;
use std::io::{BufWriter, Write, stdout};
use std::path::PathBuf;

use crate::simulation::SimulationSummary;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ReportFormat {
    /// Colored human-readable output
    Console,
    /// Machine-readable JSON
    Json,
    /// Markdown suitable for pasting into notes
    Markdown,
}

/// Everything shown on `status`.
#[derive(Debug, Clone, Serialize)]
pub struct StatusView {
    pub user_id: String,
    pub today: NaiveDate,
    pub last_reset_date: Option<NaiveDate>,
    pub wallet: Wallet,
    pub paths: Vec<PathOverview>,
    pub quests: Vec<Quest>,
}

#[derive(Debug, Clone, Serialize)]
pub struct HistoryView {
    pub user_id: String,
    pub average_task_rate: u8,
    pub points: Vec<TrendPoint>,
}

/// A command result ready for rendering.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "report", content = "data", rename_all = "snake_case")]
pub enum Report {
    Created { kind: &'static str, id: String },
    DayChange(DayChangeOutcome),
    ForcedReset(ResetReport),
    Toggle(Box<ToggleOutcome>),
    QuestCompleted(QuestCompletion),
    LevelUp { path_id: String, outcome: LevelUpOutcome },
    Status(StatusView),
    History(HistoryView),
    Simulation(SimulationSummary),
}

pub enum OutputTarget {
    Stdout(BufWriter<std::io::Stdout>),
    File(BufWriter<File>),
}

impl OutputTarget {
    pub fn new(path: Option<PathBuf>) -> Result<Self> {
        if let Some(path) = path {
            let file = File::create(&path)
                .with_context(|| format!("failed to create {}", path.display()))?;
            Ok(Self::File(BufWriter::new(file)))
        } else {
            Ok(Self::Stdout(BufWriter::new(stdout())))
        }
    }

    fn writer(&mut self) -> &mut dyn Write {
        match self {
            Self::Stdout(w) => w,
            Self::File(w) => w,
        }
    }

    pub fn flush_inner(&mut self) -> std::io::Result<()> {
        match self {
            Self::Stdout(w) => w.flush(),
            Self::File(w) => w.flush(),
        }
    }
}

impl Write for OutputTarget {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.writer().write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.flush_inner()
    }
}

pub fn write_report(out: &mut impl Write, format: ReportFormat, report: &Report) -> Result<()> {
    match format {
        ReportFormat::Console => generate_console_report(out, report),
        ReportFormat::Json => generate_json_report(out, report),
        ReportFormat::Markdown => generate_markdown_report(out, report),
    }
}

pub fn generate_json_report(out: &mut impl Write, report: &Report) -> Result<()> {
    let json_output = serde_json::to_string_pretty(report)?;
    writeln!(out, "{json_output}")?;
    Ok(())
}

/// Several reports from one command as a single JSON array.
pub fn generate_json_report_list(out: &mut impl Write, reports: &[Report]) -> Result<()> {
    let json_output = serde_json::to_string_pretty(reports)?;
    writeln!(out, "{json_output}")?;
    Ok(())
}

pub fn generate_console_report(out: &mut impl Write, report: &Report) -> Result<()> {
    match report {
        Report::Created { kind, id } => {
            writeln!(out, "✅ Created {kind} {}", id.bold())?;
        }
        Report::DayChange(outcome) => console_day_change(out, outcome)?,
        Report::ForcedReset(report) => console_reset(out, report)?,
        Report::Toggle(outcome) => console_toggle(out, outcome)?,
        Report::QuestCompleted(done) => {
            writeln!(out, "✅ Quest {} completed", done.quest_id.bold())?;
            console_rewards(out, done.rewards.coins, done.rewards.stars, None)?;
            console_tolerated(out, &done.tolerated_failures)?;
        }
        Report::LevelUp { path_id, outcome } => {
            if outcome.success {
                writeln!(
                    out,
                    "⬆️  {} is now level {}",
                    path_id.bold(),
                    outcome.state.current_level.to_string().green()
                )?;
            } else if let Some(reason) = &outcome.reason {
                writeln!(out, "❌ {} cannot level up: {}", path_id.bold(), reason.to_string().red())?;
            }
        }
        Report::Status(view) => console_status(out, view)?,
        Report::History(view) => console_history(out, view)?,
        Report::Simulation(summary) => console_simulation(out, summary)?,
    }
    Ok(())
}

fn console_day_change(out: &mut impl Write, outcome: &DayChangeOutcome) -> Result<()> {
    match outcome {
        DayChangeOutcome::Latched => writeln!(out, "⏸  Day change already checked today")?,
        DayChangeOutcome::UpToDate => writeln!(out, "✅ Already reset for today")?,
        DayChangeOutcome::WatermarkInitialized { date, error } => {
            writeln!(out, "🌱 Tracking starts on {date}")?;
            if let Some(error) = error {
                writeln!(out, "   ⚠️  {}", error.to_string().yellow())?;
            }
        }
        DayChangeOutcome::Reset(report) => console_reset(out, report)?,
    }
    Ok(())
}

fn console_reset(out: &mut impl Write, report: &ResetReport) -> Result<()> {
    let title = if report.forced {
        "🌅 Forced Reset"
    } else {
        "🌅 Day Change Reset"
    };
    writeln!(out, "{}", title.bright_cyan().bold())?;
    writeln!(out, "{}", "====================".cyan())?;
    let status = if report.success {
        "✅ PASS".green()
    } else {
        "❌ FAIL".red()
    };
    writeln!(out, "{status} reset for {}", report.date)?;
    writeln!(out, "Paths processed: {}", report.paths_processed)?;
    writeln!(
        out,
        "Streaks maintained: {} {}",
        report.streaks_maintained.len().to_string().green(),
        path_list(&report.streaks_maintained)
    )?;
    writeln!(
        out,
        "Streaks reset: {} {}",
        report.streaks_reset.len().to_string().red(),
        path_list(&report.streaks_reset)
    )?;
    writeln!(out, "Quests migrated: {}", report.quests_processed)?;
    if !report.errors.is_empty() {
        writeln!(out, "Errors:")?;
        for error in &report.errors {
            writeln!(out, "  • {}", error.to_string().red())?;
        }
    }
    if let Some(record) = &report.daily_record {
        writeln!(out)?;
        console_record(out, record)?;
    }
    Ok(())
}

fn path_list(ids: &[String]) -> String {
    if ids.is_empty() {
        String::new()
    } else {
        format!("({})", ids.join(", "))
    }
}

fn console_record(out: &mut impl Write, record: &DailyRecord) -> Result<()> {
    writeln!(out, "{}", format!("📊 Yesterday ({})", record.date).bright_yellow().bold())?;
    for stat in &record.path_stats {
        let mark = if stat.was_reset { "💔" } else { "🔥" };
        writeln!(
            out,
            "{mark} {:20} {}/{} tasks, streak {} → {}",
            stat.path_name, stat.completed_count, stat.total_count, stat.streak_before,
            stat.streak_after
        )?;
    }
    writeln!(
        out,
        "Quests: {}/{}  Coins: {}  Stars: {}",
        record.quests_completed, record.quests_total, record.coins_earned, record.stars_earned
    )?;
    Ok(())
}

fn console_rewards(
    out: &mut impl Write,
    coins: i64,
    stars: i64,
    ticket: Option<&str>,
) -> Result<()> {
    if coins == 0 && stars == 0 && ticket.is_none() {
        return Ok(());
    }
    write!(out, "   💰 +{coins} coins, +{stars} stars")?;
    if let Some(ticket) = ticket {
        write!(out, ", ticket {}", ticket.magenta())?;
    }
    writeln!(out)?;
    Ok(())
}

fn console_tolerated(out: &mut impl Write, failures: &[String]) -> Result<()> {
    for failure in failures {
        writeln!(out, "   ⚠️  {}", failure.yellow())?;
    }
    Ok(())
}

fn console_toggle(out: &mut impl Write, outcome: &ToggleOutcome) -> Result<()> {
    let entry = &outcome.entry;
    writeln!(
        out,
        "☑️  {}: {}/{} ({}%)",
        entry.path_id.bold(),
        entry.tasks_completed,
        entry.tasks_total,
        entry.percentage
    )?;
    if let Some(increment) = &outcome.increment {
        writeln!(
            out,
            "🔥 Streak {} ({})",
            increment.state.current_streak.to_string().green(),
            outcome.visual.stage.as_str()
        )?;
        if increment.milestone_reached {
            writeln!(out, "{}", "🏆 Milestone reached! Level up is available.".bright_green())?;
        } else if increment.sub_milestone_reached {
            writeln!(out, "{}", "✨ Sub-milestone bonus".bright_green())?;
        }
    }
    console_rewards(
        out,
        outcome.rewards.coins,
        outcome.rewards.stars,
        outcome.rewards.ticket.as_deref(),
    )?;
    console_tolerated(out, &outcome.tolerated_failures)
}

fn console_status(out: &mut impl Write, view: &StatusView) -> Result<()> {
    writeln!(out, "{}", format!("📋 {} on {}", view.user_id, view.today).bright_cyan().bold())?;
    writeln!(out, "{}", "====================".cyan())?;
    writeln!(
        out,
        "Wallet: {} coins, {} stars, {} tickets",
        view.wallet.coins,
        view.wallet.stars,
        view.wallet.tickets.len()
    )?;
    match view.last_reset_date {
        Some(date) if date == view.today => {}
        Some(date) => writeln!(out, "{}", format!("⚠️  Last reset ran on {date}").yellow())?,
        None => writeln!(out, "{}", "⚠️  Day tracking not started".yellow())?,
    }
    writeln!(out)?;

    if view.paths.is_empty() {
        writeln!(out, "No active paths.")?;
    }
    for overview in &view.paths {
        let path = &overview.path;
        let done = overview
            .today
            .as_ref()
            .map_or(0, |entry| entry.tasks_completed);
        writeln!(
            out,
            "{} L{} 🔥{} [{}] {}/{} today, {} days to milestone",
            path.name.bold(),
            path.current_level(),
            path.current_streak(),
            overview.visual.stage.as_str(),
            done,
            path.tasks.len(),
            overview.visual.days_until_milestone
        )?;
        for task in &path.tasks {
            let mark = if path.checklist.completed_task_ids.contains(&task.id) {
                "✅".green()
            } else {
                "⬜".normal()
            };
            writeln!(out, "   {mark} {} ({})", task.title, task.id.dimmed())?;
            for sub in &task.subtasks {
                let mark = if path.checklist.completed_subtask_ids.contains(&sub.id) {
                    "✅".green()
                } else {
                    "⬜".normal()
                };
                writeln!(out, "      {mark} {} ({})", sub.title, sub.id.dimmed())?;
            }
        }
    }

    let open: Vec<&Quest> = view
        .quests
        .iter()
        .filter(|quest| quest.status != QuestStatus::Completed)
        .collect();
    if !open.is_empty() {
        writeln!(out)?;
        writeln!(out, "{}", "🗺️  Quests".bright_yellow().bold())?;
        for quest in open {
            let recurring = if quest.is_recurring { " ↻" } else { "" };
            writeln!(
                out,
                "   [{}] {}{recurring} ({})",
                quest.status,
                quest.title,
                quest.id.dimmed()
            )?;
        }
    }
    Ok(())
}

fn console_history(out: &mut impl Write, view: &HistoryView) -> Result<()> {
    writeln!(out, "{}", "📈 Completion History".bright_cyan().bold())?;
    writeln!(out, "{}", "=====================".cyan())?;
    if view.points.is_empty() {
        writeln!(out, "No daily records yet.")?;
        return Ok(());
    }
    for point in &view.points {
        writeln!(
            out,
            "{}  {:>3}%  perfect {}/{}  quests {}  broken {}",
            point.date,
            point.task_rate,
            point.paths_perfect,
            point.paths_total,
            point.quests_completed,
            point.streaks_broken
        )?;
    }
    writeln!(out, "Average task rate: {}%", view.average_task_rate)?;
    Ok(())
}

fn console_simulation(out: &mut impl Write, summary: &SimulationSummary) -> Result<()> {
    writeln!(out, "{}", "🎲 Simulation Summary".bright_cyan().bold())?;
    writeln!(out, "{}", "=====================".cyan())?;
    writeln!(
        out,
        "Seed {} over {} days at {:.0}% completion",
        summary.seed,
        summary.days,
        summary.completion_rate * 100.0
    )?;
    writeln!(out, "Perfect path-days: {}", summary.perfect_days)?;
    writeln!(
        out,
        "Milestones: {} (sub {}), prestiges: {}",
        summary.milestones, summary.sub_milestones, summary.prestiges
    )?;
    writeln!(out, "Streaks broken: {}", summary.streaks_broken.to_string().red())?;
    writeln!(out, "Rewards: {} coins, {} stars", summary.coins, summary.stars)?;
    writeln!(out, "Average task rate: {}%", summary.average_task_rate)?;
    writeln!(out)?;
    for path in &summary.paths {
        writeln!(
            out,
            "{:10} level {:2} streak {:3} best {:3} will {:.2}",
            path.id, path.level, path.streak, path.best_streak, path.total_will
        )?;
    }
    Ok(())
}

pub fn generate_markdown_report(out: &mut impl Write, report: &Report) -> Result<()> {
    match report {
        Report::Created { kind, id } => writeln!(out, "- Created {kind} `{id}`")?,
        Report::DayChange(DayChangeOutcome::Reset(report)) | Report::ForcedReset(report) => {
            markdown_reset(out, report)?;
        }
        Report::DayChange(DayChangeOutcome::Latched) => {
            writeln!(out, "_Day change already checked today._")?;
        }
        Report::DayChange(DayChangeOutcome::UpToDate) => {
            writeln!(out, "_Already reset for today._")?;
        }
        Report::DayChange(DayChangeOutcome::WatermarkInitialized { date, .. }) => {
            writeln!(out, "_Tracking starts on {date}._")?;
        }
        Report::Toggle(outcome) => {
            let entry = &outcome.entry;
            writeln!(
                out,
                "- `{}`: {}/{} ({}%)",
                entry.path_id, entry.tasks_completed, entry.tasks_total, entry.percentage
            )?;
            if let Some(increment) = &outcome.increment {
                writeln!(out, "- Streak: **{}**", increment.state.current_streak)?;
            }
        }
        Report::QuestCompleted(done) => {
            writeln!(
                out,
                "- Quest `{}` completed (+{} coins, +{} stars)",
                done.quest_id, done.rewards.coins, done.rewards.stars
            )?;
        }
        Report::LevelUp { path_id, outcome } => match &outcome.reason {
            None => writeln!(out, "- `{path_id}` is now level {}", outcome.state.current_level)?,
            Some(reason) => writeln!(out, "- `{path_id}` cannot level up: {reason}")?,
        },
        Report::Status(view) => markdown_status(out, view)?,
        Report::History(view) => markdown_history(out, view)?,
        Report::Simulation(summary) => markdown_simulation(out, summary)?,
    }
    Ok(())
}

fn markdown_reset(out: &mut impl Write, report: &ResetReport) -> Result<()> {
    let status = if report.success { "✅" } else { "❌" };
    writeln!(out, "# {status} Reset for {}\n", report.date)?;
    writeln!(out, "- **Forced**: {}", report.forced)?;
    writeln!(out, "- **Paths processed**: {}", report.paths_processed)?;
    writeln!(
        out,
        "- **Streaks maintained**: {} {}",
        report.streaks_maintained.len(),
        path_list(&report.streaks_maintained)
    )?;
    writeln!(
        out,
        "- **Streaks reset**: {} {}",
        report.streaks_reset.len(),
        path_list(&report.streaks_reset)
    )?;
    writeln!(out, "- **Quests migrated**: {}", report.quests_processed)?;
    if !report.errors.is_empty() {
        writeln!(out, "- **Errors**:")?;
        for error in &report.errors {
            writeln!(out, "  - {error}")?;
        }
    }
    if let Some(record) = &report.daily_record {
        writeln!(out, "\n## Yesterday ({})\n", record.date)?;
        writeln!(out, "| Path | Tasks | Streak before | Streak after |")?;
        writeln!(out, "|------|-------|---------------|--------------|")?;
        for stat in &record.path_stats {
            writeln!(
                out,
                "| {} | {}/{} | {} | {} |",
                stat.path_name,
                stat.completed_count,
                stat.total_count,
                stat.streak_before,
                stat.streak_after
            )?;
        }
        writeln!(
            out,
            "\nQuests {}/{}, {} coins, {} stars",
            record.quests_completed, record.quests_total, record.coins_earned, record.stars_earned
        )?;
    }
    Ok(())
}

fn markdown_status(out: &mut impl Write, view: &StatusView) -> Result<()> {
    writeln!(out, "# {} on {}\n", view.user_id, view.today)?;
    writeln!(
        out,
        "- **Wallet**: {} coins, {} stars\n",
        view.wallet.coins, view.wallet.stars
    )?;
    writeln!(out, "| Path | Level | Streak | Stage | Days to milestone |")?;
    writeln!(out, "|------|-------|--------|-------|-------------------|")?;
    for overview in &view.paths {
        writeln!(
            out,
            "| {} | {} | {} | {} | {} |",
            overview.path.name,
            overview.path.current_level(),
            overview.path.current_streak(),
            overview.visual.stage.as_str(),
            overview.visual.days_until_milestone
        )?;
    }
    Ok(())
}

fn markdown_history(out: &mut impl Write, view: &HistoryView) -> Result<()> {
    writeln!(out, "# Completion History\n")?;
    writeln!(out, "| Date | Task rate | Perfect paths | Quests | Broken |")?;
    writeln!(out, "|------|-----------|---------------|--------|--------|")?;
    for point in &view.points {
        writeln!(
            out,
            "| {} | {}% | {}/{} | {} | {} |",
            point.date,
            point.task_rate,
            point.paths_perfect,
            point.paths_total,
            point.quests_completed,
            point.streaks_broken
        )?;
    }
    writeln!(out, "\n**Average task rate**: {}%", view.average_task_rate)?;
    Ok(())
}

fn markdown_simulation(out: &mut impl Write, summary: &SimulationSummary) -> Result<()> {
    writeln!(out, "# Simulation (seed {})\n", summary.seed)?;
    writeln!(out, "- **Days**: {}", summary.days)?;
    writeln!(out, "- **Perfect path-days**: {}", summary.perfect_days)?;
    writeln!(out, "- **Prestiges**: {}", summary.prestiges)?;
    writeln!(out, "- **Streaks broken**: {}", summary.streaks_broken)?;
    writeln!(out, "- **Average task rate**: {}%", summary.average_task_rate)?;
    Ok(())
}
