//! Transition engine command handlers

use super::{format_timestamp, parse_instant, short_id, CliContext};
use crate::engine::{RunSummary, Scheduler};
use crate::error::Result;
use crate::shutdown::ShutdownCoordinator;
use crate::timeliness::{classify, Verdict};
use chrono::Utc;
use colored::Colorize;
use std::sync::Arc;
use tabled::{Table, Tabled};

/// Transition display row for table output
#[derive(Tabled)]
struct TransitionRow {
    #[tabled(rename = "Activity")]
    activity_id: String,
    #[tabled(rename = "Deadline")]
    deadline: String,
    #[tabled(rename = "From")]
    from_step: String,
    #[tabled(rename = "To")]
    to_step: String,
    #[tabled(rename = "Verdict")]
    verdict: String,
}

/// Run history row for table output
#[derive(Tabled)]
struct RunRow {
    #[tabled(rename = "Run")]
    run_id: String,
    #[tabled(rename = "Started")]
    started: String,
    #[tabled(rename = "Deadlines")]
    deadlines: usize,
    #[tabled(rename = "Transitioned")]
    transitioned: usize,
    #[tabled(rename = "Skipped")]
    skipped: usize,
    #[tabled(rename = "Failures")]
    failures: usize,
}

fn print_summary(summary: &RunSummary) {
    if summary.skipped_in_flight {
        println!("{}", "Another run is in progress; nothing was done".yellow());
        return;
    }

    let header = format!("✓ Run {} finished", short_id(&summary.run_id));
    if summary.has_failures() {
        println!("{}", header.yellow().bold());
    } else {
        println!("{}", header.green().bold());
    }
    println!("  Evaluated at: {}", summary.evaluated_at.to_rfc3339());
    println!("  Deadlines processed: {}", summary.deadlines_processed);
    println!("  Activities examined: {}", summary.activities_examined);
    println!("  Activities transitioned: {}", summary.activities_transitioned());
    println!("  Activities skipped: {}", summary.activities_skipped());

    if !summary.transitions.is_empty() {
        let rows: Vec<TransitionRow> = summary
            .transitions
            .iter()
            .map(|t| TransitionRow {
                activity_id: t.activity_id.clone(),
                deadline: short_id(&t.deadline_id),
                from_step: t.from_step.to_string(),
                to_step: t.to_step.to_string(),
                verdict: t.verdict.to_string(),
            })
            .collect();
        println!();
        println!("{}", Table::new(rows));
    }

    for skipped in &summary.skipped {
        println!(
            "  {} {} ({})",
            "skipped".yellow(),
            skipped.activity_id(),
            skipped.reason()
        );
    }
    for deadline in &summary.skipped_deadlines {
        println!(
            "  {} deadline {}: {}",
            "ignored".yellow(),
            short_id(&deadline.deadline_id),
            deadline.reason
        );
    }
    for failure in &summary.failures {
        println!(
            "  {} {}{}: {}",
            "failed".red(),
            short_id(&failure.deadline_id),
            failure
                .activity_id
                .as_deref()
                .map(|id| format!(" / {}", id))
                .unwrap_or_default(),
            failure.error
        );
    }
}

/// Handle run command
pub async fn handle_run(ctx: &CliContext, at: Option<String>, format: String) -> Result<()> {
    let engine = ctx.engine();
    let summary = match at {
        Some(at) => engine.run_at(parse_instant(&at)?).await,
        None => engine.run_now().await,
    };

    if format == "json" {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print_summary(&summary);
    }
    Ok(())
}

/// Handle runs command
pub async fn handle_runs(ctx: &CliContext, limit: i64) -> Result<()> {
    let runs = ctx.runs().list_recent(limit).await?;

    if runs.is_empty() {
        println!("{}", "No engine runs recorded".yellow());
        return Ok(());
    }

    let rows: Vec<RunRow> = runs
        .iter()
        .map(|run| RunRow {
            run_id: short_id(&run.run_id),
            started: format_timestamp(run.started_at.timestamp()),
            deadlines: run.deadlines_processed,
            transitioned: run.activities_transitioned(),
            skipped: run.activities_skipped(),
            failures: run.failures.len(),
        })
        .collect();

    println!("{}", Table::new(rows));
    Ok(())
}

/// Handle serve command
///
/// Runs the scheduler until SIGINT or SIGTERM.
pub async fn handle_serve(ctx: &CliContext, shutdown: ShutdownCoordinator) -> Result<()> {
    let engine = Arc::new(ctx.engine());
    println!(
        "{}",
        format!(
            "Transition engine running every {}s (Ctrl+C to stop)",
            engine.config().interval_secs
        )
        .cyan()
    );

    let completed = Scheduler::new(engine, shutdown).run().await;
    ctx.db.close().await;

    println!("{}", format!("✓ Stopped after {} run(s)", completed).green().bold());
    Ok(())
}

/// Handle classify command
pub async fn handle_classify(ctx: &CliContext, deadline_id: String, at: Option<String>) -> Result<()> {
    let deadline = ctx.deadline_service().get(&deadline_id).await?;
    let submitted_at = match at {
        Some(at) => parse_instant(&at)?,
        None => Utc::now(),
    };

    let window = deadline.window()?;
    let verdict = if deadline.is_published {
        classify(submitted_at, &window)
    } else {
        Verdict::OnTime
    };

    println!("Deadline: {} ({})", deadline.name, short_id(&deadline.deadline_id));
    println!("  Formal deadline: {}", window.deadline_at.to_rfc3339());
    println!("  Effective deadline: {}", window.effective_deadline().to_rfc3339());
    println!("  Lock after deadline: {}", window.lock_after_deadline);
    if !deadline.is_published {
        println!("  {}", "Unpublished deadlines are not enforced".yellow());
    }
    println!("  Submitted at: {}", submitted_at.to_rfc3339());
    println!("  Verdict: {}", verdict.to_string().bold());

    Ok(())
}
